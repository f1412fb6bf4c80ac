use crate::aggregate::{NumericTable, SESSION_COLUMNS, SessionRow};
use crate::csv;
use crate::table::{ExportRecord, RecordMeta, TableKind};
use crate::time::Timestamp;
use tracing::{debug, info, warn};
use ucm_core::DeviceInfo;

pub const USER_COLUMNS: [&str; 5] = ["id", "device_id", "age_group", "gender", "gaming_exp"];

/// Answers from the participant questionnaire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub age_group: String,
    pub gender: String,
    /// Negative when not answered.
    pub gaming_exp: i32,
}

impl UserProfile {
    fn gaming_exp_cell(&self) -> String {
        if self.gaming_exp < 0 {
            String::new()
        } else {
            self.gaming_exp.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmailBody {
    Properties(Vec<(String, String)>),
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl EmailBody {
    /// One `key: value` pair per line: the header under `data`, then each
    /// table row as `row_<n>`, counted from 1.
    fn entries(&self) -> Vec<(String, String)> {
        match self {
            EmailBody::Properties(props) => {
                let joined = props
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![("data".to_string(), joined)]
            }
            EmailBody::Rows { columns, rows } => {
                let mut out = vec![("data".to_string(), columns.join(","))];
                out.extend(
                    rows.iter()
                        .enumerate()
                        .map(|(i, row)| (format!("row_{}", i + 1), row.join(","))),
                );
                out
            }
        }
    }
}

/// Data set as it appears in the e-mail. The body is kept structured until
/// the message is composed.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailEntry {
    pub table: TableKind,
    pub meta: RecordMeta,
    pub body: EmailBody,
}

impl EmailEntry {
    /// `key: value` lines of this entry.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("table: {}", self.table)];
        lines.extend(self.meta.entries().into_iter().map(|(k, v)| format!("{k}: {v}")));
        lines.extend(self.body.entries().into_iter().map(|(k, v)| format!("{k}: {v}")));
        lines
    }
}

/// Everything queued for export for the current participant.
#[derive(Debug, Clone, Default)]
pub struct DataCollection {
    user_id: String,
    device_id: String,
    records: Vec<ExportRecord>,
    email: Vec<EmailEntry>,
    is_invalid: bool,
    is_interrupted: bool,
    is_data_saved: bool,
    is_data_sent: bool,
}

impl DataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a collection for `user_id`, beginning with the device table.
    pub fn new_collection(&mut self, user_id: &str, device: &DeviceInfo, ts: &Timestamp) {
        self.clear();
        self.user_id = user_id.to_string();
        self.device_id = device.id();

        let props = device.properties();
        let columns: Vec<String> = props.iter().map(|(k, _)| k.to_string()).collect();
        let row: Vec<String> = props.iter().map(|(_, v)| v.clone()).collect();
        let meta = RecordMeta {
            id: Some(self.device_id.clone()),
            time: Some(ts.unix),
            ..RecordMeta::default()
        };
        self.push(ExportRecord {
            table: TableKind::Device,
            payload: csv::text_table(&columns, &[row]),
            columns,
            meta: meta.clone(),
        });
        self.email.push(EmailEntry {
            table: TableKind::Device,
            meta,
            body: EmailBody::Properties(
                props.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            ),
        });
    }

    pub fn add_user_data(&mut self, profile: &UserProfile, task: &str, ts: &Timestamp) {
        let columns: Vec<String> = USER_COLUMNS.iter().map(|c| c.to_string()).collect();
        let row = vec![
            self.user_id.clone(),
            self.device_id.clone(),
            profile.age_group.clone(),
            profile.gender.clone(),
            profile.gaming_exp_cell(),
        ];
        let meta = RecordMeta {
            user: Some(self.user_id.clone()),
            task: Some(task.to_string()),
            time: Some(ts.unix),
            ..RecordMeta::default()
        };
        self.push(ExportRecord {
            table: TableKind::User,
            payload: csv::text_table(&columns, std::slice::from_ref(&row)),
            columns: columns.clone(),
            meta: meta.clone(),
        });
        self.email.push(EmailEntry {
            table: TableKind::User,
            meta,
            body: EmailBody::Rows {
                columns,
                rows: vec![row],
            },
        });
    }

    /// Queues the finalized trials of one block.
    pub fn add_trials(&mut self, table: &NumericTable, meta: RecordMeta) {
        if self.is_invalid {
            warn!("collection is invalid, dropping trials of block {:?}", meta.block);
            return;
        }
        self.push(ExportRecord {
            table: TableKind::Trials,
            columns: table.columns.clone(),
            payload: table.to_csv(),
            meta: meta.clone(),
        });
        let rows = table
            .rows
            .iter()
            .map(|r| r.iter().copied().map(csv::format_cell).collect())
            .collect();
        self.email.push(EmailEntry {
            table: TableKind::Trials,
            meta,
            body: EmailBody::Rows {
                columns: table.columns.clone(),
                rows,
            },
        });
    }

    /// Queues the session summary. Called once, after the last block.
    pub fn add_session(&mut self, rows: &[SessionRow], meta: RecordMeta) {
        if rows.is_empty() {
            debug!("no scored blocks, skipping session table");
            return;
        }
        let columns: Vec<String> = SESSION_COLUMNS.iter().map(|c| c.to_string()).collect();
        let cells: Vec<Vec<String>> = rows.iter().map(SessionRow::cells).collect();
        self.push(ExportRecord {
            table: TableKind::Session,
            payload: csv::text_table(&columns, &cells),
            columns: columns.clone(),
            meta: meta.clone(),
        });
        self.email.push(EmailEntry {
            table: TableKind::Session,
            meta,
            body: EmailBody::Rows {
                columns,
                rows: cells,
            },
        });
    }

    fn push(&mut self, record: ExportRecord) {
        debug!(table = %record.table, bytes = record.payload.len(), "queued data set");
        self.records.push(record);
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn records(&self) -> &[ExportRecord] {
        &self.records
    }

    pub fn email_entries(&self) -> &[EmailEntry] {
        &self.email
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Marks the collection as unusable. Nothing of it will be exported.
    pub fn mark_invalid(&mut self) {
        self.is_invalid = true;
    }

    pub fn is_invalid(&self) -> bool {
        self.is_invalid
    }

    /// Drops the trials and session tables queued so far and blocks the
    /// collection from export. Device and user tables stay for the next run.
    pub fn discard_session(&mut self) {
        let before = self.records.len();
        let per_session = |t: TableKind| matches!(t, TableKind::Trials | TableKind::Session);
        self.records.retain(|r| !per_session(r.table));
        self.email.retain(|e| !per_session(e.table));
        self.is_interrupted = true;
        info!(dropped = before - self.records.len(), "session data discarded");
    }

    pub fn is_interrupted(&self) -> bool {
        self.is_interrupted
    }

    pub fn is_data_saved(&self) -> bool {
        self.is_data_saved
    }

    pub fn set_data_saved(&mut self, saved: bool) {
        self.is_data_saved = saved;
    }

    pub fn is_data_sent(&self) -> bool {
        self.is_data_sent
    }

    pub fn set_data_sent(&mut self, sent: bool) {
        self.is_data_sent = sent;
    }

    /// Drops all queued data and resets the flags.
    pub fn clear(&mut self) {
        self.records.clear();
        self.email.clear();
        self.is_invalid = false;
        self.is_interrupted = false;
        self.is_data_saved = false;
        self.is_data_sent = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::finalize_trials;
    use ucm_core::{Trial, TrialLayout};

    fn ts() -> Timestamp {
        Timestamp {
            unix: 100.0,
            iso: "2024_01_02_03_04_05".into(),
        }
    }

    fn device() -> DeviceInfo {
        DeviceInfo {
            uid: "abc".into(),
            ..DeviceInfo::default()
        }
    }

    #[test]
    fn new_collection_starts_with_device_table() {
        let mut data = DataCollection::new();
        data.new_collection("u1", &device(), &ts());
        assert_eq!(data.records().len(), 1);
        let rec = &data.records()[0];
        assert_eq!(rec.table, TableKind::Device);
        assert_eq!(rec.filename(), "device-9534d327.csv");
        assert!(String::from_utf8_lossy(&rec.payload).starts_with("id,screen_x,screen_y,"));
        assert_eq!(data.email_entries().len(), 1);
    }

    #[test]
    fn user_table_blanks_unanswered_gaming_exp() {
        let mut data = DataCollection::new();
        data.new_collection("u1", &device(), &ts());
        let profile = UserProfile {
            age_group: "18-24".into(),
            gender: "f".into(),
            gaming_exp: -1,
        };
        data.add_user_data(&profile, "Circle Task", &ts());
        let rec = &data.records()[1];
        assert_eq!(
            String::from_utf8(rec.payload.clone()).unwrap(),
            "id,device_id,age_group,gender,gaming_exp\nu1,9534d327,18-24,f,\n"
        );
        assert_eq!(rec.filename(), "user.csv");
    }

    #[test]
    fn invalid_collection_drops_trials() {
        let trials = vec![Trial {
            index: 0,
            df1_value: 0.1,
            df2_value: 0.1,
            df1_grab_dt: f64::NAN,
            df1_release_dt: f64::NAN,
            df2_grab_dt: f64::NAN,
            df2_release_dt: f64::NAN,
        }];
        let table = finalize_trials(&trials, TrialLayout::Full);
        let mut data = DataCollection::new();
        data.mark_invalid();
        data.add_trials(&table, RecordMeta::at(&ts()));
        assert!(data.is_empty());
        data.clear();
        assert!(!data.is_invalid());
    }

    #[test]
    fn email_lines_flatten_meta_and_body() {
        let mut data = DataCollection::new();
        data.new_collection("u1", &device(), &ts());
        let lines = data.email_entries()[0].lines();
        assert_eq!(lines[0], "table: device");
        assert_eq!(lines[1], "id: 9534d327");
        assert_eq!(lines[2], "time: 100.0");
        assert!(lines[3].starts_with("data: id=9534d327, screen_x=1920"));
    }

    #[test]
    fn discarding_a_session_keeps_identity_tables() {
        let table = NumericTable {
            columns: vec!["df1".into(), "df2".into()],
            rows: vec![vec![1.0, 2.0]],
        };
        let mut data = DataCollection::new();
        data.new_collection("u1", &device(), &ts());
        data.add_user_data(&UserProfile::default(), "Circle Task", &ts());
        data.add_trials(&table, RecordMeta::at(&ts()));
        assert_eq!(data.records().len(), 3);

        data.discard_session();
        let tables: Vec<TableKind> = data.records().iter().map(|r| r.table).collect();
        assert_eq!(tables, [TableKind::Device, TableKind::User]);
        assert_eq!(data.email_entries().len(), 2);
        assert!(data.is_interrupted());

        data.new_collection("u1", &device(), &ts());
        assert!(!data.is_interrupted());
    }

    #[test]
    fn email_rows_get_one_line_each() {
        let table = NumericTable {
            columns: vec!["df1".into(), "df2".into()],
            rows: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        };
        let mut data = DataCollection::new();
        data.add_trials(&table, RecordMeta::default());
        let lines = data.email_entries()[0].lines();
        assert_eq!(
            lines[lines.len() - 3..],
            [
                "data: df1,df2",
                "row_1: 1.00000,2.00000",
                "row_2: 3.00000,4.00000"
            ]
        );
        assert!(lines.iter().all(|l| !l.contains('\n')));
    }

    #[test]
    fn queued_payload_is_a_copy() {
        let mut table = NumericTable {
            columns: vec!["df1".into(), "df2".into()],
            rows: vec![vec![1.0, 2.0]],
        };
        let mut data = DataCollection::new();
        data.add_trials(&table, RecordMeta::default());
        table.rows[0][0] = 99.0;
        assert_eq!(data.records()[0].payload, b"df1,df2\n1.00000,2.00000\n");
    }
}
