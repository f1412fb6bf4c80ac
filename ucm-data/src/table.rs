use crate::time::{TIME_FMT, Timestamp};
use chrono::Local;
use std::fmt;
use ucm_core::device::float_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Device,
    User,
    Session,
    Trials,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Device => "device",
            TableKind::User => "user",
            TableKind::Session => "session",
            TableKind::Trials => "trials",
        }
    }

    /// Tables stored below `<task>/<user>/` rather than at the storage root.
    pub fn is_per_user(&self) -> bool {
        !matches!(self, TableKind::Device)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context of a data set. Which fields are present depends on the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMeta {
    pub id: Option<String>,
    pub device: Option<String>,
    pub user: Option<String>,
    pub task: Option<String>,
    pub block: Option<usize>,
    pub treatment: Option<String>,
    pub time: Option<f64>,
    pub time_iso: Option<String>,
    pub hash: Option<String>,
    pub rating: Option<u8>,
}

impl RecordMeta {
    pub fn at(ts: &Timestamp) -> Self {
        Self {
            time: Some(ts.unix),
            time_iso: Some(ts.iso.clone()),
            ..Self::default()
        }
    }

    /// Present fields as `(key, value)` pairs in a stable order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let mut put = |k: &'static str, v: Option<String>| {
            if let Some(v) = v {
                out.push((k, v));
            }
        };
        put("id", self.id.clone());
        put("device", self.device.clone());
        put("user", self.user.clone());
        put("task", self.task.clone());
        put("block", self.block.map(|b| b.to_string()));
        put("treatment", self.treatment.clone());
        put("time", self.time.map(float_str));
        put("time_iso", self.time_iso.clone());
        put("hash", self.hash.clone());
        put("rating", self.rating.map(|r| r.to_string()));
        out
    }
}

/// One finalized table ready for export. Holds its own copy of the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRecord {
    pub table: TableKind,
    pub columns: Vec<String>,
    /// CSV bytes including the header line.
    pub payload: Vec<u8>,
    pub meta: RecordMeta,
}

impl ExportRecord {
    /// File name derived from table type and metadata, or `None` if a
    /// required field is missing.
    pub fn compile_filename(&self) -> Option<String> {
        Some(match self.table {
            TableKind::Device => format!("device-{}.csv", self.meta.id.as_ref()?),
            TableKind::User => "user.csv".to_string(),
            TableKind::Session => format!("session-{}.csv", self.meta.time_iso.as_ref()?),
            TableKind::Trials => format!(
                "trials-{}-Block_{}.csv",
                self.meta.time_iso.as_ref()?,
                self.meta.block?
            ),
        })
    }

    /// Like [`compile_filename`](Self::compile_filename), falling back to the
    /// current time when metadata is incomplete.
    pub fn filename(&self) -> String {
        self.compile_filename()
            .unwrap_or_else(|| format!("{}.csv", Local::now().format(TIME_FMT)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(table: TableKind, meta: RecordMeta) -> ExportRecord {
        ExportRecord {
            table,
            columns: vec![],
            payload: vec![],
            meta,
        }
    }

    #[test]
    fn filenames_per_table() {
        let ts = Timestamp {
            unix: 1.5,
            iso: "2024_03_09_14_05_07".into(),
        };
        let mut meta = RecordMeta::at(&ts);
        meta.block = Some(2);
        meta.id = Some("9534d327".into());

        assert_eq!(
            record(TableKind::Trials, meta.clone()).filename(),
            "trials-2024_03_09_14_05_07-Block_2.csv"
        );
        assert_eq!(
            record(TableKind::Session, meta.clone()).filename(),
            "session-2024_03_09_14_05_07.csv"
        );
        assert_eq!(record(TableKind::Device, meta.clone()).filename(), "device-9534d327.csv");
        assert_eq!(record(TableKind::User, RecordMeta::default()).filename(), "user.csv");
    }

    #[test]
    fn missing_metadata_falls_back_to_timestamp() {
        let r = record(TableKind::Trials, RecordMeta::default());
        assert!(r.compile_filename().is_none());
        let name = r.filename();
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "2024_03_09_14_05_07.csv".len());
    }

    #[test]
    fn entries_skip_absent_fields() {
        let meta = RecordMeta {
            user: Some("u1".into()),
            block: Some(0),
            time: Some(2.0),
            ..RecordMeta::default()
        };
        assert_eq!(
            meta.entries(),
            vec![
                ("user", "u1".to_string()),
                ("block", "0".to_string()),
                ("time", "2.0".to_string())
            ]
        );
    }
}
