use chrono::{DateTime, Local};

/// Format used in file names and `time_iso` fields.
pub const TIME_FMT: &str = "%Y_%m_%d_%H_%M_%S";

/// A moment as stored in record metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub unix: f64,
    /// Local time formatted with [`TIME_FMT`].
    pub iso: String,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    pub fn from_datetime(at: DateTime<Local>) -> Self {
        Self {
            unix: at.timestamp_micros() as f64 / 1e6,
            iso: at.format(TIME_FMT).to_string(),
        }
    }
}
