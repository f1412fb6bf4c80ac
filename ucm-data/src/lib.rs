//! Aggregation of trial data into exportable tables.

pub mod aggregate;
pub mod collection;
pub mod csv;
pub mod error;
pub mod table;
pub mod time;

pub use aggregate::{NumericTable, SessionRow, content_hash, finalize_trials};
pub use collection::{DataCollection, EmailBody, EmailEntry, UserProfile};
pub use error::{DataError, Result};
pub use table::{ExportRecord, RecordMeta, TableKind};
pub use time::Timestamp;
