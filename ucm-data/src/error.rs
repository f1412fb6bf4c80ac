use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug, PartialEq)]
pub enum DataError {
    #[error("Table is not valid UTF-8")]
    Encoding,

    #[error("Table has no header row")]
    MissingHeader,

    #[error("Line {line}: expected {expected} cells, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: '{cell}' is not a number")]
    NotANumber { line: usize, cell: String },
}
