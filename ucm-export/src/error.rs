use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("missing metadata field '{0}'")]
    MissingMetadata(&'static str),

    #[error("unable to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Display text is shown to the participant as is.
    #[error("ERROR: Server not reachable:\n{0}")]
    Network(String),

    #[error("{0}")]
    Response(String),

    #[error("unable to compose e-mail: {0}")]
    Composer(String),
}

pub type Result<T> = std::result::Result<T, ExportError>;
