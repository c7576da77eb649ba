use thiserror::Error;

/// Errors raised at the collaborator boundaries (file reading, persistence,
/// export, admin login). Searching itself never fails.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read '{file}': {message}")]
    Extraction { file: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Export error: {0}")]
    Xlsx(String),

    #[error("{0}")]
    Auth(String),
}

impl Error {
    pub fn extraction(file: &str, message: impl std::fmt::Display) -> Self {
        Error::Extraction {
            file: file.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::Xlsx(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Snapshot(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
