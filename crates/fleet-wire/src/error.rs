use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpcError {
    #[error("{0}")]
    Validation(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for IpcError {
    fn from(e: std::io::Error) -> Self {
        IpcError::Io(e.to_string())
    }
}
