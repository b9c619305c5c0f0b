//! Crate-wide error type.
//!
//! Mirrors the five error kinds of the screening pipeline: malformed input,
//! a broken sanctions source, a misbehaving indexer, a missing identifier,
//! and everything else.

use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),

    #[error("data load: {0}")]
    DataLoad(String),

    #[error("external api: {0}")]
    ExternalApi(String),

    #[error("data not found: {0}")]
    DataNotFound(String),

    #[error("internal: {0}")]
    Internal(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// The tag carried in audit entries and, were there an HTTP surface, in the
/// error envelope described in the external interfaces. Kept separate from
/// the `Display` message so log lines and audit entries can group on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    DataLoad,
    ExternalApi,
    DataNotFound,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::DataLoad(_) => ErrorKind::DataLoad,
            Error::ExternalApi(_) => ErrorKind::ExternalApi,
            Error::DataNotFound(_) => ErrorKind::DataNotFound,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Json(_) => ErrorKind::DataLoad,
            Error::Io(_) => ErrorKind::Internal,
            Error::Http(_) => ErrorKind::ExternalApi,
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self.kind(), ErrorKind::ExternalApi)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
