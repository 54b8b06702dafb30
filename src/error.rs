use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx status, `success: false`, or a body that could not be decoded.
    #[error("backend rejected request: {0}")]
    Rejected(String),
    #[error("no signed-in user")]
    NotAuthenticated,
}

pub type SyncResult<T> = Result<T, SyncError>;
