use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session does not exist")]
    SessionDoesNotExist,

    #[error("session manager is closed")]
    Closed,

    #[error("session manager is already closed")]
    AlreadyClosed,

    #[error("session io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
