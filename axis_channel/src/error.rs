use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("pv not connected: {0}")]
    NotConnected(String),
    #[error("channel timeout: {0}")]
    Timeout(String),
    #[error("unknown pv handle: {0}")]
    UnknownHandle(u64),
    #[error("write rejected by {0}")]
    Rejected(String),
    #[error("invalid sim fault spec: {0}")]
    InvalidFault(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
