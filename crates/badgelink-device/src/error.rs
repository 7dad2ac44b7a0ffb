/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Rejected before anything was enqueued.
    #[error("validation error: {0}")]
    Validation(#[from] badgelink_frame::ValidationError),

    /// A message frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] badgelink_frame::DecodeError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] badgelink_transport::TransportError),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
