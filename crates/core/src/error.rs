/// Result alias that carries the custom [`VisError`] type.
pub type Result<T> = std::result::Result<T, VisError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wire payload or preset file that is not valid JSON for the expected shape.
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    /// Inbound frame whose bin count does not match the session's `model_length`.
    #[error("frame has {actual} bins, expected {expected}")]
    FrameLength { expected: usize, actual: usize },
    /// Requested buffer conversion is not defined for the current shape.
    #[error("cannot reshape a {0} buffer")]
    Reshape(&'static str),
    #[error("unknown render mode `{0}`")]
    UnknownMode(String),
    /// The duplex link to the backend went away.
    #[error("connection channel closed")]
    ChannelClosed,
    #[error("transport error: {0}")]
    Transport(String),
}

impl VisError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for VisError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
