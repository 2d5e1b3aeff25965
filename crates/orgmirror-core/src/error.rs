/// Central error type for orgmirror.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("config error: {message}")]
    Config { message: String },

    #[error("listing failed ({status}): {message}")]
    ListingFailed { status: u16, message: String },

    #[error("git error: {message}")]
    GitError { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl MirrorError {
    pub fn config(message: impl Into<String>) -> Self {
        MirrorError::Config {
            message: message.into(),
        }
    }
}
