use thiserror::Error;

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("plausible.init() can only be called once")]
    AlreadyInitialized,

    #[error("plausible.init(): domain argument is required")]
    MissingDomain,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("Invalid path pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TrackerError {
    /// Configuration errors must surface to the caller of `init()` rather
    /// than silently degrading the tracker.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TrackerError::AlreadyInitialized
                | TrackerError::MissingDomain
                | TrackerError::Config(_)
                | TrackerError::InvalidEndpoint(_)
                | TrackerError::InvalidPattern(_)
        )
    }
}
