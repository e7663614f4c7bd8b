use thiserror::Error;

/// Errors raised by broker operations
///
/// These are the only errors that cross the broker boundary; the REST and
/// stream adapters translate them into their own surfaces.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// Topic name already registered
    #[error("topic already exists: {0}")]
    TopicExists(String),

    /// Topic name not registered
    #[error("topic not found: {0}")]
    TopicNotFound(String),
}

impl BrokerError {
    /// Stable wire code reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::TopicExists(_) => "ALREADY_EXISTS",
            Self::TopicNotFound(_) => "TOPIC_NOT_FOUND",
        }
    }
}
