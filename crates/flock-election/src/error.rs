//! Election error types

/// Result type for election operations
pub type Result<T> = std::result::Result<T, ElectionError>;

/// Errors reported by a coordination-service client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("node already exists: {0}")]
    NodeExists(String),

    #[error("node not found: {0}")]
    NoNode(String),

    #[error("connection to the coordination service was lost")]
    ConnectionLoss,

    #[error("session expired")]
    SessionExpired,

    #[error("session is closed")]
    SessionClosed,

    #[error("malformed service address: {0}")]
    BadAddress(String),

    #[error("operation interrupted: {0}")]
    Interrupted(String),
}

/// Election-specific error types
#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    #[error("connection setup failed: {0}")]
    ConnectionSetup(String),

    #[error("candidacy registration failed: {0}")]
    Registration(String),

    #[error("election evaluation failed: {0}")]
    Evaluation(String),

    #[error("inconsistent election state: {0}")]
    InconsistentState(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("coordination client error: {0}")]
    Client(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl ElectionError {
    pub fn connection_setup<T: Into<String>>(msg: T) -> Self {
        Self::ConnectionSetup(msg.into())
    }

    pub fn registration<T: Into<String>>(msg: T) -> Self {
        Self::Registration(msg.into())
    }

    pub fn evaluation<T: Into<String>>(msg: T) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn inconsistent_state<T: Into<String>>(msg: T) -> Self {
        Self::InconsistentState(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        Self::Timeout(msg.into())
    }
}
