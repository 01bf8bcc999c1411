//! Error types for the side-panel engine.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to a collaborator (namespace or directory service).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{service} request failed: {reason}")]
    Request { service: String, reason: String },

    #[error("{service} returned {status}: {context}")]
    Status {
        service: String,
        status: u16,
        context: String,
    },

    #[error("Malformed response from {service}: {reason}")]
    Malformed { service: String, reason: String },

    #[error("{service} has no resource with id {id}")]
    NotFound { service: String, id: String },
}

/// Tree Builder errors. Any of these aborts the whole build.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Listing children of {container_id} failed: {source}")]
    Transport {
        container_id: String,
        #[source]
        source: TransportError,
    },

    #[error("Invalid expansion policy: {0}")]
    Policy(String),
}

/// Reconciliation Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Directory call failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Directory entry {id} no longer exists")]
    StaleReference { id: String },

    #[error("A create or update is already in flight for {contact}")]
    OperationPending { contact: String },

    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },
}

/// Mail host errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Message could not be parsed")]
    Unparseable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
