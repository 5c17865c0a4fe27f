//! Error types for cluster provisioning

use thiserror::Error;

use crate::domain::NetworkError;

/// Errors that can occur while declaring or applying a cluster stack
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Invalid configuration, detected before any resource is declared
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed network value
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// A resource name was registered twice
    #[error("Resource {0} is already registered")]
    DuplicateResource(String),

    /// `depends_on` names a resource the engine has never seen
    #[error("Resource {resource} depends on unknown resource {dependency}")]
    UnknownDependency { resource: String, dependency: String },

    /// A provider-assigned attribute was delivered twice (topology bug)
    #[error("Attribute {attribute} of {resource} resolved more than once")]
    DoubleResolution { resource: String, attribute: String },

    /// A deferred input was still unresolved when its resource was created
    #[error("Input {input} of {resource} is unresolved at creation time")]
    UnresolvedInput { resource: String, input: String },

    /// Invalid lifecycle transition inside the engine
    #[error("Lifecycle error for {resource}: {message}")]
    Lifecycle { resource: String, message: String },

    /// Filesystem error
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON configuration
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;

impl ProvisionError {
    /// Shorthand for configuration errors
    pub fn configuration(message: impl Into<String>) -> Self {
        ProvisionError::Configuration(message.into())
    }

    /// Whether the run must stop immediately rather than report per resource
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProvisionError::DoubleResolution { .. }
                | ProvisionError::UnresolvedInput { .. }
                | ProvisionError::Lifecycle { .. }
        )
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::Serialization(err.to_string())
    }
}
