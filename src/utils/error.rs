use crate::domain::compute::NodeMetadata;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A node that did not make it into a group, with its provider id when one was assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub name: String,
    pub node_id: Option<String>,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP transport failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("{method} {url} failed with status {status}: {message}")]
    HttpResponse {
        status: u16,
        method: String,
        url: String,
        message: String,
    },

    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    #[error("Resource not found: {resource}")]
    ResourceNotFound { resource: String },

    #[error("Container not found: {container}")]
    ContainerNotFound { container: String },

    #[error("Key {key} not found in container {container}")]
    KeyNotFound { container: String, key: String },

    #[error("Resource already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("Precondition failed: {message}")]
    PreconditionFailed { message: String },

    #[error("Not modified: {message}")]
    NotModified { message: String },

    #[error("Illegal state: {message}")]
    IllegalState { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Timed out after {waited:?} waiting for {operation}")]
    Timeout { operation: String, waited: Duration },

    #[error("Error creating nodes in group {group}: {} succeeded, {} failed", successful.len(), failures.len())]
    RunNodes {
        group: String,
        successful: Vec<NodeMetadata>,
        failures: Vec<NodeFailure>,
    },

    #[error("Could not parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported provider '{provider}': {reason}")]
    UnsupportedProvider { provider: String, reason: String },

    /// A transport failure handed to several callers at once.
    #[error("{0}")]
    Shared(Arc<CloudError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authorization,
    NotFound,
    Conflict,
    Configuration,
    Provider,
    Timeout,
}

impl CloudError {
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        CloudError::IllegalState {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CloudError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Recovers an owned error from one shared between waiters on a cache load.
    pub fn from_shared(err: Arc<CloudError>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(|shared| shared.duplicate().unwrap_or(CloudError::Shared(shared)))
    }

    fn duplicate(&self) -> Option<Self> {
        let copy = match self {
            CloudError::HttpResponse {
                status,
                method,
                url,
                message,
            } => CloudError::HttpResponse {
                status: *status,
                method: method.clone(),
                url: url.clone(),
                message: message.clone(),
            },
            CloudError::Unauthorized { message } => CloudError::Unauthorized {
                message: message.clone(),
            },
            CloudError::ResourceNotFound { resource } => CloudError::ResourceNotFound {
                resource: resource.clone(),
            },
            CloudError::ContainerNotFound { container } => CloudError::ContainerNotFound {
                container: container.clone(),
            },
            CloudError::KeyNotFound { container, key } => CloudError::KeyNotFound {
                container: container.clone(),
                key: key.clone(),
            },
            CloudError::AlreadyExists { resource } => CloudError::AlreadyExists {
                resource: resource.clone(),
            },
            CloudError::PreconditionFailed { message } => CloudError::PreconditionFailed {
                message: message.clone(),
            },
            CloudError::NotModified { message } => CloudError::NotModified {
                message: message.clone(),
            },
            CloudError::IllegalState { message } => CloudError::illegal_state(message.clone()),
            CloudError::InvalidArgument { message } => CloudError::invalid_argument(message.clone()),
            CloudError::Timeout { operation, waited } => CloudError::Timeout {
                operation: operation.clone(),
                waited: *waited,
            },
            CloudError::Parse { what, message } => CloudError::parse(what.clone(), message.clone()),
            CloudError::ConfigError { message } => CloudError::ConfigError {
                message: message.clone(),
            },
            CloudError::UnsupportedProvider { provider, reason } => CloudError::UnsupportedProvider {
                provider: provider.clone(),
                reason: reason.clone(),
            },
            _ => return None,
        };
        Some(copy)
    }

    pub fn is_not_found(&self) -> bool {
        if let CloudError::Shared(inner) = self {
            return inner.is_not_found();
        }
        matches!(
            self,
            CloudError::ResourceNotFound { .. }
                | CloudError::ContainerNotFound { .. }
                | CloudError::KeyNotFound { .. }
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CloudError::Shared(inner) => inner.category(),
            CloudError::Http(_) | CloudError::Io(_) => ErrorCategory::Network,
            CloudError::Unauthorized { .. } => ErrorCategory::Authorization,
            CloudError::ResourceNotFound { .. }
            | CloudError::ContainerNotFound { .. }
            | CloudError::KeyNotFound { .. } => ErrorCategory::NotFound,
            CloudError::AlreadyExists { .. }
            | CloudError::PreconditionFailed { .. }
            | CloudError::NotModified { .. }
            | CloudError::IllegalState { .. } => ErrorCategory::Conflict,
            CloudError::ConfigError { .. }
            | CloudError::ConfigValidationError { .. }
            | CloudError::InvalidConfigValueError { .. }
            | CloudError::UnsupportedProvider { .. }
            | CloudError::InvalidArgument { .. } => ErrorCategory::Configuration,
            CloudError::Timeout { .. } => ErrorCategory::Timeout,
            CloudError::Serialization(_)
            | CloudError::Csv(_)
            | CloudError::Xml(_)
            | CloudError::HttpResponse { .. }
            | CloudError::RunNodes { .. }
            | CloudError::Parse { .. } => ErrorCategory::Provider,
        }
    }

    /// Transient failures worth another attempt by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            CloudError::Http(e) => e.is_timeout() || e.is_connect(),
            CloudError::HttpResponse { status, .. } => *status >= 500,
            CloudError::Timeout { .. } => true,
            CloudError::Shared(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the provider: {}", self),
            ErrorCategory::Authorization => {
                "The provider rejected the supplied credentials".to_string()
            }
            ErrorCategory::NotFound => self.to_string(),
            ErrorCategory::Conflict => format!("The request conflicts with current state: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Provider => format!("The provider returned an error: {}", self),
            ErrorCategory::Timeout => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the endpoint URL and your network connection",
            ErrorCategory::Authorization => "Verify identity and credential in the provider config",
            ErrorCategory::NotFound => "Check the container, key or node id",
            ErrorCategory::Conflict => "Re-read the resource and retry the operation",
            ErrorCategory::Configuration => "Fix the configuration file and run again",
            ErrorCategory::Provider => "Run with --verbose to inspect the provider response",
            ErrorCategory::Timeout => "Raise the timeout in the [compute] section or retry later",
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_variants() {
        assert!(CloudError::ResourceNotFound {
            resource: "x".into()
        }
        .is_not_found());
        assert!(CloudError::KeyNotFound {
            container: "c".into(),
            key: "k".into()
        }
        .is_not_found());
        assert!(!CloudError::illegal_state("busy").is_not_found());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            CloudError::Unauthorized {
                message: "bad".into()
            }
            .category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            CloudError::Timeout {
                operation: "node".into(),
                waited: Duration::from_secs(1)
            }
            .category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            CloudError::UnsupportedProvider {
                provider: "x".into(),
                reason: "unknown".into()
            }
            .category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_retryable_server_errors() {
        let err = CloudError::HttpResponse {
            status: 503,
            method: "GET".into(),
            url: "http://x".into(),
            message: "unavailable".into(),
        };
        assert!(err.is_retryable());
        let err = CloudError::HttpResponse {
            status: 400,
            method: "GET".into(),
            url: "http://x".into(),
            message: "bad".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_shared_errors_keep_their_kind() {
        let shared = Arc::new(CloudError::Unauthorized {
            message: "expired".into(),
        });
        let _waiter = shared.clone();
        assert!(matches!(
            CloudError::from_shared(shared),
            CloudError::Unauthorized { .. }
        ));

        let io = Arc::new(CloudError::Io(std::io::Error::other("reset")));
        let _waiter = io.clone();
        let err = CloudError::from_shared(io);
        assert!(matches!(err, CloudError::Shared(_)));
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_run_nodes_message() {
        let err = CloudError::RunNodes {
            group: "web".into(),
            successful: vec![],
            failures: vec![NodeFailure {
                name: "web-abc".into(),
                node_id: None,
                reason: "boom".into(),
            }],
        };
        assert_eq!(
            err.to_string(),
            "Error creating nodes in group web: 0 succeeded, 1 failed"
        );
    }
}
