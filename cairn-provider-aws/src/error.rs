//! Errors returned by the remote API clients

use std::fmt::Debug;

use aws_sdk_elasticache::error::{ProvideErrorMetadata, SdkError};
use cairn_core::provider::ProviderError;
use cairn_core::resource::ResourceId;
use thiserror::Error;

/// Error from a remote API call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The addressed object does not exist
    #[error("{code}: {message}")]
    NotFound { code: String, message: String },

    /// The service rejected the request
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// The request never produced a service response (network, credentials, timeouts)
    #[error("request failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// Classify a service error code
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        if is_not_found_code(&code) {
            Self::NotFound { code, message }
        } else {
            Self::Service { code, message }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the service returned exactly this error code
    pub fn is_code(&self, expected: &str) -> bool {
        match self {
            Self::NotFound { code, .. } | Self::Service { code, .. } => code == expected,
            Self::Transport(_) => false,
        }
    }

    /// Whether the service returned this code with a message containing `needle`
    pub fn is_code_with_message(&self, expected: &str, needle: &str) -> bool {
        match self {
            Self::NotFound { code, message } | Self::Service { code, message } => {
                code == expected && message.contains(needle)
            }
            Self::Transport(_) => false,
        }
    }

    /// Wrap into a handler error, e.g. `"Failed to delete serverless cache"`
    pub(crate) fn into_provider_error(self, id: &ResourceId, action: &str) -> ProviderError {
        ProviderError::new(format!("Failed to {}", action))
            .for_resource(id.clone())
            .with_cause(self)
    }
}

fn is_not_found_code(code: &str) -> bool {
    code.ends_with("NotFound")
        || code.ends_with("NotFoundFault")
        || code == "ResourceNotFoundException"
}

impl<E, R> From<SdkError<E, R>> for ApiError
where
    E: ProvideErrorMetadata + Debug,
    R: Debug,
{
    fn from(err: SdkError<E, R>) -> Self {
        match err {
            SdkError::ServiceError(service_err) => {
                let err = service_err.into_err();
                match err.code() {
                    Some(code) => {
                        Self::service(code, err.message().unwrap_or_default().to_string())
                    }
                    None => Self::Transport(format!("{:?}", err)),
                }
            }
            other => Self::Transport(format!("{:?}", other)),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
