//! Invocation error types

use thiserror::Error;
use wayfarer_provider::{ProviderError, RetryError};

/// Errors surfaced to callers of the invoker
///
/// 캐시 에러는 여기까지 오지 않는다.
#[derive(Error, Debug)]
pub enum InvocationError {
    /// Every attempt failed
    #[error("Remote call failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: ProviderError,
    },

    /// Failure not worth retrying (classified retry policy only)
    #[error("Remote call rejected on attempt {attempt}: {source}")]
    Rejected {
        attempt: u32,
        #[source]
        source: ProviderError,
    },

    /// The response did not hold the expected JSON document
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request class that holds raw chat text, not usable for parsed values
    #[error("Request class '{0}' is reserved for raw chat responses")]
    ReservedClass(String),
}

impl InvocationError {
    /// Remote attempts made before giving up
    pub fn attempts(&self) -> Option<u32> {
        match self {
            InvocationError::Exhausted { attempts, .. } => Some(*attempts),
            InvocationError::Rejected { attempt, .. } => Some(*attempt),
            InvocationError::MalformedResponse(_) | InvocationError::ReservedClass(_) => None,
        }
    }

    /// Last underlying provider error
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            InvocationError::Exhausted { last_error, .. } => Some(last_error),
            InvocationError::Rejected { source, .. } => Some(source),
            InvocationError::MalformedResponse(_) | InvocationError::ReservedClass(_) => None,
        }
    }
}

impl From<RetryError<ProviderError>> for InvocationError {
    fn from(err: RetryError<ProviderError>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => InvocationError::Exhausted {
                attempts,
                last_error,
            },
            RetryError::Rejected { attempt, error } => InvocationError::Rejected {
                attempt,
                source: error,
            },
        }
    }
}
