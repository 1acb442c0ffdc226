use std::fmt;
use thiserror::Error;

// All service crates re-export the same smithy runtime types.
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Error codes AWS services return for throttling and short-lived
/// server-side trouble.
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "PriorRequestNotComplete",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "InternalFailure",
    "InternalError",
    "SlowDown",
    "RequestTimeout",
    "ProvisionedThroughputExceededException",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The service answered with an error.
    Service,
    /// The request never got a response (DNS, connect, reset).
    Dispatch,
    Timeout,
    /// The response could not be parsed.
    Response,
    /// The request could not be built.
    Construction,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ApiErrorKind::Service => "service error",
            ApiErrorKind::Dispatch => "dispatch failure",
            ApiErrorKind::Timeout => "timeout",
            ApiErrorKind::Response => "response error",
            ApiErrorKind::Construction => "construction failure",
        };
        f.write_str(kind)
    }
}

/// Flattened SDK error, so classifiers can look at it without knowing the
/// per-operation error type.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed with {kind}{}: {message}", fmt_code(.code))]
pub struct ApiError {
    pub operation: String,
    pub kind: ApiErrorKind,
    pub code: Option<String>,
    pub message: String,
}

fn fmt_code(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default()
}

impl ApiError {
    pub fn new(operation: impl Into<String>, kind: ApiErrorKind, code: Option<&str>) -> Self {
        Self {
            operation: operation.into(),
            kind,
            code: code.map(String::from),
            message: String::new(),
        }
    }

    pub fn from_sdk<E, R>(operation: impl Into<String>, err: &SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: fmt::Debug,
    {
        let kind = match err {
            SdkError::ServiceError(_) => ApiErrorKind::Service,
            SdkError::DispatchFailure(_) => ApiErrorKind::Dispatch,
            SdkError::TimeoutError(_) => ApiErrorKind::Timeout,
            SdkError::ResponseError(_) => ApiErrorKind::Response,
            _ => ApiErrorKind::Construction,
        };
        let code = err.as_service_error().and_then(|e| e.code()).map(String::from);
        let message = err
            .as_service_error()
            .and_then(|e| e.message())
            .map(String::from)
            .unwrap_or_else(|| DisplayErrorContext(err).to_string());

        Self {
            operation: operation.into(),
            kind,
            code,
            message,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

fn api_error(err: &anyhow::Error) -> Option<&ApiError> {
    err.chain().find_map(|cause| cause.downcast_ref::<ApiError>())
}

/// Whether the error chain carries an AWS error with the given code.
pub fn has_code(err: &anyhow::Error, code: &str) -> bool {
    api_error(err).is_some_and(|api| api.code.as_deref() == Some(code))
}

/// Transient-error classifier for AWS calls: throttling, short-lived
/// service trouble, and requests that never got an answer.
pub fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(api) = api_error(err) {
        match api.kind {
            ApiErrorKind::Dispatch | ApiErrorKind::Timeout => return true,
            ApiErrorKind::Construction => return false,
            ApiErrorKind::Service | ApiErrorKind::Response => {
                if api
                    .code
                    .as_deref()
                    .is_some_and(|code| TRANSIENT_CODES.contains(&code))
                {
                    return true;
                }
            }
        }
    }

    err.chain()
        .any(|cause| cause.to_string().to_lowercase().contains("connection reset"))
}
