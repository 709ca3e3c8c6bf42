use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors (identity provider, sessions)
/// - E2xxx: Data access errors (remote data store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,

    // Auth (E1xxx)
    InvalidCredentials,
    SignUpFailed,
    RecoveryFailed,
    SessionExpired,
    SessionInvalid,
    AuthUnavailable,

    // Data access (E2xxx)
    RecordNotFound,
    PermissionDenied,
    RemoteRejected,
    TransportFailed,
    DecodeFailed,
    PartialWrite,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0008",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::SignUpFailed => "E1002",
            Self::RecoveryFailed => "E1003",
            Self::SessionExpired => "E1004",
            Self::SessionInvalid => "E1005",
            Self::AuthUnavailable => "E1006",

            // Data access
            Self::RecordNotFound => "E2001",
            Self::PermissionDenied => "E2002",
            Self::RemoteRejected => "E2003",
            Self::TransportFailed => "E2004",
            Self::DecodeFailed => "E2005",
            Self::PartialWrite => "E2006",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::DecodeFailed | Self::PartialWrite => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ValidationError | Self::BadRequest | Self::SignUpFailed
            | Self::RecoveryFailed => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::RecordNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::SessionExpired
            | Self::SessionInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::RemoteRejected | Self::TransportFailed => StatusCode::BAD_GATEWAY,
            Self::AuthUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Failure talking to the remote data store.
///
/// Every variant carries its cause as text so the error can be cloned and
/// handed to every caller sharing one in-flight query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataAccessError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("remote store rejected the request ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl DataAccessError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::RecordNotFound,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::Remote { .. } => ErrorCode::RemoteRejected,
            Self::Transport(_) => ErrorCode::TransportFailed,
            Self::Decode(_) => ErrorCode::DecodeFailed,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for DataAccessError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DataAccessError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Failure signing in, signing up or resolving a session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("sign up failed: {0}")]
    SignUp(String),

    #[error("password recovery failed: {0}")]
    Recovery(String),

    #[error("session has expired")]
    SessionExpired,

    #[error("invalid session token: {0}")]
    InvalidToken(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::SignUp(_) => ErrorCode::SignUpFailed,
            Self::Recovery(_) => ErrorCode::RecoveryFailed,
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::InvalidToken(_) => ErrorCode::SessionInvalid,
            Self::Unavailable(_) => ErrorCode::AuthUnavailable,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Known { code, .. } => *code,
            Self::Auth(err) => err.code(),
            Self::DataAccess(err) => err.code(),
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

/// Per-field messages for inline form feedback, keyed by field name.
pub fn validation_details(errors: &validator::ValidationErrors) -> serde_json::Value {
    let fields: BTreeMap<&str, Vec<String>> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field, messages)
        })
        .collect();

    serde_json::json!(fields)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let error_response = match &self {
            AppError::Known { message, details, .. } => {
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                resp
            }
            AppError::Auth(err) => {
                tracing::warn!(error = %err, "auth error");
                ApiErrorResponse::new(code.code(), err.to_string())
            }
            AppError::DataAccess(err) => match err {
                DataAccessError::NotFound { .. } | DataAccessError::PermissionDenied(_) => {
                    tracing::warn!(error = %err, "data access error");
                    ApiErrorResponse::new(code.code(), err.to_string())
                }
                _ => {
                    tracing::error!(error = %err, "data access error");
                    ApiErrorResponse::new(code.code(), "failed to load data")
                }
            },
            AppError::Validation(errors) => {
                ApiErrorResponse::new(code.code(), "validation failed")
                    .with_details(validation_details(errors))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                ApiErrorResponse::new(code.code(), "internal server error")
            }
        };

        (code.status_code(), Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
