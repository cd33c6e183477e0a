use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::response::ApiResponse;

/// Error returned by the entity store. Services translate these into
/// [`AppError`]s with a module specific code.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate value violates `{0}`")]
    Duplicate(String),
    #[error("invalid filter field `{0}`")]
    InvalidField(String),
    #[error("transaction already finished or still in use")]
    TxFinished,
    #[error(transparent)]
    Database(sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.constraint().unwrap_or("unique").to_string())
            }
            other => RepoError::Database(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // general
    InternalError,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    Unauthorized,
    Forbidden,
    ValidationError,
    Invalid,
    RateLimitExceeded,
    RequestTimeout,
    RequestTooLarge,
    UnsupportedMediaType,
    // user
    EmailExists,
    UserNotFound,
    UserAlreadyExists,
    InvalidCredentials,
    UserInactive,
    // database
    DatabaseError,
    RecordNotFound,
    DuplicateEntry,
    ConstraintViolation,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 21] = [
        ErrorCode::InternalError,
        ErrorCode::BadRequest,
        ErrorCode::NotFound,
        ErrorCode::MethodNotAllowed,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::ValidationError,
        ErrorCode::Invalid,
        ErrorCode::RateLimitExceeded,
        ErrorCode::RequestTimeout,
        ErrorCode::RequestTooLarge,
        ErrorCode::UnsupportedMediaType,
        ErrorCode::EmailExists,
        ErrorCode::UserNotFound,
        ErrorCode::UserAlreadyExists,
        ErrorCode::InvalidCredentials,
        ErrorCode::UserInactive,
        ErrorCode::DatabaseError,
        ErrorCode::RecordNotFound,
        ErrorCode::DuplicateEntry,
        ErrorCode::ConstraintViolation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Invalid => "INVALID",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorCode::RequestTooLarge => "REQUEST_TOO_LARGE",
            ErrorCode::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            ErrorCode::EmailExists => "EMAIL_EXISTS",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::UserAlreadyExists => "USER_ALREADY_EXISTS",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::UserInactive => "USER_INACTIVE",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::RecordNotFound => "RECORD_NOT_FOUND",
            ErrorCode::DuplicateEntry => "DUPLICATE_ENTRY",
            ErrorCode::ConstraintViolation => "CONSTRAINT_VIOLATION",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::InternalError => "An unexpected internal server error occurred",
            ErrorCode::BadRequest => "The request is malformed or contains invalid parameters",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::MethodNotAllowed => "The HTTP method is not allowed for this resource",
            ErrorCode::Unauthorized => "Authentication is required to access this resource",
            ErrorCode::Forbidden => "You don't have permission to access this resource",
            ErrorCode::ValidationError => "The request data failed validation",
            ErrorCode::Invalid => "The request is invalid",
            ErrorCode::RateLimitExceeded => "Too many requests, please try again later",
            ErrorCode::RequestTimeout => "The request took too long to process",
            ErrorCode::RequestTooLarge => "The request body exceeds the maximum allowed size",
            ErrorCode::UnsupportedMediaType => "The request content type is not supported",
            ErrorCode::EmailExists => "A user with this email address already exists",
            ErrorCode::UserNotFound => "The specified user was not found",
            ErrorCode::UserAlreadyExists => "A user with these details already exists",
            ErrorCode::InvalidCredentials => "The provided credentials are invalid",
            ErrorCode::UserInactive => "The user account is inactive",
            ErrorCode::DatabaseError => "A database error occurred",
            ErrorCode::RecordNotFound => "The requested record was not found in the database",
            ErrorCode::DuplicateEntry => "A record with these details already exists",
            ErrorCode::ConstraintViolation => "The operation violates a database constraint",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::BadRequest | ErrorCode::ValidationError | ErrorCode::Invalid => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::EmailExists
            | ErrorCode::UserAlreadyExists
            | ErrorCode::DuplicateEntry
            | ErrorCode::ConstraintViolation => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound | ErrorCode::UserNotFound | ErrorCode::RecordNotFound => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::Unauthorized | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden | ErrorCode::UserInactive => StatusCode::FORBIDDEN,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RequestTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            ErrorCode::EmailExists
            | ErrorCode::UserNotFound
            | ErrorCode::UserAlreadyExists
            | ErrorCode::InvalidCredentials
            | ErrorCode::UserInactive => "USER",
            ErrorCode::DatabaseError
            | ErrorCode::RecordNotFound
            | ErrorCode::DuplicateEntry
            | ErrorCode::ConstraintViolation => "DATABASE",
            _ => "GENERAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static PRODUCTION_MODE: AtomicBool = AtomicBool::new(false);

/// Switches internal error masking on. Called once at startup.
pub fn set_production_mode(enabled: bool) {
    PRODUCTION_MODE.store(enabled, Ordering::Relaxed);
}

pub fn is_production_mode() -> bool {
    PRODUCTION_MODE.load(Ordering::Relaxed)
}

pub const MASKED_INTERNAL_MESSAGE: &str = "An internal error occurred";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Typed application error carrying a stable code, a client facing message
/// and an optional underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    source: Option<BoxError>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn internal(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::new(ErrorCode::InternalError, message).with_source(source)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Maps a store error: missing rows become `not_found`, anything else is
    /// reported as internal with the store error kept as the cause.
    pub fn from_repo(
        err: RepoError,
        not_found: ErrorCode,
        not_found_message: &str,
        internal_message: &str,
    ) -> Self {
        match err {
            RepoError::NotFound => Self::new(not_found, not_found_message),
            RepoError::InvalidField(field) => {
                Self::bad_request(format!("invalid filter field: {field}"))
            }
            other => Self::internal(internal_message, other),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.code.status().is_server_error()
    }

    /// Message shown to clients. Internal failures are masked in production
    /// and carry their cause otherwise.
    pub fn client_message(&self, production: bool) -> String {
        if !self.is_internal() {
            return self.message.clone();
        }
        if production {
            return MASKED_INTERNAL_MESSAGE.to_string();
        }
        match &self.source {
            Some(source) => format!("{}: {}", self.message, source),
            None => self.message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            match &self.source {
                Some(source) => {
                    error!(code = %self.code, error = %source, "{}", self.message)
                }
                None => error!(code = %self.code, "{}", self.message),
            }
        }

        let status = self.code.status();
        let body = ApiResponse::<()>::failure(self.code, self.client_message(is_production_mode()));
        (status, Json(body)).into_response()
    }
}
