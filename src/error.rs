/// Unified Error Handling Module
///
/// Every failure in the service maps to one `AppError` variant, which in
/// turn maps to exactly one HTTP status and a machine-readable code.
/// Responses never carry stack traces or internal paths.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Field-level validation errors. Registration aggregates every violated
/// field into a single response rather than stopping at the first.
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str, &'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field, reason) => {
                write!(f, "{}: {}", field, reason)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Central application error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed or missing input (400); carries all violated fields.
    Validation(Vec<ValidationError>),
    /// Duplicate resource, e.g. already-registered email (409).
    Conflict(String),
    /// Missing, invalid, or expired credential or token (401).
    Unauthorized(String),
    /// Authenticated but insufficient role or inactive account (403).
    Forbidden(String),
    /// Too many attempts within the configured window (429).
    RateLimited,
    /// Resource does not exist (404).
    NotFound(String),
    /// Unexpected store/cache failure (500); detail is logged, not returned.
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(errors) => {
                let joined = errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "{}", joined)
            }
            AppError::Conflict(msg) => write!(f, "{}", msg),
            AppError::Unauthorized(msg) => write!(f, "{}", msg),
            AppError::Forbidden(msg) => write!(f, "{}", msg),
            AppError::RateLimited => write!(f, "too many attempts, try again later"),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(vec![err])
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("email already registered".to_string())
            }
            sqlx::Error::RowNotFound => AppError::NotFound("record not found".to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Internal(format!("cache error: {}", err))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("blocking task failed: {}", err))
    }
}

/// JSON body of every error response
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating a client report with server logs
    pub error_id: String,
    /// Machine-readable error kind
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// HTTP status code
    pub status: u16,
    /// When the error occurred
    pub timestamp: String,
    /// All violated fields, present only for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to the client. Internal details stay in logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "internal error");
            }
            AppError::Validation(_) | AppError::Conflict(_) | AppError::NotFound(_) => {
                tracing::warn!(error_id = error_id, error = %self, "request rejected");
            }
            AppError::Unauthorized(_) | AppError::Forbidden(_) => {
                tracing::warn!(error_id = error_id, error = %self, "authentication failure");
            }
            AppError::RateLimited => {
                tracing::warn!(error_id = error_id, "rate limit exceeded");
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let status = self.status_code();
        let details = match self {
            AppError::Validation(errors) if errors.len() > 1 => {
                Some(errors.iter().map(|e| e.to_string()).collect())
            }
            _ => None,
        };

        HttpResponse::build(status).json(ErrorResponse {
            error_id,
            code: self.code().to_string(),
            message: self.public_message(),
            status: status.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            details,
        })
    }
}
