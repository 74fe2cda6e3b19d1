use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Analysis quota exceeded: used {used} of {quota}")]
    QuotaExceeded { used: i32, quota: i32 },

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Stripe error: {0}")]
    StripeError(#[from] stripe::StripeError),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    /// Machine readable code and the message that is safe to return to clients.
    fn code_and_message(&self) -> (&'static str, String) {
        match self {
            AppError::ValidationError(msg) => ("VALIDATION_ERROR", msg.clone()),
            AppError::AuthError(msg) => ("AUTH_ERROR", msg.clone()),
            AppError::JwtError(_) => ("AUTH_ERROR", "Invalid access token".to_string()),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::Forbidden => ("FORBIDDEN", "Forbidden".to_string()),
            AppError::Conflict(msg) => ("CONFLICT", msg.clone()),
            AppError::QuotaExceeded { used, quota } => (
                "QUOTA_EXCEEDED",
                format!("Analysis quota exceeded ({used}/{quota}). Upgrade your plan to continue."),
            ),
            AppError::ExternalApiError(msg) => ("EXTERNAL_API_ERROR", msg.clone()),
            AppError::StripeError(_) => ("STRIPE_ERROR", "Payment provider error".to_string()),
            AppError::DatabaseError(_) => ("DATABASE_ERROR", "Database error".to_string()),
            _ => ("INTERNAL_ERROR", "Internal server error".to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden | AppError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ExternalApiError(_) | AppError::StripeError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        match status_code {
            s if s.is_server_error() => log::error!("{self}"),
            StatusCode::NOT_FOUND => {}
            _ => log::warn!("{self}"),
        }

        let (error_code, message) = self.code_and_message();
        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::QuotaExceeded { used: 30, quota: 30 }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ExternalApiError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::InternalError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let (code, message) = AppError::InternalError("secret detail".into()).code_and_message();
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("secret"));

        let (code, message) =
            AppError::DatabaseError(sea_orm::DbErr::Custom("boom".into())).code_and_message();
        assert_eq!(code, "DATABASE_ERROR");
        assert_eq!(message, "Database error");
    }

    #[test]
    fn test_quota_exceeded_message() {
        let (code, message) = AppError::QuotaExceeded { used: 60, quota: 60 }.code_and_message();
        assert_eq!(code, "QUOTA_EXCEEDED");
        assert!(message.contains("60/60"));
    }
}
