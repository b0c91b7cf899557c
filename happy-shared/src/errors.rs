use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Account, restaurant and menu errors
/// - E3xxx: Review and like errors
/// - E4xxx: Favorite errors
/// - E5xxx: Notification errors
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
    EmailAlreadyExists,
    TokenExpired,
    TokenInvalid,
    AccountBlocked,
    PasswordTooWeak,

    // Accounts / catalog (E2xxx)
    UserNotFound,
    RestaurantNotFound,
    CannotActOnSelf,
    MenuItemNotFound,

    // Reviews (E3xxx)
    ReviewNotFound,
    AlreadyLiked,
    NotReviewOwner,
    LikeNotFound,

    // Favorites (E4xxx)
    AlreadyFavorited,
    FavoriteNotFound,

    // Notification (E5xxx)
    NotificationNotFound,
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
            Self::EmailAlreadyExists => "E1002",
            Self::TokenExpired => "E1004",
            Self::TokenInvalid => "E1005",
            Self::AccountBlocked => "E1006",
            Self::PasswordTooWeak => "E1008",

            // Accounts / catalog
            Self::UserNotFound => "E2001",
            Self::RestaurantNotFound => "E2002",
            Self::CannotActOnSelf => "E2003",
            Self::MenuItemNotFound => "E2004",

            // Reviews
            Self::ReviewNotFound => "E3001",
            Self::AlreadyLiked => "E3002",
            Self::NotReviewOwner => "E3003",
            Self::LikeNotFound => "E3004",

            // Favorites
            Self::AlreadyFavorited => "E4001",
            Self::FavoriteNotFound => "E4002",

            // Notification
            Self::NotificationNotFound => "E5001",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak => StatusCode::BAD_REQUEST,
            // Duplicates are reported as plain 400s, the client only distinguishes them by code
            Self::EmailAlreadyExists | Self::AlreadyLiked | Self::AlreadyFavorited
            | Self::CannotActOnSelf => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::UserNotFound | Self::RestaurantNotFound
            | Self::MenuItemNotFound | Self::ReviewNotFound | Self::LikeNotFound
            | Self::FavoriteNotFound | Self::NotificationNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::AccountBlocked | Self::NotReviewOwner => StatusCode::FORBIDDEN,
        }
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

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
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

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code this error will be reported with.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Internal(_) | AppError::Database(_) => ErrorCode::InternalError,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(errors.field_errors()).unwrap_or_default();
        AppError::with_details(ErrorCode::ValidationError, "request validation failed", details)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                if status.is_server_error() {
                    tracing::error!(code = code.code(), error = %message, "request failed");
                }
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => match err {
                diesel::result::Error::NotFound => (
                    StatusCode::NOT_FOUND,
                    ApiErrorResponse::new("E0003", "resource not found"),
                ),
                _ => {
                    tracing::error!(error = %err, "database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "internal server error"),
                    )
                }
            },
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn known_error_envelope() {
        let value = body_json(AppError::new(ErrorCode::ReviewNotFound, "review not found")).await;

        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E3001");
        assert_eq!(value["error"]["message"], "review not found");
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn duplicates_are_bad_requests() {
        for code in [ErrorCode::EmailAlreadyExists, ErrorCode::AlreadyLiked, ErrorCode::AlreadyFavorited] {
            let response = AppError::new(code, "duplicate").into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let value = body_json(AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"))).await;
        assert_eq!(value["error"]["code"], "E0001");
        assert_eq!(value["error"]["message"], "internal server error");
    }

    #[tokio::test]
    async fn diesel_not_found_maps_to_404() {
        let response = AppError::Database(diesel::result::Error::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn status_mapping_covers_taxonomy() {
        assert_eq!(ErrorCode::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::NotReviewOwner.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::AccountBlocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::CannotActOnSelf.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotificationNotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_code_of_database_errors() {
        assert_eq!(
            AppError::Database(diesel::result::Error::NotFound).error_code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            AppError::Database(diesel::result::Error::RollbackTransaction).error_code(),
            ErrorCode::InternalError
        );
    }
}
