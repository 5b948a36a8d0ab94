use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::core::guard::Rejection;
use crate::jsonwebtoken::errors::Error as JsonWebTokenError;
use crate::thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("persistence failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("jwt error: {0}")]
    JWTError(#[from] JsonWebTokenError),

    #[error("{0}")]
    Rejected(#[from] Rejection),

    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Poll not found")]
    NotFound,

    #[error("failed to encode qr code: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("server error: {0}")]
    ServerError(String),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Rejected(Rejection::AuthRequired) => StatusCode::UNAUTHORIZED,
            Error::Rejected(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized | Error::JWTError(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            log::error!("{}", self);
            match self {
                Error::Database(_) => "Persistence failed".to_owned(),
                _ => "Internal server error".to_owned(),
            }
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(json!({ "error": message }))
    }
}
