use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::tmdb::TmdbError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(&'static str),
    TooManyRequests,
    Upstream(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, what.to_string()),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Try again later.".to_string(),
            ),
            AppError::Upstream(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            AppError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        let body = Json(ErrorResponse { error });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Movie not found"),
            err => {
                tracing::error!("Database error: {}", err);
                AppError::Internal("Database error".to_string())
            }
        }
    }
}

impl From<TmdbError> for AppError {
    fn from(err: TmdbError) -> Self {
        match err {
            TmdbError::InvalidId => AppError::BadRequest("invalid movie ID".to_string()),
            TmdbError::QueryTooLong => AppError::BadRequest("search query too long".to_string()),
            TmdbError::NotFound => AppError::NotFound("Movie not found"),
            err => AppError::Upstream(err.to_string()),
        }
    }
}
