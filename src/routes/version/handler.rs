use axum::{
    Json,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{error::AppError, version};

const SBOM_PATH: &str = "sbom.json";

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
}

pub async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: version::version(),
    })
}

pub async fn get_sbom() -> Result<Response, AppError> {
    let data = tokio::fs::read(SBOM_PATH).await.map_err(|err| {
        tracing::error!("Error reading SBOM file: {}", err);
        AppError::Internal("Failed to read SBOM file".to_string())
    })?;

    Ok(([(header::CONTENT_TYPE, "application/json")], data).into_response())
}
