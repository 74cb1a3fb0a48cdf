use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tokio::fs;
use uuid::Uuid;

use crate::{AppState, error::AppError, routes::movie::Movie};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .filter(|extension| !extension.is_empty())
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    if Movie::find_by_id(&state.pool, id).await?.is_none() {
        return Err(AppError::NotFound("Movie not found"));
    }

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("Invalid multipart request: {}", err)))?
    {
        if field.name() == Some("image") {
            let filename = field
                .file_name()
                .map(|name| name.to_string())
                .ok_or_else(|| AppError::BadRequest("No image file provided".to_string()))?;
            let data = field.bytes().await.map_err(|err| {
                AppError::BadRequest(format!("Failed to read image data: {}", err))
            })?;
            image = Some((filename, data));
            break;
        }
    }

    let (filename, data) =
        image.ok_or_else(|| AppError::BadRequest("No image file provided".to_string()))?;

    let extension = file_extension(&filename)
        .filter(|extension| ALLOWED_EXTENSIONS.contains(&extension.as_str()))
        .ok_or_else(|| {
            AppError::BadRequest(
                "Invalid file type. Only jpg, jpeg, png, and gif are allowed".to_string(),
            )
        })?;

    if data.is_empty() {
        return Err(AppError::BadRequest("Empty file".to_string()));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(AppError::BadRequest(
            "File size exceeds maximum limit of 5MB".to_string(),
        ));
    }

    fs::create_dir_all(&state.config.upload_path)
        .await
        .map_err(|err| {
            tracing::error!("Failed to create upload directory: {}", err);
            AppError::Internal("Failed to create upload directory".to_string())
        })?;

    let stored_path = format!(
        "{}/{}.{}",
        state.config.upload_path.trim_end_matches('/'),
        Uuid::new_v4(),
        extension
    );

    fs::write(&stored_path, &data).await.map_err(|err| {
        tracing::error!("Failed to save image: {}", err);
        AppError::Internal("Failed to save image".to_string())
    })?;

    if let Err(err) = Movie::set_image_path(&state.pool, id, &stored_path).await {
        let _ = fs::remove_file(&stored_path).await;
        return Err(err.into());
    }

    Ok(Json(
        json!({"message": "Image uploaded successfully", "path": stored_path}),
    ))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let movie = Movie::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound("Movie not found"))?;

    if movie.image_path.is_empty() {
        return Err(AppError::NotFound("No image found for this movie"));
    }

    let data = fs::read(&movie.image_path)
        .await
        .map_err(|_| AppError::NotFound("Image file not found"))?;

    let extension = file_extension(&movie.image_path).unwrap_or_default();
    Ok(([(header::CONTENT_TYPE, content_type_for(&extension))], data).into_response())
}

pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let movie = Movie::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound("Movie not found"))?;

    if movie.image_path.is_empty() {
        return Err(AppError::NotFound("No image found for this movie"));
    }

    if let Err(err) = fs::remove_file(&movie.image_path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::error!("Failed to delete image file: {}", err);
            return Err(AppError::Internal("Failed to delete image file".to_string()));
        }
    }

    Movie::set_image_path(&state.pool, id, "").await?;

    Ok(Json(json!({"message": "Image deleted successfully"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_lowercased_and_validated() {
        assert_eq!(file_extension("poster.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("no-extension"), None);
        assert_eq!(file_extension("trailing-dot."), None);
    }

    #[test]
    fn content_types_match_their_extension() {
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("jpeg"), "image/jpeg");
        assert_eq!(content_type_for("png"), "image/png");
        assert_eq!(content_type_for("gif"), "image/gif");
        assert_eq!(content_type_for("bmp"), "application/octet-stream");
    }
}
