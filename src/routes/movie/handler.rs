use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, error::AppError};

use super::model::{
    CreateMovieRequest, Movie, PageMeta, PaginatedMovies, Pagination, UpdateMovieRequest,
    total_pages,
};

#[axum::debug_handler]
pub async fn list_movies(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedMovies>, AppError> {
    let (page, limit) = pagination.clamp();
    let offset = Pagination::offset(page, limit);

    let (movies, total) = Movie::list(&state.pool, offset, limit).await?;

    Ok(Json(PaginatedMovies {
        data: movies,
        meta: PageMeta {
            page,
            limit,
            total,
            total_pages: total_pages(total, limit),
            query: None,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[axum::debug_handler]
pub async fn search_movies(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<PaginatedMovies>, AppError> {
    let (page, limit) = Pagination {
        page: params.page,
        limit: params.limit,
    }
    .clamp();
    let offset = Pagination::offset(page, limit);

    // an empty search term falls back to the plain listing
    let (movies, total) = if params.q.is_empty() {
        Movie::list(&state.pool, offset, limit).await?
    } else {
        Movie::search(&state.pool, &params.q, offset, limit).await?
    };

    Ok(Json(PaginatedMovies {
        data: movies,
        meta: PageMeta {
            page,
            limit,
            total,
            total_pages: total_pages(total, limit),
            query: Some(params.q),
        },
    }))
}

#[axum::debug_handler]
pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Movie>, AppError> {
    Movie::find_by_id(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Movie not found"))
}

#[axum::debug_handler]
pub async fn create_movie(
    State(state): State<AppState>,
    Json(req): Json<CreateMovieRequest>,
) -> Result<Response, AppError> {
    if req.title.is_empty() || req.year == 0 {
        return Err(AppError::BadRequest("Title and year are required".to_string()));
    }

    if !req.tmdb_id.is_empty() {
        if let Some(existing) = Movie::find_by_tmdb_id(&state.pool, &req.tmdb_id).await? {
            return Ok((
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "A movie with this TMDB id already exists",
                    "movie": existing,
                })),
            )
                .into_response());
        }
    }

    let movie = Movie::create(&state.pool, req).await?;
    flush_page_cache(&state).await;

    Ok((StatusCode::CREATED, Json(movie)).into_response())
}

#[axum::debug_handler]
pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateMovieRequest>,
) -> Result<Json<Movie>, AppError> {
    if req.title.is_empty() || req.year == 0 {
        return Err(AppError::BadRequest("Title and year are required".to_string()));
    }

    if Movie::find_by_id(&state.pool, id).await?.is_none() {
        return Err(AppError::NotFound("Movie not found"));
    }

    let movie = Movie::update(&state.pool, id, req).await?;
    flush_page_cache(&state).await;

    Ok(Json(movie))
}

#[axum::debug_handler]
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    if !Movie::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Movie not found"));
    }

    flush_page_cache(&state).await;

    Ok(Json(json!({"message": "Movie deleted successfully"})))
}

/// Write-through invalidation: every mutation clears all cached pages rather
/// than hunting down individual keys.
async fn flush_page_cache(state: &AppState) {
    tracing::info!("Flushing page cache after movie mutation");
    if let Err(err) = state.store.flush().await {
        tracing::warn!("Failed to flush page cache: {}", err);
    }
}
