use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, error::AppError, tmdb::TmdbMovie};

#[derive(Debug, Deserialize)]
pub struct TmdbSearchParams {
    #[serde(default)]
    pub query: String,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<TmdbSearchParams>,
) -> Result<Json<Vec<TmdbMovie>>, AppError> {
    if params.query.is_empty() {
        return Err(AppError::BadRequest("query parameter is required".to_string()));
    }

    let movies = state.tmdb.search_movies(&params.query).await?;
    Ok(Json(movies))
}

pub async fn movie_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TmdbMovie>, AppError> {
    let movie = state.tmdb.movie_details(id).await?;
    Ok(Json(movie))
}

pub async fn test_connection(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.tmdb.test_connection().await?;
    Ok(Json(json!({"status": "ok"})))
}
