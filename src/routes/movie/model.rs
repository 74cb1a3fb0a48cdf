use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Movie {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub year: i32,
    pub image_path: String,
    pub poster_path: String,
    pub tmdb_id: String,
    pub overview: String,
    pub release_date: String,
    pub rating: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    pub title: String,
    pub year: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub poster_path: String,
    #[serde(default)]
    pub tmdb_id: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub rating: f32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMovieRequest {
    pub title: String,
    pub year: i32,
    #[serde(default)]
    pub description: String,
    pub poster_path: Option<String>,
    pub tmdb_id: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub rating: Option<f32>,
}

/// Query parameters shared by the paginated listings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Page defaults to 1; limit defaults to 20 and is capped at 100.
    pub fn clamp(self) -> (i64, i64) {
        let page = match self.page {
            Some(page) if page >= 1 => page,
            _ => 1,
        };
        let limit = match self.limit {
            Some(limit) if limit >= 1 => limit.min(MAX_PAGE_SIZE),
            _ => DEFAULT_PAGE_SIZE,
        };
        (page, limit)
    }

    pub fn offset(page: i64, limit: i64) -> i64 {
        (page - 1) * limit
    }
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedMovies {
    pub data: Vec<Movie>,
    pub meta: PageMeta,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl Movie {
    pub async fn list(
        pool: &PgPool,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let movies =
            sqlx::query_as::<_, Movie>("SELECT * FROM movies ORDER BY id OFFSET $1 LIMIT $2")
                .bind(offset)
                .bind(limit)
                .fetch_all(pool)
                .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
            .fetch_one(pool)
            .await?;

        Ok((movies, total))
    }

    pub async fn search(
        pool: &PgPool,
        query: &str,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let pattern = format!("%{}%", query);

        let movies = sqlx::query_as::<_, Movie>(
            "SELECT * FROM movies WHERE title ILIKE $1 OR description ILIKE $1 \
             ORDER BY id OFFSET $2 LIMIT $3",
        )
        .bind(&pattern)
        .bind(offset)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM movies WHERE title ILIKE $1 OR description ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

        Ok((movies, total))
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_tmdb_id(pool: &PgPool, tmdb_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE tmdb_id = $1")
            .bind(tmdb_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &PgPool, req: CreateMovieRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Movie>(
            r#"
            INSERT INTO movies
                (title, description, year, poster_path, tmdb_id, overview, release_date, rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.year)
        .bind(&req.poster_path)
        .bind(&req.tmdb_id)
        .bind(&req.overview)
        .bind(&req.release_date)
        .bind(req.rating)
        .fetch_one(pool)
        .await
    }

    /// Title, year and description always win; the remaining fields keep
    /// their stored value unless the request provides a non-empty one.
    pub async fn update(
        pool: &PgPool,
        id: i32,
        req: UpdateMovieRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Movie>(
            r#"
            UPDATE movies SET
                title = $2,
                year = $3,
                description = $4,
                poster_path = COALESCE($5, poster_path),
                tmdb_id = COALESCE($6, tmdb_id),
                overview = COALESCE($7, overview),
                release_date = COALESCE($8, release_date),
                rating = COALESCE($9, rating),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.title)
        .bind(req.year)
        .bind(&req.description)
        .bind(non_empty(req.poster_path.as_deref()))
        .bind(non_empty(req.tmdb_id.as_deref()))
        .bind(non_empty(req.overview.as_deref()))
        .bind(non_empty(req.release_date.as_deref()))
        .bind(req.rating.filter(|rating| *rating != 0.0))
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_image_path(
        pool: &PgPool,
        id: i32,
        image_path: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Movie>(
            "UPDATE movies SET image_path = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(image_path)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_apply_to_missing_and_invalid_values() {
        let (page, limit) = Pagination {
            page: None,
            limit: None,
        }
        .clamp();
        assert_eq!((page, limit), (1, DEFAULT_PAGE_SIZE));

        let (page, limit) = Pagination {
            page: Some(0),
            limit: Some(-5),
        }
        .clamp();
        assert_eq!((page, limit), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn pagination_caps_the_page_size() {
        let (_, limit) = Pagination {
            page: Some(3),
            limit: Some(500),
        }
        .clamp();
        assert_eq!(limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn offset_counts_from_the_first_page() {
        assert_eq!(Pagination::offset(1, 20), 0);
        assert_eq!(Pagination::offset(3, 20), 40);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
    }

    #[test]
    fn empty_update_fields_do_not_overwrite() {
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(Some("value")), Some("value"));
        assert_eq!(non_empty(None), None);
    }
}
