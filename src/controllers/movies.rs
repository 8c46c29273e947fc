use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    controllers::{page_meta, PageQuery, PAGE_SIZE},
    error::{is_foreign_key_violation, ApiError, ApiResult},
    middleware::AdminUser,
    models::Movie,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(get_all_movies).post(create_movie))
        .route(
            "/movies/{id}",
            get(get_movie).patch(update_movie).delete(delete_movie),
        )
}

#[derive(Debug, Deserialize, Validate)]
struct MovieRequest {
    #[validate(length(min = 1, message = "Название не может быть пустым"))]
    title: String,
    overview: Option<String>,
    #[validate(url(message = "Некорректная ссылка на постер"))]
    poster_image_url: Option<String>,
    #[validate(range(min = 1, message = "Длительность должна быть больше нуля"))]
    runtime: i32,
}

// POST /api/v1/movies
async fn create_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<MovieRequest>,
) -> ApiResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let movie: Movie = sqlx::query_as(
        "INSERT INTO movies (title, overview, poster_image_url, runtime)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(&payload.title)
    .bind(&payload.overview)
    .bind(&payload.poster_image_url)
    .bind(payload.runtime)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Фильм создан успешно!",
            "data": movie,
        })),
    ))
}

// PATCH /api/v1/movies/{id}
async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    _admin: AdminUser,
    Json(payload): Json<MovieRequest>,
) -> ApiResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let movie: Option<Movie> = sqlx::query_as(
        "UPDATE movies
         SET title = $2, overview = $3, poster_image_url = $4, runtime = $5, updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(&payload.title)
    .bind(&payload.overview)
    .bind(&payload.poster_image_url)
    .bind(payload.runtime)
    .fetch_optional(&state.db.pool)
    .await?;

    let movie = movie.ok_or_else(|| ApiError::NotFound("Фильм не существует".to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Фильм обновлён успешно!",
            "data": movie,
        })),
    ))
}

// DELETE /api/v1/movies/{id}
async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    _admin: AdminUser,
) -> ApiResult<impl IntoResponse> {
    let result = sqlx::query("DELETE FROM movies WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Фильм удалён успешно!",
            })),
        )),
        Ok(_) => Err(ApiError::NotFound("Фильм не существует".to_string())),
        Err(e) if is_foreign_key_violation(&e) => Err(ApiError::Conflict(
            "Нельзя удалить фильм: на него запланированы сеансы".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

// GET /api/v1/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let movie: Option<Movie> = sqlx::query_as("SELECT * FROM movies WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await?;

    let movie = movie.ok_or_else(|| ApiError::NotFound("Фильм не существует".to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Фильм получен успешно!",
            "data": movie,
        })),
    ))
}

// GET /api/v1/movies
async fn get_all_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let movies: Vec<Movie> =
        sqlx::query_as("SELECT * FROM movies ORDER BY id DESC LIMIT $1 OFFSET $2")
            .bind(PAGE_SIZE)
            .bind(query.offset())
            .fetch_all(&state.db.pool)
            .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
        .fetch_one(&state.db.pool)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Фильмы получены успешно!",
            "data": movies,
            "meta": page_meta(query.page(), total),
        })),
    ))
}
