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
use uuid::Uuid;
use validator::Validate;

use crate::{
    controllers::{page_meta, PageQuery, PAGE_SIZE},
    error::{is_foreign_key_violation, is_unique_violation, ApiError, ApiResult},
    middleware::AdminUser,
    models::Theatre,
    seats,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/theatres", get(get_all_theatres).post(create_theatre))
        .route(
            "/theatres/{id}",
            get(get_theatre).patch(update_theatre).delete(delete_theatre),
        )
}

#[derive(Debug, Deserialize, Validate)]
struct TheatreRequest {
    #[validate(length(min = 1, message = "Название не может быть пустым"))]
    name: String,
    capacity: i32,
    seats_per_row: i32,
}

// POST /api/v1/theatres
async fn create_theatre(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<TheatreRequest>,
) -> ApiResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    seats::validate_layout(payload.capacity, payload.seats_per_row).map_err(ApiError::BadRequest)?;

    let room_id = Uuid::new_v4().simple().to_string();

    let inserted: Result<Theatre, sqlx::Error> = sqlx::query_as(
        "INSERT INTO theatres (name, capacity, seats_per_row, room_id)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(&payload.name)
    .bind(payload.capacity)
    .bind(payload.seats_per_row)
    .bind(&room_id)
    .fetch_one(&state.db.pool)
    .await;

    let theatre = match inserted {
        Ok(theatre) => theatre,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict(
                "Зал с таким названием уже существует!".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Зал создан успешно!",
            "data": theatre,
        })),
    ))
}

// PATCH /api/v1/theatres/{id}
async fn update_theatre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    _admin: AdminUser,
    Json(payload): Json<TheatreRequest>,
) -> ApiResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    seats::validate_layout(payload.capacity, payload.seats_per_row).map_err(ApiError::BadRequest)?;

    let updated: Result<Option<Theatre>, sqlx::Error> = sqlx::query_as(
        "UPDATE theatres
         SET name = $2, capacity = $3, seats_per_row = $4, updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(&payload.name)
    .bind(payload.capacity)
    .bind(payload.seats_per_row)
    .fetch_optional(&state.db.pool)
    .await;

    let theatre = match updated {
        Ok(Some(theatre)) => theatre,
        Ok(None) => return Err(ApiError::NotFound("Зал не существует!".to_string())),
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict(
                "Зал с таким названием уже существует!".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Зал обновлён успешно!",
            "data": theatre,
        })),
    ))
}

// DELETE /api/v1/theatres/{id}
async fn delete_theatre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    _admin: AdminUser,
) -> ApiResult<impl IntoResponse> {
    let result = sqlx::query("DELETE FROM theatres WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Зал удалён успешно!",
            })),
        )),
        Ok(_) => Err(ApiError::NotFound("Зал не существует!".to_string())),
        // удаление блокируется на уровне данных, пока на зал ссылаются сеансы
        Err(e) if is_foreign_key_violation(&e) => Err(ApiError::Conflict(
            "Нельзя удалить зал: в нём запланированы сеансы".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

// GET /api/v1/theatres/{id}
async fn get_theatre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let theatre: Option<Theatre> = sqlx::query_as("SELECT * FROM theatres WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await?;

    let theatre = theatre.ok_or_else(|| ApiError::NotFound("Зал не существует!".to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Зал получен успешно!",
            "data": theatre,
        })),
    ))
}

// GET /api/v1/theatres
async fn get_all_theatres(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let theatres: Vec<Theatre> =
        sqlx::query_as("SELECT * FROM theatres ORDER BY id LIMIT $1 OFFSET $2")
            .bind(PAGE_SIZE)
            .bind(query.offset())
            .fetch_all(&state.db.pool)
            .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM theatres")
        .fetch_one(&state.db.pool)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Залы получены успешно!",
            "data": theatres,
            "meta": page_meta(query.page(), total),
        })),
    ))
}
