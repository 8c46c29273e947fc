use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    controllers::{page_meta, PageQuery, PAGE_SIZE},
    error::{is_foreign_key_violation, ApiError, ApiResult},
    middleware::AdminUser,
    models::{Showtime, ShowtimeStatus},
    services::availability,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtime", get(get_all_showtime).post(create_showtime))
        .route(
            "/showtime/{id}",
            get(get_showtime)
                .patch(update_showtime)
                .delete(delete_showtime),
        )
        .route("/showtime/{id}/status", patch(update_showtime_status))
        .route("/showtime/{id}/seats", get(get_showtime_seats))
}

/* ---------- helpers ---------- */

// Срез сеанса для read-путей: цена уже поделена на 100
#[derive(Debug, FromRow, serde::Serialize)]
struct ShowtimeRead {
    id: i64,
    movie_id: i64,
    theatre_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    price: i64,
    available_seats: i32,
    status: ShowtimeStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const SHOWTIME_READ_COLUMNS: &str = "id, movie_id, theatre_id, start_time, end_time, \
     (price / 100) AS price, available_seats, status, created_at, updated_at";

async fn movie_exists(pool: &sqlx::PgPool, movie_id: i64) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
        .bind(movie_id)
        .fetch_one(pool)
        .await
}

// Пересечение с другим не-терминальным сеансом зала по времени
async fn slot_taken(
    pool: &sqlx::PgPool,
    theatre_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    exclude_id: Option<i64>,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM showtime
            WHERE theatre_id = $1
              AND status NOT IN ('done', 'cancelled')
              AND start_time < $3
              AND end_time > $2
              AND ($4::BIGINT IS NULL OR id != $4)
         )",
    )
    .bind(theatre_id)
    .bind(start_time)
    .bind(end_time)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

/* ---------- СЕАНСЫ ---------- */

#[derive(Debug, Deserialize)]
struct ShowtimeRequest {
    movie_id: i64,
    theatre_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    // минорные единицы валюты
    price: i64,
}

impl ShowtimeRequest {
    fn validate_times(&self) -> Result<(), ApiError> {
        if self.end_time <= self.start_time {
            return Err(ApiError::BadRequest(
                "Время окончания должно быть позже времени начала".to_string(),
            ));
        }
        if self.price < 0 {
            return Err(ApiError::BadRequest(
                "Цена не может быть отрицательной".to_string(),
            ));
        }
        Ok(())
    }
}

// POST /api/v1/showtime
async fn create_showtime(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<ShowtimeRequest>,
) -> ApiResult<impl IntoResponse> {
    payload.validate_times()?;

    if !movie_exists(&state.db.pool, payload.movie_id).await? {
        return Err(ApiError::NotFound("Фильм не существует".to_string()));
    }

    let capacity: Option<i32> = sqlx::query_scalar("SELECT capacity FROM theatres WHERE id = $1")
        .bind(payload.theatre_id)
        .fetch_optional(&state.db.pool)
        .await?;
    let capacity = capacity.ok_or_else(|| ApiError::NotFound("Зал не существует!".to_string()))?;

    if slot_taken(
        &state.db.pool,
        payload.theatre_id,
        payload.start_time,
        payload.end_time,
        None,
    )
    .await?
    {
        return Err(ApiError::Conflict(
            "Этот слот времени в зале уже занят другим сеансом".to_string(),
        ));
    }

    // не больше одного идущего сеанса на зал
    let theatre_busy: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM showtime WHERE theatre_id = $1 AND status = 'active')",
    )
    .bind(payload.theatre_id)
    .fetch_one(&state.db.pool)
    .await?;
    if theatre_busy {
        return Err(ApiError::Conflict(
            "Зал уже используется, выберите другой".to_string(),
        ));
    }

    let showtime_ref = Uuid::new_v4().simple().to_string();

    let showtime: Showtime = sqlx::query_as(
        "INSERT INTO showtime
             (movie_id, theatre_id, start_time, end_time, price, available_seats, showtime_ref)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(payload.movie_id)
    .bind(payload.theatre_id)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.price)
    .bind(capacity)
    .bind(&showtime_ref)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Сеанс создан успешно!",
            "data": showtime,
        })),
    ))
}

// PATCH /api/v1/showtime/{id}
async fn update_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    _admin: AdminUser,
    Json(payload): Json<ShowtimeRequest>,
) -> ApiResult<impl IntoResponse> {
    payload.validate_times()?;

    let status: Option<ShowtimeStatus> =
        sqlx::query_scalar("SELECT status FROM showtime WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db.pool)
            .await?;
    let status = status.ok_or_else(|| ApiError::NotFound("Сеанс не существует".to_string()))?;
    if status != ShowtimeStatus::Pending {
        return Err(ApiError::BadRequest(
            "Изменять можно только ещё не начавшийся сеанс".to_string(),
        ));
    }

    if !movie_exists(&state.db.pool, payload.movie_id).await? {
        return Err(ApiError::NotFound("Фильм не существует".to_string()));
    }

    let theatre_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM theatres WHERE id = $1)")
            .bind(payload.theatre_id)
            .fetch_one(&state.db.pool)
            .await?;
    if !theatre_exists {
        return Err(ApiError::NotFound("Зал не существует!".to_string()));
    }

    if slot_taken(
        &state.db.pool,
        payload.theatre_id,
        payload.start_time,
        payload.end_time,
        Some(id),
    )
    .await?
    {
        return Err(ApiError::Conflict(
            "Этот слот времени в зале уже занят другим сеансом".to_string(),
        ));
    }

    let showtime: Showtime = sqlx::query_as(
        "UPDATE showtime
         SET movie_id = $2, theatre_id = $3, start_time = $4, end_time = $5,
             price = $6, updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(id)
    .bind(payload.movie_id)
    .bind(payload.theatre_id)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(payload.price)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Сеанс обновлён успешно!",
            "data": showtime,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct ShowtimeStatusRequest {
    status: ShowtimeStatus,
}

// PATCH /api/v1/showtime/{id}/status
//
// Руками сеанс можно только отменить: active и done выставляют часы
// жизненного цикла.
async fn update_showtime_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    _admin: AdminUser,
    Json(payload): Json<ShowtimeStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.status != ShowtimeStatus::Cancelled {
        return Err(ApiError::BadRequest(
            "Вручную сеанс можно только отменить".to_string(),
        ));
    }

    let cancelled = sqlx::query(
        "UPDATE showtime SET status = 'cancelled', updated_at = NOW()
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(&state.db.pool)
    .await?;

    if cancelled.rows_affected() == 0 {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM showtime WHERE id = $1)")
            .bind(id)
            .fetch_one(&state.db.pool)
            .await?;
        return if exists {
            Err(ApiError::BadRequest(
                "Отменить можно только ещё не начавшийся сеанс".to_string(),
            ))
        } else {
            Err(ApiError::NotFound("Сеанс не существует".to_string()))
        };
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Сеанс отменён успешно!",
        })),
    ))
}

// DELETE /api/v1/showtime/{id}
async fn delete_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    _admin: AdminUser,
) -> ApiResult<impl IntoResponse> {
    let result = sqlx::query("DELETE FROM showtime WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Сеанс удалён успешно!",
            })),
        )),
        Ok(_) => Err(ApiError::NotFound("Сеанс не существует".to_string())),
        Err(e) if is_foreign_key_violation(&e) => Err(ApiError::Conflict(
            "Нельзя удалить сеанс: по нему есть брони".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

// GET /api/v1/showtime/{id}
async fn get_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let showtime: Option<ShowtimeRead> = sqlx::query_as(&format!(
        "SELECT {SHOWTIME_READ_COLUMNS} FROM showtime WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?;

    let showtime =
        showtime.ok_or_else(|| ApiError::NotFound("Сеанс не существует".to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Сеанс получен успешно!",
            "data": showtime,
        })),
    ))
}

// GET /api/v1/showtime
async fn get_all_showtime(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let rows: Vec<ShowtimeRead> = sqlx::query_as(&format!(
        "SELECT {SHOWTIME_READ_COLUMNS} FROM showtime ORDER BY id DESC LIMIT $1 OFFSET $2"
    ))
    .bind(PAGE_SIZE)
    .bind(query.offset())
    .fetch_all(&state.db.pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM showtime")
        .fetch_one(&state.db.pool)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Сеансы получены успешно!",
            "data": rows,
            "meta": page_meta(query.page(), total),
        })),
    ))
}

// GET /api/v1/showtime/{id}/seats
//
// Полная раскладка зала: каталог мест, разделённый на занятые и свободные.
async fn get_showtime_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let seat_map = availability::seat_map(&state.db, id).await?;
    let reserved_count = seat_map.reserved.len();
    let available_count = seat_map.available.len();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Раскладка мест получена успешно!",
            "data": {
                "reserved": seat_map.reserved,
                "available": seat_map.available,
                "reserved_count": reserved_count,
                "available_count": available_count,
            },
        })),
    ))
}
