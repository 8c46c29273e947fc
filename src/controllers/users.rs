use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::FromRow;
use std::sync::Arc;
use validator::Validate;

use crate::{
    controllers::{page_meta, PageQuery, PAGE_SIZE},
    error::{is_unique_violation, ApiError, ApiResult},
    middleware::{issue_token, AuthUser},
    models::User,
    services::mails,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/{id}/reservations", get(user_reservations))
        // исторический путь того же списка броней пользователя
        .route("/reservations/{id}/user", get(user_reservations))
}

/* ---------- РЕГИСТРАЦИЯ И ВХОД ---------- */

#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email(message = "Некорректный email"))]
    email: String,
    #[validate(length(min = 2, message = "Имя должно быть не короче 2 символов"))]
    name: String,
    #[validate(length(min = 8, message = "Пароль должен быть не короче 8 символов"))]
    password: String,
}

// POST /api/v1/users
async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let password_hash = bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("bcrypt failure: {e}")))?;

    let inserted: Result<User, sqlx::Error> = sqlx::query_as(
        "INSERT INTO users (email, name, password_hash)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(&payload.email)
    .bind(&payload.name)
    .bind(&password_hash)
    .fetch_one(&state.db.pool)
    .await;

    let user = match inserted {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict(
                "Пользователь с таким email уже существует".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    state.mailer.send_detached(
        user.email.clone(),
        "Добро пожаловать в Cinema Hub".to_string(),
        mails::welcome_mail(&user.name),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Пользователь создан успешно!",
            "data": user,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

// POST /api/v1/users/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = User::find_by_email(&payload.email, &state.db)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !user.verify_password(&payload.password) {
        return Err(ApiError::Unauthorized);
    }

    let access_token = issue_token(&state.config.jwt, &user)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Вход выполнен успешно!",
            "data": { "user": user, "access_token": access_token },
        })),
    ))
}

/* ---------- БРОНИ ПОЛЬЗОВАТЕЛЯ ---------- */

#[derive(Debug, FromRow)]
struct UserReservationRow {
    id: i64,
    seat_number: String,
    status: crate::models::ReservationStatus,
    showtime_id: i64,
    movie_id: i64,
    theatre_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// GET /api/v1/users/{id}/reservations
async fn user_reservations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    actor: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    if actor.user_id != id && !actor.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let rows: Vec<UserReservationRow> = sqlx::query_as(
        "SELECT r.id, r.seat_number, r.status,
                s.id AS showtime_id, s.movie_id, s.theatre_id,
                s.start_time, s.end_time, (s.price / 100) AS price,
                r.created_at, r.updated_at
         FROM reservations r
         JOIN showtime s ON s.id = r.showtime_id
         WHERE r.user_id = $1
         ORDER BY r.created_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(id)
    .bind(PAGE_SIZE)
    .bind(query.offset())
    .fetch_all(&state.db.pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE user_id = $1")
        .bind(id)
        .fetch_one(&state.db.pool)
        .await?;

    let data: Vec<_> = rows
        .into_iter()
        .map(|r| {
            json!({
                "id": r.id,
                "seat_number": r.seat_number,
                "status": r.status,
                "showtime": {
                    "id": r.showtime_id,
                    "movie_id": r.movie_id,
                    "theatre_id": r.theatre_id,
                    "start_time": r.start_time,
                    "end_time": r.end_time,
                    "price": r.price,
                },
                "created_at": r.created_at,
                "updated_at": r.updated_at,
            })
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Брони получены успешно!",
            "data": data,
            "meta": page_meta(query.page(), total),
        })),
    ))
}
