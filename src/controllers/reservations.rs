use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
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
    error::{ApiError, ApiResult},
    middleware::{AdminUser, AuthUser},
    models::ReservationStatus,
    seats,
    services::{
        mails,
        payment::{PaymentLink, PaymentLinkRequest},
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/reservations",
            post(create_reservation).get(get_all_reservations),
        )
        .route("/reservations/report", get(reservation_report))
        .route(
            "/reservations/{id}",
            get(get_reservation).patch(update_reservation_status),
        )
        .route("/reservations/{id}/cancel", delete(cancel_reservation))
        .route(
            "/reservations/{id}/payment-link",
            post(recreate_payment_link),
        )
}

/* ---------- helpers ---------- */

// wire-формат номера места: ^[A-Z]{1,2}\d{3}$
fn validate_seat_numbers(seat_numbers: &[String]) -> Result<(), ApiError> {
    for label in seat_numbers {
        if !seats::is_valid_seat_label(label) {
            return Err(ApiError::BadRequest(format!(
                "Номер места \"{}\" должен иметь вид A001",
                label
            )));
        }
    }
    Ok(())
}

#[derive(Debug, FromRow)]
struct CustomerContact {
    email: String,
    name: String,
}

async fn customer_contact(pool: &sqlx::PgPool, user_id: i64) -> Result<CustomerContact, ApiError> {
    let contact: Option<CustomerContact> =
        sqlx::query_as("SELECT email, name FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    contact.ok_or_else(|| ApiError::NotFound("Пользователь не существует".to_string()))
}

/* ---------- БРОНИРОВАНИЕ ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreateReservationRequest {
    user_id: i64,
    showtime_id: i64,
    #[validate(length(min = 1, max = 5, message = "В пакете может быть от 1 до 5 мест"))]
    seat_numbers: Vec<String>,
}

// POST /api/v1/reservations
async fn create_reservation(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    Json(payload): Json<CreateReservationRequest>,
) -> ApiResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_seat_numbers(&payload.seat_numbers)?;

    // покупатель бронирует только для себя
    if actor.user_id != payload.user_id && !actor.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let booked = state
        .reservations
        .reserve(payload.showtime_id, payload.user_id, &payload.seat_numbers)
        .await?;

    let contact = customer_contact(&state.db.pool, payload.user_id).await?;
    let movie_title: String = sqlx::query_scalar("SELECT title FROM movies WHERE id = $1")
        .bind(booked.showtime.movie_id)
        .fetch_one(&state.db.pool)
        .await?;
    let theatre_name: String = sqlx::query_scalar("SELECT name FROM theatres WHERE id = $1")
        .bind(booked.showtime.theatre_id)
        .fetch_one(&state.db.pool)
        .await?;

    let amount = booked.showtime.price * payload.seat_numbers.len() as i64;
    let link_request = PaymentLinkRequest {
        email: contact.email.clone(),
        customer_name: contact.name.clone(),
        amount,
        showtime_ref: booked.showtime.showtime_ref.clone(),
        seat_numbers: payload.seat_numbers.clone(),
        reservation_ids: booked.reservation_ids.clone(),
    };

    // бронь уже закоммичена: ошибка шлюза её не трогает,
    // ссылку можно перевыпустить через /payment-link
    let payment: Option<PaymentLink> = match state.payments.create_payment_link(&link_request).await
    {
        Ok(link) => Some(link),
        Err(e) => {
            tracing::warn!(
                "payment link for reservations {:?} failed: {}",
                booked.reservation_ids,
                e
            );
            None
        }
    };

    if let Some(link) = &payment {
        let html = mails::reservation_mail(&mails::ReservationMailParams {
            customer_name: &contact.name,
            movie_title: &movie_title,
            theatre: &theatre_name,
            start_time: booked.showtime.start_time,
            seat_numbers: &payload.seat_numbers.join(". "),
            payment_link: &link.authorization_url,
        });
        state
            .mailer
            .send_detached(contact.email, "Бронь создана".to_string(), html);
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Бронь создана успешно! Неоплаченная бронь будет снята через 20 минут",
            "data": {
                "reservation_ids": booked.reservation_ids,
                "seat_numbers": payload.seat_numbers,
                "showtime": {
                    "id": booked.showtime.id,
                    "movie_id": booked.showtime.movie_id,
                    "theatre_id": booked.showtime.theatre_id,
                    "start_time": booked.showtime.start_time,
                    "price": booked.showtime.price,
                    "showtime_ref": booked.showtime.showtime_ref,
                },
                "payment": payment,
            },
        })),
    ))
}

// POST /api/v1/reservations/{id}/payment-link
//
// Перевыпуск ссылки для неоплаченного пакета: собирает все pending-брони
// того же пользователя на тот же сеанс.
async fn recreate_payment_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    actor: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let reservation: Option<(i64, i64, ReservationStatus)> =
        sqlx::query_as("SELECT user_id, showtime_id, status FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db.pool)
            .await?;
    let (user_id, showtime_id, status) =
        reservation.ok_or_else(|| ApiError::NotFound("Бронь не существует".to_string()))?;

    if user_id != actor.user_id && !actor.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if status != ReservationStatus::Pending {
        return Err(ApiError::BadRequest(
            "Ссылку можно перевыпустить только для неоплаченной брони".to_string(),
        ));
    }

    let pending: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, seat_number FROM reservations
         WHERE user_id = $1 AND showtime_id = $2 AND status = 'pending'
         ORDER BY id",
    )
    .bind(user_id)
    .bind(showtime_id)
    .fetch_all(&state.db.pool)
    .await?;

    let (price, showtime_ref): (i64, String) =
        sqlx::query_as("SELECT price, showtime_ref FROM showtime WHERE id = $1")
            .bind(showtime_id)
            .fetch_one(&state.db.pool)
            .await?;

    let contact = customer_contact(&state.db.pool, user_id).await?;
    let (reservation_ids, seat_numbers): (Vec<i64>, Vec<String>) = pending.into_iter().unzip();

    let link = state
        .payments
        .create_payment_link(&PaymentLinkRequest {
            email: contact.email,
            customer_name: contact.name,
            amount: price * reservation_ids.len() as i64,
            showtime_ref,
            seat_numbers,
            reservation_ids,
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Платёжная ссылка выпущена успешно!",
            "data": { "payment": link },
        })),
    ))
}

/* ---------- ОТМЕНА И СТАТУСЫ ---------- */

// DELETE /api/v1/reservations/{id}/cancel
async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    actor: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let cancelled = state.reservations.cancel(id, &actor).await?;

    // письмо об отмене - best effort
    let details: Option<(String, String, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT u.email, u.name, m.title, s.start_time
         FROM reservations r
         JOIN users u ON u.id = r.user_id
         JOIN showtime s ON s.id = r.showtime_id
         JOIN movies m ON m.id = s.movie_id
         WHERE r.id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?;

    if let Some((email, name, movie_title, start_time)) = details {
        let html = mails::reservation_cancellation_mail(&name, &movie_title, start_time);
        state
            .mailer
            .send_detached(email, "Бронь отменена".to_string(), html);
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Бронь отменена успешно",
            "data": { "id": cancelled.id, "seat_number": cancelled.seat_number },
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct UpdateReservationStatusRequest {
    status: ReservationStatus,
}

// PATCH /api/v1/reservations/{id} - только для администраторов
async fn update_reservation_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    _admin: AdminUser,
    Json(payload): Json<UpdateReservationStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.reservations.update_status(id, payload.status).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Статус брони обновлён успешно",
            "data": updated,
        })),
    ))
}

/* ---------- ЧТЕНИЕ ---------- */

#[derive(Debug, FromRow)]
struct ReservationRow {
    id: i64,
    seat_number: String,
    status: ReservationStatus,
    user_id: i64,
    showtime_id: i64,
    movie_id: i64,
    theatre_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReservationRow {
    fn into_json(self) -> serde_json::Value {
        json!({
            "id": self.id,
            "seat_number": self.seat_number,
            "status": self.status,
            "user_id": self.user_id,
            "showtime": {
                "id": self.showtime_id,
                "movie_id": self.movie_id,
                "theatre_id": self.theatre_id,
                "start_time": self.start_time,
                "end_time": self.end_time,
                "price": self.price,
            },
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

const RESERVATION_ROW_QUERY: &str = "SELECT r.id, r.seat_number, r.status, r.user_id,
        s.id AS showtime_id, s.movie_id, s.theatre_id,
        s.start_time, s.end_time, (s.price / 100) AS price,
        r.created_at, r.updated_at
 FROM reservations r
 JOIN showtime s ON s.id = r.showtime_id";

// GET /api/v1/reservations/{id}
async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    actor: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let row: Option<ReservationRow> =
        sqlx::query_as(&format!("{RESERVATION_ROW_QUERY} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&state.db.pool)
            .await?;

    let row = row.ok_or_else(|| ApiError::NotFound("Бронь не существует".to_string()))?;
    if row.user_id != actor.user_id && !actor.is_admin() {
        return Err(ApiError::Forbidden);
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Бронь получена успешно!",
            "data": row.into_json(),
        })),
    ))
}

// GET /api/v1/reservations - только для администраторов
async fn get_all_reservations(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
        "{RESERVATION_ROW_QUERY} ORDER BY r.created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(PAGE_SIZE)
    .bind(query.offset())
    .fetch_all(&state.db.pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations")
        .fetch_one(&state.db.pool)
        .await?;

    let data: Vec<_> = rows.into_iter().map(ReservationRow::into_json).collect();

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

// GET /api/v1/reservations/report - только для администраторов
async fn reservation_report(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<impl IntoResponse> {
    let (total, confirmed, completed, revenue): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COUNT(*) FILTER (WHERE r.status = 'confirmed'),
                COUNT(*) FILTER (WHERE r.status = 'completed'),
                COALESCE(SUM(s.price) FILTER (WHERE r.status = 'completed'), 0)::BIGINT
         FROM reservations r
         JOIN showtime s ON s.id = r.showtime_id",
    )
    .fetch_one(&state.db.pool)
    .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Отчёт по броням получен успешно!",
            "data": {
                "total_reservations": total,
                "confirmed_reservations": confirmed,
                "completed_reservations": completed,
                // выручка в минорных единицах по завершённым броням
                "total_revenue": revenue,
            },
        })),
    ))
}
