use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Жизненный цикл сеанса: pending -> active -> done, cancelled - терминальный
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "showtime_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShowtimeStatus {
    Pending,
    Active,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub theatre_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    // минорные единицы валюты
    pub price: i64,
    pub available_seats: i32,
    pub showtime_ref: String,
    pub status: ShowtimeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
