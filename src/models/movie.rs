use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_image_url: Option<String>,
    pub runtime: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
