pub mod movies;
pub mod payments;
pub mod reservations;
pub mod showtime;
pub mod theatres;
pub mod users;

use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(movies::routes())
        .merge(theatres::routes())
        .merge(showtime::routes())
        .merge(reservations::routes())
        .merge(payments::routes())
}

/* ---------- пагинация ---------- */

pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        i64::from(self.page.unwrap_or(1).max(1))
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * PAGE_SIZE
    }
}

pub fn page_meta(page: i64, total: i64) -> Value {
    json!({
        "page": page,
        "per_page": PAGE_SIZE,
        "total": total,
        "total_pages": (total + PAGE_SIZE - 1) / PAGE_SIZE,
    })
}
