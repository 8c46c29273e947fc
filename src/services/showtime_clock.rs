//! showtime_clock.rs
//!
//! Часы жизненного цикла сеанса: pending -> active -> done по времени
//! начала и конца. Переходы монотонные, отменённые сеансы не трогаются.
//! Свежесть статуса относительно бронирований гарантирует блокировка
//! строки сеанса в менеджере транзакций.

use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

pub struct ShowtimeClock {
    state: Arc<AppState>,
}

impl ShowtimeClock {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn run_once(&self) {
        self.activate_started().await;
        self.finish_ended().await;
    }

    /// pending-сеансы, чьё время начала наступило, становятся active.
    async fn activate_started(&self) {
        let activated: Result<Vec<i64>, sqlx::Error> = sqlx::query_scalar(
            "UPDATE showtime SET status = 'active', updated_at = NOW()
             WHERE status = 'pending' AND start_time <= NOW()
             RETURNING id",
        )
        .fetch_all(&self.state.db.pool)
        .await;

        match activated {
            Ok(ids) if !ids.is_empty() => {
                info!("{} showtime(s) went active: {:?}", ids.len(), ids);
            }
            Ok(_) => {}
            Err(e) => error!("failed to activate started showtimes: {:?}", e),
        }
    }

    /// active-сеансы, чьё время конца прошло, становятся done.
    async fn finish_ended(&self) {
        let finished: Result<Vec<i64>, sqlx::Error> = sqlx::query_scalar(
            "UPDATE showtime SET status = 'done', updated_at = NOW()
             WHERE status = 'active' AND end_time <= NOW()
             RETURNING id",
        )
        .fetch_all(&self.state.db.pool)
        .await;

        match finished {
            Ok(ids) if !ids.is_empty() => {
                info!("{} showtime(s) finished: {:?}", ids.len(), ids);
            }
            Ok(_) => {}
            Err(e) => error!("failed to finish ended showtimes: {:?}", e),
        }
    }
}
