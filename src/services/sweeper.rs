//! sweeper.rs
//!
//! Фоновые задачи над бронями:
//! - снятие неоплаченных pending-броней, провисевших дольше окна
//!   оплаты, с возвратом места в счётчик сеанса;
//! - напоминания о скором начале сеанса для подтверждённых броней.
//!
//! Каждая запись обрабатывается отдельной транзакцией: ошибка одной
//! строки логируется и не прерывает проход по остальным. Полностью
//! неудавшийся проход повторится на следующем тике.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

pub struct ExpirySweeper {
    state: Arc<AppState>,
}

#[derive(Debug, FromRow)]
struct ReminderRow {
    id: i64,
    email: String,
    name: String,
    title: String,
    start_time: DateTime<Utc>,
    seat_number: String,
}

impl ExpirySweeper {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Полный проход: истёкшие брони, затем напоминания.
    pub async fn run_once(&self) {
        self.expire_stale_reservations().await;
        self.send_showtime_reminders().await;
    }

    /// Находит pending-брони старше окна оплаты и по одной переводит
    /// их в expired, возвращая место сеансу.
    async fn expire_stale_reservations(&self) {
        let hold_minutes = self.state.config.reservations.hold_minutes;

        let stale: Vec<(i64, i64)> = match sqlx::query_as(
            "SELECT id, showtime_id FROM reservations
             WHERE status = 'pending'
               AND updated_at < NOW() - ($1 * INTERVAL '1 minute')",
        )
        .bind(hold_minutes)
        .fetch_all(&self.state.db.pool)
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("failed to query stale reservations: {:?}", e);
                return;
            }
        };

        if stale.is_empty() {
            return;
        }

        info!("found {} unpaid hold(s) to expire", stale.len());

        for (reservation_id, showtime_id) in stale {
            if let Err(e) = self.expire_one(reservation_id, showtime_id).await {
                error!("failed to expire reservation {}: {:?}", reservation_id, e);
            }
        }
    }

    async fn expire_one(&self, reservation_id: i64, showtime_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.state.db.pool.begin().await?;

        // повторная проверка статуса: бронь могли успеть оплатить или отменить
        let expired = sqlx::query(
            "UPDATE reservations SET status = 'expired', updated_at = NOW()
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        if expired.rows_affected() == 0 {
            return Ok(());
        }

        sqlx::query(
            "UPDATE showtime
             SET available_seats = available_seats + 1, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(showtime_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            "reservation {} expired, seat returned to showtime {}",
            reservation_id, showtime_id
        );
        Ok(())
    }

    /// Подтверждённые брони сеансов, начинающихся в ближайший час,
    /// получают письмо-напоминание один раз.
    async fn send_showtime_reminders(&self) {
        let rows: Vec<ReminderRow> = match sqlx::query_as(
            "SELECT r.id, u.email, u.name, m.title, s.start_time, r.seat_number
             FROM reservations r
             JOIN showtime s ON s.id = r.showtime_id
             JOIN users u ON u.id = r.user_id
             JOIN movies m ON m.id = s.movie_id
             WHERE r.status = 'confirmed'
               AND s.status = 'pending'
               AND s.start_time BETWEEN NOW() AND NOW() + INTERVAL '1 hour'
               AND r.reminder_sent_at IS NULL",
        )
        .fetch_all(&self.state.db.pool)
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("failed to query reservations for reminders: {:?}", e);
                return;
            }
        };

        for row in rows {
            // отметка до отправки защищает от повторов при перезапусках
            let marked = sqlx::query(
                "UPDATE reservations SET reminder_sent_at = NOW()
                 WHERE id = $1 AND reminder_sent_at IS NULL",
            )
            .bind(row.id)
            .execute(&self.state.db.pool)
            .await;

            match marked {
                Ok(result) if result.rows_affected() > 0 => {
                    let html = crate::services::mails::reservation_reminder_mail(
                        &row.name,
                        &row.title,
                        row.start_time,
                        &row.seat_number,
                    );
                    self.state.mailer.send_detached(
                        row.email,
                        "Напоминание - сеанс скоро начнётся".to_string(),
                        html,
                    );
                }
                Ok(_) => {}
                Err(e) => error!("failed to mark reminder for reservation {}: {:?}", row.id, e),
            }
        }
    }
}
