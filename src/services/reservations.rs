//! reservations.rs
//!
//! Канонический менеджер транзакций бронирования.
//!
//! Все изменения броней проходят через этот модуль:
//! 1.  **reserve**: пакетное бронирование мест - N строк брони и
//!     уменьшение счётчика свободных мест сеанса в одной транзакции,
//!     всё или ничего.
//! 2.  **cancel**: отмена брони пользователем или администратором с
//!     возвратом места в счётчик.
//! 3.  **update_status**: административный перевод брони в
//!     confirmed/completed по закрытой таблице переходов.
//!
//! Предпроверки выполняются внутри транзакции под `FOR UPDATE` на
//! строке сеанса, поэтому одновременные бронирования одного сеанса
//! сериализуются. Источником истины для "не более одного победителя"
//! на пару (сеанс, место) остаётся частичный уникальный индекс
//! `uq_reservations_active_seat`.

use sqlx::FromRow;
use std::collections::HashSet;

use crate::{
    config::ReservationsConfig,
    database::Database,
    error::{is_unique_violation, ApiError},
    middleware::AuthUser,
    models::{Reservation, ReservationStatus, Role, ShowtimeStatus},
    seats,
    services::availability,
};

/// Срез сеанса, который читается под блокировкой при бронировании.
#[derive(Debug, Clone, FromRow)]
pub struct ShowtimeForBooking {
    pub id: i64,
    pub status: ShowtimeStatus,
    pub price: i64,
    pub available_seats: i32,
    pub showtime_ref: String,
    pub movie_id: i64,
    pub theatre_id: i64,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub capacity: i32,
    pub seats_per_row: i32,
}

/// Результат успешного бронирования: id броней в порядке создания
/// плюс срез сеанса для платёжной ссылки и письма.
#[derive(Debug)]
pub struct BookedSeats {
    pub reservation_ids: Vec<i64>,
    pub showtime: ShowtimeForBooking,
}

#[derive(Clone)]
pub struct ReservationService {
    db: Database,
    cfg: ReservationsConfig,
}

impl ReservationService {
    pub fn new(db: Database, cfg: ReservationsConfig) -> Self {
        Self { db, cfg }
    }

    /// Бронирует пакет мест для пользователя. Либо все места из
    /// пакета становятся pending-бронями и счётчик сеанса уменьшается
    /// на размер пакета, либо не происходит ничего.
    pub async fn reserve(
        &self,
        showtime_id: i64,
        user_id: i64,
        seat_numbers: &[String],
    ) -> Result<BookedSeats, ApiError> {
        // роль проверяется до входа в транзакцию
        let user: Option<Role> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db.pool)
            .await?;
        let role = user.ok_or_else(|| ApiError::NotFound("Пользователь не существует".to_string()))?;
        if role != Role::Customer {
            return Err(ApiError::BadRequest(
                "Бронировать места могут только покупатели".to_string(),
            ));
        }

        let mut tx = self.db.pool.begin().await?;

        // FOR UPDATE сериализует одновременные бронирования сеанса и
        // закрывает гонку с часами жизненного цикла
        let showtime: Option<ShowtimeForBooking> = sqlx::query_as(
            "SELECT s.id, s.status, s.price, s.available_seats, s.showtime_ref,
                    s.movie_id, s.theatre_id, s.start_time,
                    t.capacity, t.seats_per_row
             FROM showtime s
             JOIN theatres t ON t.id = s.theatre_id
             WHERE s.id = $1
             FOR UPDATE OF s",
        )
        .bind(showtime_id)
        .fetch_optional(&mut *tx)
        .await?;

        let showtime =
            showtime.ok_or_else(|| ApiError::NotFound("Сеанс не существует".to_string()))?;

        match showtime.status {
            ShowtimeStatus::Pending => {}
            ShowtimeStatus::Active => {
                return Err(ApiError::BadRequest(
                    "Нельзя забронировать место на уже идущий сеанс".to_string(),
                ))
            }
            ShowtimeStatus::Cancelled => {
                return Err(ApiError::BadRequest(
                    "Нельзя забронировать место на отменённый сеанс".to_string(),
                ))
            }
            ShowtimeStatus::Done => {
                return Err(ApiError::BadRequest(
                    "Нельзя забронировать место на завершённый сеанс".to_string(),
                ))
            }
        }

        let catalog: HashSet<String> =
            seats::generate_seat_labels(showtime.capacity, showtime.seats_per_row)
                .into_iter()
                .collect();
        availability::validate_batch(seat_numbers, &catalog)?;

        // занятые места среди запрошенных
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT seat_number FROM reservations
             WHERE showtime_id = $1
               AND seat_number = ANY($2)
               AND status NOT IN ('cancelled', 'expired')",
        )
        .bind(showtime_id)
        .bind(seat_numbers)
        .fetch_all(&mut *tx)
        .await?;
        if !taken.is_empty() {
            return Err(ApiError::Conflict(format!(
                "Места \"{}\" уже забронированы, выберите другие",
                taken.join(", ")
            )));
        }

        // лимит броней пользователя на сеанс
        let held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations
             WHERE user_id = $1 AND showtime_id = $2
               AND status IN ('pending', 'confirmed')",
        )
        .bind(user_id)
        .bind(showtime_id)
        .fetch_one(&mut *tx)
        .await?;
        let requested = seat_numbers.len() as i64;
        if held + requested > self.cfg.max_per_showtime {
            return Err(ApiError::BadRequest(format!(
                "На один сеанс можно держать не более {} броней, у вас уже {}",
                self.cfg.max_per_showtime, held
            )));
        }

        if i64::from(showtime.available_seats) < requested {
            return Err(ApiError::BadRequest(
                "В зале недостаточно свободных мест".to_string(),
            ));
        }

        // пакетная вставка одним стейтментом, id возвращаются в порядке пакета
        let insert_result: Result<Vec<i64>, sqlx::Error> = sqlx::query_scalar(
            "INSERT INTO reservations (showtime_id, user_id, seat_number)
             SELECT $1, $2, u.seat
             FROM UNNEST($3::text[]) WITH ORDINALITY AS u(seat, ord)
             ORDER BY u.ord
             RETURNING id",
        )
        .bind(showtime_id)
        .bind(user_id)
        .bind(seat_numbers)
        .fetch_all(&mut *tx)
        .await;

        let reservation_ids = match insert_result {
            Ok(ids) => ids,
            // проигравший гонку за место получает конфликт с именами мест
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                let contested: Vec<String> = sqlx::query_scalar(
                    "SELECT seat_number FROM reservations
                     WHERE showtime_id = $1
                       AND seat_number = ANY($2)
                       AND status NOT IN ('cancelled', 'expired')",
                )
                .bind(showtime_id)
                .bind(seat_numbers)
                .fetch_all(&self.db.pool)
                .await
                .unwrap_or_else(|_| seat_numbers.to_vec());
                return Err(ApiError::Conflict(format!(
                    "Места \"{}\" уже забронированы, выберите другие",
                    contested.join(", ")
                )));
            }
            Err(e) => return Err(e.into()),
        };

        // уменьшение счётчика тем же объёмом и в той же транзакции
        let updated = sqlx::query(
            "UPDATE showtime
             SET available_seats = available_seats - $2, updated_at = NOW()
             WHERE id = $1 AND available_seats >= $2",
        )
        .bind(showtime_id)
        .bind(requested as i32)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ApiError::BadRequest(
                "В зале недостаточно свободных мест".to_string(),
            ));
        }

        tx.commit().await?;

        tracing::info!(
            "reserved {} seat(s) for user {} on showtime {}",
            reservation_ids.len(),
            user_id,
            showtime_id
        );

        Ok(BookedSeats {
            reservation_ids,
            showtime,
        })
    }

    /// Отмена брони владельцем или администратором. Место возвращается
    /// в счётчик сеанса той же транзакцией.
    pub async fn cancel(
        &self,
        reservation_id: i64,
        actor: &AuthUser,
    ) -> Result<Reservation, ApiError> {
        let mut tx = self.db.pool.begin().await?;

        let reservation: Option<Reservation> =
            sqlx::query_as("SELECT * FROM reservations WHERE id = $1 FOR UPDATE")
                .bind(reservation_id)
                .fetch_optional(&mut *tx)
                .await?;
        let reservation =
            reservation.ok_or_else(|| ApiError::NotFound("Бронь не существует".to_string()))?;

        if reservation.user_id != actor.user_id && !actor.is_admin() {
            return Err(ApiError::Forbidden);
        }

        match reservation.status {
            ReservationStatus::Pending | ReservationStatus::Confirmed => {}
            _ => {
                return Err(ApiError::BadRequest(
                    "Эту бронь уже нельзя отменить".to_string(),
                ))
            }
        }

        sqlx::query(
            "UPDATE reservations SET status = 'cancelled', updated_at = NOW() WHERE id = $1",
        )
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE showtime
             SET available_seats = available_seats + 1, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(reservation.showtime_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "reservation {} cancelled, seat {} released",
            reservation_id,
            reservation.seat_number
        );

        Ok(reservation)
    }

    /// Административный перевод статуса по закрытой таблице переходов.
    pub async fn update_status(
        &self,
        reservation_id: i64,
        new_status: ReservationStatus,
    ) -> Result<Reservation, ApiError> {
        if !matches!(
            new_status,
            ReservationStatus::Confirmed | ReservationStatus::Completed
        ) {
            return Err(ApiError::BadRequest(
                "Вручную бронь можно перевести только в confirmed или completed".to_string(),
            ));
        }

        let mut tx = self.db.pool.begin().await?;

        let current: Option<ReservationStatus> =
            sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1 FOR UPDATE")
                .bind(reservation_id)
                .fetch_optional(&mut *tx)
                .await?;
        let current =
            current.ok_or_else(|| ApiError::NotFound("Бронь не существует".to_string()))?;

        if !admin_transition_allowed(current, new_status) {
            return Err(ApiError::BadRequest(format!(
                "Недопустимый переход статуса: {:?} -> {:?}",
                current, new_status
            )));
        }

        let updated: Reservation = sqlx::query_as(
            "UPDATE reservations SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(reservation_id)
        .bind(new_status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}

// Переходы вперёд по жизненному циклу; из терминальных состояний - никуда.
fn admin_transition_allowed(from: ReservationStatus, to: ReservationStatus) -> bool {
    matches!(
        (from, to),
        (ReservationStatus::Pending, ReservationStatus::Confirmed)
            | (ReservationStatus::Pending, ReservationStatus::Completed)
            | (ReservationStatus::Confirmed, ReservationStatus::Completed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use ReservationStatus::*;

        assert!(admin_transition_allowed(Pending, Confirmed));
        assert!(admin_transition_allowed(Pending, Completed));
        assert!(admin_transition_allowed(Confirmed, Completed));

        assert!(!admin_transition_allowed(Confirmed, Confirmed));
        assert!(!admin_transition_allowed(Completed, Confirmed));
        assert!(!admin_transition_allowed(Cancelled, Completed));
        assert!(!admin_transition_allowed(Expired, Confirmed));
    }
}
