//! availability.rs
//!
//! Раскладка занятости зала для сеанса: каталог мест теарта,
//! разделённый на занятые и свободные по активным броням.

use serde::Serialize;
use std::collections::HashSet;

use crate::{database::Database, error::ApiError, seats};

#[derive(Debug, Serialize)]
pub struct SeatMap {
    pub reserved: Vec<String>,
    pub available: Vec<String>,
}

/// Полная раскладка зала для сеанса: место занято, если его номер
/// числится в не-терминальной брони этого сеанса.
pub async fn seat_map(db: &Database, showtime_id: i64) -> Result<SeatMap, ApiError> {
    let layout: Option<(i32, i32)> = sqlx::query_as(
        "SELECT t.capacity, t.seats_per_row
         FROM showtime s
         JOIN theatres t ON t.id = s.theatre_id
         WHERE s.id = $1",
    )
    .bind(showtime_id)
    .fetch_optional(&db.pool)
    .await?;

    let (capacity, seats_per_row) =
        layout.ok_or_else(|| ApiError::NotFound("Сеанс не существует".to_string()))?;

    let taken = active_seat_numbers(db, showtime_id).await?;

    let mut reserved = Vec::new();
    let mut available = Vec::new();
    for label in seats::generate_seat_labels(capacity, seats_per_row) {
        if taken.contains(&label) {
            reserved.push(label);
        } else {
            available.push(label);
        }
    }

    Ok(SeatMap {
        reserved,
        available,
    })
}

/// Номера мест, занятых активными бронями сеанса (pending, confirmed,
/// completed - всё, кроме отменённых и истёкших).
pub async fn active_seat_numbers(
    db: &Database,
    showtime_id: i64,
) -> Result<HashSet<String>, ApiError> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT seat_number FROM reservations
         WHERE showtime_id = $1 AND status NOT IN ('cancelled', 'expired')",
    )
    .bind(showtime_id)
    .fetch_all(&db.pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Проверка пакета мест до обращения к хранилищу: размер, дубликаты,
/// принадлежность каталогу. Любое нарушение отклоняет весь пакет.
pub fn validate_batch(
    seat_numbers: &[String],
    catalog: &HashSet<String>,
) -> Result<(), ApiError> {
    if seat_numbers.is_empty() {
        return Err(ApiError::BadRequest(
            "Нужно указать хотя бы одно место".to_string(),
        ));
    }
    if seat_numbers.len() > seats::MAX_SEATS_PER_REQUEST {
        return Err(ApiError::BadRequest(format!(
            "За один запрос можно забронировать не более {} мест",
            seats::MAX_SEATS_PER_REQUEST
        )));
    }

    let mut seen = HashSet::new();
    for label in seat_numbers {
        if !seen.insert(label.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "Место \"{}\" указано в запросе дважды",
                label
            )));
        }
        if !catalog.contains(label) {
            return Err(ApiError::BadRequest(format!(
                "Место \"{}\" не существует в этом зале, выберите другое",
                label
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seats::generate_seat_labels;

    fn catalog_20x10() -> HashSet<String> {
        generate_seat_labels(20, 10).into_iter().collect()
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accepts_valid_batch() {
        assert!(validate_batch(&labels(&["A001", "A002", "B010"]), &catalog_20x10()).is_ok());
    }

    #[test]
    fn rejects_empty_batch() {
        assert!(validate_batch(&[], &catalog_20x10()).is_err());
    }

    #[test]
    fn rejects_oversized_batch() {
        let batch = labels(&["A001", "A002", "A003", "A004", "A005", "A006"]);
        let err = validate_batch(&batch, &catalog_20x10()).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rejects_duplicate_label() {
        let err = validate_batch(&labels(&["A001", "A001"]), &catalog_20x10()).unwrap_err();
        assert!(err.to_string().contains("A001"));
    }

    #[test]
    fn rejects_label_outside_catalog() {
        // ряд A заканчивается на A010 при 10 местах в ряду
        let err = validate_batch(&labels(&["A011"]), &catalog_20x10()).unwrap_err();
        assert!(err.to_string().contains("A011"));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
