//! seats.rs
//!
//! Каталог мест зала: детерминированная генерация полного набора
//! номеров мест из конфигурации театра (вместимость + мест в ряду).
//!
//! Формат номера: буква ряда (A..Z, AA..ZZ) + номер места в ряду,
//! дополненный нулями до трёх цифр, например `A001` или `AB015`.
//! Каталог - чистая функция своих аргументов: и валидация входящих
//! запросов, и расчёт доступности строятся поверх него.

use regex::Regex;
use std::sync::LazyLock;

/// Максимум рядов, представимых одной-двумя буквами (26 + 26*26).
pub const MAX_ROWS: i32 = 702;

/// Номер места в ряду дополняется до трёх цифр.
pub const MAX_SEATS_PER_ROW: i32 = 999;

/// Не больше пяти мест за один запрос бронирования.
pub const MAX_SEATS_PER_REQUEST: usize = 5;

static SEAT_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,2}\d{3}$").expect("valid seat label regex"));

/// Проверка соответствия номера места wire-формату `^[A-Z]{1,2}\d{3}$`.
pub fn is_valid_seat_label(label: &str) -> bool {
    SEAT_LABEL_RE.is_match(label)
}

// Буквенный индекс ряда: 0 -> A, 25 -> Z, 26 -> AA, 701 -> ZZ
fn row_letters(row: i32) -> String {
    debug_assert!((0..MAX_ROWS).contains(&row));
    if row < 26 {
        ((b'A' + row as u8) as char).to_string()
    } else {
        let rest = row - 26;
        let first = (b'A' + (rest / 26) as u8) as char;
        let second = (b'A' + (rest % 26) as u8) as char;
        format!("{}{}", first, second)
    }
}

/// Генерирует упорядоченный каталог номеров мест для зала.
///
/// Буква ряда - `index / seats_per_row`, номер места -
/// `index % seats_per_row + 1`. Результат отсортирован по ряду,
/// затем по номеру; ровно `capacity` уникальных значений.
pub fn generate_seat_labels(capacity: i32, seats_per_row: i32) -> Vec<String> {
    if capacity <= 0 || seats_per_row <= 0 {
        return Vec::new();
    }

    (0..capacity)
        .map(|i| {
            let row = row_letters(i / seats_per_row);
            let number = i % seats_per_row + 1;
            format!("{}{:03}", row, number)
        })
        .collect()
}

/// Проверяет, что конфигурация зала порождает корректный каталог:
/// положительные размеры, вместимость кратна длине ряда, ряды
/// умещаются в две буквы, номер места - в три цифры.
pub fn validate_layout(capacity: i32, seats_per_row: i32) -> Result<(), String> {
    if capacity <= 0 {
        return Err("Вместимость зала должна быть больше нуля".to_string());
    }
    if seats_per_row <= 0 {
        return Err("Количество мест в ряду должно быть больше нуля".to_string());
    }
    if seats_per_row > MAX_SEATS_PER_ROW {
        return Err(format!(
            "Количество мест в ряду не может превышать {}",
            MAX_SEATS_PER_ROW
        ));
    }
    if capacity % seats_per_row != 0 {
        return Err("Вместимость зала должна быть кратна количеству мест в ряду".to_string());
    }
    let rows = capacity / seats_per_row;
    if rows > MAX_ROWS {
        return Err(format!("Количество рядов не может превышать {}", MAX_ROWS));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn twenty_seats_two_rows() {
        let labels = generate_seat_labels(20, 10);
        let expected: Vec<String> = (1..=10)
            .map(|n| format!("A{:03}", n))
            .chain((1..=10).map(|n| format!("B{:03}", n)))
            .collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn double_letter_rows_after_z() {
        // 27 рядов по одному месту: последний ряд - AA
        let labels = generate_seat_labels(27, 1);
        assert_eq!(labels.first().unwrap(), "A001");
        assert_eq!(labels.last().unwrap(), "AA001");
        assert!(labels.iter().all(|l| is_valid_seat_label(l)));
    }

    #[test]
    fn empty_catalog_for_bad_inputs() {
        assert!(generate_seat_labels(0, 10).is_empty());
        assert!(generate_seat_labels(-5, 10).is_empty());
        assert!(generate_seat_labels(10, 0).is_empty());
    }

    #[test]
    fn label_format_checks() {
        assert!(is_valid_seat_label("A001"));
        assert!(is_valid_seat_label("AB015"));
        assert!(is_valid_seat_label("ZZ999"));
        assert!(!is_valid_seat_label("a001"));
        assert!(!is_valid_seat_label("A1"));
        assert!(!is_valid_seat_label("A0001"));
        assert!(!is_valid_seat_label("ABC001"));
        assert!(!is_valid_seat_label(""));
    }

    #[test]
    fn layout_validation() {
        assert!(validate_layout(20, 10).is_ok());
        assert!(validate_layout(0, 10).is_err());
        assert!(validate_layout(20, 0).is_err());
        assert!(validate_layout(21, 10).is_err());
        assert!(validate_layout(20, 1000).is_err());
        // 703 ряда по одному месту не умещаются в две буквы
        assert!(validate_layout(703, 1).is_err());
        assert!(validate_layout(702, 1).is_ok());
    }

    proptest! {
        // Ровно capacity уникальных номеров, каждый в wire-формате,
        // порядок - ряд, затем номер места.
        #[test]
        fn catalog_properties(capacity in 1i32..=2000, seats_per_row in 1i32..=50) {
            prop_assume!(capacity / seats_per_row < MAX_ROWS);

            let labels = generate_seat_labels(capacity, seats_per_row);
            prop_assert_eq!(labels.len(), capacity as usize);

            let unique: HashSet<&String> = labels.iter().collect();
            prop_assert_eq!(unique.len(), labels.len());

            for label in &labels {
                prop_assert!(is_valid_seat_label(label), "bad label {}", label);
            }

            // сортировка по (длина буквы ряда, буква ряда, номер) = порядок генерации
            let mut keyed: Vec<(usize, &str, &str)> = labels
                .iter()
                .map(|l| {
                    let split = l.len() - 3;
                    (split, &l[..split], &l[split..])
                })
                .collect();
            let original = keyed.clone();
            keyed.sort();
            prop_assert_eq!(keyed, original);
        }
    }
}
