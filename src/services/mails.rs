//! mails.rs
//!
//! HTML-шаблоны исходящих писем.

use chrono::{DateTime, Utc};

const STYLE: &str = r#"
    body { font-family: Arial, sans-serif; background-color: #f4f4f4; margin: 0; padding: 0; }
    .container { width: 100%; max-width: 600px; margin: 0 auto; background-color: #ffffff;
                 padding: 20px; border-radius: 8px; box-shadow: 0 0 10px rgba(0, 0, 0, 0.1); }
    .header { background-color: #333; color: #ffffff; padding: 10px 0; text-align: center; }
    .content { padding: 20px; }
    .content h2 { color: #333333; }
    .content p { color: #666666; }
    .button { display: inline-block; padding: 10px 20px; background-color: #333;
              color: #ffffff; text-decoration: none; border-radius: 4px; }
    .footer { text-align: center; padding: 10px 0; color: #999999; font-size: 12px; }
"#;

fn layout(title: &str, content: String) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="ru">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="container">
        <div class="header"><h1>Cinema Hub</h1></div>
        <div class="content">{content}</div>
        <div class="footer">&copy; Cinema Hub. Это автоматическое письмо, отвечать на него не нужно.</div>
    </div>
</body>
</html>"#
    )
}

pub fn welcome_mail(customer_name: &str) -> String {
    layout(
        "Добро пожаловать в Cinema Hub",
        format!(
            r#"<h2>Добро пожаловать, {customer_name}!</h2>
            <p>Ваш аккаунт создан. Выбирайте фильм, бронируйте места и приходите в кино.</p>"#
        ),
    )
}

pub struct ReservationMailParams<'a> {
    pub customer_name: &'a str,
    pub movie_title: &'a str,
    pub theatre: &'a str,
    pub start_time: DateTime<Utc>,
    pub seat_numbers: &'a str,
    pub payment_link: &'a str,
}

pub fn reservation_mail(params: &ReservationMailParams<'_>) -> String {
    layout(
        "Бронь создана",
        format!(
            r#"<h2>Здравствуйте, {}!</h2>
            <p>Ваша бронь создана:</p>
            <p><b>Фильм:</b> {}<br>
            <b>Зал:</b> {}<br>
            <b>Начало:</b> {}<br>
            <b>Места:</b> {}</p>
            <p>Бронь будет снята, если не оплатить её в течение 20 минут.</p>
            <p><a class="button" href="{}">Оплатить</a></p>"#,
            params.customer_name,
            params.movie_title,
            params.theatre,
            params.start_time.format("%d-%m-%Y %H:%M"),
            params.seat_numbers,
            params.payment_link,
        ),
    )
}

pub fn reservation_cancellation_mail(
    customer_name: &str,
    movie_title: &str,
    start_time: DateTime<Utc>,
) -> String {
    layout(
        "Бронь отменена",
        format!(
            r#"<h2>Здравствуйте, {}!</h2>
            <p>Ваша бронь на фильм <b>{}</b> ({} в {}) отменена.</p>
            <p>Если это были не вы, свяжитесь с поддержкой.</p>"#,
            customer_name,
            movie_title,
            start_time.format("%d-%m-%Y"),
            start_time.format("%H:%M"),
        ),
    )
}

pub fn reservation_reminder_mail(
    customer_name: &str,
    movie_title: &str,
    start_time: DateTime<Utc>,
    seat_number: &str,
) -> String {
    layout(
        "Сеанс скоро начнётся",
        format!(
            r#"<h2>Здравствуйте, {}!</h2>
            <p>Напоминаем: фильм <b>{}</b> начнётся {} .</p>
            <p>Ваше место: <b>{}</b>. Приятного просмотра!</p>"#,
            customer_name,
            movie_title,
            start_time.format("%d-%m-%Y в %H:%M"),
            seat_number,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reservation_mail_contains_details() {
        let start = Utc.with_ymd_and_hms(2026, 8, 10, 18, 30, 0).unwrap();
        let html = reservation_mail(&ReservationMailParams {
            customer_name: "Анна",
            movie_title: "Интерстеллар",
            theatre: "Зал 1",
            start_time: start,
            seat_numbers: "A001. A002",
            payment_link: "https://pay.example.com/abc",
        });

        assert!(html.contains("Анна"));
        assert!(html.contains("Интерстеллар"));
        assert!(html.contains("A001. A002"));
        assert!(html.contains("https://pay.example.com/abc"));
        assert!(html.contains("10-08-2026 18:30"));
    }
}
