use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub smtp: SmtpConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub reservations: ReservationsConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки JWT
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
}

// Настройки платёжного провайдера
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

// Настройки SMTP для исходящих писем
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

// Настройки Circuit Breaker для платёжного шлюза
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

// Настройки бронирования: окно оплаты и лимит на пользователя
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationsConfig {
    pub hold_minutes: i64,
    pub max_per_showtime: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_hub=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
                expires_in_hours: env::var("JWT_EXPIRES_IN_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .expect("JWT_EXPIRES_IN_HOURS must be a valid number"),
            },
            payment: PaymentConfig {
                secret_key: env::var("PAYMENT_SECRET_KEY").expect("PAYMENT_SECRET_KEY must be set"),
                base_url: env::var("PAYMENT_BASE_URL")
                    .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
                timeout_seconds: env::var("PAYMENT_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("PAYMENT_TIMEOUT_SECONDS must be a valid number"),
            },
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").expect("SMTP_HOST must be set"),
                port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .expect("SMTP_PORT must be a valid number"),
                username: env::var("SMTP_USER").expect("SMTP_USER must be set"),
                password: env::var("SMTP_PASS").expect("SMTP_PASS must be set"),
                from: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "Cinema Hub <admin@cinemahub.com>".to_string()),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be a valid number"),
                timeout_seconds: env::var("CIRCUIT_BREAKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_TIMEOUT_SECONDS must be a valid number"),
            },
            reservations: ReservationsConfig {
                hold_minutes: env::var("RESERVATION_HOLD_MINUTES")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("RESERVATION_HOLD_MINUTES must be a valid number"),
                max_per_showtime: env::var("RESERVATION_MAX_PER_SHOWTIME")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("RESERVATION_MAX_PER_SHOWTIME must be a valid number"),
            },
        }
    }
}
