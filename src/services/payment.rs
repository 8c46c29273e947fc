//! payment.rs
//!
//! Сервисный слой для работы с платёжным провайдером.
//!
//! Ключевые компоненты:
//! 1.  **CircuitBreaker**: защита от постоянных запросов к лежащему
//!     провайдеру (Closed -> Open -> HalfOpen).
//! 2.  **PaymentLinkClient**: клиент, который выпускает платёжную
//!     ссылку для пакета броней. Контракт корреляции: id броней и
//!     ссылка на сеанс кладутся в metadata запроса, чтобы вебхук
//!     однозначно нашёл нужные строки.
//! 3.  **Вебхук**: проверка HMAC-SHA512 подписи сырого тела запроса и
//!     идемпотентный перевод броней в completed.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::{
    config::{CircuitBreakerConfig, PaymentConfig},
    database::Database,
    error::ApiError,
};

type HmacSha512 = Hmac<Sha512>;

/// Заголовок с hex-подписью HMAC-SHA512 сырого тела вебхука.
pub const SIGNATURE_HEADER: &str = "x-provider-signature";

/// Состояния "Автоматического выключателя".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Нормальный режим, запросы разрешены.
    Closed,
    /// Провайдер признан лежащим, запросы блокируются до таймаута.
    Open,
    /// Пробный режим после таймаута: пропускается один запрос.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
}

/// Автоматический выключатель для внешнего платёжного API.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
            }),
            failure_threshold,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    /// Разрешён ли следующий запрос к провайдеру.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.timeout)
                    .unwrap_or(true);
                if expired {
                    inner.state = CircuitState::HalfOpen;
                    info!("circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::HalfOpen {
            info!("circuit breaker recovered - transitioning to Closed state");
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures += 1;
        match inner.state {
            CircuitState::Closed if inner.failures >= self.failure_threshold => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                error!(
                    "circuit breaker OPENED - {} failures reached threshold {}",
                    inner.failures, self.failure_threshold
                );
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                warn!("circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }
}

// --- Модели данных API провайдера ---

/// Данные для выпуска платёжной ссылки на пакет броней.
#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub email: String,
    pub customer_name: String,
    /// минорные единицы валюты
    pub amount: i64,
    pub showtime_ref: String,
    pub seat_numbers: Vec<String>,
    pub reservation_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    // провайдер принимает сумму в минорных единицах строкой
    amount: String,
    metadata: InitializeMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct InitializeMetadata<'a> {
    reservation_ids: &'a [i64],
    showtime_ref: &'a str,
    seat_numbers: String,
    customer_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    message: Option<String>,
    data: Option<PaymentLink>,
}

/// Выпущенная провайдером ссылка на оплату.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Клиент платёжного провайдера.
#[derive(Clone)]
pub struct PaymentLinkClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    breaker: Arc<CircuitBreaker>,
}

impl PaymentLinkClient {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(payment.timeout_seconds))
                .build()
                .expect("failed to create HTTP client"),
            base_url: payment.base_url.clone(),
            secret_key: payment.secret_key.clone(),
            breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                breaker.timeout_seconds,
            )),
        }
    }

    /// Выпускает платёжную ссылку. Вызов ограничен таймаутом и идёт
    /// через выключатель; уже закоммиченные брони при ошибке остаются
    /// pending и ссылку можно перевыпустить повторным запросом.
    pub async fn create_payment_link(
        &self,
        req: &PaymentLinkRequest,
    ) -> Result<PaymentLink, ApiError> {
        if !self.breaker.can_execute() {
            warn!("circuit breaker is OPEN - blocking payment link request");
            return Err(ApiError::PaymentGateway(
                "платёжный шлюз временно недоступен, повторите позже".to_string(),
            ));
        }

        let body = InitializeRequest {
            email: &req.email,
            amount: req.amount.to_string(),
            metadata: InitializeMetadata {
                reservation_ids: &req.reservation_ids,
                showtime_ref: &req.showtime_ref,
                seat_numbers: req.seat_numbers.join(". "),
                customer_name: &req.customer_name,
            },
        };

        let result = async {
            self.http
                .post(format!("{}/transaction/initialize", self.base_url))
                .bearer_auth(&self.secret_key)
                .json(&body)
                .send()
                .await?
                .json::<InitializeResponse>()
                .await
        }
        .await;

        let resp = match result {
            Ok(resp) => {
                self.breaker.record_success();
                resp
            }
            Err(e) => {
                error!("payment link request failed: {:?}", e);
                self.breaker.record_failure();
                return Err(ApiError::PaymentGateway(
                    "не удалось связаться с платёжным шлюзом".to_string(),
                ));
            }
        };

        if !resp.status {
            let message = resp
                .message
                .unwrap_or_else(|| "провайдер отклонил запрос".to_string());
            error!("payment provider rejected request: {}", message);
            return Err(ApiError::PaymentGateway(message));
        }

        resp.data.ok_or_else(|| {
            ApiError::PaymentGateway("ответ провайдера без ссылки на оплату".to_string())
        })
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }
}

// --- Вебхук ---

/// Сверяет hex-подпись HMAC-SHA512 с сырым телом запроса.
/// Сравнение выполняется за константное время.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("hmac accepts keys of any size");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub status: String,
    pub reference: String,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub reservation_ids: Vec<i64>,
}

impl WebhookEvent {
    pub fn is_successful_charge(&self) -> bool {
        self.event == "charge.success" && self.data.status == "success"
    }

    pub fn reservation_ids(&self) -> &[i64] {
        self.data
            .metadata
            .as_ref()
            .map(|m| m.reservation_ids.as_slice())
            .unwrap_or(&[])
    }
}

/// Итог применения успешного платежа.
#[derive(Debug)]
pub struct AppliedCharge {
    pub completed: Vec<i64>,
    pub skipped: Vec<i64>,
}

/// Переводит брони из события в completed одной транзакцией.
///
/// Идемпотентно: уже завершённые и терминальные строки пропускаются,
/// поэтому повтор того же события ничего не меняет. Отсутствующие id
/// логируются и не валят обработку остальных.
pub async fn apply_successful_charge(
    db: &Database,
    event: &WebhookEvent,
) -> Result<AppliedCharge, ApiError> {
    let ids = event.reservation_ids();
    if ids.is_empty() {
        warn!(
            "charge {} carries no reservation ids in metadata",
            event.data.reference
        );
        return Ok(AppliedCharge {
            completed: Vec::new(),
            skipped: Vec::new(),
        });
    }

    let paid_at = event.data.paid_at.unwrap_or_else(Utc::now);

    let mut tx = db.pool.begin().await?;
    let completed: Vec<i64> = sqlx::query_scalar(
        "UPDATE reservations
         SET status = 'completed', payment_ref = $2, paid_at = $3, updated_at = NOW()
         WHERE id = ANY($1) AND status NOT IN ('cancelled', 'expired', 'completed')
         RETURNING id",
    )
    .bind(ids)
    .bind(&event.data.reference)
    .bind(paid_at)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    let skipped: Vec<i64> = ids
        .iter()
        .copied()
        .filter(|id| !completed.contains(id))
        .collect();
    for id in &skipped {
        warn!(
            "reservation {} from charge {} missing or already terminal, skipped",
            id, event.data.reference
        );
    }

    info!(
        "charge {} applied: {} completed, {} skipped",
        event.data.reference,
        completed.len(),
        skipped.len()
    );

    Ok(AppliedCharge { completed, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_accepted() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign("top-secret", body);
        assert!(verify_signature("top-secret", body, &signature));
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign("another-secret", body);
        assert!(!verify_signature("top-secret", body, &signature));
    }

    #[test]
    fn tampered_body_rejected() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign("top-secret", body);
        let tampered = br#"{"event":"charge.success","hacked":true}"#;
        assert!(!verify_signature("top-secret", tampered, &signature));
    }

    #[test]
    fn garbage_signature_rejected() {
        assert!(!verify_signature("top-secret", b"{}", "not-hex-at-all"));
        assert!(!verify_signature("top-secret", b"{}", ""));
    }

    #[test]
    fn webhook_payload_parses() {
        let raw = r#"{
            "event": "charge.success",
            "data": {
                "status": "success",
                "reference": "ref-123",
                "paid_at": "2026-08-06T12:00:00Z",
                "metadata": { "reservation_ids": [10, 11] }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert!(event.is_successful_charge());
        assert_eq!(event.reservation_ids(), &[10, 11]);
        assert_eq!(event.data.reference, "ref-123");
    }

    #[test]
    fn non_success_event_is_ignored() {
        let raw = r#"{
            "event": "charge.failed",
            "data": { "status": "failed", "reference": "ref-9" }
        }"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert!(!event.is_successful_charge());
        assert!(event.reservation_ids().is_empty());
    }

    #[test]
    fn breaker_opens_after_threshold_and_half_opens() {
        let breaker = CircuitBreaker::new(2, 0);
        assert!(breaker.can_execute());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // таймаут нулевой, следующий запрос - пробный
        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
