use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{services::payment, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/payments/webhook", post(payment_webhook))
}

// POST /api/v1/payments/webhook
//
// Подпись считается по сырому телу запроса, поэтому тело принимается
// как Bytes и парсится только после сверки. Несовпадение подписи не
// раскрывается отправителю: в ответ уходит обычный 200.
async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(payment::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let Some(signature) = signature else {
        warn!("webhook without {} header, ignoring", payment::SIGNATURE_HEADER);
        return (StatusCode::OK, Json(json!({ "received": true })));
    };

    if !payment::verify_signature(&state.config.payment.secret_key, &body, signature) {
        warn!("webhook signature mismatch, ignoring");
        return (StatusCode::OK, Json(json!({ "received": true })));
    }

    let event: payment::WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("failed to parse webhook payload: {:?}", e);
            return (StatusCode::OK, Json(json!({ "received": true })));
        }
    };

    if !event.is_successful_charge() {
        debug!(
            "ignoring webhook event {} with status {}",
            event.event, event.data.status
        );
        return (StatusCode::OK, Json(json!({ "received": true })));
    }

    // при ошибке БД отвечаем 500: повтор от провайдера безопасен,
    // применение идемпотентно
    if let Err(e) = payment::apply_successful_charge(&state.db, &event).await {
        error!("failed to apply charge {}: {:?}", event.data.reference, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "received": false })),
        );
    }

    (StatusCode::OK, Json(json!({ "received": true })))
}
