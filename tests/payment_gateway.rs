//! Интеграционные тесты клиента платёжного провайдера на wiremock:
//! контракт корреляции (metadata) и поведение при сбоях.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cinema_hub::config::{CircuitBreakerConfig, PaymentConfig};
use cinema_hub::services::payment::{CircuitState, PaymentLinkClient, PaymentLinkRequest};

fn client_for(server_uri: &str, failure_threshold: u32) -> PaymentLinkClient {
    PaymentLinkClient::from_config(
        &PaymentConfig {
            secret_key: "sk_test_secret".to_string(),
            base_url: server_uri.to_string(),
            timeout_seconds: 5,
        },
        &CircuitBreakerConfig {
            failure_threshold,
            timeout_seconds: 60,
        },
    )
}

fn link_request() -> PaymentLinkRequest {
    PaymentLinkRequest {
        email: "anna@example.com".to_string(),
        customer_name: "Анна".to_string(),
        amount: 5000,
        showtime_ref: "st-ref-42".to_string(),
        seat_numbers: vec!["A001".to_string(), "A002".to_string()],
        reservation_ids: vec![10, 11],
    }
}

#[tokio::test]
async fn mints_link_with_correlation_metadata() {
    let server = MockServer::start().await;

    // id броней и ссылка на сеанс обязаны попасть в metadata запроса
    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .and(header("authorization", "Bearer sk_test_secret"))
        .and(body_partial_json(json!({
            "amount": "10000",
            "email": "anna@example.com",
            "metadata": {
                "reservation_ids": [10, 11],
                "showtime_ref": "st-ref-42",
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.example.com/abc123",
                "access_code": "abc123",
                "reference": "trx-777"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 3);
    let mut request = link_request();
    request.amount = 10000;

    let link = client.create_payment_link(&request).await.unwrap();
    assert_eq!(link.authorization_url, "https://checkout.example.com/abc123");
    assert_eq!(link.reference, "trx-777");
}

#[tokio::test]
async fn provider_rejection_surfaces_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": false,
            "message": "Invalid amount"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 3);
    let err = client.create_payment_link(&link_request()).await.unwrap_err();
    assert!(err.to_string().contains("Invalid amount"));
    // отказ провайдера - не транспортный сбой, выключатель не открывается
    assert_eq!(client.breaker_state(), CircuitState::Closed);
}

#[tokio::test]
async fn transport_failures_open_the_breaker() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 2);

    assert!(client.create_payment_link(&link_request()).await.is_err());
    assert_eq!(client.breaker_state(), CircuitState::Closed);

    assert!(client.create_payment_link(&link_request()).await.is_err());
    assert_eq!(client.breaker_state(), CircuitState::Open);

    // при открытом выключателе запрос блокируется без похода в сеть
    let received_before = server.received_requests().await.unwrap().len();
    assert!(client.create_payment_link(&link_request()).await.is_err());
    let received_after = server.received_requests().await.unwrap().len();
    assert_eq!(received_before, received_after);
}
