use assert_json_diff::assert_json_eq;
use backstop::{
    ApiClient, ApiError, CircuitBreaker, CircuitBreakerConfig, CircuitState, ClientConfig,
    FormData, Payload, RequestOptions,
};
use bytes::Bytes;
use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, breaker_config: CircuitBreakerConfig) -> ApiClient {
    let config = ClientConfig {
        base_url: server.uri(),
        ..Default::default()
    };
    ApiClient::new(config, Arc::new(CircuitBreaker::new(breaker_config)))
}

#[tokio::test]
async fn test_request_body_snake_cased_response_camel_cased() {
    let server = MockServer::start().await;

    // the wire sees snake_case in both directions
    Mock::given(method("POST"))
        .and(path("/promotions/"))
        .and(body_json(json!({"target_customers": "18-35"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "target_customers": "18-35",
            "created_at": "2025-03-01T09:00:00Z",
            "suggested_discounts": [{"item_name": "espresso", "discount_rate": 0.2}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, CircuitBreakerConfig::default());
    let result: Value = client
        .post(
            "/promotions/",
            &json!({"targetCustomers": "18-35"}),
            RequestOptions::new(),
        )
        .await
        .unwrap();

    assert_json_eq!(
        result,
        json!({
            "targetCustomers": "18-35",
            "createdAt": "2025-03-01T09:00:00Z",
            "suggestedDiscounts": [{"itemName": "espresso", "discountRate": 0.2}]
        })
    );
}

#[tokio::test]
async fn test_http_error_preserves_server_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/posts/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "caption": ["This field may not be blank."]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, CircuitBreakerConfig::default());
    let err = client
        .post::<Value, _>("/posts/", &json!({"caption": ""}), RequestOptions::new())
        .await
        .unwrap_err();

    match &err {
        ApiError::Http {
            status,
            status_text,
            body,
        } => {
            assert_eq!(*status, 400);
            assert_eq!(status_text, "Bad Request");
            // error bodies stay verbatim so validation errors are inspectable
            assert_json_eq!(
                body.clone().unwrap(),
                json!({"caption": ["This field may not be blank."]})
            );
        }
        other => panic!("expected Http error, got {:?}", other),
    }
    assert_eq!(err.user_message(), "caption: This field may not be blank.");
}

#[tokio::test]
async fn test_text_response_passes_through_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/export/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"id,caption\n1,espresso\n".to_vec(), "text/csv"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, CircuitBreakerConfig::default());
    let payload = client
        .request(Method::GET, "/export/", None, RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(payload.into_text().unwrap(), "id,caption\n1,espresso\n");
}

#[tokio::test]
async fn test_binary_response_returned_as_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/media/logo/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"\x89PNG\r\n".to_vec(), "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, CircuitBreakerConfig::default());
    let payload = client
        .request(Method::GET, "/media/logo/", None, RequestOptions::new())
        .await
        .unwrap();

    match payload {
        Payload::Bytes(bytes) => assert_eq!(&bytes[..], b"\x89PNG\r\n"),
        other => panic!("expected bytes, got {:?}", other),
    }
}

#[tokio::test]
async fn test_circuit_opens_and_stops_touching_the_network() {
    let server = MockServer::start().await;

    // exactly three requests reach the backend; the fourth fails fast
    Mock::given(method("GET"))
        .and(path("/dashboard/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
            ..Default::default()
        },
    );

    for _ in 0..3 {
        let err = client
            .get::<Value>("/dashboard/", RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }
    assert_eq!(client.breaker().state().await, CircuitState::Open);

    let err = client
        .get::<Value>("/dashboard/", RequestOptions::new())
        .await
        .unwrap_err();
    match err {
        ApiError::CircuitOpen { retry_after } => {
            assert!(retry_after > Duration::from_secs(29));
        }
        other => panic!("expected CircuitOpen, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fallback_served_while_open() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let fallback = json!({"posts": [], "offline": true});
    let client = client_for(
        &server,
        CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout_ms: 30_000,
            fallback: Some(fallback.clone()),
            ..Default::default()
        },
    );

    client
        .get::<Value>("/posts/", RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(client.breaker().state().await, CircuitState::Open);

    // while open the configured fallback replaces the error
    let result: Value = client.get("/posts/", RequestOptions::new()).await.unwrap();
    assert_json_eq!(result, fallback);
}

#[tokio::test]
async fn test_slow_response_times_out_and_counts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sales/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout_ms: 30_000,
            ..Default::default()
        },
    );

    let err = client
        .get::<Value>(
            "/sales/",
            RequestOptions::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Timeout { .. }));
    assert_eq!(client.breaker().state().await, CircuitState::Open);
}

#[tokio::test]
async fn test_health_check_ok() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let client = client_for(&server, CircuitBreakerConfig::default());
    assert!(client.check_health().await);
}

#[tokio::test]
async fn test_health_check_failure_does_not_feed_the_breaker() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        },
    );

    // repeated failing health checks never trip the circuit
    for _ in 0..5 {
        assert!(!client.check_health().await);
    }
    assert_eq!(client.breaker().state().await, CircuitState::Closed);
}

#[tokio::test]
async fn test_health_check_unreachable_host_resolves_false() {
    // nothing listens on port 1
    let config = ClientConfig {
        base_url: "http://127.0.0.1:1/api".to_string(),
        ..Default::default()
    };
    let client = ApiClient::new(
        config,
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
    );

    let started = std::time::Instant::now();
    assert!(!client.check_health().await);
    // bounded by the fixed health budget, with headroom for slow CI
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cookies_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/login/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc123; Path=/")
                .set_body_json(json!({"ok": true})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/me/"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "owner@cafe.test"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, CircuitBreakerConfig::default());
    let _: Value = client
        .post("/users/login/", &json!({"email": "owner@cafe.test"}), RequestOptions::new())
        .await
        .unwrap();

    let me: Value = client.get("/users/me/", RequestOptions::new()).await.unwrap();
    assert_eq!(me["email"], "owner@cafe.test");
}

#[tokio::test]
async fn test_multipart_form_dispatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/posts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, CircuitBreakerConfig::default());
    let form = FormData::new()
        .text("caption", "new seasonal drink")
        .file(
            "imageFile",
            Bytes::from_static(b"\xff\xd8\xff"),
            "drink.jpg",
            "image/jpeg",
        );

    let result: Value = client
        .post_form("/posts/", form, RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(result["id"], 1);
}

#[tokio::test]
async fn test_caller_headers_are_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts/"))
        .and(header("x-request-source", "dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, CircuitBreakerConfig::default());
    let options = RequestOptions::new().header(
        http::HeaderName::from_static("x-request-source"),
        http::HeaderValue::from_static("dashboard"),
    );

    let result: Value = client.get("/posts/", options).await.unwrap();
    assert_json_eq!(result, json!([]));
}
