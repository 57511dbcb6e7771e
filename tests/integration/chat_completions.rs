//! Chat completions forwarding and retry tests
//!
//! Verifies verbatim passthrough of upstream bodies, default model
//! substitution, tool forwarding, and the 400-only retry policy.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{constants, test_data, upstream_mocks, TestHarness};

#[tokio::test]
async fn non_streaming_response_is_passed_through_verbatim() {
    let harness = TestHarness::new().await;
    upstream_mocks::mock_chat_completions(&harness.upstream).await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::valid_chat_request())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, upstream_mocks::chat_completion_body());
}

#[tokio::test]
async fn default_model_is_applied_when_request_omits_it() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": constants::TEST_CHAT_MODEL})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::valid_chat_request())
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn request_model_overrides_the_default() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "my-special-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let mut request = test_data::valid_chat_request();
    request["model"] = json!("my-special-model");

    harness
        .server
        .post("/v1/chat/completions")
        .json(&request)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn tools_are_forwarded_with_auto_tool_choice() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "tool_choice": "auto",
            "tools": [{"function": {"name": "get_weather"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::tool_chat_request())
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn retry_on_400_succeeds_on_third_attempt() {
    let harness = TestHarness::new().await;

    // First two attempts are rejected, the third succeeds.
    // Mocks match in mount order; the 400 stops matching after two hits.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("no tool support here"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&harness.upstream)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"attempt": 3})))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let started = Instant::now();
    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::tool_chat_request())
        .await;
    let elapsed = started.elapsed();

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, json!({"attempt": 3}));

    // Two backoff delays occurred: 0.5s then 1.0s
    assert!(
        elapsed >= Duration::from_millis(1400),
        "expected two backoff delays, elapsed {elapsed:?}"
    );
}

#[tokio::test]
async fn retries_exhausted_surface_as_bad_gateway() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("still broken"))
        .expect(3)
        .mount(&harness.upstream)
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::valid_chat_request())
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("still broken"));
}

#[tokio::test]
async fn non_400_errors_are_not_retried() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&test_data::valid_chat_request())
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn vision_completions_forward_multimodal_content() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "stream": false,
            "messages": [{
                "content": [
                    {"type": "text", "text": "Describe this image"},
                    {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"described": true})))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let response = harness
        .server
        .post("/v1/vision/completions")
        .json(&test_data::vision_request())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, json!({"described": true}));
}

#[tokio::test]
async fn vision_completions_do_not_retry_on_400() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("rejected"))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let response = harness
        .server
        .post("/v1/vision/completions")
        .json(&test_data::vision_request())
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
}
