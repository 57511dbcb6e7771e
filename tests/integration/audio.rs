//! Audio transcription forwarding tests

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use base64::Engine;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{upstream_mocks, TestHarness};

#[tokio::test]
async fn multipart_transcription_is_forwarded() {
    let harness = TestHarness::new().await;
    upstream_mocks::mock_transcription(&harness.upstream).await;

    let form = MultipartForm::new()
        .add_text("model", "whisper-1")
        .add_text("language", "en")
        .add_part(
            "file",
            Part::bytes(b"fake ogg bytes".to_vec())
                .file_name("clip.ogg")
                .mime_type("application/octet-stream"),
        );

    let response = harness
        .server
        .post("/v1/audio/transcriptions")
        .multipart(form)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["text"], "hello from the microphone");

    // The upstream received a multipart form
    let requests = harness.upstream.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let content_type = requests[0].headers.get("content-type").unwrap();
    assert!(content_type
        .to_str()
        .unwrap()
        .starts_with("multipart/form-data"));
}

#[tokio::test]
async fn missing_file_part_fails_without_upstream_call() {
    let harness = TestHarness::new().await;
    upstream_mocks::mock_transcription(&harness.upstream).await;

    let form = MultipartForm::new().add_text("model", "whisper-1");

    let response = harness
        .server
        .post("/v1/audio/transcriptions")
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert!(harness.upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn base64_transcription_is_decoded_and_forwarded() {
    let harness = TestHarness::new().await;
    upstream_mocks::mock_transcription(&harness.upstream).await;

    let audio_data = base64::engine::general_purpose::STANDARD.encode(b"fake ogg bytes");
    let response = harness
        .server
        .post("/v1/audio/transcriptions/base64")
        .json(&json!({
            "audio_data": audio_data,
            "filename": "voice-note.ogg",
            "language": "en"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["text"], "hello from the microphone");
    assert_eq!(harness.upstream.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_base64_fails_before_any_upstream_call() {
    let harness = TestHarness::new().await;
    upstream_mocks::mock_transcription(&harness.upstream).await;

    let response = harness
        .server
        .post("/v1/audio/transcriptions/base64")
        .json(&json!({
            "audio_data": "!!!definitely not base64!!!",
            "filename": "voice-note.ogg"
        }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    // The decode failure never reached the backend
    assert!(harness.upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upstream_transcription_failure_is_not_retried() {
    let harness = TestHarness::new().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unsupported format"))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"bytes".to_vec())
            .file_name("clip.ogg")
            .mime_type("application/octet-stream"),
    );

    let response = harness
        .server
        .post("/v1/audio/transcriptions")
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
}
