//! Integration tests for the HTTP backend adapters against mock servers

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pulse::config::{BackendsConfig, GatewayConfig, GeminiConfig, OllamaConfig, OpenAiConfig};
use pulse::gateway::{
    Backend, BackendError, GeminiBackend, Gateway, GenerationContext, OllamaBackend,
    OpenAiBackend, TokenEvent,
};

const TEST_KEY: &str = "test-key-0123456789abcdefghij";

fn context() -> GenerationContext {
    GenerationContext::new("You are Maya.", "How are you?")
}

fn gemini_config(api_url: String) -> GeminiConfig {
    GeminiConfig {
        api_url,
        api_key: Some(TEST_KEY.to_string()),
        ..GeminiConfig::default()
    }
}

fn openai_config(api_url: String) -> OpenAiConfig {
    OpenAiConfig {
        api_url,
        api_key: Some(TEST_KEY.to_string()),
        ..OpenAiConfig::default()
    }
}

fn ollama_config(url: String) -> OllamaConfig {
    OllamaConfig {
        url,
        ..OllamaConfig::default()
    }
}

fn sse_body(frames: &[&str]) -> String {
    frames.iter().map(|f| format!("data: {f}\n\n")).collect()
}

async fn collect(backend: &dyn Backend) -> Vec<Result<TokenEvent, String>> {
    backend
        .generate_stream(&context())
        .await
        .expect("stream should open")
        .map(|r| r.map_err(|e| e.to_string()))
        .collect()
        .await
}

// =============================================================================
// Gemini
// =============================================================================

#[tokio::test]
async fn test_gemini_generate() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", TEST_KEY))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "You are Maya."}]},
            "contents": [{"role": "user", "parts": [{"text": "How are you?"}]}],
            "generationConfig": {"maxOutputTokens": 150}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Busy, but good."}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&gemini_config(server.uri())).unwrap();
    assert!(backend.is_configured());
    assert_eq!(backend.generate(&context()).await.unwrap(), "Busy, but good.");
}

#[tokio::test]
async fn test_gemini_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&gemini_config(server.uri())).unwrap();
    match backend.generate(&context()).await {
        Err(BackendError::Http { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_gemini_stream() {
    let server = MockServer::start().await;

    let body = sse_body(&[
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Busy"}]}}]}"#,
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":", but good."}]}}]}"#,
    ]);

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(body_partial_json(json!({"generationConfig": {"maxOutputTokens": 256}})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&gemini_config(server.uri())).unwrap();
    assert_eq!(
        collect(&backend).await,
        vec![
            Ok(TokenEvent::token("Busy")),
            Ok(TokenEvent::token(", but good.")),
            Ok(TokenEvent::done("Busy, but good.")),
        ]
    );
}

// =============================================================================
// OpenAI
// =============================================================================

#[tokio::test]
async fn test_openai_generate() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", format!("Bearer {TEST_KEY}").as_str()))
        .and(body_partial_json(json!({"model": "gpt-3.5-turbo", "max_tokens": 256})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "\"Doing well.\""}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(&openai_config(server.uri())).unwrap();
    // Adapters return raw text; sanitizing is the gateway's job.
    assert_eq!(backend.generate(&context()).await.unwrap(), "\"Doing well.\"");
}

#[tokio::test]
async fn test_openai_stream() {
    let server = MockServer::start().await;

    let body = sse_body(&[
        r#"{"object":"chat.completion.chunk","choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
        r#"{"object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Doing"}}]}"#,
        r#"{"object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":" well."}}]}"#,
        "[DONE]",
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(&openai_config(server.uri())).unwrap();
    assert_eq!(
        collect(&backend).await,
        vec![
            Ok(TokenEvent::token("Doing")),
            Ok(TokenEvent::token(" well.")),
            Ok(TokenEvent::done("Doing well.")),
        ]
    );
}

#[tokio::test]
async fn test_openai_stream_without_done_marker_is_interrupted() {
    let server = MockServer::start().await;

    let body = sse_body(&[
        r#"{"choices":[{"index":0,"delta":{"content":"Doing"}}]}"#,
    ]);

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(&openai_config(server.uri())).unwrap();
    let events = collect(&backend).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], Ok(TokenEvent::token("Doing")));
    assert!(events[1].is_err());
}

#[tokio::test]
async fn test_openai_without_key_is_not_configured() {
    let config = OpenAiConfig {
        api_key: None,
        api_key_env: "PULSE_TEST_NO_SUCH_OPENAI_KEY".to_string(),
        ..OpenAiConfig::default()
    };
    let backend = OpenAiBackend::new(&config).unwrap();
    assert!(!backend.is_configured());
}

// =============================================================================
// Ollama
// =============================================================================

#[tokio::test]
async fn test_ollama_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(&ollama_config(server.uri())).unwrap();
    assert!(backend.requires_probe());
    assert!(backend.probe().await.is_ok());
}

#[tokio::test]
async fn test_ollama_probe_fails_on_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(&ollama_config(server.uri())).unwrap();
    assert!(backend.probe().await.is_err());
}

#[tokio::test]
async fn test_ollama_generate_uses_flattened_prompt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "phi3:mini",
            "prompt": "You are Maya.\n\nUser: How are you?\n\nAssistant:",
            "stream": false,
            "options": {"num_predict": 256, "num_ctx": 4096}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "phi3:mini",
            "response": "Pretty good.",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(&ollama_config(server.uri())).unwrap();
    assert_eq!(backend.generate(&context()).await.unwrap(), "Pretty good.");
}

#[tokio::test]
async fn test_ollama_stream_skips_malformed_lines() {
    let server = MockServer::start().await;

    let body = [
        r#"{"model":"phi3:mini","response":"Pretty","done":false}"#,
        "{not json",
        r#"{"model":"phi3:mini","response":" good.","done":false}"#,
        r#"{"model":"phi3:mini","response":"","done":true}"#,
    ]
    .join("\n");

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-ndjson")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(&ollama_config(server.uri())).unwrap();
    assert_eq!(
        collect(&backend).await,
        vec![
            Ok(TokenEvent::token("Pretty")),
            Ok(TokenEvent::token(" good.")),
            Ok(TokenEvent::done("Pretty good.")),
        ]
    );
}

// =============================================================================
// Gateway over real adapters
// =============================================================================

#[tokio::test]
async fn test_gateway_falls_back_from_gemini_to_ollama() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "  'Hanging in there.' ",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut backends = BackendsConfig {
        gemini: gemini_config(server.uri()),
        ollama: ollama_config(server.uri()),
        ..BackendsConfig::default()
    };
    backends.openai.enabled = false;

    let gateway = Gateway::from_config(&backends, &GatewayConfig::default()).unwrap();
    let result = gateway.complete(&context()).await;

    assert_eq!(result.backend_name, "ollama");
    assert_eq!(result.text, "Hanging in there.");
}

#[tokio::test]
async fn test_gateway_skips_unreachable_ollama() {
    let mut backends = BackendsConfig::default();
    backends.gemini.enabled = false;
    backends.openai.enabled = false;
    // Nothing listens on the discard port.
    backends.ollama.url = "http://127.0.0.1:9".to_string();

    let gateway = Gateway::from_config(
        &backends,
        &GatewayConfig {
            probe_timeout_ms: 500,
        },
    )
    .unwrap();

    let start = std::time::Instant::now();
    let result = gateway.complete(&context()).await;

    assert_eq!(result.backend_name, "offline");
    assert!(start.elapsed() < Duration::from_secs(5));
}
