use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pencil_ai::gateway::anthropic::AnthropicProvider;
use pencil_ai::gateway::local::LocalProvider;
use pencil_ai::gateway::openai::OpenAIProvider;
use pencil_ai::gateway::{
    ImageFallbackChain, InferenceRequest, LLMProvider, ModelGateway, OpenAIImageProvider,
    PollinationsProvider, ProviderGateway,
};
use pencil_ai::{ChatMessage, GatewayError, ModelId};

fn request(model: &str) -> InferenceRequest {
    InferenceRequest {
        model: ModelId::new(model),
        messages: vec![ChatMessage::user("hi")],
        max_tokens: 256,
        temperature: Some(0.3),
        system: "be brief".to_string(),
    }
}

#[tokio::test]
async fn anthropic_parses_text_blocks_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(body_partial_json(json!({ "system": "be brief", "temperature": 0.3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "hello " },
                { "type": "text", "text": "there" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 11, "output_tokens": 4 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new_with_model("sk-test".to_string(), None)
        .unwrap()
        .with_base_url(server.uri());

    let resp = provider.infer(&request("claude-3-5-sonnet-latest")).await.unwrap();
    assert_eq!(resp.content, "hello there");
    assert_eq!(resp.stop_reason, "end_turn");
    assert_eq!(resp.usage.total(), 15);
}

#[tokio::test]
async fn openai_sends_system_first_and_drops_temperature_for_gpt5() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "max_completion_tokens": 256,
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "hi" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "hello" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 9, "completion_tokens": 2 }
        })))
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new_with_model("sk-test".to_string(), None)
        .unwrap()
        .with_base_url(server.uri());

    let resp = provider.infer(&request("gpt-5-mini")).await.unwrap();
    assert_eq!(resp.content, "hello");
    assert_eq!(resp.usage.total(), 11);

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("temperature").is_none());
}

#[tokio::test]
async fn openai_rate_limit_maps_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new_with_model("sk-test".to_string(), None)
        .unwrap()
        .with_base_url(server.uri());

    let err = provider.infer(&request("gpt-4o-mini")).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::RateLimited { provider: "openai", retry_after: Some(d) } if d == Duration::from_secs(7)
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn api_error_keeps_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new_with_model("sk-bad".to_string(), None)
        .unwrap()
        .with_base_url(server.uri());

    match provider.infer(&request("claude-3-5-sonnet-latest")).await {
        Err(GatewayError::Api { provider, status, message }) => {
            assert_eq!(provider, "anthropic");
            assert_eq!(status, 401);
            assert_eq!(message, "invalid x-api-key");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn ollama_chat_is_non_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "llama3.2", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "  local reply \n" },
            "done_reason": "stop",
            "prompt_eval_count": 5,
            "eval_count": 3
        })))
        .mount(&server)
        .await;

    let provider = LocalProvider::new_with_model(Some(ModelId::new("llama3.2")))
        .unwrap()
        .with_host(server.uri());

    let resp = provider.infer(&request("llama3.2")).await.unwrap();
    assert_eq!(resp.content, "local reply");
    assert_eq!(resp.usage.total(), 8);
}

#[tokio::test]
async fn ollama_availability_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    assert!(LocalProvider::is_available(&server.uri()).await);
    assert!(!LocalProvider::is_available("http://127.0.0.1:9").await);
}

#[tokio::test]
async fn openai_images_returns_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(body_partial_json(json!({ "size": "1024x1024", "n": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "url": "https://images.test/a.png" }]
        })))
        .mount(&server)
        .await;

    let provider = OpenAIImageProvider::new("sk-test".to_string())
        .unwrap()
        .with_base_url(server.uri());
    let chain = ImageFallbackChain::new(vec![Box::new(provider)]);

    let image = chain.generate("a cat", 1024, 1024).await.unwrap();
    assert_eq!(image.url, "https://images.test/a.png");
    assert_eq!(image.provider, "openai-images");
}

#[tokio::test]
async fn image_chain_falls_back_to_pollinations() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let openai = OpenAIImageProvider::new("sk-test".to_string())
        .unwrap()
        .with_base_url(server.uri());
    let chain = ImageFallbackChain::new(vec![
        Box::new(openai),
        Box::new(PollinationsProvider::new()),
    ]);

    let image = chain.generate("a red fox", 512, 512).await.unwrap();
    assert_eq!(image.provider, "pollinations");
    assert!(image.url.starts_with("https://image.pollinations.ai/prompt/a%20red%20fox"));
}

#[tokio::test]
async fn gateway_chat_round_trip_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({ "system": "sys", "max_tokens": 4096 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "ok" }],
            "usage": { "input_tokens": 3, "output_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new_with_model("sk-test".to_string(), None)
        .unwrap()
        .with_base_url(server.uri());
    let gateway = ProviderGateway::new(
        Box::new(provider),
        ImageFallbackChain::new(vec![Box::new(PollinationsProvider::new())]),
    );

    let completion = gateway
        .chat_complete(&[ChatMessage::system("sys"), ChatMessage::user("hi")], None)
        .await
        .unwrap();
    assert_eq!(completion.content, "ok");
    assert_eq!(completion.tokens_consumed, 4);
    assert_eq!(completion.model.as_str(), "claude-3-5-sonnet-latest");
}
