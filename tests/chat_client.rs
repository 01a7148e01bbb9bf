use futures::StreamExt;
use serde_json::json;
use volcano_nodes::{
    ApiMode, ChatClient, ChatClientConfig, ContentItem, GenerationParams, ImageRef,
    MessageAssembler, VolcanoError,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, mode: ApiMode, endpoint_id: &str) -> ChatClient {
    let config = ChatClientConfig::new(mode, "test-key")
        .with_endpoint_id(endpoint_id)
        .with_base_url(format!("{}/v1", server.uri()));
    ChatClient::new(config).unwrap()
}

fn completion_body(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
    })
}

#[tokio::test]
async fn generate_sends_openai_shaped_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "ep-123",
            "max_tokens": 1024,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    let generation = client
        .generate("hello", "be brief", &GenerationParams::default(), None)
        .await
        .unwrap();

    assert_eq!(generation.text, "hi there");
    assert_eq!(generation.info.finish_reason, "stop");
    assert_eq!(generation.info.usage.prompt_tokens, 12);
    assert_eq!(generation.info.usage.completion_tokens, 5);
    assert_eq!(generation.info.usage.total_tokens, 17);
}

#[tokio::test]
async fn multimodal_request_keeps_image_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "https://x/y.png"}},
                    {"type": "video_url", "video_url": {"url": "https://x/clip.mp4"}}
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("a cat")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    let items = vec![
        ContentItem::Text("what is this?".into()),
        ContentItem::Image(ImageRef::Reference("https://x/y.png".into())),
        ContentItem::Video("https://x/clip.mp4".into()),
    ];
    let generation = client
        .generate_multimodal(&items, "", &GenerationParams::default(), None)
        .await
        .unwrap();

    assert_eq!(generation.text, "a cat");
}

#[tokio::test]
async fn empty_content_fails_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    let err = client
        .generate_multimodal(&[], "", &GenerationParams::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VolcanoError::EmptyInput { .. }));
}

#[tokio::test]
async fn missing_model_fails_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let openapi = client_for(&server, ApiMode::OpenApi, "");
    let err = openapi
        .generate("hi", "", &GenerationParams::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VolcanoError::InvalidConfiguration { .. }));

    let rest = client_for(&server, ApiMode::Rest, "ep-123");
    let err = rest
        .generate("hi", "", &GenerationParams::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VolcanoError::InvalidConfiguration { .. }));
}

#[tokio::test]
async fn rest_mode_defaults_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "doubao-pro"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"content": "ok"}}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::Rest, "");
    let generation = client
        .generate("ping", "", &GenerationParams::default(), Some("doubao-pro"))
        .await
        .unwrap();

    assert_eq!(generation.text, "ok");
    assert_eq!(generation.info.finish_reason, "");
    assert_eq!(generation.info.usage.total_tokens, 0);
}

#[tokio::test]
async fn unauthorized_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    let err = client
        .generate("hi", "", &GenerationParams::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, VolcanoError::Authentication { .. }));
    assert!(err.to_string().contains("invalid api key"));
}

#[tokio::test]
async fn not_found_is_endpoint_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-missing");
    let err = client
        .generate("hi", "", &GenerationParams::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, VolcanoError::EndpointNotFound { .. }));
}

#[tokio::test]
async fn server_error_is_processing_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    let err = client
        .generate("hi", "", &GenerationParams::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, VolcanoError::ProcessingFailed { .. }));
}

#[tokio::test]
async fn refused_connection_is_connection_error() {
    // Grab a free port, then close it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ChatClientConfig::new(ApiMode::OpenApi, "test-key")
        .with_endpoint_id("ep-123")
        .with_base_url(format!("http://{}/v1", addr));
    let client = ChatClient::new(config).unwrap();

    let err = client
        .generate("hi", "", &GenerationParams::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VolcanoError::Connection { .. }));

    let err = client.test_connection().await.unwrap_err();
    assert!(matches!(err, VolcanoError::Connection { .. }));
}

#[tokio::test]
async fn connection_test_checks_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    client.test_connection().await.unwrap();
}

#[tokio::test]
async fn connection_test_classifies_bad_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    let err = client.test_connection().await.unwrap_err();
    assert!(matches!(err, VolcanoError::Authentication { .. }));
}

#[tokio::test]
async fn stream_yields_incremental_chunks() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true, "model": "doubao-pro"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::Rest, "");
    let messages = MessageAssembler::build_text_messages("hi", "");
    let stream = client
        .chat_stream(&messages, &GenerationParams::default(), Some("doubao-pro"))
        .await
        .unwrap();

    let chunks: Vec<_> = stream.map(|chunk| chunk.unwrap()).collect().await;
    let deltas: Vec<&str> = chunks.iter().map(|c| c.delta.as_str()).collect();
    assert_eq!(deltas, vec!["Hel", "lo", ""]);
    assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn stream_error_event_reaches_caller() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"rate limited\",\"code\":\"429\"}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    let messages = MessageAssembler::build_text_messages("hi", "");
    let stream = client
        .chat_stream(&messages, &GenerationParams::default(), None)
        .await
        .unwrap();

    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().delta, "Hel");
    match &items[1] {
        Err(err @ VolcanoError::ProcessingFailed { .. }) => {
            assert!(err.to_string().contains("rate limited"));
        }
        other => panic!("expected a processing failure, got {other:?}"),
    }
}

#[tokio::test]
async fn rest_mode_treats_null_usage_counts_as_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}, "finish_reason": null}],
            "usage": {"prompt_tokens": 3, "completion_tokens": null, "total_tokens": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::Rest, "");
    let generation = client
        .generate("ping", "", &GenerationParams::default(), Some("doubao-pro"))
        .await
        .unwrap();

    assert_eq!(generation.text, "ok");
    assert_eq!(generation.info.finish_reason, "");
    assert_eq!(generation.info.usage.prompt_tokens, 3);
    assert_eq!(generation.info.usage.completion_tokens, 0);
    assert_eq!(generation.info.usage.total_tokens, 0);
}

#[tokio::test]
async fn undecodable_body_is_processing_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::Rest, "");
    let err = client
        .generate("ping", "", &GenerationParams::default(), Some("doubao-pro"))
        .await
        .unwrap_err();

    assert!(matches!(err, VolcanoError::ProcessingFailed { .. }));
    assert!(err.to_string().starts_with("Processing failed: Failed to decode"));
}

#[tokio::test]
async fn openapi_response_without_choices_is_processing_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = client_for(&server, ApiMode::OpenApi, "ep-123");
    let err = client
        .generate("hi", "", &GenerationParams::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VolcanoError::ProcessingFailed { .. }));
}
