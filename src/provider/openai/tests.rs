use super::*;
use crate::QaError;
use crate::provider::Role;
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn test_client(server: &MockServer, attempts: u32) -> OpenAiClient {
    let base_url = Url::parse(&format!("{}/v1/", server.uri())).expect("mock uri should parse");
    let transport = HttpTransport::new(Duration::from_secs(5), attempts)
        .with_backoff_base(Duration::from_millis(1))
        .with_bearer_token("sk-test");
    OpenAiClient::new(
        base_url,
        "text-embedding-ada-002".to_string(),
        "gpt-3.5-turbo".to_string(),
        transport,
    )
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[test]
fn client_models() {
    let transport = HttpTransport::new(Duration::from_secs(1), 1);
    let client = OpenAiClient::new(
        Url::parse("https://api.openai.com/v1/").expect("url should parse"),
        "embed-model".to_string(),
        "chat-model".to_string(),
        transport,
    );
    assert_eq!(Embedder::model(&client), "embed-model");
    assert_eq!(Completer::model(&client), "chat-model");
    assert_eq!(
        client.endpoint("embeddings").expect("join works").as_str(),
        "https://api.openai.com/v1/embeddings"
    );
}

#[tokio::test]
async fn embeddings_follow_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-ada-002",
            "input": ["A cat sat.", "Rain fell."]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ],
            "model": "text-embedding-ada-002"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 1);
    let vectors = client
        .embed(&texts(&["A cat sat.", "Rain fell."]))
        .expect("embedding should succeed");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn large_inputs_are_split_into_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"input": ["one", "two"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"input": ["three"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.5, 0.5]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 1).with_batch_size(2);
    let vectors = client
        .embed(&texts(&["one", "two", "three"]))
        .expect("embedding should succeed");

    assert_eq!(
        vectors,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test]
async fn failed_batch_names_its_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(400).set_body_string("too many inputs"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 1).with_batch_size(3);
    match client.embed(&texts(&["a", "b", "c", "d"])) {
        Err(QaError::Embedding(message)) => {
            assert!(message.contains("batch of 3 texts"), "{message}");
        }
        other => panic!("expected embedding error, got {other:?}"),
    }
}

#[tokio::test]
async fn embedding_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 0, "embedding": [1.0, 0.0]},
                {"index": 1, "embedding": [0.0, 1.0]}
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server, 1);
    let result = client.embed(&texts(&["one", "two", "three"]));

    match result {
        Err(QaError::Embedding(message)) => assert!(message.contains("Mismatch"), "{message}"),
        other => panic!("expected embedding error, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_embedding_index_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 0, "embedding": [1.0]},
                {"index": 0, "embedding": [2.0]}
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server, 1);
    assert!(matches!(
        client.embed(&texts(&["a", "b"])),
        Err(QaError::Embedding(_))
    ));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 3);
    match client.embed(&texts(&["question"])) {
        Err(QaError::Embedding(message)) => {
            assert!(message.contains("401"), "{message}");
            assert!(message.contains("Incorrect API key"), "{message}");
        }
        other => panic!("expected embedding error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.5, 0.5]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 2);
    let vectors = client
        .embed(&texts(&["question"]))
        .expect("second attempt should succeed");
    assert_eq!(vectors, vec![vec![0.5, 0.5]]);
}

#[tokio::test]
async fn single_attempt_surfaces_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 1);
    assert!(matches!(
        client.complete(&[ChatMessage::user("hi")]),
        Err(QaError::Completion(_))
    ));
}

#[tokio::test]
async fn completion_returns_choice_contents() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "messages": [{"role": "user", "content": "What is GPT-4?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "A large model [1]."}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": null}, "finish_reason": "stop"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 1);
    let message = ChatMessage::user("What is GPT-4?");
    assert_eq!(message.role, Role::User);

    let choices = client
        .complete(&[message])
        .expect("completion should succeed");
    assert_eq!(choices, vec!["A large model [1].".to_string(), String::new()]);
}

#[tokio::test]
async fn completion_without_choices_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = test_client(&server, 1);
    let choices = client
        .complete(&[ChatMessage::user("hi")])
        .expect("request itself succeeds");
    assert!(choices.is_empty());
}

#[tokio::test]
async fn malformed_completion_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server, 1);
    match client.complete(&[ChatMessage::user("hi")]) {
        Err(QaError::Completion(message)) => {
            assert!(message.contains("Failed to parse response"), "{message}");
        }
        other => panic!("expected completion error, got {other:?}"),
    }
}

#[test]
fn empty_input_makes_no_request() {
    let transport = HttpTransport::new(Duration::from_secs(1), 1);
    let client = OpenAiClient::new(
        Url::parse("http://127.0.0.1:9/v1/").expect("url should parse"),
        "embed".to_string(),
        "chat".to_string(),
        transport,
    );
    assert!(client.embed(&[]).expect("no request needed").is_empty());
}
