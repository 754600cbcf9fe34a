use super::*;
use crate::config::OllamaConfig;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server_uri: &str) -> OllamaConfig {
    let url = Url::parse(server_uri).expect("mock server URI is valid");
    OllamaConfig {
        protocol: url.scheme().to_string(),
        host: url.host_str().expect("mock server has host").to_string(),
        port: url.port().expect("mock server has port"),
        model: "test-model".to_string(),
        batch_size: 2,
        embedding_dimension: 4,
    }
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        embedding_dimension: 768,
    };
    let client = OllamaEmbedder::new(&config).expect("Failed to create client");

    assert_eq!(client.model_id(), "test-model");
    assert_eq!(client.dimension(), 768);
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let config = OllamaConfig::default();
    let client = OllamaEmbedder::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batches_against_mock_server() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3, 0.4], [0.5, 0.6, 0.7, 0.8]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = OllamaEmbedder::new(&config_for(&server.uri())).expect("Failed to create client");

    // Four texts with batch_size 2 means two requests
    let texts: Vec<String> = (0..4).map(|i| format!("text {}", i)).collect();
    let vectors = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("task should not panic")
        .expect("embed should succeed");

    assert_eq!(vectors.len(), 4);
    assert_eq!(vectors[0], vec![0.1, 0.2, 0.3, 0.4]);
}

#[tokio::test(flavor = "multi_thread")]
async fn count_mismatch_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.1, 0.2, 0.3, 0.4]]
        })))
        .mount(&server)
        .await;

    let client = OllamaEmbedder::new(&config_for(&server.uri())).expect("Failed to create client");

    let texts = vec!["one".to_string(), "two".to_string()];
    let result = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("task should not panic");

    assert!(matches!(result, Err(crate::RagError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaEmbedder::new(&config_for(&server.uri()))
        .expect("Failed to create client")
        .with_retry_attempts(3);

    let texts = vec!["one".to_string()];
    let result = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}

#[test]
fn empty_input_returns_empty_output() {
    let client = OllamaEmbedder::new(&OllamaConfig::default()).expect("Failed to create client");
    let vectors = client.embed(&[]).expect("embed of nothing should succeed");
    assert!(vectors.is_empty());
}
