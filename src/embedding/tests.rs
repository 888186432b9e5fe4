use super::openai::parse_embeddings_response;
use super::*;

#[tokio::test]
async fn test_hash_embedder_is_deterministic_and_normalized() {
    let embedder = HashEmbedder::new(64).unwrap();

    let (a, _) = embedder.embed("budget overrun").await.unwrap();
    let (b, _) = embedder.embed("budget overrun").await.unwrap();
    let (c, _) = embedder.embed("something else").await.unwrap();

    assert_eq!(a.len(), 64);
    assert_eq!(a, b);
    assert_ne!(a, c);

    let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_hash_embedder_batch_reports_estimated_tokens() {
    let embedder = HashEmbedder::new(8).unwrap();
    let batch = embedder.embed_batch(&["abcd", "abcde"]).await.unwrap();

    assert_eq!(batch.vectors.len(), 2);
    assert_eq!(batch.usage.prompt_tokens, 3);
    assert_eq!(batch.usage.cost, 0.0);
}

#[test]
fn test_hash_embedder_rejects_zero_dimension() {
    assert!(matches!(
        HashEmbedder::new(0),
        Err(EmbeddingError::InvalidConfig { .. })
    ));
}

#[test]
fn test_parse_response_restores_input_order_and_cost() {
    let body = br#"{
        "data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ],
        "usage": {"prompt_tokens": 2000000, "total_tokens": 2000000}
    }"#;

    let batch = parse_embeddings_response(body, 2, 2, 0.13).unwrap();

    assert_eq!(batch.vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert_eq!(batch.usage.prompt_tokens, 2_000_000);
    assert!((batch.usage.cost - 0.26).abs() < 1e-9);
}

#[test]
fn test_parse_response_rejects_wrong_dimension() {
    let body = br#"{"data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}]}"#;
    let err = parse_embeddings_response(body, 1, 2, 0.13).unwrap_err();
    assert!(matches!(
        err,
        EmbeddingError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    ));
}

#[test]
fn test_parse_response_rejects_count_mismatch() {
    let body = br#"{"data": [{"index": 0, "embedding": [1.0]}]}"#;
    let err = parse_embeddings_response(body, 2, 1, 0.13).unwrap_err();
    assert!(matches!(err, EmbeddingError::InvalidResponse { .. }));
}

#[test]
fn test_parse_response_rejects_repeated_index() {
    let body = br#"{"data": [
        {"index": 0, "embedding": [1.0]},
        {"index": 0, "embedding": [2.0]}
    ]}"#;
    assert!(parse_embeddings_response(body, 2, 1, 0.13).is_err());
}

#[test]
fn test_openai_config_validation() {
    assert!(OpenAiEmbeddingsConfig::default().validate().is_ok());
    assert!(OpenAiEmbeddingsConfig::new("  ").validate().is_err());
    assert!(
        OpenAiEmbeddingsConfig::default()
            .with_model("m", 0)
            .validate()
            .is_err()
    );
    assert!(
        OpenAiEmbeddingsConfig::default()
            .with_cost_per_million_tokens(-1.0)
            .validate()
            .is_err()
    );
}

#[test]
fn test_usage_add_accumulates() {
    let mut usage = EmbeddingUsage::new(10, 0.5);
    usage.add(EmbeddingUsage::new(5, 0.25));
    assert_eq!(usage.prompt_tokens, 15);
    assert!((usage.cost - 0.75).abs() < 1e-12);
}
