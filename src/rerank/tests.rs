use std::time::Duration;

use serial_test::serial;

use super::config::ENV_RERANKER_URL;
use super::http::parse_rerank_response;
use super::*;

#[test]
fn test_lexical_overlap_beats_unrelated() {
    let reranker = LexicalReranker::new();
    let related = reranker.score_pair(
        "budget overrun risk",
        "The budget overrun risk is tracked per stage.",
    );
    let unrelated = reranker.score_pair("budget overrun risk", "Penguins live in Antarctica.");

    assert!(related > unrelated);
    assert!((0.0..=1.0).contains(&related));
    assert!((0.0..=1.0).contains(&unrelated));
}

#[test]
fn test_lexical_stopword_only_query_uses_length_ratio() {
    let reranker = LexicalReranker::new();
    let score = reranker.score_pair("the of", "the of");
    assert!((score - 0.3).abs() < 1e-6);
}

#[tokio::test]
async fn test_lexical_batch_preserves_order() {
    let reranker = LexicalReranker::new();
    let scores = reranker
        .score_batch("rust tokio", &["tokio runtime", "gardening tips", "rust tokio"])
        .await
        .unwrap();

    assert_eq!(scores.len(), 3);
    assert!(scores[2] > scores[0]);
    assert!(scores[0] > scores[1]);
}

#[tokio::test]
async fn test_score_default_uses_batch() {
    let model = MockRerankModel::new(0.1).with_score("hit", 0.9);
    assert_eq!(model.score("q", "hit").await.unwrap(), 0.9);
    assert_eq!(model.score("q", "miss").await.unwrap(), 0.1);
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_mock_failing_returns_unavailable() {
    let model = MockRerankModel::default();
    model.set_failing(true);

    let err = model.score_batch("q", &["a"]).await.unwrap_err();
    assert!(matches!(err, RerankerError::Unavailable { .. }));
}

#[tokio::test]
async fn test_mock_response_override() {
    let model = MockRerankModel::default();
    model.set_response_override(Some(vec![0.5]));

    let scores = model.score_batch("q", &["a", "b"]).await.unwrap();
    assert_eq!(scores, vec![0.5]);
}

#[test]
fn test_parse_rerank_response_maps_indices() {
    let body = br#"[{"index": 2, "score": 0.9}, {"index": 0, "score": 0.4}, {"index": 1, "score": 0.1}]"#;
    let scores = parse_rerank_response(body, 3).unwrap();
    assert_eq!(scores, vec![0.4, 0.1, 0.9]);
}

#[test]
fn test_parse_rerank_response_rejects_bad_shapes() {
    assert!(parse_rerank_response(br#"[{"index": 0, "score": 0.4}]"#, 2).is_err());
    assert!(
        parse_rerank_response(
            br#"[{"index": 0, "score": 0.4}, {"index": 0, "score": 0.5}]"#,
            2
        )
        .is_err()
    );
    assert!(parse_rerank_response(br#"[{"index": 5, "score": 0.4}]"#, 1).is_err());
    assert!(parse_rerank_response(b"not json", 1).is_err());
}

#[test]
fn test_http_config_validation() {
    assert!(HttpRerankerConfig::new("http://localhost:8081").validate().is_ok());
    assert!(HttpRerankerConfig::new("").validate().is_err());
    assert!(
        HttpRerankerConfig::new("http://x")
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err()
    );
    assert_eq!(
        HttpRerankerConfig::new("http://x/").endpoint(),
        "http://x/rerank"
    );
}

#[test]
fn test_http_reranker_rejects_invalid_config() {
    assert!(matches!(
        HttpReranker::new(HttpRerankerConfig::new(" ")),
        Err(RerankerError::InvalidConfig { .. })
    ));
}

#[test]
#[serial]
fn test_http_config_from_env() {
    unsafe { std::env::remove_var(ENV_RERANKER_URL) };
    assert!(HttpRerankerConfig::from_env().is_none());

    unsafe { std::env::set_var(ENV_RERANKER_URL, "  http://tei:8080 ") };
    let config = HttpRerankerConfig::from_env().unwrap();
    assert_eq!(config.base_url, "http://tei:8080");

    unsafe { std::env::set_var(ENV_RERANKER_URL, "   ") };
    assert!(HttpRerankerConfig::from_env().is_none());

    unsafe { std::env::remove_var(ENV_RERANKER_URL) };
}
