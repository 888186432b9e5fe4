use super::*;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

const FUNNEL_VARS: &[&str] = &[
    "FUNNEL_QDRANT_URL",
    "FUNNEL_COLLECTION",
    "FUNNEL_EMBEDDING_DIM",
    "FUNNEL_MEMORY_PATH",
    "FUNNEL_INDEX_TIMEOUT_MS",
    "FUNNEL_RERANK_TIMEOUT_MS",
    "FUNNEL_STAGE1_TOP_K",
    "FUNNEL_SIMILARITY_THRESHOLD",
    "FUNNEL_MIN_SURVIVORS",
    "FUNNEL_RELAX_STEP",
    "FUNNEL_RELAX_FLOOR",
    "FUNNEL_RERANK_TOP_K",
    "FUNNEL_MAX_CONTEXT_TOKENS",
    "FUNNEL_TARGET_CONTEXT_TOKENS",
    "FUNNEL_BUDGET_LIMIT",
    "FUNNEL_MEMORY_MAX_TOKENS",
    "FUNNEL_EMBEDDINGS_URL",
    "FUNNEL_EMBEDDINGS_API_KEY",
    "FUNNEL_RERANKER_URL",
];

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    clear_funnel_env();
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    clear_funnel_env();
    result
}

fn clear_funnel_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for key in FUNNEL_VARS {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.qdrant_url, "http://localhost:6334");
    assert_eq!(config.collection, "rag_job_chunks");
    assert_eq!(config.embedding_dim, 3072);
    assert_eq!(config.memory_path, PathBuf::from("./.data/jobs"));
    assert_eq!(config.stage1_top_k, 50);
    assert_eq!(config.similarity_threshold, 0.75);
    assert_eq!(config.rerank_top_k, 15);
    assert_eq!(config.max_context_tokens, 15_000);
    assert_eq!(config.budget_limit, 200.0);
    assert!(config.embeddings_url.is_none());
    assert!(config.reranker_url.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_funnel_config_mirrors_fields() {
    let config = Config {
        stage1_top_k: 40,
        similarity_threshold: 0.8,
        min_survivors: 3,
        relax_step: 0.1,
        relax_floor: 0.4,
        rerank_top_k: 10,
        max_context_tokens: 9_000,
        target_context_tokens: 8_000,
        index_timeout: Duration::from_millis(750),
        ..Config::default()
    };

    let funnel = config.funnel_config();
    assert_eq!(funnel.retriever.top_k, 40);
    assert_eq!(funnel.retriever.index_timeout, Duration::from_millis(750));
    assert_eq!(funnel.filter.threshold, 0.8);
    assert_eq!(funnel.filter.min_survivors, 3);
    assert_eq!(funnel.filter.relax_floor, 0.4);
    assert_eq!(funnel.rerank.top_k, 10);
    assert_eq!(funnel.assembler.max_tokens, 9_000);
    assert_eq!(funnel.assembler.target_tokens, 8_000);
    assert!(funnel.validate().is_ok());
}

#[test]
fn test_memory_config_mirrors_fields() {
    let config = Config {
        budget_limit: 50.0,
        memory_max_tokens: 500,
        ..Config::default()
    };
    let memory = config.memory_config();
    assert_eq!(memory.budget_limit, 50.0);
    assert_eq!(memory.max_tokens, 500);
}

#[test]
#[serial]
fn test_from_env_defaults() {
    let config = with_env_vars(&[], Config::from_env).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    let config = with_env_vars(
        &[
            ("FUNNEL_QDRANT_URL", "http://qdrant:6334"),
            ("FUNNEL_COLLECTION", "contracts"),
            ("FUNNEL_EMBEDDING_DIM", "1536"),
            ("FUNNEL_INDEX_TIMEOUT_MS", "500"),
            ("FUNNEL_SIMILARITY_THRESHOLD", "0.7"),
            ("FUNNEL_MIN_SURVIVORS", " 8 "),
            ("FUNNEL_BUDGET_LIMIT", "75.5"),
            ("FUNNEL_RERANKER_URL", "http://tei:8080"),
            ("FUNNEL_EMBEDDINGS_URL", "http://embed:8000/v1"),
            ("FUNNEL_EMBEDDINGS_API_KEY", "sk-test"),
        ],
        Config::from_env,
    )
    .unwrap();

    assert_eq!(config.qdrant_url, "http://qdrant:6334");
    assert_eq!(config.collection, "contracts");
    assert_eq!(config.embedding_dim, 1536);
    assert_eq!(config.index_timeout, Duration::from_millis(500));
    assert_eq!(config.similarity_threshold, 0.7);
    assert_eq!(config.min_survivors, 8);
    assert_eq!(config.budget_limit, 75.5);

    let reranker = config.reranker_config().unwrap();
    assert_eq!(reranker.base_url, "http://tei:8080");

    let embeddings = config.embeddings_config().unwrap();
    assert_eq!(embeddings.base_url, "http://embed:8000/v1");
    assert_eq!(embeddings.dimension, 1536);
    assert_eq!(embeddings.api_key.as_deref(), Some("sk-test"));
}

#[test]
#[serial]
fn test_from_env_rejects_malformed_numbers() {
    let err = with_env_vars(&[("FUNNEL_STAGE1_TOP_K", "lots")], Config::from_env).unwrap_err();
    match err {
        ConfigError::InvalidValue { name, value, .. } => {
            assert_eq!(name, "FUNNEL_STAGE1_TOP_K");
            assert_eq!(value, "lots");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = with_env_vars(&[("FUNNEL_RERANK_TIMEOUT_MS", "-5")], Config::from_env).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
#[serial]
fn test_blank_optional_urls_are_unset() {
    let config = with_env_vars(
        &[("FUNNEL_RERANKER_URL", "   "), ("FUNNEL_EMBEDDINGS_URL", "")],
        Config::from_env,
    )
    .unwrap();
    assert!(config.reranker_config().is_none());
    assert!(config.embeddings_config().is_none());
}

#[test]
fn test_validate_rejects_floor_above_threshold() {
    let config = Config {
        similarity_threshold: 0.6,
        relax_floor: 0.7,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_validate_rejects_target_above_budget() {
    let config = Config {
        max_context_tokens: 1_000,
        target_context_tokens: 2_000,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_validate_rejects_rerank_top_k_above_stage1() {
    let config = Config {
        stage1_top_k: 10,
        rerank_top_k: 15,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_validate_rejects_file_as_memory_path() {
    let file = NamedTempFile::new().unwrap();
    let config = Config {
        memory_path: file.path().to_path_buf(),
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::NotADirectory { .. })
    ));
}

#[test]
fn test_validate_rejects_negative_budget() {
    let config = Config {
        budget_limit: -1.0,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
}
