use super::*;

#[test]
fn test_signature_collapses_case_and_whitespace() {
    let a = text_signature("  Quarterly   Revenue\n\tGrew  ", 100);
    let b = text_signature("quarterly revenue grew", 100);

    assert_eq!(a, "quarterly revenue grew");
    assert_eq!(a, b);
}

#[test]
fn test_signature_truncates_to_prefix() {
    let text = "x".repeat(250);
    assert_eq!(text_signature(&text, 100).chars().count(), 100);
}

#[test]
fn test_signature_prefix_boundary_on_space() {
    assert_eq!(text_signature("a b", 1), "a");
    assert_eq!(text_signature("a b", 2), "a ");
    assert_eq!(text_signature("a b", 3), "a b");
}

#[test]
fn test_signature_multibyte_chars() {
    let sig = text_signature("Ünïcödé  TEXT", 5);
    assert_eq!(sig, "ünïcö");
}

#[test]
fn test_signature_empty_text() {
    assert_eq!(text_signature("   \n  ", 100), "");
}

#[test]
fn test_estimate_tokens_rounds_up() {
    assert_eq!(estimate_tokens(""), 0);
    assert_eq!(estimate_tokens("abc"), 1);
    assert_eq!(estimate_tokens("abcd"), 1);
    assert_eq!(estimate_tokens("abcde"), 2);
}

#[test]
fn test_effective_tokens_prefers_loader_count() {
    let counted = Chunk::new("c1", "short", "a.pdf", 0).with_token_count(42);
    let uncounted = Chunk::new("c2", "12345678", "a.pdf", 1);

    assert_eq!(counted.effective_tokens(), 42);
    assert_eq!(uncounted.effective_tokens(), 2);
}

#[test]
fn test_precedes_requires_same_file_and_next_index() {
    let a3 = Chunk::new("a3", "t", "a.pdf", 3);
    let a4 = Chunk::new("a4", "t", "a.pdf", 4);
    let a5 = Chunk::new("a5", "t", "a.pdf", 5);
    let b4 = Chunk::new("b4", "t", "b.pdf", 4);

    assert!(a3.precedes(&a4));
    assert!(!a4.precedes(&a3));
    assert!(!a3.precedes(&a5));
    assert!(!a3.precedes(&b4));
}

#[test]
fn test_precedes_does_not_overflow() {
    let last = Chunk::new("z", "t", "a.pdf", u32::MAX);
    let first = Chunk::new("y", "t", "a.pdf", 0);
    assert!(!last.precedes(&first));
}

#[test]
fn test_candidate_starts_with_raw_score() {
    let chunk = Arc::new(Chunk::new("c", "t", "a.pdf", 0));
    let candidate = Candidate::new(Arc::clone(&chunk), 0.8);

    assert_eq!(candidate.raw_score, 0.8);
    assert_eq!(candidate.score, 0.8);
    assert_eq!(Arc::strong_count(&chunk), 2);
}

#[test]
fn test_chunk_deserializes_with_missing_optional_fields() {
    let json = r#"{"id":"c1","text":"body","source_file":"a.pdf","chunk_index":7}"#;
    let chunk: Chunk = serde_json::from_str(json).expect("should deserialize");

    assert_eq!(chunk.chunk_index(), 7);
    assert_eq!(chunk.section(), "");
    assert_eq!(chunk.token_count(), 0);
}
