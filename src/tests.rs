use super::*;

#[test]
fn in_stage_wraps_infrastructure_errors() {
    let error = BotError::Database("table missing".to_string()).in_stage(BotError::Retrieval);
    match error {
        BotError::Retrieval(message) => assert!(message.contains("table missing")),
        other => panic!("expected retrieval error, got {other:?}"),
    }
}

#[test]
fn in_stage_keeps_timeouts_and_cancellation() {
    let timeout = BotError::Timeout {
        operation: "chat completion".to_string(),
        after: Duration::from_secs(60),
    }
    .in_stage(BotError::Generation);
    assert!(matches!(timeout, BotError::Timeout { .. }));

    let cancelled =
        BotError::Cancelled("query embedding".to_string()).in_stage(BotError::Retrieval);
    assert!(matches!(cancelled, BotError::Cancelled(_)));

    let rejected = BotError::Auth("HTTP 401".to_string()).in_stage(BotError::Embedding);
    assert!(matches!(rejected, BotError::Auth(_)));
}

#[test]
fn in_stage_does_not_double_wrap() {
    let error = BotError::Generation("empty reply".to_string()).in_stage(BotError::Generation);
    assert_eq!(error.to_string(), "Generation failed: empty reply");
}

#[test]
fn load_error_names_the_file() {
    let error = BotError::Load {
        path: PathBuf::from("resume.pdf"),
        message: "unsupported document type".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Failed to load resume.pdf: unsupported document type"
    );
}
