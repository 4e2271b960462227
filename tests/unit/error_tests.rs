//! Display format and wire kinds of `AppError`.

use agent_chronicle::AppError;

fn every_variant() -> Vec<AppError> {
    vec![
        AppError::Config("bad".into()),
        AppError::StoreUnavailable("down".into()),
        AppError::SessionNotFound("abc".into()),
        AppError::SessionClosed("abc".into()),
        AppError::NoActiveSession,
        AppError::LogIo("disk full".into()),
        AppError::Io("denied".into()),
        AppError::Harvest("no repo".into()),
        AppError::Embedding("refused".into()),
        AppError::Protocol("line too long".into()),
        AppError::InvalidInput("empty".into()),
        AppError::PathViolation("escape".into()),
        AppError::LockTimeout("held".into()),
    ]
}

#[test]
fn display_has_kind_prefix_and_no_trailing_period() {
    for err in every_variant() {
        let text = err.to_string();
        assert!(text.contains(": "), "missing prefix separator: {text}");
        assert!(!text.ends_with('.'), "trailing period: {text}");
    }
}

#[test]
fn kinds_are_unique_snake_case() {
    let kinds: Vec<&str> = every_variant().iter().map(AppError::kind).collect();
    let mut deduped = kinds.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), kinds.len());
    for kind in kinds {
        assert!(
            kind.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
            "kind not snake_case: {kind}"
        );
    }
}

#[test]
fn session_errors_carry_the_id() {
    assert_eq!(
        AppError::SessionNotFound("s-1".into()).to_string(),
        "session not found: s-1"
    );
    assert_eq!(
        AppError::SessionClosed("s-1".into()).to_string(),
        "session closed: s-1"
    );
    assert_eq!(AppError::NoActiveSession.kind(), "no_active_session");
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Io("x".into()));
}
