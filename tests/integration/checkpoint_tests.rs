use agent_chronicle::models::session::SessionRecord;
use agent_chronicle::orchestrator::checkpoint_manager::QuicksaveParams;
use agent_chronicle::persistence::graph_store::GraphStore;
use agent_chronicle::AppError;

use super::test_helpers::{harness, harness_with, read};

fn params(summary: &str) -> QuicksaveParams {
    QuicksaveParams {
        summary: summary.to_owned(),
        ..QuicksaveParams::default()
    }
}

#[tokio::test]
async fn quicksave_without_session_creates_nothing() {
    let h = harness().await;
    let result = h.state.checkpoints.quicksave(params("nothing open")).await;
    assert!(matches!(result, Err(AppError::NoActiveSession)));
    assert!(!h.paths().session_logs_dir().exists());
    assert!(!h.paths().marker_file().exists());
}

#[tokio::test]
async fn quicksaves_only_grow_the_log() {
    let h = harness().await;
    let started = h.state.sessions.start(h.start_params()).await.expect("start");
    let header = read(&started.log_path);

    h.state.checkpoints.quicksave(params("first")).await.expect("first");
    let after_first = read(&started.log_path);
    h.state.checkpoints.quicksave(params("second")).await.expect("second");
    let after_second = read(&started.log_path);

    assert!(after_first.starts_with(&header));
    assert!(after_second.starts_with(&after_first));
    assert_eq!(after_second.matches("### Quicksave (").count(), 2);
    assert!(after_second.find("first").expect("first") < after_second.find("second").expect("second"));
}

#[tokio::test]
async fn unknown_session_id_is_rejected() {
    let h = harness().await;
    h.state.sessions.start(h.start_params()).await.expect("start");
    let result = h
        .state
        .checkpoints
        .quicksave(QuicksaveParams {
            session_id: Some("not-open".into()),
            ..params("x")
        })
        .await;
    assert!(matches!(result, Err(AppError::NoActiveSession)));
}

#[tokio::test]
async fn disabled_compliance_never_warns() {
    let h = harness_with(|c| c.compliance.enabled = false, None).await;
    let started = h.state.sessions.start(h.start_params()).await.expect("start");
    let saved = h
        .state
        .checkpoints
        .quicksave(params("Implemented everything"))
        .await
        .expect("quicksave");
    assert!(saved.warnings.is_empty());
    assert!(!read(&started.log_path).contains("[!CAUTION]"));
}

#[tokio::test]
async fn quicksave_advances_last_activity() {
    let h = harness().await;
    let started = h.state.sessions.start(h.start_params()).await.expect("start");
    let before = h
        .state
        .registry
        .get(Some(&started.session_id))
        .expect("handle")
        .last_activity;

    h.state.checkpoints.quicksave(params("tick")).await.expect("quicksave");

    let handle = h.state.registry.get(None).expect("handle");
    assert!(handle.last_activity >= before);
    let stored: SessionRecord = h
        .store
        .get_node(&started.session_id)
        .await
        .expect("get")
        .expect("node")
        .decode()
        .expect("decode");
    assert_eq!(stored.last_activity, handle.last_activity);
}

#[tokio::test]
async fn deleted_log_degrades_and_is_not_recreated() {
    let h = harness_with(|c| c.compliance.enabled = false, None).await;
    let started = h.state.sessions.start(h.start_params()).await.expect("start");
    std::fs::remove_file(&started.log_path).expect("delete log");

    let saved = h
        .state
        .checkpoints
        .quicksave(params("lost"))
        .await
        .expect("quicksave still succeeds");
    assert_eq!(saved.warnings.len(), 1);
    assert!(saved.warnings[0].starts_with("append quicksave: "));
    assert!(!started.log_path.exists());
}
