use agent_chronicle::narrative::digest::CanonicalDigest;
use agent_chronicle::narrative::format::{self, Header};
use agent_chronicle::narrative::writer::SessionLog;
use agent_chronicle::AppError;
use chrono::{NaiveDate, TimeZone, Utc};

const SESSION_ID: &str = "0f3a9c12-aaaa-bbbb-cccc-123456789abc";

fn header() -> String {
    format::session_header(&Header {
        session_id: SESSION_ID,
        started_at: Utc
            .with_ymd_and_hms(2025, 6, 1, 9, 30, 0)
            .single()
            .expect("time"),
        project_id: Some("chronicle"),
        user_id: None,
        project_state_preview: Some("Phase 2..."),
    })
}

#[test]
fn path_is_deterministic_per_date_and_id() {
    let date = NaiveDate::from_ymd_opt(2025, 6, 1).expect("date");
    let path = SessionLog::path_for(std::path::Path::new("/logs"), date, SESSION_ID);
    assert_eq!(
        path,
        std::path::Path::new("/logs").join(format!("Session_2025-06-01_{SESSION_ID}.md"))
    );
}

#[test]
fn create_writes_header_and_refuses_to_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs/Session_2025-06-01_x.md");
    let log = SessionLog::create(path.clone(), &header()).expect("create");

    let text = std::fs::read_to_string(log.path()).expect("read");
    assert!(text.starts_with(&format!("# Session Log: {SESSION_ID}\n")));
    assert!(text.contains("**Date**: 2025-06-01T09:30:00.000Z"));
    assert!(text.contains("**Project**: chronicle"));
    assert!(text.contains("**User**: N/A"));
    assert!(text.contains("### Project State Snapshot\nPhase 2..."));

    assert!(matches!(
        SessionLog::create(path, "other"),
        Err(AppError::LogIo(_))
    ));
}

#[test]
fn append_only_grows_and_never_recreates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = SessionLog::create(dir.path().join("a.md"), &header()).expect("create");
    let before = log.byte_len().expect("len");

    log.append("\n### Quicksave (10:00:00)\nstep\n").expect("append");
    let after = log.byte_len().expect("len");
    assert!(after > before);
    let text = std::fs::read_to_string(log.path()).expect("read");
    assert!(text.starts_with(&header()));

    let missing = SessionLog::open(dir.path().join("gone.md"));
    assert!(matches!(missing.append("x"), Err(AppError::LogIo(_))));
    assert!(!dir.path().join("gone.md").exists());
}

#[test]
fn locate_prefers_full_id_then_fragment() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("Session_2025-06-01_0f3a9c12.md"), "short").expect("write");
    assert!(SessionLog::locate(dir.path(), SESSION_ID)
        .expect("fragment match")
        .path()
        .ends_with("Session_2025-06-01_0f3a9c12.md"));

    let full = dir.path().join(format!("Session_2025-06-02_{SESSION_ID}.md"));
    std::fs::write(&full, "full").expect("write");
    assert_eq!(
        SessionLog::locate(dir.path(), SESSION_ID).expect("full match").path(),
        full.as_path()
    );

    assert!(SessionLog::locate(dir.path(), "ffffffff-0000").is_none());
    assert!(SessionLog::locate(&dir.path().join("absent"), SESSION_ID).is_none());
}

#[test]
fn digest_append_creates_file_and_accumulates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let digest = CanonicalDigest::new(dir.path().join(".context/CANONICAL.md"));
    let date = NaiveDate::from_ymd_opt(2025, 6, 1).expect("date");

    digest
        .append(&format::digest_entry(SESSION_ID, date, "First"))
        .expect("append");
    digest
        .append(&format::digest_entry("11111111-2222", date, "Second"))
        .expect("append");

    let text = std::fs::read_to_string(digest.path()).expect("read");
    assert!(text.contains("### Session 0f3a9c12 (2025-06-01)\nFirst"));
    assert!(text.contains("### Session 11111111 (2025-06-01)\nSecond"));
}
