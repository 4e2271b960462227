use std::path::Path;

use agent_chronicle::workspace::marker::MarkerStore;
use agent_chronicle::workspace::WorkspacePaths;

#[test]
fn layout_lives_under_context_dir() {
    let paths = WorkspacePaths::new("/ws");
    assert_eq!(paths.root(), Path::new("/ws"));
    assert_eq!(paths.context_dir(), Path::new("/ws/.context"));
    assert_eq!(paths.marker_file(), Path::new("/ws/.context/.session_marker"));
    assert_eq!(
        paths.session_logs_dir(),
        Path::new("/ws/.context/memories/session_logs")
    );
    assert_eq!(paths.canonical_digest(), Path::new("/ws/.context/CANONICAL.md"));
    assert_eq!(
        paths.start_lock_file(),
        Path::new("/ws/.context/.session_start.lock")
    );
}

#[test]
fn marker_write_creates_context_dir_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = WorkspacePaths::new(dir.path());
    let marker = MarkerStore::new(paths.marker_file());

    marker.write("session-a").expect("write");

    let raw = std::fs::read_to_string(paths.marker_file()).expect("read raw");
    assert_eq!(raw.trim(), "session-a");
    let entries: Vec<_> = std::fs::read_dir(paths.context_dir())
        .expect("list")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec![".session_marker".to_owned()]);
}

#[test]
fn blank_marker_reads_as_absent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(".session_marker");
    std::fs::write(&path, "  \n").expect("write");
    assert_eq!(MarkerStore::new(path).read().expect("read"), None);
}

#[test]
fn clear_if_owner_matches_removes_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = MarkerStore::new(dir.path().join(".session_marker"));
    marker.write("mine").expect("write");

    assert_eq!(marker.clear_if("mine").expect("clear"), None);
    assert!(!marker.path().exists());
    assert_eq!(marker.clear_if("mine").expect("clear absent"), None);
}
