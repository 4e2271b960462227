use agent_chronicle::workspace::path_safety::resolve_within;
use agent_chronicle::AppError;

#[test]
fn relative_path_resolves_inside_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("modules")).expect("mkdir");
    std::fs::write(dir.path().join("modules/Core_Identity.md"), "id").expect("write");

    let resolved = resolve_within(dir.path(), "modules/./Core_Identity.md").expect("resolve");
    assert_eq!(
        resolved,
        dir.path()
            .canonicalize()
            .expect("canonical")
            .join("modules/Core_Identity.md")
    );
}

#[test]
fn missing_file_still_resolves() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolved = resolve_within(dir.path(), "notes/todo.md").expect("resolve");
    assert!(resolved.ends_with("notes/todo.md"));
}

#[test]
fn inner_parent_segments_are_normalized() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolved = resolve_within(dir.path(), "a/../b.md").expect("resolve");
    assert!(resolved.ends_with("b.md"));
}

#[test]
fn traversal_and_absolute_paths_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(matches!(
        resolve_within(dir.path(), "../secret.md"),
        Err(AppError::PathViolation(_))
    ));
    assert!(matches!(
        resolve_within(dir.path(), "/etc/passwd"),
        Err(AppError::PathViolation(_))
    ));
}

#[test]
fn missing_root_is_a_violation() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(matches!(
        resolve_within(&dir.path().join("absent"), "file.md"),
        Err(AppError::PathViolation(_))
    ));
}

#[cfg(unix)]
#[test]
fn symlink_escaping_root_is_rejected() {
    let root = tempfile::tempdir().expect("tempdir");
    let outside = tempfile::tempdir().expect("tempdir");
    std::fs::write(outside.path().join("secret.md"), "s").expect("write");
    std::os::unix::fs::symlink(outside.path().join("secret.md"), root.path().join("link.md"))
        .expect("symlink");

    assert!(matches!(
        resolve_within(root.path(), "link.md"),
        Err(AppError::PathViolation(_))
    ));
}
