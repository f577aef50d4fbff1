mod common;

use tempfile::TempDir;

use kioku_memory::{
    MemoryError, MemoryIndexManager, MemoryManagerRegistry, ReadFileRequest, ResolvedMemorySearch,
};

use common::{params, quiet_settings, write};

fn manager_for(temp: &TempDir, settings: ResolvedMemorySearch) -> MemoryIndexManager {
    MemoryManagerRegistry::new()
        .get_with(params(temp.path(), settings))
        .expect("manager")
}

async fn assert_rejected(manager: &MemoryIndexManager, rel_path: &str) {
    let err = manager
        .read_file(ReadFileRequest::new(rel_path))
        .await
        .expect_err("path should be rejected");
    assert!(matches!(err, MemoryError::PathRejected), "{rel_path}: {err}");
    assert_eq!(err.to_string(), "path required");
}

#[tokio::test]
async fn test_reads_memory_namespace_files() {
    let temp = TempDir::new().expect("tempdir");
    write(&temp.path().join("MEMORY.md"), "line one\nline two\nline three");
    write(&temp.path().join("memory/2025-01-03.md"), "daily");
    let manager = manager_for(&temp, quiet_settings());

    let full = manager
        .read_file(ReadFileRequest::new("MEMORY.md"))
        .await
        .expect("read");
    assert_eq!(full.text, "line one\nline two\nline three");
    assert_eq!(full.path, "MEMORY.md");

    let nested = manager
        .read_file(ReadFileRequest::new("  ./memory/2025-01-03.md  "))
        .await
        .expect("read");
    assert_eq!(nested.text, "daily");
    assert_eq!(nested.path, "memory/2025-01-03.md");

    let absolute = temp.path().join("memory/2025-01-03.md");
    let by_absolute = manager
        .read_file(ReadFileRequest::new(absolute.display().to_string()))
        .await
        .expect("read");
    assert_eq!(by_absolute.path, "memory/2025-01-03.md");
}

#[tokio::test]
async fn test_reads_line_slices() {
    let temp = TempDir::new().expect("tempdir");
    write(&temp.path().join("MEMORY.md"), "one\ntwo\nthree\nfour");
    let manager = manager_for(&temp, quiet_settings());

    let slice = manager
        .read_file(ReadFileRequest::new("MEMORY.md").slice(Some(2), Some(2)))
        .await
        .expect("read");
    assert_eq!(slice.text, "two\nthree");

    let tail = manager
        .read_file(ReadFileRequest::new("MEMORY.md").slice(Some(3), None))
        .await
        .expect("read");
    assert_eq!(tail.text, "three\nfour");
}

#[tokio::test]
async fn test_rejects_paths_outside_memory() {
    let temp = TempDir::new().expect("tempdir");
    let outside = TempDir::new().expect("tempdir");
    write(&temp.path().join("README.md"), "readme");
    write(&temp.path().join("memory/notes.txt"), "plain text");
    write(&temp.path().join("memory/sub/dir.md/inner.md"), "inner");
    write(&outside.path().join("secret.md"), "secret");
    let manager = manager_for(&temp, quiet_settings());

    assert_rejected(&manager, "").await;
    assert_rejected(&manager, "   ").await;
    assert_rejected(&manager, "README.md").await;
    assert_rejected(&manager, "memory/notes.txt").await;
    assert_rejected(&manager, "memory/missing.md").await;
    assert_rejected(&manager, "memory/sub/dir.md").await;
    assert_rejected(&manager, "memory/../README.md").await;
    assert_rejected(&manager, "../secret.md").await;
    assert_rejected(&manager, &outside.path().join("secret.md").display().to_string()).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_rejects_symlinked_targets() {
    let temp = TempDir::new().expect("tempdir");
    let outside = TempDir::new().expect("tempdir");
    write(&outside.path().join("secret.md"), "secret");
    std::fs::create_dir_all(temp.path().join("memory")).unwrap();
    std::os::unix::fs::symlink(
        outside.path().join("secret.md"),
        temp.path().join("memory/link.md"),
    )
    .unwrap();
    let manager = manager_for(&temp, quiet_settings());

    assert_rejected(&manager, "memory/link.md").await;
}

#[tokio::test]
async fn test_reads_from_extra_paths() {
    let temp = TempDir::new().expect("tempdir");
    let shared = TempDir::new().expect("tempdir");
    write(&shared.path().join("docs/guide.md"), "guide");
    write(&shared.path().join("docs/guide.txt"), "guide text");
    write(&shared.path().join("single.md"), "single");
    write(&shared.path().join("other.md"), "other");
    write(&temp.path().join("notes/team.md"), "team");

    let mut settings = quiet_settings();
    settings.extra_paths = vec![
        shared.path().join("docs").display().to_string(),
        shared.path().join("single.md").display().to_string(),
        "notes".to_string(),
    ];
    let manager = manager_for(&temp, settings);

    let guide = manager
        .read_file(ReadFileRequest::new(
            shared.path().join("docs/guide.md").display().to_string(),
        ))
        .await
        .expect("read");
    assert_eq!(guide.text, "guide");
    assert!(guide.path.ends_with("docs/guide.md"));

    let single = manager
        .read_file(ReadFileRequest::new(
            shared.path().join("single.md").display().to_string(),
        ))
        .await
        .expect("read");
    assert_eq!(single.text, "single");

    let team = manager
        .read_file(ReadFileRequest::new("notes/team.md"))
        .await
        .expect("read");
    assert_eq!(team.path, "notes/team.md");

    assert_rejected(&manager, &shared.path().join("docs/guide.txt").display().to_string()).await;
    assert_rejected(&manager, &shared.path().join("other.md").display().to_string()).await;
    assert_rejected(&manager, &shared.path().join("docs").display().to_string()).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_extra_path_grants_nothing() {
    let temp = TempDir::new().expect("tempdir");
    let shared = TempDir::new().expect("tempdir");
    write(&shared.path().join("docs/guide.md"), "guide");
    std::os::unix::fs::symlink(shared.path().join("docs"), temp.path().join("linked")).unwrap();

    let mut settings = quiet_settings();
    settings.extra_paths = vec!["linked".to_string()];
    let manager = manager_for(&temp, settings);

    assert_rejected(&manager, "linked/guide.md").await;
}
