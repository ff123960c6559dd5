//! Persistence tests for the publish-time cache file.

use std::io::Write;
use std::sync::Arc;

use libyear::cache::{CachedRelease, VersionStore};
use semver::Version;

fn release(path: &str, version: &str, time: &str) -> CachedRelease {
    CachedRelease {
        path: path.to_string(),
        version: Version::parse(version).unwrap(),
        time: time.parse().unwrap(),
    }
}

#[test]
fn entries_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("modules");

    let store = VersionStore::open(&cache_file).unwrap();
    store
        .insert(release("golang.org/x/text", "0.14.0", "2023-11-02T15:04:05Z"))
        .unwrap();
    store
        .insert(release("golang.org/x/sync", "0.6.0", "2024-01-09T18:00:00Z"))
        .unwrap();
    drop(store);

    let reopened = VersionStore::open(&cache_file).unwrap();
    assert_eq!(reopened.len(), 2);
    let loaded = reopened
        .get("golang.org/x/text", &Version::parse("0.14.0").unwrap())
        .unwrap();
    assert_eq!(
        loaded.time,
        "2023-11-02T15:04:05Z"
            .parse::<chrono::DateTime<chrono::Utc>>()
            .unwrap()
    );
}

#[test]
fn open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("nested").join("deeper").join("modules");

    let store = VersionStore::open(&cache_file).unwrap();

    assert!(store.is_empty());
    assert!(cache_file.exists());
}

#[test]
fn duplicate_log_entries_keep_the_first_record() {
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("modules");
    let mut file = std::fs::File::create(&cache_file).unwrap();
    writeln!(
        file,
        r#"{{"path":"golang.org/x/text","version":"0.14.0","time":"2023-11-02T15:04:05Z"}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"path":"golang.org/x/text","version":"0.14.0","time":"2024-06-01T00:00:00Z"}}"#
    )
    .unwrap();
    drop(file);

    let store = VersionStore::open(&cache_file).unwrap();

    assert_eq!(store.len(), 1);
    let loaded = store
        .get("golang.org/x/text", &Version::parse("0.14.0").unwrap())
        .unwrap();
    assert_eq!(
        loaded.time,
        "2023-11-02T15:04:05Z"
            .parse::<chrono::DateTime<chrono::Utc>>()
            .unwrap()
    );
}

#[test]
fn racing_inserts_of_the_same_release_persist_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("modules");
    let store = Arc::new(VersionStore::open(&cache_file).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store
                    .insert(release("golang.org/x/text", "0.14.0", "2023-11-02T15:04:05Z"))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 1);
    let contents = std::fs::read_to_string(&cache_file).unwrap();
    assert_eq!(contents.lines().count(), 1);
}
