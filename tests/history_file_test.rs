use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use caption_api::codec::encode;
use caption_api::history::{FileBackend, HistoryRecord, HistoryStore, HISTORY_STORAGE_KEY};

fn record(bytes: &[u8], caption: &str) -> HistoryRecord {
    HistoryRecord::new(&encode(bytes, "image/png"), caption)
}

#[test]
fn test_history_survives_reopen() {
    let dir = tempdir().unwrap();

    let store = HistoryStore::new(FileBackend::new(dir.path()));
    store.append(record(b"one", "first")).unwrap();
    store.append(record(b"two", "second")).unwrap();
    drop(store);

    let reopened = HistoryStore::new(FileBackend::new(dir.path()));
    let captions: Vec<String> = reopened.list().into_iter().map(|r| r.caption).collect();
    assert_eq!(captions, vec!["second", "first"]);
}

#[test]
fn test_slot_file_named_after_storage_key() {
    let dir = tempdir().unwrap();
    let backend = FileBackend::new(dir.path().join("nested"));
    assert_eq!(
        backend.path().file_name().and_then(|n| n.to_str()),
        Some(format!("{}.json", HISTORY_STORAGE_KEY).as_str())
    );

    let store = HistoryStore::new(backend.clone());
    assert!(store.list().is_empty());
    store.append(record(b"x", "created on first write")).unwrap();
    assert!(backend.path().exists());
    assert!(!backend.path().with_extension("json.tmp").exists());
}

#[test]
fn test_corrupt_file_reads_as_empty() {
    let dir = tempdir().unwrap();
    let backend = FileBackend::new(dir.path());
    fs::write(backend.path(), "{ definitely not a list").unwrap();

    let store = HistoryStore::new(backend);
    assert!(store.list().is_empty());

    store.append(record(b"y", "fresh start")).unwrap();
    assert_eq!(store.list().len(), 1);
}

#[test]
fn test_delete_and_clear_persist() {
    let dir = tempdir().unwrap();
    let store = HistoryStore::new(FileBackend::new(dir.path()));
    let keep = record(b"keep", "keep me");
    let drop_me = record(b"drop", "drop me");
    let drop_id = drop_me.id.clone();
    store.append(keep.clone()).unwrap();
    store.append(drop_me).unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store.delete_by_id(&drop_id).unwrap();
    let reopened = HistoryStore::new(FileBackend::new(dir.path()));
    assert_eq!(reopened.list(), vec![keep]);

    store.clear().unwrap();
    let reopened = HistoryStore::new(FileBackend::new(dir.path()));
    assert!(reopened.list().is_empty());
    assert_eq!(notified.load(Ordering::SeqCst), 2);
}
