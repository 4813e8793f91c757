//! File-backed snapshot store tests.

use idle_core::error::GameError;
use idle_core::persistence::{GameSnapshot, SnapshotStore};
use idle_core::state::Timestamp;
use idle_headless::store::{FileStore, StoreFormat};
use idle_test_utils::fixtures::{mid_game_state, standard_engine};

#[test]
fn test_missing_file_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("absent.json"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("save.json");
    let engine = standard_engine();
    let state = mid_game_state(&engine);

    let mut store = FileStore::new(&path);
    assert_eq!(store.format(), StoreFormat::Json);
    store.save(&GameSnapshot::capture(&state)).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"lastUpdateTimestamp\""), "{text}");

    let restored = store
        .load()
        .unwrap()
        .unwrap()
        .restore(&engine, Timestamp::ZERO)
        .unwrap();
    assert_eq!(restored.state_hash(), state.state_hash());
}

#[test]
fn test_binary_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let engine = standard_engine();
    let snapshot = GameSnapshot::capture(&mid_game_state(&engine));

    let mut store = FileStore::new(dir.path().join("save.bin"));
    assert_eq!(store.format(), StoreFormat::Binary);
    store.save(&snapshot).unwrap();
    assert_eq!(store.load().unwrap(), Some(snapshot));
}

#[test]
fn test_save_creates_parent_directories_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles").join("main").join("save.json");
    let mut store = FileStore::new(&path);

    store.save(&GameSnapshot::default()).unwrap();
    store.save(&GameSnapshot::default()).unwrap();

    assert!(path.exists());
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_garbage_is_corrupt_and_clear_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("save.bin");
    std::fs::write(&path, [0xff, 0x01]).unwrap();

    let mut store = FileStore::new(&path);
    assert!(matches!(
        store.load(),
        Err(GameError::CorruptPersistedState(_))
    ));

    store.clear().unwrap();
    assert!(!path.exists());
    store.clear().unwrap();
    assert!(store.load().unwrap().is_none());
}
