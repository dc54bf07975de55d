//! Named profile storage.

use presso_config::ProfileDir;
use presso_core::mocks::MemoryStore;
use presso_core::{CsvProfileStore, Profile, ProfilePoint, ProfileStore, StoreError};
use rstest::rstest;

fn csv_store() -> (tempfile::TempDir, CsvProfileStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvProfileStore::new(ProfileDir::new(dir.path().join("profiles")));
    (dir, store)
}

#[test]
fn csv_round_trip_preserves_points() {
    let (_tmp, mut store) = csv_store();
    let profile = Profile::from_points(vec![
        ProfilePoint::new(0.0, 9.0),
        ProfilePoint::new(4.5, 8.25),
        ProfilePoint::new(12.125, 3.0),
        ProfilePoint::new(30.0, 9.5),
    ])
    .unwrap();
    store.save("blooming", &profile).unwrap();
    let loaded = store.load("blooming").unwrap();
    assert_eq!(loaded.len(), profile.len());
    for (a, b) in loaded.points().iter().zip(profile.points()) {
        assert!((a.time - b.time).abs() < 1e-9);
        assert!((a.pressure - b.pressure).abs() < 1e-9);
    }
    assert_eq!(
        store.list().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["blooming".to_string()]
    );
}

#[test]
fn missing_profile_is_not_found() {
    let (_tmp, store) = csv_store();
    assert!(matches!(store.load("nope"), Err(StoreError::NotFound(n)) if n == "nope"));
}

#[test]
fn stored_profile_out_of_range_is_rejected() {
    let (tmp, store) = csv_store();
    let dir = tmp.path().join("profiles");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("hot.csv"), "time,pressure\n0,9\n5,12\n").unwrap();
    let err = store.load("hot").unwrap_err();
    assert!(matches!(err, StoreError::Profile { ref name, .. } if name == "hot"));
}

#[rstest]
#[case("../escape")]
#[case("")]
#[case("with space")]
fn invalid_names_are_rejected(#[case] name: &str) {
    let (_tmp, mut store) = csv_store();
    assert!(matches!(
        store.save(name, &Profile::classic()),
        Err(StoreError::InvalidName(_))
    ));
    let mut mem = MemoryStore::new();
    assert!(matches!(
        mem.save(name, &Profile::classic()),
        Err(StoreError::InvalidName(_))
    ));
}

#[test]
fn memory_store_lists_sorted() {
    let mut mem = MemoryStore::new();
    mem.save("turbo", &Profile::classic()).unwrap();
    mem.save("classic", &Profile::classic()).unwrap();
    let names: Vec<String> = mem.list().unwrap().into_iter().collect();
    assert_eq!(names, vec!["classic", "turbo"]);
    assert_eq!(mem.load("turbo").unwrap(), Profile::classic());
}
