//! Record Store integration tests against `SQLite`.
//!
//! Covers:
//! - Existence-gated create/update/delete
//! - Field-preserving partial updates
//! - All-or-nothing batch inserts
//! - Search filter composition
//! - Concurrent use through a shared store
//! - Connection failures at open and acquire

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use userstore::{ConnectionManager, Error, Record, RecordStore, SearchFilter, StoreConfig};

fn memory_store() -> RecordStore {
    RecordStore::open("sqlite::memory:").unwrap()
}

fn file_target(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("users.db").display())
}

fn ids(records: &[Record]) -> BTreeSet<i64> {
    records.iter().map(|r| r.id).collect()
}

/// Seeds the search fixture: three "john" emails, subjects spread over 3..12.
fn seed_search_fixture(store: &RecordStore) {
    store
        .create_batch(&[
            Record::new(10010, "john.doe@example.com", 5),
            Record::new(10011, "jane.smith@example.com", 10),
            Record::new(10012, "john.wick@example.org", 3),
            Record::new(10013, "alice.johnson@example.net", 7),
            Record::new(10014, "bob.brown@example.com", 12),
        ])
        .unwrap();
}

// ============================================================================
// Create / Get
// ============================================================================

mod create_and_get {
    use super::*;

    #[test]
    fn test_create_then_get_returns_same_fields() {
        let store = memory_store();
        assert_eq!(store.create(10001, "test@example.com", 5).unwrap(), 1);

        let record = store.get(10001).unwrap().unwrap();
        assert_eq!(record, Record::new(10001, "test@example.com", 5));
    }

    #[test]
    fn test_get_absent_is_none_not_error() {
        assert_eq!(memory_store().get(424_242).unwrap(), None);
    }

    #[test]
    fn test_second_create_fails_and_keeps_first() {
        let store = memory_store();
        store.create(10001, "first@example.com", 1).unwrap();

        let err = store.create(10001, "second@example.com", 2).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { id: 10001, ref operation } if operation == "create"));
        assert!(err.is_precondition());
        assert_eq!(
            store.get(10001).unwrap(),
            Some(Record::new(10001, "first@example.com", 1))
        );
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_get_all_and_exists() {
        let store = memory_store();
        store.create(1, "a@x", 1).unwrap();
        store.create(2, "b@x", 2).unwrap();

        assert_eq!(ids(&store.get_all().unwrap()), BTreeSet::from([1, 2]));
        assert!(store.exists(1).unwrap());
        assert!(!store.exists(3).unwrap());
    }

    #[test]
    fn test_get_by_email_is_exact() {
        let store = memory_store();
        store.create(10030, "shared@example.com", 1).unwrap();
        store.create(10031, "shared@example.com", 2).unwrap();
        store.create(10032, "other.shared@example.com", 3).unwrap();

        let found = store.get_by_email("shared@example.com").unwrap();
        assert_eq!(ids(&found), BTreeSet::from([10030, 10031]));
        assert!(store.get_by_email("nobody@example.com").unwrap().is_empty());
    }

    #[test]
    fn test_count_is_stable_without_writes() {
        let store = memory_store();
        store.create(1, "a@x", 1).unwrap();

        assert_eq!(store.count().unwrap(), store.count().unwrap());
    }
}

// ============================================================================
// Update / Delete
// ============================================================================

mod mutation {
    use super::*;
    use test_case::test_case;

    #[test_case("update"; "update")]
    #[test_case("update_email"; "update email")]
    #[test_case("update_subject"; "update subject")]
    #[test_case("delete"; "delete")]
    fn test_mutating_absent_id_is_not_found(operation: &str) {
        let store = memory_store();
        store.create(1, "keep@x", 1).unwrap();

        let result = match operation {
            "update" => store.update(99, "new@x", 2),
            "update_email" => store.update_email(99, "new@x"),
            "update_subject" => store.update_subject(99, 2),
            "delete" => store.delete(99),
            other => panic!("unknown operation {other}"),
        };

        let err = result.unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 99, .. }));
        assert_eq!(err.record_id(), Some(99));
        assert_eq!(store.get_all().unwrap(), vec![Record::new(1, "keep@x", 1)]);
    }

    #[test]
    fn test_update_overwrites_both_fields() {
        let store = memory_store();
        store.create(1, "old@x", 1).unwrap();

        assert_eq!(store.update(1, "new@x", 2).unwrap(), 1);
        assert_eq!(store.get(1).unwrap(), Some(Record::new(1, "new@x", 2)));
    }

    #[test]
    fn test_update_email_preserves_subject() {
        let store = memory_store();
        store.create(1, "old@x", 7).unwrap();

        assert_eq!(store.update_email(1, "new@x").unwrap(), 1);
        assert_eq!(store.get(1).unwrap(), Some(Record::new(1, "new@x", 7)));
    }

    #[test]
    fn test_update_subject_preserves_email() {
        let store = memory_store();
        store.create(1, "keep@x", 7).unwrap();

        assert_eq!(store.update_subject(1, 8).unwrap(), 1);
        assert_eq!(store.get(1).unwrap(), Some(Record::new(1, "keep@x", 8)));
    }

    #[test]
    fn test_delete_removes_only_target() {
        let store = memory_store();
        store.create(1, "a@x", 1).unwrap();
        store.create(2, "b@x", 2).unwrap();

        assert_eq!(store.delete(1).unwrap(), 1);
        assert!(!store.exists(1).unwrap());
        assert!(store.exists(2).unwrap());
    }

    #[test]
    fn test_delete_all_returns_previous_count() {
        let store = memory_store();
        seed_search_fixture(&store);
        let before = store.count().unwrap();

        assert_eq!(store.delete_all().unwrap(), before);
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.delete_all().unwrap(), 0);
    }
}

// ============================================================================
// Batch
// ============================================================================

mod batch {
    use super::*;

    #[test]
    fn test_batch_inserts_then_skips_on_rerun() {
        let store = memory_store();
        let records = [Record::new(1, "a@x", 1), Record::new(2, "b@x", 2)];

        assert_eq!(store.create_batch(&records).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 2);

        assert_eq!(store.create_batch(&records).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_batch_skips_existing_without_overwriting() {
        let store = memory_store();
        store.create(10002, "existing@example.com", 1).unwrap();

        let inserted = store
            .create_batch(&[
                Record::new(10002, "replacement@example.com", 9),
                Record::new(10003, "batch3@example.com", 3),
                Record::new(10004, "batch4@example.com", 4),
            ])
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(
            store.get(10002).unwrap(),
            Some(Record::new(10002, "existing@example.com", 1))
        );
    }

    #[test]
    fn test_failing_row_rolls_back_whole_batch() {
        let dir = TempDir::new().unwrap();
        let target = file_target(&dir);
        let store = RecordStore::open(&target).unwrap();
        store.create(1, "before@x", 1).unwrap();

        // Make the store itself reject one row of the batch.
        {
            let mut conn = store.connections().acquire().unwrap();
            conn.batch_execute(
                "CREATE TRIGGER reject_666 BEFORE INSERT ON users
                 WHEN NEW.user_id = 666
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        }

        let err = store
            .create_batch(&[
                Record::new(2, "b@x", 2),
                Record::new(666, "bad@x", 6),
                Record::new(3, "c@x", 3),
            ])
            .unwrap_err();

        assert!(matches!(err, Error::Write { id: Some(666), ref operation, .. } if operation == "create_batch"));
        assert!(!err.is_precondition());
        assert_eq!(store.count().unwrap(), 1);
        assert!(!store.exists(2).unwrap());
    }

    #[test]
    fn test_failing_create_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(&file_target(&dir)).unwrap();
        {
            let mut conn = store.connections().acquire().unwrap();
            conn.batch_execute(
                "CREATE TRIGGER reject_all BEFORE INSERT ON users
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        }

        let err = store.create(1, "a@x", 1).unwrap_err();
        assert!(matches!(err, Error::Write { id: Some(1), .. }));
        assert_eq!(store.count().unwrap(), 0);
        // The store stays usable after a rollback.
        assert!(!store.exists(1).unwrap());
    }
}

// ============================================================================
// Search
// ============================================================================

mod search {
    use super::*;

    #[test]
    fn test_email_fragment_is_case_sensitive_substring() {
        let store = memory_store();
        seed_search_fixture(&store);
        store.create(10015, "JOHN.upper@example.com", 1).unwrap();

        let found = store
            .search(&SearchFilter::new().with_email_containing("john"))
            .unwrap();
        assert_eq!(ids(&found), BTreeSet::from([10010, 10012, 10013]));
    }

    #[test]
    fn test_subject_range_is_inclusive() {
        let store = memory_store();
        seed_search_fixture(&store);

        let found = store
            .search(&SearchFilter::new().with_min_subject_id(5).with_max_subject_id(10))
            .unwrap();
        assert_eq!(ids(&found), BTreeSet::from([10010, 10011, 10013]));
        assert!(found.iter().all(|r| (5..=10).contains(&r.subject_id)));
    }

    #[test]
    fn test_criteria_are_anded() {
        let store = memory_store();
        seed_search_fixture(&store);

        let found = store
            .search(
                &SearchFilter::new()
                    .with_email_containing("example")
                    .with_min_subject_id(5),
            )
            .unwrap();
        assert_eq!(ids(&found), BTreeSet::from([10010, 10011, 10013, 10014]));

        let found = store
            .search(
                &SearchFilter::new()
                    .with_email_containing("john")
                    .with_max_subject_id(4),
            )
            .unwrap();
        assert_eq!(ids(&found), BTreeSet::from([10012]));
    }

    #[test]
    fn test_empty_filter_and_empty_fragment_return_all() {
        let store = memory_store();
        seed_search_fixture(&store);

        assert_eq!(store.search(&SearchFilter::new()).unwrap().len(), 5);
        assert_eq!(
            store
                .search(&SearchFilter::new().with_email_containing(""))
                .unwrap()
                .len(),
            5
        );
    }

    #[test]
    fn test_wildcard_characters_match_literally() {
        let store = memory_store();
        store.create(1, "a_b@x", 1).unwrap();
        store.create(2, "acb@x", 1).unwrap();
        store.create(3, "100%@x", 1).unwrap();

        let underscore = store
            .search(&SearchFilter::new().with_email_containing("a_b"))
            .unwrap();
        assert_eq!(ids(&underscore), BTreeSet::from([1]));

        let percent = store
            .search(&SearchFilter::new().with_email_containing("%"))
            .unwrap();
        assert_eq!(ids(&percent), BTreeSet::from([3]));
    }

    #[test]
    fn test_hostile_fragment_is_bound() {
        let store = memory_store();
        seed_search_fixture(&store);

        let found = store
            .search(&SearchFilter::new().with_email_containing("' OR '1'='1"))
            .unwrap();
        assert!(found.is_empty());
        assert_eq!(store.count().unwrap(), 5);
    }
}

// ============================================================================
// Concurrency and connections
// ============================================================================

mod connections {
    use super::*;

    #[test]
    fn test_concurrent_creates_of_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::open(&file_target(&dir)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for n in 0..10 {
                        let id = worker * 100 + n;
                        store.create(id, &format!("user{id}@x"), n).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count().unwrap(), 80);
    }

    #[test]
    fn test_concurrent_creates_of_same_id_admit_exactly_one() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::open(&file_target(&dir)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.create(7, &format!("w{worker}@x"), worker))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, Error::AlreadyExists { id: 7, .. }))
        );
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_file_database_persists_across_stores() {
        let dir = TempDir::new().unwrap();
        let target = file_target(&dir);

        RecordStore::open(&target)
            .unwrap()
            .create(1, "a@x", 1)
            .unwrap();

        let reopened = RecordStore::open(&target).unwrap();
        assert_eq!(reopened.get(1).unwrap(), Some(Record::new(1, "a@x", 1)));
    }

    #[test]
    fn test_open_fails_when_unreachable() {
        let dir = TempDir::new().unwrap();
        let target = format!(
            "sqlite://{}",
            dir.path().join("no_such_dir").join("users.db").display()
        );
        let config = StoreConfig::default().with_acquire_timeout(Duration::from_millis(200));

        let err = RecordStore::open_with_config(&target, config).unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_open_rejects_unbounded_acquire_timeout() {
        let config = StoreConfig::default().with_acquire_timeout(Duration::from_secs(u64::MAX));

        let err = RecordStore::open_with_config("sqlite::memory:", config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_operation_fails_with_connection_error_when_pool_exhausted() {
        let config = StoreConfig::default().with_acquire_timeout(Duration::from_millis(50));
        let store = RecordStore::open_with_config("sqlite::memory:", config).unwrap();

        let _held = store.connections().acquire().unwrap();
        let err = store.count().unwrap_err();
        assert!(matches!(err, Error::Connection { ref operation, .. } if operation == "count"));
    }

    #[test]
    fn test_store_over_existing_manager() {
        let config = StoreConfig::default().with_table("accounts");
        let manager = ConnectionManager::open("sqlite::memory:", &config).unwrap();
        let store = RecordStore::new(manager, &config).unwrap();

        store.create(1, "a@x", 1).unwrap();
        assert_eq!(store.table(), "accounts");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_invalid_table_name_is_rejected() {
        let config = StoreConfig::default().with_table("users; DROP TABLE users");
        let err = RecordStore::open_with_config("sqlite::memory:", config).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
