//! # Core Operation Tests
//!
//! End-to-end coverage of the public surface against a real directory:
//! append (single and batched), reads by id, and the three truncation
//! flavors, including every boundary case of the id-range contract.

use chunklog::{Error, LogDb};
use tempfile::{tempdir, TempDir};

const CHUNK_SIZE: u32 = 113;
const NUM_ENTRIES: u64 = 255;

fn entry(i: u64) -> Vec<u8> {
    format!("entry-{}", i).into_bytes()
}

fn create_db() -> (LogDb, TempDir) {
    let dir = tempdir().unwrap();
    let db = LogDb::create(dir.path().join("log"), CHUNK_SIZE).unwrap();
    (db, dir)
}

/// Append `entry-0` .. `entry-254` and sanity-check the boundaries.
fn fill_db(db: &LogDb) -> Vec<Vec<u8>> {
    let entries: Vec<Vec<u8>> = (0..NUM_ENTRIES).map(entry).collect();
    db.append_entries(&entries).unwrap();
    assert_eq!(db.oldest_id().unwrap(), 1);
    assert_eq!(db.newest_id().unwrap(), NUM_ENTRIES);
    entries
}

mod append_tests {
    use super::*;

    #[test]
    fn ids_start_at_one() {
        let (db, _dir) = create_db();

        let id = db.append(&[42]).unwrap();

        assert_eq!(id, 1);
        assert_eq!(db.oldest_id().unwrap(), 1);
        assert_eq!(db.newest_id().unwrap(), 1);
        assert_eq!(db.next_id().unwrap(), 2);
        assert_eq!(db.get(1).unwrap(), vec![42]);
    }

    #[test]
    fn appends_assign_sequential_ids() {
        let (db, _dir) = create_db();

        for expected in 1..=20u64 {
            let id = db.append(format!("x{}", expected).as_bytes()).unwrap();
            assert_eq!(id, expected);
        }
    }

    #[test]
    fn every_appended_entry_reads_back() {
        let (db, _dir) = create_db();

        let entries: Vec<Vec<u8>> = (0..NUM_ENTRIES).map(entry).collect();
        for e in &entries {
            db.append(e).unwrap();
        }

        assert_eq!(db.oldest_id().unwrap(), 1);
        assert_eq!(db.newest_id().unwrap(), NUM_ENTRIES);
        for (i, e) in entries.iter().enumerate() {
            assert_eq!(&db.get(i as u64 + 1).unwrap(), e, "entry {}", i + 1);
        }
    }

    #[test]
    fn batched_appends_match_single_appends() {
        let (db, _dir) = create_db();

        let entries = fill_db(&db);

        for (i, e) in entries.iter().enumerate() {
            assert_eq!(&db.get(i as u64 + 1).unwrap(), e);
        }
    }

    #[test]
    fn oversized_entry_is_rejected() {
        let dir = tempdir().unwrap();
        let db = LogDb::create(dir.path().join("log"), 1).unwrap();

        let err = db.append(&[1, 2, 3, 4, 5]).unwrap_err();

        assert!(matches!(
            err,
            Error::TooBig {
                len: 5,
                chunk_size: 1
            }
        ));
        assert_eq!(db.newest_id().unwrap(), 0);
    }

    #[test]
    fn entry_may_fill_a_chunk_exactly() {
        let dir = tempdir().unwrap();
        let db = LogDb::create(dir.path().join("log"), 8).unwrap();

        db.append(b"8bytes!!").unwrap();
        db.append(b"8bytes??").unwrap();

        assert_eq!(db.get(1).unwrap(), b"8bytes!!");
        assert_eq!(db.get(2).unwrap(), b"8bytes??");
    }

    #[test]
    fn empty_entry_is_rejected() {
        let (db, _dir) = create_db();

        let err = db.append(&[]).unwrap_err();

        assert!(matches!(err, Error::EmptyEntry));
    }

    #[test]
    fn get_rejects_out_of_range_ids() {
        let (db, _dir) = create_db();

        assert!(matches!(db.get(0), Err(Error::IdOutOfRange { id: 0 })));
        assert!(matches!(db.get(1), Err(Error::IdOutOfRange { id: 1 })));

        db.append(b"only").unwrap();

        assert!(matches!(db.get(0), Err(Error::IdOutOfRange { id: 0 })));
        assert!(db.get(1).is_ok());
        assert!(matches!(db.get(2), Err(Error::IdOutOfRange { id: 2 })));
    }
}

mod forget_tests {
    use super::*;

    #[test]
    fn forget_zero_on_empty_database_is_a_noop() {
        let (db, _dir) = create_db();

        db.forget(0).unwrap();

        assert_eq!(db.oldest_id().unwrap(), 0);
        assert_eq!(db.newest_id().unwrap(), 0);
    }

    #[test]
    fn forget_at_or_below_oldest_is_a_noop() {
        let (db, _dir) = create_db();
        db.append(b"hello world").unwrap();

        db.forget(0).unwrap();
        db.forget(1).unwrap();

        assert_eq!(db.oldest_id().unwrap(), 1);
        assert_eq!(db.newest_id().unwrap(), 1);
    }

    #[test]
    fn forget_past_next_id_is_out_of_range() {
        let (db, _dir) = create_db();
        db.append(b"hello world").unwrap();

        let err = db.forget(3).unwrap_err();

        assert!(matches!(err, Error::IdOutOfRange { id: 3 }));
        assert_eq!(db.oldest_id().unwrap(), 1);
    }

    #[test]
    fn forget_advances_the_oldest_id() {
        let (db, _dir) = create_db();
        let entries = fill_db(&db);

        db.forget(51).unwrap();

        assert_eq!(db.oldest_id().unwrap(), 51);
        assert_eq!(db.newest_id().unwrap(), NUM_ENTRIES);
        assert!(matches!(db.get(50), Err(Error::IdOutOfRange { id: 50 })));
        assert_eq!(db.get(51).unwrap(), entries[50]);
        assert_eq!(db.get(51).unwrap(), b"entry-50");
        for i in 51..=NUM_ENTRIES {
            assert_eq!(&db.get(i).unwrap(), &entries[i as usize - 1]);
        }
    }

    #[test]
    fn forget_to_next_id_empties_the_database() {
        let (db, _dir) = create_db();
        db.append(b"a").unwrap();
        db.append(b"b").unwrap();

        db.forget(3).unwrap();

        assert_eq!(db.newest_id().unwrap(), 0);
        assert!(matches!(db.get(2), Err(Error::IdOutOfRange { .. })));

        // Ids keep counting from where the log left off.
        assert_eq!(db.append(b"c").unwrap(), 3);
        assert_eq!(db.get(3).unwrap(), b"c");
    }
}

mod rollback_tests {
    use super::*;

    #[test]
    fn rollback_zero_on_empty_database_is_a_noop() {
        let (db, _dir) = create_db();

        db.rollback(0).unwrap();

        assert_eq!(db.oldest_id().unwrap(), 0);
        assert_eq!(db.newest_id().unwrap(), 0);
    }

    #[test]
    fn rollback_at_or_above_newest_is_a_noop() {
        let (db, _dir) = create_db();
        db.append(b"hello world").unwrap();

        db.rollback(1).unwrap();
        db.rollback(2).unwrap();

        assert_eq!(db.oldest_id().unwrap(), 1);
        assert_eq!(db.newest_id().unwrap(), 1);
    }

    #[test]
    fn rollback_below_oldest_is_out_of_range() {
        let (db, _dir) = create_db();
        db.append(b"hello world").unwrap();

        let err = db.rollback(0).unwrap_err();

        assert!(matches!(err, Error::IdOutOfRange { id: 0 }));
        assert_eq!(db.newest_id().unwrap(), 1);
    }

    #[test]
    fn rollback_lowers_the_newest_id() {
        let (db, _dir) = create_db();
        let entries = fill_db(&db);

        db.rollback(205).unwrap();

        assert_eq!(db.oldest_id().unwrap(), 1);
        assert_eq!(db.newest_id().unwrap(), 205);
        assert!(matches!(db.get(206), Err(Error::IdOutOfRange { id: 206 })));
        assert_eq!(db.get(205).unwrap(), b"entry-204");
        for i in 1..=205 {
            assert_eq!(&db.get(i).unwrap(), &entries[i as usize - 1]);
        }
    }

    #[test]
    fn rolled_back_ids_are_reassigned() {
        let (db, _dir) = create_db();
        db.append(b"keep").unwrap();
        db.append(b"drop").unwrap();

        db.rollback(1).unwrap();

        assert_eq!(db.append(b"new").unwrap(), 2);
        assert_eq!(db.get(2).unwrap(), b"new");
    }
}

mod truncate_tests {
    use super::*;

    #[test]
    fn truncate_shrinks_both_ends() {
        let (db, _dir) = create_db();
        let entries = fill_db(&db);

        db.truncate(21, 225).unwrap();

        assert_eq!(db.oldest_id().unwrap(), 21);
        assert_eq!(db.newest_id().unwrap(), 225);
        assert!(matches!(db.get(20), Err(Error::IdOutOfRange { .. })));
        assert!(matches!(db.get(226), Err(Error::IdOutOfRange { .. })));
        for i in 21..=225 {
            assert_eq!(&db.get(i).unwrap(), &entries[i as usize - 1]);
        }
    }

    #[test]
    fn truncate_rejects_lowering_the_oldest_id() {
        let (db, _dir) = create_db();
        fill_db(&db);
        db.forget(10).unwrap();

        let err = db.truncate(5, 200).unwrap_err();

        assert!(matches!(err, Error::IdOutOfRange { id: 5 }));
    }

    #[test]
    fn truncate_rejects_a_newest_id_past_next() {
        let (db, _dir) = create_db();
        fill_db(&db);

        let err = db.truncate(1, 257).unwrap_err();

        assert!(matches!(err, Error::IdOutOfRange { id: 257 }));
        assert_eq!(db.newest_id().unwrap(), NUM_ENTRIES);
    }

    #[test]
    fn truncate_rejects_a_crossed_range() {
        let (db, _dir) = create_db();
        fill_db(&db);

        let err = db.truncate(30, 10).unwrap_err();

        assert!(matches!(err, Error::IdOutOfRange { id: 30 }));
    }

    #[test]
    fn truncate_to_adjacent_ids_empties_mid_range() {
        let (db, _dir) = create_db();
        fill_db(&db);

        db.truncate(100, 99).unwrap();

        assert_eq!(db.newest_id().unwrap(), 0);
        assert!(matches!(db.get(99), Err(Error::IdOutOfRange { .. })));
        assert_eq!(db.append(b"resumed").unwrap(), 100);
        assert_eq!(db.get(100).unwrap(), b"resumed");
    }

    #[test]
    fn truncate_zero_zero_on_empty_database_is_a_noop() {
        let (db, _dir) = create_db();

        db.truncate(0, 0).unwrap();

        assert_eq!(db.oldest_id().unwrap(), 0);
        assert_eq!(db.newest_id().unwrap(), 0);
    }
}

mod batch_tests {
    use super::*;

    #[test]
    fn failed_batch_leaves_prior_entries_untouched() {
        let (db, _dir) = create_db();
        let entries = fill_db(&db);

        let oversized = vec![0u8; CHUNK_SIZE as usize + 1];
        let batch = vec![b"one".to_vec(), oversized, b"three".to_vec()];
        let err = db.append_entries(&batch).unwrap_err();

        assert!(matches!(err, Error::TooBig { .. }));
        assert_eq!(db.oldest_id().unwrap(), 1);
        assert_eq!(db.newest_id().unwrap(), NUM_ENTRIES);
        for (i, e) in entries.iter().enumerate() {
            assert_eq!(&db.get(i as u64 + 1).unwrap(), e);
        }
        assert!(matches!(
            db.get(NUM_ENTRIES + 1),
            Err(Error::IdOutOfRange { .. })
        ));
    }

    #[test]
    fn failed_batch_on_a_virgin_database_restores_it_to_empty() {
        let (db, dir) = create_db();

        let oversized = vec![0u8; CHUNK_SIZE as usize + 1];
        let batch = vec![b"one".to_vec(), b"two".to_vec(), oversized];
        let err = db.append_entries(&batch).unwrap_err();

        assert!(matches!(err, Error::TooBig { .. }));
        assert_eq!(db.oldest_id().unwrap(), 0);
        assert_eq!(db.newest_id().unwrap(), 0);
        assert_eq!(db.next_id().unwrap(), 0);

        // The chunk allocated for the rolled-back prefix is gone.
        assert!(!dir.path().join("log").join("chunk_0").exists());

        assert_eq!(db.append(b"fresh").unwrap(), 1);
    }

    #[test]
    fn a_failed_rollback_surfaces_both_errors() {
        let dir = tempdir().unwrap();
        let db = LogDb::create(dir.path().join("log"), 8).unwrap();
        db.append(b"aaaa").unwrap();
        db.sync().unwrap();

        // Block the metadata rewrite the rollback will need: the atomic
        // replace stages through `chunk_0_meta.tmp`, and a directory at
        // that path makes the staging write fail. The batch itself never
        // touches it (its appends only create `chunk_1` files).
        std::fs::create_dir(db.path().join("chunk_0_meta.tmp")).unwrap();

        // Two entries land (the second in a fresh chunk), then an
        // oversized one fails the batch; rolling the prefix back has to
        // sync the shrunk chunk_0 metadata, which is blocked above.
        let batch = vec![b"bbbb".to_vec(), b"cccc".to_vec(), vec![0u8; 9]];
        let err = db.append_entries(&batch).unwrap_err();

        match err {
            Error::Atomicity { append, rollback } => {
                assert!(matches!(
                    *append,
                    Error::TooBig {
                        len: 9,
                        chunk_size: 8
                    }
                ));
                assert!(matches!(*rollback, Error::Sync { .. }));
            }
            other => panic!("expected an atomicity error, got: {}", other),
        }
    }

    #[test]
    fn appends_continue_after_a_successful_batch() {
        let (db, _dir) = create_db();

        db.append_entries(&[b"a".to_vec(), b"b".to_vec()]).unwrap();
        let id = db.append(b"c").unwrap();

        assert_eq!(id, 3);
        assert_eq!(db.get(3).unwrap(), b"c");
    }
}
