//! Integration tests for the snapshot store

use crate::common::{customer, init_logging, loan, transaction};
use saccobook::kv::{KvStore, MemoryKv};
use saccobook::model::{audit_actions, BackupKind, TxKind};
use saccobook::{SaccoError, Store, BACKUPS_KEY, BACKUP_HISTORY_CAP, DATA_KEY};

#[test]
fn save_then_reload_round_trips_the_snapshot() {
    init_logging();
    let kv = MemoryKv::new();

    let mut store = Store::load(&kv);
    store.snapshot_mut().customers.push(customer(101, 250.0));
    store
        .snapshot_mut()
        .transactions
        .push(transaction("t1", 101, TxKind::Daily, 250.0));
    store.save().unwrap();

    let reloaded = Store::load(&kv);
    assert_eq!(reloaded.snapshot().customers.len(), 1);
    assert_eq!(reloaded.snapshot().customers[0].name, "Customer 101");
    assert_eq!(reloaded.snapshot().transactions[0].id, "t1");
}

#[test]
fn save_recomputes_metadata_from_collections() {
    let mut store = Store::load(MemoryKv::new());
    store.snapshot_mut().customers.push(customer(101, 40.0));
    store.snapshot_mut().customers.push(customer(102, 60.0));
    store.snapshot_mut().loans.push(loan("L1", 101, 500.0));

    // Hand-edit metadata to nonsense; save must overwrite it.
    store.snapshot_mut().metadata.total_savings = 9999.0;
    store.snapshot_mut().metadata.total_customers = 42;
    store.save().unwrap();

    let meta = &store.snapshot().metadata;
    assert_eq!(meta.total_customers, 2);
    assert_eq!(meta.total_savings, 100.0);
    assert_eq!(meta.total_loans, 500.0);
    assert_eq!(meta.last_customer_id, 102);
    assert!(meta.last_updated.is_some());
}

#[test]
fn save_appends_data_saved_audit_entry() {
    let mut store = Store::load(MemoryKv::new());
    store.snapshot_mut().customers.push(customer(101, 0.0));
    store.save().unwrap();

    let entry = &store.snapshot().audit_log[0];
    assert_eq!(entry.action, audit_actions::DATA_SAVED);
    // 1 customer + 1 seeded admin user
    assert_eq!(entry.details["item_count"], serde_json::json!(2));
}

#[test]
fn backup_history_is_capped_most_recent_first() {
    let mut store = Store::load(MemoryKv::new());

    for i in 0..(BACKUP_HISTORY_CAP + 5) {
        store
            .snapshot_mut()
            .settings
            .insert("round".into(), serde_json::json!(i));
        store.create_backup(BackupKind::AutoBackup).unwrap();
    }

    assert_eq!(store.backups().len(), BACKUP_HISTORY_CAP);
    // Most recent first: the last round taken sits at index 0.
    assert_eq!(
        store.backups()[0].data.settings["round"],
        serde_json::json!(BACKUP_HISTORY_CAP + 4)
    );
    assert_eq!(
        store.backups()[BACKUP_HISTORY_CAP - 1].data.settings["round"],
        serde_json::json!(5)
    );
}

#[test]
fn create_backup_persists_history_but_not_snapshot() {
    let kv = MemoryKv::new();
    let mut store = Store::load(&kv);
    store.snapshot_mut().customers.push(customer(101, 10.0));

    store.create_backup(BackupKind::Manual).unwrap();

    assert!(kv.get(BACKUPS_KEY).unwrap().is_some());
    // The live snapshot was never saved.
    assert!(kv.get(DATA_KEY).unwrap().is_none());
    assert_eq!(store.backups()[0].customer_count, 1);
}

#[test]
fn restore_backup_swaps_state_and_takes_safety_backup() {
    let kv = MemoryKv::new();
    let mut store = Store::load(&kv);

    store.snapshot_mut().customers.push(customer(101, 10.0));
    store.create_backup(BackupKind::Manual).unwrap();

    store.snapshot_mut().customers.push(customer(102, 20.0));
    store.save().unwrap();

    // Restore the manual backup (index 0): back to one customer.
    store.restore_backup(0).unwrap();
    assert_eq!(store.snapshot().customers.len(), 1);
    assert_eq!(store.snapshot().audit_log[1].action, audit_actions::BACKUP_RESTORED);

    // The safety backup of the two-customer state leads the history.
    assert_eq!(store.backups()[0].kind, BackupKind::PreRestoreBackup);
    assert_eq!(store.backups()[0].customer_count, 2);

    // And restoring it brings the second customer back.
    store.restore_backup(0).unwrap();
    assert_eq!(store.snapshot().customers.len(), 2);
}

#[test]
fn restore_backup_out_of_range_is_not_found() {
    let mut store = Store::load(MemoryKv::new());
    store.create_backup(BackupKind::Manual).unwrap();

    let err = store.restore_backup(5).unwrap_err();
    assert!(matches!(err, SaccoError::NotFound { index: 5, len: 1 }));
    // Nothing changed: no safety backup was taken.
    assert_eq!(store.backups().len(), 1);
}

#[test]
fn audit_log_is_capped() {
    let mut store = Store::load(MemoryKv::new());
    for _ in 0..1100 {
        store.append_audit("TEST_ACTION", serde_json::Value::Null);
    }
    assert_eq!(store.snapshot().audit_log.len(), saccobook::AUDIT_LOG_CAP);
}
