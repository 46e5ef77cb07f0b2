//! Snapshot store: the sole writer of persisted bookkeeping state
//!
//! Each `Store` explicitly owns its kv handle, live snapshot, and backup
//! history, so tests (and embedders) can run any number of isolated stores
//! side by side. Persisted state is committed as one combined blob per
//! save: any externally visible state is fully pre-save or fully post-save.

use crate::error::{Result, SaccoError};
use crate::kv::KvStore;
use crate::model::{audit_actions, AuditEntry, BackupKind, BackupRecord, Metadata, Snapshot};
use crate::{AUDIT_LOG_CAP, BACKUPS_KEY, BACKUP_HISTORY_CAP, DATA_KEY};
use chrono::Utc;

pub struct Store<K: KvStore> {
    kv: K,
    snapshot: Snapshot,
    backups: Vec<BackupRecord>,
}

impl<K: KvStore> Store<K> {
    /// Load the store from persistence. Never fails: absent or unparsable
    /// records degrade to their documented defaults.
    pub fn load(kv: K) -> Self {
        let snapshot = match Self::read_record(&kv, DATA_KEY) {
            Some(snapshot) => snapshot,
            None => Snapshot::default(),
        };
        let backups = Self::read_record(&kv, BACKUPS_KEY).unwrap_or_default();

        Self {
            kv,
            snapshot,
            backups,
        }
    }

    fn read_record<T: serde::de::DeserializeOwned>(kv: &K, key: &str) -> Option<T> {
        let raw = match kv.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Read of '{}' failed, using defaults: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Record '{}' is unparsable, using defaults: {}", key, e);
                None
            }
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }

    /// Replace the live snapshot wholesale (migration hands over its result
    /// this way). The caller still has to `save`.
    pub fn replace_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
    }

    pub fn backups(&self) -> &[BackupRecord] {
        &self.backups
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Prepend an audit entry (most-recent-first, ring-capped).
    pub fn append_audit(&mut self, action: &str, details: serde_json::Value) {
        self.snapshot.audit_log.insert(
            0,
            AuditEntry {
                timestamp: Utc::now(),
                action: action.to_string(),
                details,
                actor: "system".to_string(),
            },
        );
        self.snapshot.audit_log.truncate(AUDIT_LOG_CAP);
    }

    /// Recompute metadata, record the save in the audit log, and commit the
    /// snapshot as a single blob write.
    ///
    /// On a storage failure the in-memory snapshot keeps its mutated state;
    /// a retry of `save` is idempotent.
    pub fn save(&mut self) -> Result<()> {
        self.snapshot.metadata = Metadata::derive(
            &self.snapshot.customers,
            &self.snapshot.transactions,
            &self.snapshot.loans,
            &self.snapshot.users,
            self.snapshot.metadata.last_customer_id,
        );
        self.append_audit(
            audit_actions::DATA_SAVED,
            serde_json::json!({ "item_count": self.snapshot.item_count() }),
        );

        let blob = serde_json::to_string(&self.snapshot)?;
        self.kv.set(DATA_KEY, &blob)?;
        log::debug!(
            "Saved snapshot: {} items, {} bytes",
            self.snapshot.item_count(),
            blob.len()
        );
        Ok(())
    }

    /// Take a backup of the current snapshot, prepend it to the history,
    /// truncate to the cap, and persist the history record only.
    pub fn create_backup(&mut self, kind: BackupKind) -> Result<()> {
        let record = BackupRecord {
            kind,
            created: Utc::now(),
            customer_count: self.snapshot.customers.len(),
            transaction_count: self.snapshot.transactions.len(),
            data: self.snapshot.clone(),
        };
        self.backups.insert(0, record);
        self.backups.truncate(BACKUP_HISTORY_CAP);

        let blob = serde_json::to_string(&self.backups)?;
        self.kv.set(BACKUPS_KEY, &blob)?;
        log::info!("Created {:?} backup ({} retained)", kind, self.backups.len());
        Ok(())
    }

    /// Replace the live snapshot with a backup's embedded copy.
    ///
    /// A safety backup of the current state is taken first, so the restore
    /// itself is reversible.
    pub fn restore_backup(&mut self, index: usize) -> Result<()> {
        if index >= self.backups.len() {
            return Err(SaccoError::not_found(index, self.backups.len()));
        }

        // Clone the target before the safety backup shifts the indices.
        let target = self.backups[index].data.clone();
        let target_kind = self.backups[index].kind;

        self.create_backup(BackupKind::PreRestoreBackup)?;
        self.snapshot = target;
        self.append_audit(
            audit_actions::BACKUP_RESTORED,
            serde_json::json!({ "index": index, "kind": target_kind }),
        );
        self.save()?;
        log::info!("Restored backup at index {}", index);
        Ok(())
    }
}
