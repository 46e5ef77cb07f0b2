//! Backup/restore exchange: checksummed export containers and merge-on-import
//!
//! The container is a plain JSON document the UI shell offers as a download
//! and feeds back from a file picker. Validation happens strictly before any
//! mutation; the merge never clobbers an existing record (existing wins on
//! id/username collisions, imported settings overlay existing ones).

use crate::error::{Result, SaccoError};
use crate::kv::KvStore;
use crate::model::{audit_actions, BackupKind, BackupRecord, Snapshot};
use crate::store::Store;
use crate::SCHEMA_VERSION;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Everything a container carries under `data`: the seven in-blob records
/// plus the backup history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    #[serde(default)]
    pub backup_history: Vec<BackupRecord>,
}

/// Outcome of a merge-on-import, for the UI shell to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub customers_imported: usize,
    pub transactions_imported: usize,
    pub users_imported: usize,
    pub loans_imported: usize,
    /// `None` when the container carried no checksum (e.g. the
    /// `system_info` exchanger variant)
    pub checksum_ok: Option<bool>,
}

/// Non-cryptographic rolling checksum: 32-bit signed wrapping accumulation
/// of character codes. Detects accidental corruption only; never treat it
/// as an integrity or authenticity control.
pub fn rolling_checksum(text: &str) -> i32 {
    let mut hash: i32 = 0;
    for c in text.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(c as i32);
    }
    hash
}

// The checksum is computed over the `data` object rendered through
// `serde_json::Value`, whose object keys are sorted. Export and import both
// go through that canonical form, so field order in the file is irrelevant.
fn data_checksum(data: &serde_json::Value) -> Result<i32> {
    Ok(rolling_checksum(&serde_json::to_string(data)?))
}

/// Serialize the store's full state into a portable container:
/// `{ schema_version, export_date, data, checksum }`.
pub fn export_snapshot<K: KvStore>(store: &Store<K>) -> Result<String> {
    let data = ExportData {
        snapshot: store.snapshot().clone(),
        backup_history: store.backups().to_vec(),
    };
    let data_value = serde_json::to_value(&data)?;
    let checksum = data_checksum(&data_value)?;

    let container = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "export_date": Utc::now(),
        "data": data_value,
        "checksum": checksum,
    });

    let text = serde_json::to_string_pretty(&container)?;
    log::info!("Exported snapshot container ({} bytes)", text.len());
    Ok(text)
}

/// Validate a container without touching the store.
///
/// Accepted only when `schema_version` equals the current version and
/// `data.customers` / `data.transactions` are both present (possibly
/// empty). Both exchanger variants are recognised: `export_date` or
/// `backup_date`, `checksum` or `system_info`.
fn validate(container: &serde_json::Value) -> Result<&serde_json::Value> {
    let version = container
        .get("schema_version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SaccoError::invalid_format("missing schema_version"))?;
    if version != SCHEMA_VERSION {
        return Err(SaccoError::invalid_format(format!(
            "unsupported schema_version '{}' (expected '{}')",
            version, SCHEMA_VERSION
        )));
    }

    let data = container
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| SaccoError::invalid_format("missing data object"))?;

    if data.get("customers").is_none() || data.get("transactions").is_none() {
        return Err(SaccoError::invalid_format(
            "data must carry customers and transactions",
        ));
    }

    Ok(data)
}

/// Merge an imported container into the store.
///
/// Takes a pre-import safety backup first, merges per collection (existing
/// record wins on collision; imported settings take precedence), saves, and
/// records a `DATA_IMPORTED` audit entry.
pub fn import_merge<K: KvStore>(store: &mut Store<K>, bytes: &[u8]) -> Result<ImportSummary> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| SaccoError::invalid_format("container is not UTF-8 text"))?;
    let container: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| SaccoError::invalid_format(format!("container is not valid JSON: {}", e)))?;

    let data_value = validate(&container)?;

    let checksum_ok = match container.get("checksum").and_then(|c| c.as_i64()) {
        Some(stated) => {
            let computed = data_checksum(data_value)? as i64;
            if stated != computed {
                log::warn!(
                    "Container checksum mismatch (stated {}, computed {})",
                    stated,
                    computed
                );
            }
            Some(stated == computed)
        }
        None => None,
    };

    let imported: ExportData = serde_json::from_value(data_value.clone())
        .map_err(|e| SaccoError::invalid_format(format!("data does not parse: {}", e)))?;

    // Validation is done; everything below mutates, guarded by the safety
    // backup.
    store.create_backup(BackupKind::PreImportBackup)?;

    let summary = merge_into(store.snapshot_mut(), imported.snapshot, checksum_ok);

    store.save()?;
    store.append_audit(
        audit_actions::DATA_IMPORTED,
        serde_json::json!({ "customers_imported": summary.customers_imported }),
    );

    log::info!(
        "Imported container: {} customers, {} transactions, {} users, {} loans",
        summary.customers_imported,
        summary.transactions_imported,
        summary.users_imported,
        summary.loans_imported
    );
    Ok(summary)
}

fn merge_into(
    existing: &mut Snapshot,
    imported: Snapshot,
    checksum_ok: Option<bool>,
) -> ImportSummary {
    let known_customers: HashSet<u64> = existing.customers.iter().map(|c| c.id).collect();
    let mut customers_imported = 0;
    for customer in imported.customers {
        if !known_customers.contains(&customer.id) {
            existing.customers.push(customer);
            customers_imported += 1;
        }
    }

    let known_txs: HashSet<String> = existing.transactions.iter().map(|t| t.id.clone()).collect();
    let mut transactions_imported = 0;
    for tx in imported.transactions {
        if !known_txs.contains(&tx.id) {
            existing.transactions.push(tx);
            transactions_imported += 1;
        }
    }

    let known_users: HashSet<String> = existing.users.iter().map(|u| u.username.clone()).collect();
    let mut users_imported = 0;
    for user in imported.users {
        if !known_users.contains(&user.username) {
            existing.users.push(user);
            users_imported += 1;
        }
    }

    // Imported settings overlay existing ones, unlike the record
    // collections.
    for (key, value) in imported.settings {
        existing.settings.insert(key, value);
    }

    // Loans: concatenate then keep the first occurrence per id, so existing
    // entries win collisions like everywhere else.
    let before_loans = existing.loans.len();
    existing.loans.extend(imported.loans);
    let mut seen: HashSet<String> = HashSet::new();
    existing.loans.retain(|loan| seen.insert(loan.id.clone()));
    let loans_imported = existing.loans.len().saturating_sub(before_loans);

    ImportSummary {
        customers_imported,
        transactions_imported,
        users_imported,
        loans_imported,
        checksum_ok,
    }
}
