//! One-shot migration from the legacy record layout
//!
//! The legacy app kept six ad-hoc keys (`sacco_auth`, `sacco_members`,
//! `sacco_ledger`, `sacco_last_id`, `sacco_users`, `sacco_settings`).
//! Migration transforms them into the current snapshot, archives the
//! originals under one key, then deletes them. Every step re-derives from
//! the old keys, so an interrupted pass is completed by simply running
//! again; once the archive key exists the whole routine is a no-op.

use crate::error::Result;
use crate::kv::KvStore;
use crate::model::{
    audit_actions, default_permissions, default_settings, Customer, CustomerStatus, Metadata,
    Settings, Snapshot, Transaction, TxKind, TxStatus, User,
};
use crate::store::Store;
use crate::ARCHIVE_KEY;
use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;

/// Legacy keys, in archive order
pub const OLD_KEYS: [&str; 6] = [
    "sacco_auth",
    "sacco_members",
    "sacco_ledger",
    "sacco_last_id",
    "sacco_users",
    "sacco_settings",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Archive key present: a previous pass completed
    AlreadyMigrated,
    /// No legacy keys in storage at all
    NothingToMigrate,
    Migrated {
        customers: usize,
        transactions: usize,
        users: usize,
    },
}

// Lenient views of the legacy records. Unknown fields are ignored, missing
// ones default; the legacy data was hand-maintained JSON.

#[derive(Debug, Deserialize)]
struct OldMember {
    #[serde(default)]
    name: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    join_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OldLedgerEntry {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    cust: Option<serde_json::Value>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    value_date: Option<String>,
    #[serde(default)]
    reversed: bool,
}

#[derive(Debug, Deserialize)]
struct OldUser {
    #[serde(default)]
    id: Option<u64>,
    username: String,
    #[serde(default)]
    password_hash: String,
    #[serde(default = "default_role")]
    role: String,
    #[serde(default)]
    permissions: Option<IndexMap<String, bool>>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_role() -> String {
    "thrift_collector".to_string()
}

fn default_active() -> bool {
    true
}

/// Run the migration against the given storage.
pub fn migrate<K: KvStore>(kv: &K) -> Result<MigrationOutcome> {
    if kv.get(ARCHIVE_KEY)?.is_some() {
        log::debug!("Migration archive present, nothing to do");
        return Ok(MigrationOutcome::AlreadyMigrated);
    }

    let raw: Vec<(&str, Option<String>)> = OLD_KEYS
        .iter()
        .map(|&key| Ok((key, kv.get(key)?)))
        .collect::<Result<_>>()?;

    if raw.iter().all(|(_, value)| value.is_none()) {
        return Ok(MigrationOutcome::NothingToMigrate);
    }

    log::info!("Legacy records found, migrating to schema {}", crate::SCHEMA_VERSION);

    let members = parse_record::<IndexMap<String, OldMember>>(&raw, "sacco_members");
    let ledger = parse_record::<Vec<OldLedgerEntry>>(&raw, "sacco_ledger");
    let old_users = parse_record::<Vec<OldUser>>(&raw, "sacco_users");
    let old_settings = parse_record::<Settings>(&raw, "sacco_settings");
    let last_id = parse_record::<serde_json::Value>(&raw, "sacco_last_id")
        .as_ref()
        .and_then(value_as_u64)
        .unwrap_or(100);

    let transactions = transform_ledger(ledger.unwrap_or_default());
    let customers = transform_members(members.unwrap_or_default(), &transactions);
    let mut users = transform_users(old_users.unwrap_or_default());
    if users.is_empty() {
        // A store with no login is unusable; fall back to the seeded admin.
        users = crate::model::default_users();
    }

    let mut settings = default_settings();
    for (key, value) in old_settings.unwrap_or_default() {
        settings.insert(key, value);
    }

    let mut snapshot = Snapshot {
        customers,
        transactions,
        loans: Vec::new(),
        users,
        settings,
        audit_log: Vec::new(),
        metadata: Metadata::default(),
    };
    snapshot.metadata = Metadata::derive(
        &snapshot.customers,
        &snapshot.transactions,
        &snapshot.loans,
        &snapshot.users,
        last_id,
    );

    let summary = MigrationOutcome::Migrated {
        customers: snapshot.customers.len(),
        transactions: snapshot.transactions.len(),
        users: snapshot.users.len(),
    };

    // Persist through the store so metadata and the audit trail follow the
    // normal save path.
    let mut store = Store::load(kv);
    store.replace_snapshot(snapshot);
    store.append_audit(
        audit_actions::MIGRATION_COMPLETED,
        serde_json::json!({ "source_keys": OLD_KEYS }),
    );
    store.save()?;

    // Archive the originals before deleting them. Written as one record so
    // an interrupted delete loop can still be finished on the next run.
    let archive = serde_json::json!({
        "archived_at": Utc::now(),
        "records": raw
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<IndexMap<String, Option<String>>>(),
    });
    kv.set(ARCHIVE_KEY, &serde_json::to_string(&archive)?)?;

    for key in OLD_KEYS {
        kv.remove(key)?;
    }

    log::info!("Migration complete: {:?}", summary);
    Ok(summary)
}

fn parse_record<T: serde::de::DeserializeOwned>(
    raw: &[(&str, Option<String>)],
    key: &str,
) -> Option<T> {
    let value = raw
        .iter()
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.as_ref())?;

    match serde_json::from_str(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("Legacy record '{}' is unparsable, skipping: {}", key, e);
            None
        }
    }
}

fn value_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn parse_kind(kind: Option<&str>) -> TxKind {
    match kind {
        Some(s) => serde_json::from_value(serde_json::Value::String(s.to_string()))
            .unwrap_or(TxKind::Other),
        None => TxKind::Other,
    }
}

/// Map each ledger entry 1:1 onto a transaction.
///
/// Entries without an id get a synthesized `<epoch_ms>-<seq>` id from a
/// strictly monotonic counter (the legacy timestamp+random scheme could
/// collide). An entry marked `reversed` becomes `status: reversed` with no
/// `reversal_of` target: the legacy store pointed the field at the entry's
/// own id, which named no actual reversing transaction.
fn transform_ledger(ledger: Vec<OldLedgerEntry>) -> Vec<Transaction> {
    let mut used: HashSet<String> = ledger
        .iter()
        .filter_map(|e| e.id.as_ref().and_then(value_as_id_string))
        .collect();
    let epoch_ms = Utc::now().timestamp_millis();
    let mut seq = 0u64;

    ledger
        .into_iter()
        .map(|entry| {
            let id = match entry.id.as_ref().and_then(value_as_id_string) {
                Some(id) => id,
                None => loop {
                    let candidate = format!("{}-{}", epoch_ms, seq);
                    seq += 1;
                    if used.insert(candidate.clone()) {
                        break candidate;
                    }
                },
            };

            let customer_id = match entry.cust.as_ref().and_then(value_as_u64) {
                Some(id) => id,
                None => {
                    log::warn!("Ledger entry {} has no parsable customer reference", id);
                    0
                }
            };

            Transaction {
                id,
                customer_id,
                kind: parse_kind(entry.kind.as_deref()),
                amount: entry.amount,
                date: entry.date,
                value_date: entry.value_date,
                status: if entry.reversed {
                    TxStatus::Reversed
                } else {
                    TxStatus::Completed
                },
                reversal_of: None,
            }
        })
        .collect()
}

/// Build customers from the legacy member map, deriving both balances from
/// the already-transformed ledger (non-reversed entries only, signed, no
/// floor: a balance may go negative).
fn transform_members(
    members: IndexMap<String, OldMember>,
    transactions: &[Transaction],
) -> Vec<Customer> {
    let mut customers = Vec::new();

    for (key, member) in members {
        let id: u64 = match key.trim().parse() {
            Ok(id) => id,
            Err(_) => {
                log::warn!("Member key '{}' is not a numeric id, skipping", key);
                continue;
            }
        };

        let mut balance_savings = 0.0;
        let mut balance_loans = 0.0;
        for tx in transactions
            .iter()
            .filter(|t| t.customer_id == id && t.status != TxStatus::Reversed)
        {
            balance_savings += tx.kind.savings_delta(tx.amount);
            balance_loans += tx.kind.loan_delta(tx.amount);
        }

        customers.push(Customer {
            id,
            name: member.name,
            phone: member.phone,
            email: member.email,
            address: member.address,
            join_date: member.join_date,
            status: if member.status.as_deref() == Some("inactive") {
                CustomerStatus::Inactive
            } else {
                CustomerStatus::Active
            },
            balance_savings,
            balance_loans,
            closure_date: None,
            closure_reason: None,
            created_by: "migration".to_string(),
            last_updated: Some(Utc::now()),
        });
    }

    customers.sort_by_key(|c| c.id);
    customers
}

/// Carry users over 1:1; missing permission sets are filled from the
/// role-based defaults table.
fn transform_users(old_users: Vec<OldUser>) -> Vec<User> {
    let mut next_id = old_users.iter().filter_map(|u| u.id).max().unwrap_or(0);

    old_users
        .into_iter()
        .map(|old| {
            let id = old.id.unwrap_or_else(|| {
                next_id += 1;
                next_id
            });
            let permissions = match old.permissions {
                Some(perms) if !perms.is_empty() => perms,
                _ => default_permissions(&old.role),
            };

            User {
                id,
                username: old.username,
                password_hash: old.password_hash,
                role: old.role,
                permissions,
                active: old.active,
            }
        })
        .collect()
}
