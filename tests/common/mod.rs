//! Common test utilities and helpers

use saccobook::kv::{KvStore, MemoryKv};
use saccobook::model::{Customer, CustomerStatus, Loan, LoanStatus, Transaction, TxKind, TxStatus};

/// Initialize test logging once per binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a customer with the given id and savings balance
pub fn customer(id: u64, savings: f64) -> Customer {
    Customer {
        id,
        name: format!("Customer {}", id),
        phone: "0800000000".into(),
        email: String::new(),
        address: String::new(),
        join_date: Some("2024-01-15".into()),
        status: CustomerStatus::Active,
        balance_savings: savings,
        balance_loans: 0.0,
        closure_date: None,
        closure_reason: None,
        created_by: "test".into(),
        last_updated: None,
    }
}

/// Build a completed transaction
pub fn transaction(id: &str, customer_id: u64, kind: TxKind, amount: f64) -> Transaction {
    Transaction {
        id: id.to_string(),
        customer_id,
        kind,
        amount,
        date: Some("2024-02-01".into()),
        value_date: None,
        status: TxStatus::Completed,
        reversal_of: None,
    }
}

/// Build an active loan
pub fn loan(id: &str, customer_id: u64, outstanding: f64) -> Loan {
    Loan {
        id: id.to_string(),
        customer_id,
        amount_outstanding: outstanding,
        status: LoanStatus::Active,
    }
}

/// Seed the legacy schema used by the migration tests: one member ("Ada",
/// id 7) with a deposit and a withdrawal, one user without permissions,
/// a last-assigned id, and a settings overlay.
pub fn seed_old_schema(kv: &MemoryKv) {
    kv.set(
        "sacco_members",
        r#"{"7": {"name": "Ada", "phone": "123"}}"#,
    )
    .unwrap();
    kv.set(
        "sacco_ledger",
        r#"[
            {"cust": "7", "type": "DAILY", "amount": 50},
            {"cust": "7", "type": "WITHDRAWAL", "amount": 20}
        ]"#,
    )
    .unwrap();
    kv.set(
        "sacco_users",
        r#"[{"username": "ngozi", "password_hash": "abc123", "role": "supervisor"}]"#,
    )
    .unwrap();
    kv.set("sacco_last_id", "150").unwrap();
    kv.set("sacco_settings", r#"{"currency": "GHS"}"#).unwrap();
    kv.set("sacco_auth", r#"{"session": null}"#).unwrap();
}
