//! Record types for the bookkeeping snapshot
//!
//! Plain serde structs, persisted as one combined JSON blob. Every snapshot
//! field carries `#[serde(default)]` so a record absent from storage (or a
//! partially-formed blob) degrades to its documented default instead of
//! failing the load.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Flat settings mapping (currency, interest rate, backup interval, ...)
pub type Settings = IndexMap<String, serde_json::Value>;

/// Audit action tags written by this core
pub mod audit_actions {
    pub const DATA_SAVED: &str = "DATA_SAVED";
    pub const BACKUP_RESTORED: &str = "BACKUP_RESTORED";
    pub const DATA_IMPORTED: &str = "DATA_IMPORTED";
    pub const MIGRATION_COMPLETED: &str = "MIGRATION_COMPLETED";
}

/// Capability names recognised by the permission system
pub const CAPABILITIES: [&str; 12] = [
    "member_creation",
    "transaction_posting",
    "withdrawal",
    "loan_management",
    "account_closure",
    "account_reactivation",
    "view_statements",
    "search_customers",
    "generate_reports",
    "user_management",
    "system_settings",
    "backup_restore",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxKind {
    Daily,
    Weekly,
    Monthly,
    Withdrawal,
    Loan,
    LoanRepay,
    /// Unrecognised legacy type; carried through untouched by balance math
    #[serde(other)]
    Other,
}

impl TxKind {
    /// Signed effect of a completed transaction on the savings balance
    pub fn savings_delta(self, amount: f64) -> f64 {
        match self {
            TxKind::Daily | TxKind::Weekly | TxKind::Monthly => amount,
            TxKind::Withdrawal => -amount,
            _ => 0.0,
        }
    }

    /// Signed effect of a completed transaction on the loan balance
    pub fn loan_delta(self, amount: f64) -> f64 {
        match self {
            TxKind::Loan => amount,
            TxKind::LoanRepay => -amount,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Completed,
    Reversed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    #[default]
    Active,
    Closed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub join_date: Option<String>,
    #[serde(default)]
    pub status: CustomerStatus,
    #[serde(default)]
    pub balance_savings: f64,
    #[serde(default)]
    pub balance_loans: f64,
    #[serde(default)]
    pub closure_date: Option<String>,
    #[serde(default)]
    pub closure_reason: Option<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id (txId); string-typed to match the legacy wire form
    pub id: String,
    pub customer_id: u64,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub amount: f64,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub value_date: Option<String>,
    #[serde(default)]
    pub status: TxStatus,
    /// Id of the distinct transaction this one reverses, when known.
    /// Legacy data that marked an entry reversed without a counterpart
    /// carries `None` here (see migration).
    #[serde(default)]
    pub reversal_of: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    /// Opaque hash carried verbatim from the legacy store; never rehashed
    pub password_hash: String,
    pub role: String,
    #[serde(default)]
    pub permissions: IndexMap<String, bool>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub customer_id: u64,
    #[serde(default)]
    pub amount_outstanding: f64,
    #[serde(default)]
    pub status: LoanStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default)]
    pub actor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    Manual,
    AutoBackup,
    PreImportBackup,
    PreRestoreBackup,
}

/// One entry in the backup history ring: a full embedded snapshot copy
/// plus summary counts for listing without deserializing the copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub created: DateTime<Utc>,
    pub data: Snapshot,
    pub customer_count: usize,
    pub transaction_count: usize,
}

/// Derived aggregate over the four mutable collections.
///
/// Never hand-edited: recomputed by `Metadata::derive` on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub total_customers: usize,
    #[serde(default)]
    pub total_transactions: usize,
    #[serde(default)]
    pub total_savings: f64,
    #[serde(default)]
    pub total_loans: f64,
    #[serde(default = "default_last_customer_id")]
    pub last_customer_id: u64,
    #[serde(default)]
    pub last_transaction_id: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

fn default_last_customer_id() -> u64 {
    100
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            total_customers: 0,
            total_transactions: 0,
            total_savings: 0.0,
            total_loans: 0.0,
            last_customer_id: default_last_customer_id(),
            last_transaction_id: None,
            last_updated: None,
        }
    }
}

impl Metadata {
    /// Derivation from the four mutable collections.
    ///
    /// `last_id_floor` is the previously assigned customer id: the derived
    /// value never goes below it, so deleting the highest-numbered customer
    /// cannot cause an id to be handed out twice.
    pub fn derive(
        customers: &[Customer],
        transactions: &[Transaction],
        loans: &[Loan],
        _users: &[User],
        last_id_floor: u64,
    ) -> Self {
        let total_savings = customers.iter().map(|c| c.balance_savings).sum();
        let total_loans = loans
            .iter()
            .filter(|l| l.status == LoanStatus::Active)
            .map(|l| l.amount_outstanding)
            .sum();
        let last_customer_id = customers
            .iter()
            .map(|c| c.id)
            .max()
            .unwrap_or(0)
            .max(last_id_floor)
            .max(default_last_customer_id());

        Self {
            total_customers: customers.len(),
            total_transactions: transactions.len(),
            total_savings,
            total_loans,
            last_customer_id,
            last_transaction_id: transactions.last().map(|t| t.id.clone()),
            last_updated: Some(Utc::now()),
        }
    }
}

/// The in-blob records of the store: seven of the eight named collections.
/// Backup history is the eighth, persisted under its own key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default = "default_users")]
    pub users: Vec<User>,
    #[serde(default = "default_settings")]
    pub settings: Settings,
    #[serde(default)]
    pub audit_log: Vec<AuditEntry>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            customers: Vec::new(),
            transactions: Vec::new(),
            loans: Vec::new(),
            users: default_users(),
            settings: default_settings(),
            audit_log: Vec::new(),
            metadata: Metadata::default(),
        }
    }
}

impl Snapshot {
    /// Combined item count across the four mutable collections
    pub fn item_count(&self) -> usize {
        self.customers.len() + self.transactions.len() + self.loans.len() + self.users.len()
    }
}

/// Single seeded administrator, present whenever no users record exists.
pub fn default_users() -> Vec<User> {
    vec![User {
        id: 1,
        username: "admin".to_string(),
        password_hash: "21232f297a57a5a743894a0e4a801fc3".to_string(),
        role: "admin".to_string(),
        permissions: default_permissions("admin"),
        active: true,
    }]
}

/// Application default settings; migration overlays legacy settings on top.
pub fn default_settings() -> Settings {
    let mut settings = Settings::new();
    settings.insert("currency".into(), serde_json::json!("NGN"));
    settings.insert("interest_rate".into(), serde_json::json!(5.0));
    settings.insert("backup_interval_minutes".into(), serde_json::json!(30));
    settings.insert("locale".into(), serde_json::json!("en-NG"));
    settings.insert("organization_name".into(), serde_json::json!("Savings Cooperative"));
    settings
}

/// Role-based default permission set, used when a migrated user record
/// carries no permission flags of its own.
pub fn default_permissions(role: &str) -> IndexMap<String, bool> {
    let granted: &[&str] = match role {
        "admin" => &CAPABILITIES,
        "supervisor" => &[
            "member_creation",
            "transaction_posting",
            "withdrawal",
            "loan_management",
            "account_closure",
            "account_reactivation",
            "view_statements",
            "search_customers",
            "generate_reports",
        ],
        "thrift_collector" => &[
            "member_creation",
            "transaction_posting",
            "withdrawal",
            "loan_management",
            "view_statements",
            "search_customers",
        ],
        _ => &[],
    };

    CAPABILITIES
        .iter()
        .map(|cap| (cap.to_string(), granted.contains(cap)))
        .collect()
}
