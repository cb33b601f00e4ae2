use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction supplied by the caller for transaction types that don't imply
/// a fixed sign on their own (currently only ADJUSTMENT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Purchase,
    Return,
    TransferIn,
    Outbound,
    TransferOut,
    Damage,
    Reserved,
    Released,
    Adjustment,
    Refresh,
}

impl sqlx::postgres::PgHasArrayType for TransactionType {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_transaction_type")
    }
}

/// Append-only audit row. Never updated or deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub before_quantity: i64,
    pub after_quantity: i64,
    pub performed_by: String,
    pub reference_id: Option<String>,
    pub reference_type: String,
    pub reason: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub inventory_id: Option<Uuid>,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub performed_by: Option<String>,
    /// Location ids the requesting seller owns, resolved via
    /// `VariantDirectory::active_locations_by_priority` by the caller.
    /// `None` means no scoping was applied (internal/system callers only);
    /// HTTP callers must always populate this.
    pub location_ids: Option<Vec<i64>>,
    pub page: i32,
    pub per_page: i32,
}
