use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single (variant, location) stock row. Created lazily on first mutation;
/// never deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub variant_id: i64,
    pub location_id: i64,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub threshold: i64,
    pub bin_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn new(variant_id: i64, location_id: i64, threshold: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            variant_id,
            location_id,
            quantity: 0,
            reserved_quantity: 0,
            threshold,
            bin_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `quantity - reserved_quantity`.
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_is_quantity_minus_reserved() {
        let mut item = InventoryItem::new(1, 1, 0);
        item.quantity = 10;
        item.reserved_quantity = 3;
        assert_eq!(item.available(), 7);
    }
}
