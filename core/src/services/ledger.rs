use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use inv_shared::Result;

use crate::models::InventoryItem;

/// Per-(variant, location) stock storage. Performs no business validation —
/// callers (the Inventory Manager) own the transaction and the invariants.
#[derive(Clone)]
pub struct InventoryLedger;

impl InventoryLedger {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_variant_location<'e, E>(
        &self,
        executor: E,
        variant_id: i64,
        location_id: i64,
    ) -> Result<Option<InventoryItem>>
    where
        E: PgExecutor<'e>,
    {
        let item = sqlx::query_as::<_, InventoryItem>(
            "SELECT id, variant_id, location_id, quantity, reserved_quantity, threshold, \
             bin_location, created_at, updated_at \
             FROM inventory WHERE variant_id = $1 AND location_id = $2",
        )
        .bind(variant_id)
        .bind(location_id)
        .fetch_optional(executor)
        .await?;
        Ok(item)
    }

    /// Batch form to avoid N+1 when resolving many (variant, location)
    /// pairs at once, locking every existing row `FOR UPDATE` so the
    /// caller's read-compute-write cycle serializes against any other
    /// transaction touching the same rows. Ordered by `(variant_id,
    /// location_id)` so two overlapping batches always acquire their locks
    /// in the same order, avoiding deadlocks. Pairs with no existing row
    /// are simply absent from the result; callers allocate an in-memory
    /// zeroed row for those (and take their lock implicitly via the
    /// `ON CONFLICT` upsert on write). Must be called inside the caller's
    /// transaction — `executor` should be the open `PgConnection`/
    /// `Transaction`, never a bare pool.
    pub async fn find_by_variant_location_batch_for_update<'e, E>(
        &self,
        executor: E,
        pairs: &[(i64, i64)],
    ) -> Result<Vec<InventoryItem>>
    where
        E: PgExecutor<'e>,
    {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let variant_ids: Vec<i64> = pairs.iter().map(|(v, _)| *v).collect();
        let location_ids: Vec<i64> = pairs.iter().map(|(_, l)| *l).collect();

        let items = sqlx::query_as::<_, InventoryItem>(
            "SELECT id, variant_id, location_id, quantity, reserved_quantity, threshold, \
             bin_location, created_at, updated_at \
             FROM inventory \
             WHERE (variant_id, location_id) IN ( \
                 SELECT * FROM UNNEST($1::bigint[], $2::bigint[]) \
             ) \
             ORDER BY variant_id, location_id \
             FOR UPDATE",
        )
        .bind(&variant_ids)
        .bind(&location_ids)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    /// Inserts new rows and updates existing ones in a single round-trip,
    /// inside the caller's transaction.
    pub async fn upsert_batch(&self, tx: &mut PgConnection, items: &[InventoryItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        let variant_ids: Vec<i64> = items.iter().map(|i| i.variant_id).collect();
        let location_ids: Vec<i64> = items.iter().map(|i| i.location_id).collect();
        let quantities: Vec<i64> = items.iter().map(|i| i.quantity).collect();
        let reserved_quantities: Vec<i64> = items.iter().map(|i| i.reserved_quantity).collect();
        let thresholds: Vec<i64> = items.iter().map(|i| i.threshold).collect();
        let bin_locations: Vec<Option<String>> = items.iter().map(|i| i.bin_location.clone()).collect();

        sqlx::query(
            "INSERT INTO inventory \
                (id, variant_id, location_id, quantity, reserved_quantity, threshold, bin_location, created_at, updated_at) \
             SELECT * FROM UNNEST($1::uuid[], $2::bigint[], $3::bigint[], $4::bigint[], $5::bigint[], $6::bigint[], $7::text[]), now(), now() \
             ON CONFLICT (variant_id, location_id) DO UPDATE SET \
                quantity = EXCLUDED.quantity, \
                reserved_quantity = EXCLUDED.reserved_quantity, \
                threshold = EXCLUDED.threshold, \
                bin_location = EXCLUDED.bin_location, \
                updated_at = now()",
        )
        .bind(&ids)
        .bind(&variant_ids)
        .bind(&location_ids)
        .bind(&quantities)
        .bind(&reserved_quantities)
        .bind(&thresholds)
        .bind(&bin_locations)
        .execute(&mut *tx)
        .await?;

        Ok(())
    }
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new()
    }
}
