use sqlx::{PgConnection, PgPool};

use inv_shared::Result;

use crate::models::{Transaction, TransactionFilter};

/// Append-only audit trail. No updates, no deletes.
#[derive(Clone)]
pub struct TransactionJournal;

impl TransactionJournal {
    pub fn new() -> Self {
        Self
    }

    /// Inserts every row in one statement, inside the caller's transaction.
    pub async fn append_batch(&self, tx: &mut PgConnection, rows: &[Transaction]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        let inventory_ids: Vec<_> = rows.iter().map(|r| r.inventory_id).collect();
        let types: Vec<_> = rows.iter().map(|r| r.transaction_type).collect();
        let quantities: Vec<_> = rows.iter().map(|r| r.quantity).collect();
        let befores: Vec<_> = rows.iter().map(|r| r.before_quantity).collect();
        let afters: Vec<_> = rows.iter().map(|r| r.after_quantity).collect();
        let performed_bys: Vec<_> = rows.iter().map(|r| r.performed_by.clone()).collect();
        let reference_ids: Vec<_> = rows.iter().map(|r| r.reference_id.clone()).collect();
        let reference_types: Vec<_> = rows.iter().map(|r| r.reference_type.clone()).collect();
        let reasons: Vec<_> = rows.iter().map(|r| r.reason.clone()).collect();
        let notes: Vec<_> = rows.iter().map(|r| r.note.clone()).collect();

        sqlx::query(
            "INSERT INTO inventory_transaction \
                (id, inventory_id, transaction_type, quantity, before_quantity, after_quantity, \
                 performed_by, reference_id, reference_type, reason, note, created_at) \
             SELECT * FROM UNNEST( \
                $1::uuid[], $2::uuid[], $3::transaction_type[], $4::bigint[], $5::bigint[], $6::bigint[], \
                $7::text[], $8::text[], $9::text[], $10::text[], $11::text[] \
             ), now()",
        )
        .bind(&ids)
        .bind(&inventory_ids)
        .bind(&types as &[crate::models::TransactionType])
        .bind(&quantities)
        .bind(&befores)
        .bind(&afters)
        .bind(&performed_bys)
        .bind(&reference_ids)
        .bind(&reference_types)
        .bind(&reasons)
        .bind(&notes)
        .execute(&mut *tx)
        .await?;

        Ok(())
    }

    /// Paginated listing with filters on inventory_id, reference_id,
    /// reference_type, type, performed_by, and seller scope (resolved by
    /// the caller via a ledger→location ownership join).
    pub async fn find_by_filter(&self, pool: &PgPool, filter: &TransactionFilter) -> Result<(Vec<Transaction>, i64)> {
        let limit = filter.per_page.max(1).min(200) as i64;
        let offset = ((filter.page.max(1) - 1) as i64) * limit;

        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT t.id, t.inventory_id, t.transaction_type, t.quantity, t.before_quantity, t.after_quantity, \
                    t.performed_by, t.reference_id, t.reference_type, t.reason, t.note, t.created_at \
             FROM inventory_transaction t \
             JOIN inventory i ON i.id = t.inventory_id \
             WHERE ($1::uuid IS NULL OR t.inventory_id = $1) \
               AND ($2::text IS NULL OR t.reference_id = $2) \
               AND ($3::text IS NULL OR t.reference_type = $3) \
               AND ($4::transaction_type IS NULL OR t.transaction_type = $4) \
               AND ($5::text IS NULL OR t.performed_by = $5) \
               AND ($8::bigint[] IS NULL OR i.location_id = ANY($8)) \
             ORDER BY t.created_at DESC \
             LIMIT $6 OFFSET $7",
        )
        .bind(filter.inventory_id)
        .bind(&filter.reference_id)
        .bind(&filter.reference_type)
        .bind(filter.transaction_type)
        .bind(&filter.performed_by)
        .bind(limit)
        .bind(offset)
        .bind(&filter.location_ids)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_transaction t \
             JOIN inventory i ON i.id = t.inventory_id \
             WHERE ($1::uuid IS NULL OR t.inventory_id = $1) \
               AND ($2::text IS NULL OR t.reference_id = $2) \
               AND ($3::text IS NULL OR t.reference_type = $3) \
               AND ($4::transaction_type IS NULL OR t.transaction_type = $4) \
               AND ($5::text IS NULL OR t.performed_by = $5) \
               AND ($6::bigint[] IS NULL OR i.location_id = ANY($6))",
        )
        .bind(filter.inventory_id)
        .bind(&filter.reference_id)
        .bind(&filter.reference_type)
        .bind(filter.transaction_type)
        .bind(&filter.performed_by)
        .bind(&filter.location_ids)
        .fetch_one(pool)
        .await?;

        Ok((rows, total))
    }
}

impl Default for TransactionJournal {
    fn default() -> Self {
        Self::new()
    }
}
