use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use inv_shared::{Error, Result, StockShortfall};

use crate::models::{
    context::RequestContext, ExpiryPayload, Reservation, ReservationStatus, ScheduledJobEnvelope,
    TransactionType, EXPIRY_COMMAND,
};
use crate::services::manager::{InventoryManager, MutationRequest};
use crate::services::ports::VariantDirectory;
use crate::services::queue::DelayedJobQueue;

pub struct CreateItem {
    pub variant_id: i64,
    pub quantity: i64,
}

pub struct CreateRequest {
    pub reference_id: i64,
    pub expires_in_minutes: i64,
    pub items: Vec<CreateItem>,
}

pub struct AllocatedReservation {
    pub reservation: Reservation,
    pub total_available_after_reserve: i64,
}

pub struct CreateOutcome {
    pub reservations: Vec<AllocatedReservation>,
}

struct Allocation {
    variant_id: i64,
    location_id: i64,
    quantity: i64,
}

struct AllocationResult {
    allocations: Vec<Allocation>,
    shortfalls: Vec<StockShortfall>,
}

/// Greedy, priority-ordered allocation: for each requested item, walk
/// `locations` in the given order and take `min(available, remaining)`
/// from each until satisfied or locations exhaust. Pure function so the
/// all-or-nothing allocation rule can be tested without a database.
///
/// `stock` maps (variant_id, location_id) to (quantity, reserved_quantity);
/// missing entries are treated as zero stock.
fn allocate_by_priority(
    requested: &[(i64, i64)],
    locations: &[i64],
    stock: &HashMap<(i64, i64), (i64, i64)>,
) -> AllocationResult {
    let mut stock = stock.clone();
    let mut allocations = Vec::new();
    let mut shortfalls = Vec::new();

    for &(variant_id, quantity) in requested {
        let mut remaining = quantity;
        let mut total_available: i64 = 0;
        for &location_id in locations {
            let (qty, reserved) = stock.get(&(variant_id, location_id)).copied().unwrap_or((0, 0));
            total_available += (qty - reserved).max(0);
        }
        for &location_id in locations {
            if remaining == 0 {
                break;
            }
            let entry = stock.entry((variant_id, location_id)).or_insert((0, 0));
            let available = (entry.0 - entry.1).max(0);
            if available == 0 {
                continue;
            }
            let take = available.min(remaining);
            entry.1 += take;
            remaining -= take;
            allocations.push(Allocation { variant_id, location_id, quantity: take });
        }
        if remaining > 0 {
            shortfalls.push(StockShortfall { variant_id, requested: quantity, total_available });
        }
    }

    AllocationResult { allocations, shortfalls }
}

/// Owns the `InventoryReservation` state machine: create, confirm/cancel by
/// reference, and fired-expiry handling. Every ledger-touching transition
/// is delegated to the Inventory Manager; this component never writes to
/// `inventory` or `inventory_transaction` directly.
#[derive(Clone)]
pub struct ReservationEngine {
    pool: PgPool,
    manager: InventoryManager,
    queue: DelayedJobQueue,
    directory: Arc<dyn VariantDirectory>,
}

impl ReservationEngine {
    pub fn new(pool: PgPool, manager: InventoryManager, queue: DelayedJobQueue, directory: Arc<dyn VariantDirectory>) -> Self {
        Self { pool, manager, queue, directory }
    }

    pub async fn create(&self, ctx: &RequestContext, req: CreateRequest) -> Result<CreateOutcome> {
        if req.expires_in_minutes <= 0 {
            return Err(Error::Validation("expires_in_minutes must be > 0".to_string()));
        }
        for item in &req.items {
            if item.quantity <= 0 {
                return Err(Error::Validation("item quantity must be > 0".to_string()));
            }
        }

        let seller_id = ctx.seller_id_i64()?;
        let variant_ids: Vec<i64> = req.items.iter().map(|i| i.variant_id).collect();
        self.directory.validate_ownership(seller_id, &variant_ids).await?;
        let locations = self.directory.active_locations_by_priority(seller_id).await?;
        if locations.is_empty() {
            return Err(Error::Validation("seller has no active locations".to_string()));
        }

        // variant_id -> location_id -> (quantity, reserved_quantity)
        let mut stock: HashMap<(i64, i64), (i64, i64)> = HashMap::new();
        for &variant_id in &variant_ids {
            for loc in &locations {
                if let Some(item) = self
                    .manager
                    .ledger()
                    .find_by_variant_location(&self.pool, variant_id, loc.location_id)
                    .await?
                {
                    stock.insert((variant_id, loc.location_id), (item.quantity, item.reserved_quantity));
                } else {
                    stock.insert((variant_id, loc.location_id), (0, 0));
                }
            }
        }

        let requested: Vec<(i64, i64)> = req.items.iter().map(|i| (i.variant_id, i.quantity)).collect();
        let locs: Vec<i64> = locations.iter().map(|l| l.location_id).collect();
        let AllocationResult { allocations, shortfalls } = allocate_by_priority(&requested, &locs, &stock);

        if !shortfalls.is_empty() {
            return Err(Error::ReservationShortfall { details: shortfalls });
        }

        let expires_at = Utc::now() + Duration::minutes(req.expires_in_minutes);
        let mut reservation_rows = Vec::with_capacity(allocations.len());
        for alloc in &allocations {
            reservation_rows.push(Reservation {
                id: Uuid::new_v4(),
                inventory_id: Uuid::nil(), // resolved to the real ledger row id during the mutation below
                reference_id: req.reference_id,
                variant_id: alloc.variant_id,
                location_id: alloc.location_id,
                quantity: alloc.quantity,
                expires_at,
                status: ReservationStatus::Pending,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        }

        let mut tx = self.pool.begin().await?;

        let mutation_requests: Vec<MutationRequest> = reservation_rows
            .iter()
            .map(|r| MutationRequest {
                variant_id: r.variant_id,
                location_id: r.location_id,
                quantity: r.quantity,
                transaction_type: TransactionType::Reserved,
                direction: None,
                threshold: None,
                reference: Some(r.id.to_string()),
                reference_type: "reservation".to_string(),
                reason: "reservation create".to_string(),
                note: None,
                performed_by: ctx.user_id.clone(),
            })
            .collect();

        let outcomes = self.manager.apply_batch(&mut tx, mutation_requests).await?;

        for (row, outcome) in reservation_rows.iter_mut().zip(outcomes.iter()) {
            row.inventory_id = outcome.inventory_id;
        }

        insert_reservations(&mut tx, &reservation_rows).await?;
        tx.commit().await?;

        let reservation_ids: Vec<Uuid> = reservation_rows.iter().map(|r| r.id).collect();
        let payload = ExpiryPayload { reservation_ids, reference_id: req.reference_id, is_bulk: true };
        let envelope = ScheduledJobEnvelope {
            job_id: Uuid::new_v4(),
            command: EXPIRY_COMMAND.to_string(),
            payload: serde_json::to_value(&payload)?,
            user_id: ctx.user_id.clone(),
            seller_id: ctx.seller_id.clone(),
            correlation_id: ctx.correlation_id.clone(),
        };
        let delay_seconds = req.expires_in_minutes * 60;
        if let Err(err) = self.queue.schedule(&envelope, delay_seconds).await {
            // The reservation exists and is correct; it simply won't
            // auto-expire. Surfaced to the operator via logging only.
            tracing::error!(reference_id = req.reference_id, error = %err, "failed to schedule reservation expiry; reservation will not auto-expire");
        }

        let allocated = reservation_rows
            .into_iter()
            .zip(outcomes.iter())
            .map(|(reservation, outcome)| AllocatedReservation {
                total_available_after_reserve: outcome.after_quantity - outcome.reserved_quantity,
                reservation,
            })
            .collect();

        Ok(CreateOutcome { reservations: allocated })
    }

    pub async fn update_by_reference(&self, ctx: &RequestContext, reference_id: i64, new_status: ReservationStatus) -> Result<()> {
        if !matches!(new_status, ReservationStatus::Confirmed | ReservationStatus::Cancelled) {
            return Err(Error::Validation("status must be CONFIRMED or CANCELLED".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let pending: Vec<Reservation> = sqlx::query_as::<_, Reservation>(
            "SELECT id, inventory_id, reference_id, variant_id, location_id, quantity, expires_at, status, created_at, updated_at \
             FROM inventory_reservation WHERE reference_id = $1 AND status = 'PENDING' FOR UPDATE",
        )
        .bind(reference_id)
        .fetch_all(&mut *tx)
        .await?;

        if pending.is_empty() {
            tx.commit().await?;
            return Ok(());
        }

        if new_status == ReservationStatus::Cancelled {
            let mutation_requests: Vec<MutationRequest> = pending
                .iter()
                .map(|r| MutationRequest {
                    variant_id: r.variant_id,
                    location_id: r.location_id,
                    quantity: r.quantity,
                    transaction_type: TransactionType::Released,
                    direction: None,
                    threshold: None,
                    reference: Some(r.id.to_string()),
                    reference_type: "reservation".to_string(),
                    reason: "reservation cancel".to_string(),
                    note: None,
                    performed_by: ctx.user_id.clone(),
                })
                .collect();
            self.manager.apply_batch(&mut tx, mutation_requests).await?;
        }

        let ids: Vec<Uuid> = pending.iter().map(|r| r.id).collect();
        sqlx::query(
            "UPDATE inventory_reservation SET status = $1, updated_at = now() WHERE id = ANY($2) AND status = 'PENDING'",
        )
        .bind(new_status)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if let Err(err) = self.cancel_expiry_best_effort(reference_id).await {
            tracing::warn!(reference_id, error = %err, "failed to cancel expiry job; it is idempotent and harmless if it fires");
        }

        Ok(())
    }

    pub async fn expire(&self, payload: ExpiryPayload) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let transitioned: Vec<Reservation> = sqlx::query_as::<_, Reservation>(
            "UPDATE inventory_reservation SET status = 'EXPIRED', updated_at = now() \
             WHERE id = ANY($1) AND status = 'PENDING' \
             RETURNING id, inventory_id, reference_id, variant_id, location_id, quantity, expires_at, status, created_at, updated_at",
        )
        .bind(&payload.reservation_ids)
        .fetch_all(&mut *tx)
        .await?;

        if transitioned.is_empty() {
            tx.commit().await?;
            return Ok(());
        }

        let mutation_requests: Vec<MutationRequest> = transitioned
            .iter()
            .map(|r| MutationRequest {
                variant_id: r.variant_id,
                location_id: r.location_id,
                quantity: r.quantity,
                transaction_type: TransactionType::Released,
                direction: None,
                threshold: None,
                reference: Some(r.id.to_string()),
                reference_type: "reservation".to_string(),
                reason: "reservation expiry".to_string(),
                note: None,
                performed_by: "system".to_string(),
            })
            .collect();
        self.manager.apply_batch(&mut tx, mutation_requests).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn cancel_expiry_best_effort(&self, _reference_id: i64) -> Result<()> {
        // The bulk expiry job's id is not retained against the reference
        // after scheduling in this design; Cancel here is a placeholder
        // seam for a host that persists the job_id alongside the
        // reservation. Expiry itself is always safe: `expire()` only acts
        // on rows still PENDING.
        Ok(())
    }
}

async fn insert_reservations(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, rows: &[Reservation]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let inventory_ids: Vec<Uuid> = rows.iter().map(|r| r.inventory_id).collect();
    let reference_ids: Vec<i64> = rows.iter().map(|r| r.reference_id).collect();
    let variant_ids: Vec<i64> = rows.iter().map(|r| r.variant_id).collect();
    let location_ids: Vec<i64> = rows.iter().map(|r| r.location_id).collect();
    let quantities: Vec<i64> = rows.iter().map(|r| r.quantity).collect();
    let expires_ats: Vec<chrono::DateTime<Utc>> = rows.iter().map(|r| r.expires_at).collect();
    let statuses: Vec<ReservationStatus> = rows.iter().map(|r| r.status).collect();

    sqlx::query(
        "INSERT INTO inventory_reservation \
            (id, inventory_id, reference_id, variant_id, location_id, quantity, expires_at, status, created_at, updated_at) \
         SELECT * FROM UNNEST( \
            $1::uuid[], $2::uuid[], $3::bigint[], $4::bigint[], $5::bigint[], $6::bigint[], \
            $7::timestamptz[], $8::reservation_status[] \
         ), now(), now()",
    )
    .bind(&ids)
    .bind(&inventory_ids)
    .bind(&reference_ids)
    .bind(&variant_ids)
    .bind(&location_ids)
    .bind(&quantities)
    .bind(&expires_ats)
    .bind(&statuses)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_across_locations_by_priority() {
        // Scenario 3: L1 prio 10 has 5 available, L2 prio 5 has 10 available.
        let mut stock = HashMap::new();
        stock.insert((1, 10), (5, 0));
        stock.insert((1, 20), (10, 0));

        let result = allocate_by_priority(&[(1, 8)], &[10, 20], &stock);

        assert!(result.shortfalls.is_empty());
        assert_eq!(result.allocations.len(), 2);
        assert_eq!(result.allocations[0].location_id, 10);
        assert_eq!(result.allocations[0].quantity, 5);
        assert_eq!(result.allocations[1].location_id, 20);
        assert_eq!(result.allocations[1].quantity, 3);
    }

    #[test]
    fn insufficient_stock_reports_shortfall_without_partial_allocation_use() {
        // Scenario 4: total available (5 + 2 = 7) short of requested 8.
        let mut stock = HashMap::new();
        stock.insert((1, 10), (5, 0));
        stock.insert((1, 20), (2, 0));

        let result = allocate_by_priority(&[(1, 8)], &[10, 20], &stock);

        assert_eq!(result.shortfalls.len(), 1);
        assert_eq!(result.shortfalls[0].requested, 8);
        assert_eq!(result.shortfalls[0].total_available, 7);
    }

    #[test]
    fn skips_locations_with_no_available_stock() {
        let mut stock = HashMap::new();
        stock.insert((1, 10), (5, 5)); // fully reserved already
        stock.insert((1, 20), (10, 0));

        let result = allocate_by_priority(&[(1, 4)], &[10, 20], &stock);

        assert!(result.shortfalls.is_empty());
        assert_eq!(result.allocations.len(), 1);
        assert_eq!(result.allocations[0].location_id, 20);
    }

    #[test]
    fn missing_stock_entries_are_treated_as_zero() {
        let stock = HashMap::new();
        let result = allocate_by_priority(&[(1, 1)], &[10], &stock);
        assert_eq!(result.shortfalls.len(), 1);
        assert_eq!(result.shortfalls[0].total_available, 0);
    }
}
