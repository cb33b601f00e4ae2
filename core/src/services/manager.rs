use std::collections::HashMap;

use sqlx::{Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use inv_shared::{Error, Result};

use crate::models::inventory::InventoryItem;
use crate::models::transaction::{Direction, Transaction, TransactionType};
use crate::services::ledger::InventoryLedger;
use crate::services::journal::TransactionJournal;

/// One requested mutation against a (variant, location) row.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub variant_id: i64,
    pub location_id: i64,
    pub quantity: i64,
    pub transaction_type: TransactionType,
    pub direction: Option<Direction>,
    pub threshold: Option<i64>,
    pub reference: Option<String>,
    /// Defaults to "manual" for direct `/api/inventory/manage` calls; the
    /// Reservation Engine sets this to "reservation" for RESERVED/RELEASED/
    /// OUTBOUND mutations it drives.
    pub reference_type: String,
    pub reason: String,
    pub note: Option<String>,
    pub performed_by: String,
}

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub inventory_id: Uuid,
    pub variant_id: i64,
    pub location_id: i64,
    pub before_quantity: i64,
    pub after_quantity: i64,
    pub reserved_quantity: i64,
}

/// Which ledger field a transaction type's sign applies to.
#[derive(Debug)]
enum Field {
    Quantity,
    Reserved,
    /// OUTBOUND: both fields move together.
    Both,
}

#[derive(Debug)]
struct Rule {
    sign: i64,
    direction_allowed: bool,
    direction_required: bool,
    reference_required: bool,
    field: Field,
    skip_threshold: bool,
}

fn rule_for(t: TransactionType) -> Rule {
    match t {
        TransactionType::Purchase | TransactionType::Return | TransactionType::TransferIn => Rule {
            sign: 1,
            direction_allowed: false,
            direction_required: false,
            reference_required: true,
            field: Field::Quantity,
            skip_threshold: false,
        },
        TransactionType::Outbound => Rule {
            sign: -1,
            direction_allowed: false,
            direction_required: false,
            reference_required: true,
            field: Field::Both,
            skip_threshold: false,
        },
        TransactionType::TransferOut => Rule {
            sign: -1,
            direction_allowed: false,
            direction_required: false,
            reference_required: true,
            field: Field::Quantity,
            skip_threshold: false,
        },
        TransactionType::Damage => Rule {
            sign: -1,
            direction_allowed: false,
            direction_required: false,
            reference_required: false,
            field: Field::Quantity,
            skip_threshold: false,
        },
        TransactionType::Reserved => Rule {
            sign: 1,
            direction_allowed: false,
            direction_required: false,
            reference_required: true,
            field: Field::Reserved,
            skip_threshold: false,
        },
        TransactionType::Released => Rule {
            sign: -1,
            direction_allowed: false,
            direction_required: false,
            reference_required: true,
            field: Field::Reserved,
            skip_threshold: false,
        },
        TransactionType::Adjustment => Rule {
            sign: 0, // resolved from request.direction
            direction_allowed: true,
            direction_required: true,
            reference_required: false,
            field: Field::Quantity,
            skip_threshold: false,
        },
        TransactionType::Refresh => Rule {
            sign: 0, // absolute set, not a delta
            direction_allowed: false,
            direction_required: false,
            reference_required: false,
            field: Field::Quantity,
            skip_threshold: true,
        },
    }
}

/// Validates and applies batches of mutation requests against the ledger,
/// producing journal rows, all within one database transaction.
#[derive(Clone)]
pub struct InventoryManager {
    ledger: InventoryLedger,
    journal: TransactionJournal,
}

impl InventoryManager {
    pub fn new(ledger: InventoryLedger, journal: TransactionJournal) -> Self {
        Self { ledger, journal }
    }

    /// Read-only access for callers (the Reservation Engine) that need to
    /// inspect current stock before deciding what mutations to request.
    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub fn journal(&self) -> &TransactionJournal {
        &self.journal
    }

    fn validate(&self, req: &MutationRequest) -> Result<Rule> {
        if req.quantity <= 0 {
            return Err(Error::Validation("quantity must be > 0".to_string()));
        }
        if req.reason.len() < 5 {
            return Err(Error::Validation("reason must be at least 5 characters".to_string()));
        }

        let rule = rule_for(req.transaction_type);

        if rule.direction_required && req.direction.is_none() {
            return Err(Error::UnknownDirection(format!("{:?}", req.transaction_type)));
        }
        if !rule.direction_allowed && req.direction.is_some() {
            return Err(Error::Validation(format!(
                "direction is not accepted for transaction type {:?}",
                req.transaction_type
            )));
        }
        if rule.reference_required && req.reference.is_none() {
            return Err(Error::MissingReference(format!("{:?}", req.transaction_type)));
        }

        Ok(rule)
    }

    /// Single-item mutation is a batch of one.
    pub async fn apply_one(&self, tx: &mut SqlxTransaction<'_, Postgres>, req: MutationRequest) -> Result<MutationOutcome> {
        let mut outcomes = self.apply_batch(tx, vec![req]).await?;
        Ok(outcomes.remove(0))
    }

    pub async fn apply_batch(
        &self,
        tx: &mut SqlxTransaction<'_, Postgres>,
        requests: Vec<MutationRequest>,
    ) -> Result<Vec<MutationOutcome>> {
        // Validate every item up-front; any failure aborts the whole batch
        // with nothing written.
        let mut rules = Vec::with_capacity(requests.len());
        for req in &requests {
            rules.push(self.validate(req)?);
        }

        let pairs: Vec<(i64, i64)> = requests.iter().map(|r| (r.variant_id, r.location_id)).collect();
        let existing = self.ledger.find_by_variant_location_batch_for_update(&mut **tx, &pairs).await?;

        let mut rows: HashMap<(i64, i64), InventoryItem> =
            existing.into_iter().map(|i| ((i.variant_id, i.location_id), i)).collect();

        let mut journal_rows = Vec::with_capacity(requests.len());
        let mut outcomes = Vec::with_capacity(requests.len());

        for (req, rule) in requests.iter().zip(rules.iter()) {
            let key = (req.variant_id, req.location_id);
            if !rows.contains_key(&key) {
                rows.insert(key, InventoryItem::new(req.variant_id, req.location_id, req.threshold.unwrap_or(0)));
            }
            let item = rows.get_mut(&key).unwrap();

            let sign = match rule.sign {
                0 if matches!(req.transaction_type, TransactionType::Adjustment) => match req.direction {
                    Some(Direction::Add) => 1,
                    Some(Direction::Remove) => -1,
                    None => unreachable!("validated above"),
                },
                0 => 0, // REFRESH: absolute assignment, handled separately
                s => s,
            };

            match rule.field {
                Field::Reserved => {
                    let delta = sign * req.quantity;
                    let before = item.reserved_quantity;
                    let after = before + delta;
                    if after < 0 {
                        return Err(Error::InsufficientReservedStock {
                            variant_id: req.variant_id,
                            location_id: req.location_id,
                            requested: req.quantity,
                            reserved: before,
                        });
                    }
                    if after > item.quantity {
                        return Err(Error::InsufficientStock {
                            variant_id: req.variant_id,
                            location_id: req.location_id,
                            requested: req.quantity,
                            available: item.available(),
                        });
                    }
                    item.reserved_quantity = after;
                    journal_rows.push(self.build_journal_row(item.id, req, before, after, delta));
                    outcomes.push(MutationOutcome {
                        inventory_id: item.id,
                        variant_id: item.variant_id,
                        location_id: item.location_id,
                        before_quantity: before,
                        after_quantity: after,
                        reserved_quantity: item.reserved_quantity,
                    });
                }
                Field::Quantity => {
                    let (before, after, delta) = if matches!(req.transaction_type, TransactionType::Refresh) {
                        let before = item.quantity;
                        let after = req.quantity;
                        (before, after, after - before)
                    } else {
                        let delta = sign * req.quantity;
                        let before = item.quantity;
                        let after = before + delta;
                        if !rule.skip_threshold && after < item.threshold {
                            return Err(Error::InsufficientStock {
                                variant_id: req.variant_id,
                                location_id: req.location_id,
                                requested: req.quantity,
                                available: item.available(),
                            });
                        }
                        (before, after, delta)
                    };
                    item.quantity = after;
                    journal_rows.push(self.build_journal_row(item.id, req, before, after, delta));
                    outcomes.push(MutationOutcome {
                        inventory_id: item.id,
                        variant_id: item.variant_id,
                        location_id: item.location_id,
                        before_quantity: before,
                        after_quantity: after,
                        reserved_quantity: item.reserved_quantity,
                    });
                }
                Field::Both => {
                    // OUTBOUND: release reserved and decrement quantity atomically.
                    let delta = sign * req.quantity;
                    let reserved_before = item.reserved_quantity;
                    let reserved_after = reserved_before + delta;
                    if reserved_after < 0 {
                        return Err(Error::InsufficientReservedStock {
                            variant_id: req.variant_id,
                            location_id: req.location_id,
                            requested: req.quantity,
                            reserved: reserved_before,
                        });
                    }
                    let before = item.quantity;
                    let after = before + delta;
                    if after < item.threshold {
                        return Err(Error::InsufficientStock {
                            variant_id: req.variant_id,
                            location_id: req.location_id,
                            requested: req.quantity,
                            available: item.available(),
                        });
                    }
                    item.reserved_quantity = reserved_after;
                    item.quantity = after;
                    // Single journal row; its snapshots reflect `quantity`.
                    journal_rows.push(self.build_journal_row(item.id, req, before, after, delta));
                    outcomes.push(MutationOutcome {
                        inventory_id: item.id,
                        variant_id: item.variant_id,
                        location_id: item.location_id,
                        before_quantity: before,
                        after_quantity: after,
                        reserved_quantity: item.reserved_quantity,
                    });
                }
            }
        }

        let updated: Vec<InventoryItem> = rows.into_values().collect();
        self.ledger.upsert_batch(&mut *tx, &updated).await?;
        self.journal.append_batch(&mut *tx, &journal_rows).await?;

        Ok(outcomes)
    }

    fn build_journal_row(
        &self,
        inventory_id: Uuid,
        req: &MutationRequest,
        before: i64,
        after: i64,
        delta: i64,
    ) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            inventory_id,
            transaction_type: req.transaction_type,
            quantity: delta,
            before_quantity: before,
            after_quantity: after,
            performed_by: req.performed_by.clone(),
            reference_id: req.reference.clone(),
            reference_type: req.reference_type.clone(),
            reason: req.reason.clone(),
            note: req.note.clone(),
            created_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request(transaction_type: TransactionType) -> MutationRequest {
        MutationRequest {
            variant_id: 1,
            location_id: 1,
            quantity: 5,
            transaction_type,
            direction: None,
            threshold: Some(0),
            reference: Some("ref-1".to_string()),
            reference_type: "manual".to_string(),
            reason: "unit test mutation".to_string(),
            note: None,
            performed_by: "tester".to_string(),
        }
    }

    #[test]
    fn adjustment_requires_direction() {
        let manager = InventoryManager::new(InventoryLedger::new(), TransactionJournal::new());
        let mut req = base_request(TransactionType::Adjustment);
        req.reference = None;
        let err = manager.validate(&req).unwrap_err();
        assert!(matches!(err, Error::UnknownDirection(_)));
    }

    #[test]
    fn purchase_rejects_direction() {
        let manager = InventoryManager::new(InventoryLedger::new(), TransactionJournal::new());
        let mut req = base_request(TransactionType::Purchase);
        req.direction = Some(Direction::Add);
        let err = manager.validate(&req).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn outbound_requires_reference() {
        let manager = InventoryManager::new(InventoryLedger::new(), TransactionJournal::new());
        let mut req = base_request(TransactionType::Outbound);
        req.reference = None;
        let err = manager.validate(&req).unwrap_err();
        assert!(matches!(err, Error::MissingReference(_)));
    }

    #[test]
    fn reason_too_short_is_rejected() {
        let manager = InventoryManager::new(InventoryLedger::new(), TransactionJournal::new());
        let mut req = base_request(TransactionType::Purchase);
        req.reason = "no".to_string();
        let err = manager.validate(&req).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[rstest::rstest]
    #[case::purchase(TransactionType::Purchase, true)]
    #[case::return_(TransactionType::Return, true)]
    #[case::transfer_in(TransactionType::TransferIn, true)]
    #[case::outbound(TransactionType::Outbound, true)]
    #[case::transfer_out(TransactionType::TransferOut, true)]
    #[case::reserved(TransactionType::Reserved, true)]
    #[case::released(TransactionType::Released, true)]
    #[case::damage(TransactionType::Damage, false)]
    #[case::adjustment(TransactionType::Adjustment, false)]
    #[case::refresh(TransactionType::Refresh, false)]
    fn reference_requirement_matches_rule_table(#[case] transaction_type: TransactionType, #[case] reference_required: bool) {
        let manager = InventoryManager::new(InventoryLedger::new(), TransactionJournal::new());
        let mut req = base_request(transaction_type);
        req.reference = None;
        if matches!(transaction_type, TransactionType::Adjustment) {
            req.direction = Some(Direction::Add);
        }

        let result = manager.validate(&req);
        assert_eq!(result.is_err(), reference_required, "{transaction_type:?}");
        if reference_required {
            assert!(matches!(result.unwrap_err(), Error::MissingReference(_)));
        }
    }
}
