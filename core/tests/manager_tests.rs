use inv_core::models::{Direction, TransactionType};
use inv_core::services::{InventoryLedger, InventoryManager, MutationRequest, TransactionJournal};
use sqlx::PgPool;

fn manager() -> InventoryManager {
    InventoryManager::new(InventoryLedger::new(), TransactionJournal::new())
}

fn purchase(variant_id: i64, location_id: i64, quantity: i64) -> MutationRequest {
    MutationRequest {
        variant_id,
        location_id,
        quantity,
        transaction_type: TransactionType::Purchase,
        direction: None,
        threshold: Some(0),
        reference: Some("po-1".to_string()),
        reference_type: "manual".to_string(),
        reason: "initial stock load".to_string(),
        note: None,
        performed_by: "tester".to_string(),
    }
}

#[sqlx::test(migrations = "../migrations")]
async fn purchase_then_reserve_then_outbound_reconciles_ledger(pool: PgPool) -> sqlx::Result<()> {
    let manager = manager();
    let mut tx = pool.begin().await?;

    let purchase_outcome = manager.apply_one(&mut tx, purchase(1, 1, 100)).await.expect("purchase applies");
    assert_eq!(purchase_outcome.after_quantity, 100);

    let reserve = MutationRequest {
        transaction_type: TransactionType::Reserved,
        reference: Some("reservation-1".to_string()),
        reason: "reservation create".to_string(),
        quantity: 3,
        ..purchase(1, 1, 3)
    };
    let reserved = manager.apply_one(&mut tx, reserve).await.expect("reserve applies");
    assert_eq!(reserved.reserved_quantity, 3);
    assert_eq!(reserved.after_quantity, 100);

    let ship = MutationRequest {
        transaction_type: TransactionType::Outbound,
        reference: Some("order-1".to_string()),
        reason: "ship against order".to_string(),
        quantity: 3,
        ..purchase(1, 1, 3)
    };
    let shipped = manager.apply_one(&mut tx, ship).await.expect("ship applies");
    assert_eq!(shipped.after_quantity, 97);
    assert_eq!(shipped.reserved_quantity, 0);

    tx.commit().await?;
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn threshold_floor_rejects_decrement_below_floor(pool: PgPool) -> sqlx::Result<()> {
    let manager = manager();
    let mut tx = pool.begin().await?;
    manager.apply_one(&mut tx, purchase(2, 1, 5)).await.expect("purchase applies");

    let damage = MutationRequest {
        transaction_type: TransactionType::Damage,
        reference: None,
        reason: "breakage on shelf".to_string(),
        quantity: 6,
        threshold: Some(0),
        ..purchase(2, 1, 6)
    };
    let result = manager.apply_one(&mut tx, damage).await;
    assert!(result.is_err());
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn adjustment_without_direction_is_rejected(pool: PgPool) -> sqlx::Result<()> {
    let manager = manager();
    let mut tx = pool.begin().await?;
    manager.apply_one(&mut tx, purchase(3, 1, 10)).await.expect("purchase applies");

    let adjustment = MutationRequest {
        transaction_type: TransactionType::Adjustment,
        direction: None,
        reference: None,
        reason: "physical recount".to_string(),
        quantity: 1,
        ..purchase(3, 1, 1)
    };
    let result = manager.apply_one(&mut tx, adjustment).await;
    assert!(result.is_err());
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn adjustment_with_direction_remove_decrements_quantity(pool: PgPool) -> sqlx::Result<()> {
    let manager = manager();
    let mut tx = pool.begin().await?;
    manager.apply_one(&mut tx, purchase(4, 1, 10)).await.expect("purchase applies");

    let adjustment = MutationRequest {
        transaction_type: TransactionType::Adjustment,
        direction: Some(Direction::Remove),
        reference: None,
        reason: "physical recount".to_string(),
        quantity: 2,
        threshold: Some(0),
        ..purchase(4, 1, 2)
    };
    let outcome = manager.apply_one(&mut tx, adjustment).await.expect("adjustment applies");
    assert_eq!(outcome.after_quantity, 8);
    Ok(())
}

#[sqlx::test(migrations = "../migrations")]
async fn refresh_sets_absolute_quantity_and_skips_floor(pool: PgPool) -> sqlx::Result<()> {
    let manager = manager();
    let mut tx = pool.begin().await?;
    manager.apply_one(&mut tx, purchase(5, 1, 10)).await.expect("purchase applies");

    let refresh = MutationRequest {
        transaction_type: TransactionType::Refresh,
        reference: None,
        reason: "physical count override".to_string(),
        quantity: 2,
        threshold: Some(5),
        ..purchase(5, 1, 2)
    };
    let outcome = manager.apply_one(&mut tx, refresh).await.expect("refresh applies even below threshold");
    assert_eq!(outcome.after_quantity, 2);
    Ok(())
}
