//! Racing adjustments of one product keep the counter and the log in step.

use std::sync::Arc;

use marginalia_core::actor::{Actor, StaffRole};
use marginalia_inventory::application::command_handlers::handle_adjust_stock;
use marginalia_inventory::domain::commands::AdjustStock;
use marginalia_inventory::domain::stock::AdjustOutcome;
use marginalia_test_support::{FixedClock, InMemoryCommerceStore, fixed_now};
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_racing_sales_never_oversell() {
    // Arrange
    let store = InMemoryCommerceStore::new();
    let product_id = Uuid::new_v4();
    let admin = Actor::new("admin", StaffRole::Admin);
    handle_adjust_stock(
        &AdjustStock {
            movement_id: Uuid::new_v4(),
            product_id,
            delta: 5,
            reason: "delivery".into(),
        },
        &admin,
        &FixedClock(fixed_now()),
        &store,
    )
    .await
    .unwrap();

    // Act: 20 concurrent single-unit sales against 5 units.
    let store = Arc::new(store);
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let store = Arc::clone(&store);
        let admin = admin.clone();
        tasks.push(tokio::spawn(async move {
            let command = AdjustStock {
                movement_id: Uuid::new_v4(),
                product_id,
                delta: -1,
                reason: "sale".into(),
            };
            handle_adjust_stock(&command, &admin, &FixedClock(fixed_now()), store.as_ref())
                .await
                .unwrap()
        }));
    }
    let mut applied = 0;
    for task in tasks {
        if matches!(task.await.unwrap(), AdjustOutcome::Applied { .. }) {
            applied += 1;
        }
    }

    // Assert
    assert_eq!(applied, 5);
    let state = store.snapshot().await;
    let logged: i64 = state.stock_movements.iter().map(|m| m.delta).sum();
    assert_eq!(state.stock_levels.get(&product_id), Some(&0));
    assert_eq!(logged, 0);
}
