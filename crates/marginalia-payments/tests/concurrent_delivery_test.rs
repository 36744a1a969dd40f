//! Racing deliveries of one payment apply its effects exactly once.

mod common;

use std::sync::Arc;

use common::{Fixture, notification, sign};
use marginalia_core::model::{OrderLine, RecordStatus};
use marginalia_payments::application::command_handlers::{
    ConfirmPayment, handle_confirm, handle_webhook,
};
use marginalia_payments::domain::outcome::{ReconcileOutcome, Transition};
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_webhook_redeliveries_and_confirms_race_to_one_transition() {
    // Arrange
    let fx = Arc::new(Fixture::new());
    let product_id = Uuid::new_v4();
    fx.store
        .seed(|state| {
            state.stock_levels.insert(product_id, 3);
        })
        .await;
    let order = fx
        .order(
            vec![OrderLine::Product {
                product_id,
                quantity: 1,
                unit_price: 900,
            }],
            None,
        )
        .await;
    let session_id = fx.open_session(order).await;
    fx.gateway.mark_paid(&session_id, "pi_1");
    let body = Arc::new(notification("evt_1", "payment_succeeded", &session_id, &order));

    // Act: six webhook deliveries and six confirm calls at once.
    let mut tasks = Vec::new();
    for n in 0..12 {
        let fx = Arc::clone(&fx);
        let body = Arc::clone(&body);
        let session_id = session_id.clone();
        tasks.push(tokio::spawn(async move {
            if n % 2 == 0 {
                let signature = sign(&body);
                handle_webhook(&body, Some(&signature), &fx.verifier, fx.ctx())
                    .await
                    .unwrap()
            } else {
                handle_confirm(
                    &ConfirmPayment::Session { session_id },
                    &fx.gateway,
                    fx.ctx(),
                )
                .await
                .unwrap()
            }
        }));
    }
    let mut applied = 0;
    for task in tasks {
        if matches!(
            task.await.unwrap(),
            ReconcileOutcome::Applied(Transition::MarkedPaid { .. })
        ) {
            applied += 1;
        }
    }

    // Assert
    assert_eq!(applied, 1);
    let state = fx.store.snapshot().await;
    assert_eq!(state.orders[&order.domain_id].0.status, RecordStatus::Paid);
    assert_eq!(state.stock_levels[&product_id], 2);
    assert_eq!(state.stock_movements.len(), 1);
}
