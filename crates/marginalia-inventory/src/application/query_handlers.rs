//! Query handlers for the Inventory context.

use marginalia_core::actor::{Actor, StaffRole};
use marginalia_core::error::DomainError;
use marginalia_core::model::StockMovement;
use marginalia_core::store::CommerceStore;
use serde::Serialize;
use uuid::Uuid;

/// Current stock of a product.
#[derive(Debug, Serialize)]
pub struct StockView {
    /// The product.
    pub product_id: Uuid,
    /// Units on hand.
    pub balance: i64,
}

/// Returns the stored counter of a product. Products never stocked read as 0.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store is unreachable.
pub async fn balance_of(
    product_id: Uuid,
    store: &dyn CommerceStore,
) -> Result<StockView, DomainError> {
    let mut uow = store.begin().await?;
    let balance = uow.stock_balance(product_id).await?.unwrap_or(0);
    Ok(StockView {
        product_id,
        balance,
    })
}

/// Lists a product's movements, oldest first.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the actor is an admin.
pub async fn movements_of(
    product_id: Uuid,
    actor: &Actor,
    store: &dyn CommerceStore,
) -> Result<Vec<StockMovement>, DomainError> {
    actor.require("read stock history", &[StaffRole::Admin])?;
    let mut uow = store.begin().await?;
    uow.stock_movements(product_id).await
}
