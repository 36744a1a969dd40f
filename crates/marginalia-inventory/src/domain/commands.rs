//! Commands for the Inventory context.

use marginalia_core::command::Command;
use uuid::Uuid;

/// Command to move stock in or out.
#[derive(Debug, Clone)]
pub struct AdjustStock {
    /// Id of the movement to append; doubles as the idempotency key.
    pub movement_id: Uuid,
    /// The product.
    pub product_id: Uuid,
    /// Signed change to the balance.
    pub delta: i64,
    /// Free-text reason, e.g. `delivery`, `sale`, `stocktake`.
    pub reason: String,
}

impl Command for AdjustStock {
    fn command_type(&self) -> &'static str {
        "inventory.adjust"
    }

    fn request_id(&self) -> Uuid {
        self.movement_id
    }
}
