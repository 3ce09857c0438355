use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order row, one per user x intent. `intent` holds the `"cart"` sentinel
/// until the payment-created webhook migrates the key to the processor's
/// intent id. Line items and the delivery location are stored as JSON.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub intent: String,
    #[sea_orm(column_type = "Json")]
    pub line_items: Json,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub status: String,
    #[sea_orm(column_type = "Json", nullable)]
    pub location: Option<Json>,
    pub logs: String,
    /// Epoch milliseconds; refreshed at the cart-to-intent key migration
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
