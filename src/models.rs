//! Domain types shared by the stores, services, and HTTP surface.
//!
//! Order records and line items serialize in camelCase because their field
//! names (productId, imageSlot, createdAt, ...) are part of the wire contract
//! consumed by storefront clients.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sort-key sentinel for the open, pre-checkout cart record.
pub const CART_INTENT: &str = "cart";

/// Default diagnostic log value for order records.
pub const DEFAULT_LOGS: &str = "-";

/// Current time as epoch milliseconds, the timestamp unit used on order rows.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Rounds a monetary amount to two decimal places.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Canonical product record, the source of truth for every derived order
/// line field. The three image flags mark which attachment slots (1..3)
/// hold an uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub image1: bool,
    pub image2: bool,
    pub image3: bool,
    pub created_at: i64,
}

impl Product {
    /// First populated image slot, propagated onto order lines for display.
    pub fn first_image_slot(&self) -> Option<u8> {
        if self.image1 {
            Some(1)
        } else if self.image2 {
            Some(2)
        } else if self.image3 {
            Some(3)
        } else {
            None
        }
    }
}

/// One priced line of an order. Everything except `count` is derived from
/// the canonical product at write time, never taken from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_slot: Option<u8>,
}

impl LineItem {
    /// Derives a fully-priced line for `count` units of `product`.
    pub fn derive(product: &Product, count: i64) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
            price: product.price,
            count,
            image_slot: product.first_image_slot(),
        }
    }
}

/// Delivery location captured at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub country: String,
}

/// Payment lifecycle states of an order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "IN CART")]
    InCart,
    #[serde(rename = "PAYMENT CREATED")]
    PaymentCreated,
    #[serde(rename = "PAYMENT SUCCEEDED")]
    PaymentSucceeded,
    #[serde(rename = "PAYMENT FAILED")]
    PaymentFailed,
    #[serde(rename = "PAYMENT CANCELED")]
    PaymentCanceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InCart => "IN CART",
            Self::PaymentCreated => "PAYMENT CREATED",
            Self::PaymentSucceeded => "PAYMENT SUCCEEDED",
            Self::PaymentFailed => "PAYMENT FAILED",
            Self::PaymentCanceled => "PAYMENT CANCELED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "IN CART" => Some(Self::InCart),
            "PAYMENT CREATED" => Some(Self::PaymentCreated),
            "PAYMENT SUCCEEDED" => Some(Self::PaymentSucceeded),
            "PAYMENT FAILED" => Some(Self::PaymentFailed),
            "PAYMENT CANCELED" => Some(Self::PaymentCanceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order record per user x intent. `intent` is either the cart sentinel
/// or an external payment-intent identifier once checkout has migrated the
/// key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(rename = "user")]
    pub user_id: String,
    pub intent: String,
    #[serde(rename = "orders")]
    pub lines: Vec<LineItem>,
    pub amount: Decimal,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub logs: String,
    pub created_at: i64,
}

impl OrderRecord {
    /// A fresh, empty cart for `user`.
    pub fn empty_cart(user: &str) -> Self {
        Self {
            user_id: user.to_string(),
            intent: CART_INTENT.to_string(),
            lines: Vec::new(),
            amount: Decimal::ZERO,
            status: OrderStatus::InCart,
            location: None,
            logs: DEFAULT_LOGS.to_string(),
            created_at: now_millis(),
        }
    }

    pub fn is_cart(&self) -> bool {
        self.intent == CART_INTENT
    }
}

/// Order-history filter categories exposed to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Succeeded,
    Requested,
    Canceled,
}

impl StatusFilter {
    /// Whether an order with `status` belongs to this history category.
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            Self::All => true,
            Self::Succeeded => status == OrderStatus::PaymentSucceeded,
            Self::Requested => status == OrderStatus::PaymentCreated,
            Self::Canceled => {
                matches!(status, OrderStatus::PaymentFailed | OrderStatus::PaymentCanceled)
            }
        }
    }
}
