use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::{round2, Location, CART_INTENT};
use crate::payments::PaymentProcessor;
use crate::store::{OrderPatch, OrderStore};

/// Delivery details submitted at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutInput {
    pub address: String,
    pub country: String,
}

/// What the storefront needs to complete payment: the processor's client
/// secret and the charged amount in major units.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub client_secret: String,
    pub amount: Decimal,
}

/// Turns a populated cart into a payment intent. The cart row itself is not
/// re-keyed here; that happens when the processor confirms intent creation
/// through the webhook channel.
#[derive(Clone)]
pub struct CheckoutService {
    orders: Arc<dyn OrderStore>,
    processor: Arc<dyn PaymentProcessor>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        processor: Arc<dyn PaymentProcessor>,
        currency: String,
    ) -> Self {
        Self {
            orders,
            processor,
            currency,
        }
    }

    #[instrument(skip(self, input), fields(user = %user))]
    pub async fn checkout(
        &self,
        user: &str,
        input: CheckoutInput,
    ) -> Result<CheckoutReceipt, ServiceError> {
        let cart = self
            .orders
            .get(user, CART_INTENT)
            .await?
            .ok_or_else(|| ServiceError::NotFound("no order in cart".into()))?;
        if cart.lines.is_empty() {
            return Err(ServiceError::InvalidOperation("no order".into()));
        }

        let address = input.address.trim();
        let country = input.country.trim();
        if address.is_empty() || country.is_empty() {
            return Err(ServiceError::ValidationError("invalid location".into()));
        }

        self.orders
            .update(
                user,
                CART_INTENT,
                OrderPatch {
                    location: Some(Location {
                        address: address.to_string(),
                        country: country.to_string(),
                    }),
                    ..Default::default()
                },
            )
            .await?;

        let amount = round2(cart.amount);
        let minor = to_minor_units(amount)?;
        let intent = self.processor.create_intent(minor, &self.currency, user).await?;

        info!(intent_id = %intent.id, amount_minor = minor, "Checkout initiated");
        Ok(CheckoutReceipt {
            client_secret: intent.client_secret,
            amount,
        })
    }
}

fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| ServiceError::InternalError("order amount out of range".into()))
}
