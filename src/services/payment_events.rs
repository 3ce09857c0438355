use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::errors::ServiceError;
use crate::models::{now_millis, OrderRecord, OrderStatus, CART_INTENT, DEFAULT_LOGS};
use crate::payments::PaymentEvent;
use crate::store::{OrderPatch, OrderStore};

/// Applies processor webhook events to order records.
///
/// `created` promotes the open cart: the record moves from the cart key to
/// the intent key in one atomic migration, so at no point does the user have
/// two carts or none. Terminal events only touch status and logs.
#[derive(Clone)]
pub struct PaymentEventService {
    orders: Arc<dyn OrderStore>,
}

impl PaymentEventService {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    #[instrument(skip(self, event))]
    pub async fn apply(&self, event: PaymentEvent) -> Result<(), ServiceError> {
        match event {
            PaymentEvent::Created { intent_id, user } => self.promote_cart(&user, &intent_id).await,
            PaymentEvent::Succeeded {
                intent_id,
                user,
                message,
            } => {
                self.finish(&user, &intent_id, OrderStatus::PaymentSucceeded, message)
                    .await
            }
            PaymentEvent::Failed {
                intent_id,
                user,
                message,
            } => {
                self.finish(&user, &intent_id, OrderStatus::PaymentFailed, message)
                    .await
            }
            PaymentEvent::Canceled {
                intent_id,
                user,
                message,
            } => {
                self.finish(&user, &intent_id, OrderStatus::PaymentCanceled, message)
                    .await
            }
        }
    }

    async fn promote_cart(&self, user: &str, intent_id: &str) -> Result<(), ServiceError> {
        match self.orders.get(user, CART_INTENT).await? {
            Some(cart) => {
                let record = OrderRecord {
                    intent: intent_id.to_string(),
                    status: OrderStatus::PaymentCreated,
                    created_at: now_millis(),
                    ..cart
                };
                self.orders.migrate_key(user, CART_INTENT, record).await?;
                info!(user = %user, intent_id = %intent_id, "Cart promoted to order");
                Ok(())
            }
            None => {
                // webhook deliveries can repeat; a replay after migration is a no-op
                if self.orders.get(user, intent_id).await?.is_some() {
                    debug!(user = %user, intent_id = %intent_id, "Intent already promoted, ignoring replay");
                    Ok(())
                } else {
                    Err(ServiceError::NotFound("no order in cart".into()))
                }
            }
        }
    }

    async fn finish(
        &self,
        user: &str,
        intent_id: &str,
        status: OrderStatus,
        message: Option<String>,
    ) -> Result<(), ServiceError> {
        self.orders
            .update(
                user,
                intent_id,
                OrderPatch {
                    status: Some(status),
                    logs: Some(message.unwrap_or_else(|| DEFAULT_LOGS.to_string())),
                    ..Default::default()
                },
            )
            .await?;
        info!(user = %user, intent_id = %intent_id, status = %status, "Order status updated");
        Ok(())
    }
}
