//! Stripe-style HTTP payment processor client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::payments::{PaymentIntent, PaymentProcessor};

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Clone)]
pub struct StripeGateway {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self::with_api_base(secret_key, DEFAULT_API_BASE.to_string())
    }

    pub fn with_api_base(secret_key: String, api_base: String) -> Self {
        Self {
            secret_key,
            api_base,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

#[async_trait]
impl PaymentProcessor for StripeGateway {
    #[instrument(skip(self))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        user: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
            ("metadata[user]", user.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, Some(""))
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("payment processor unreachable: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Payment intent creation rejected: {}", detail);
            return Err(ServiceError::PaymentFailed("payment intent rejected".into()));
        }

        let intent: IntentResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("unparseable processor response: {e}"))
        })?;

        info!(intent_id = %intent.id, "Payment intent created");
        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
        })
    }
}
