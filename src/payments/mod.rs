//! Payment processor collaborator: intent creation and webhook events.

pub mod mock;
pub mod stripe;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::ServiceError;

/// A created payment intent: the id later drives webhook correlation, the
/// client secret is handed to the storefront to complete payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// External payment processor contract.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates an intent for `amount_minor` minor currency units, tagged
    /// with the user identifier as metadata for webhook correlation.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        user: &str,
    ) -> Result<PaymentIntent, ServiceError>;
}

/// The webhook event kinds the state machine reacts to. Each carries the
/// processor-assigned intent id and the user recovered from intent metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Created {
        intent_id: String,
        user: String,
    },
    Succeeded {
        intent_id: String,
        user: String,
        message: Option<String>,
    },
    Failed {
        intent_id: String,
        user: String,
        message: Option<String>,
    },
    Canceled {
        intent_id: String,
        user: String,
        message: Option<String>,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: IntentObject,
}

#[derive(Deserialize)]
struct IntentObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    last_payment_error: Option<PaymentError>,
    #[serde(default)]
    cancellation_reason: Option<String>,
}

#[derive(Deserialize)]
struct PaymentError {
    #[serde(default)]
    message: Option<String>,
}

/// Parses a webhook payload into an event. Returns `Ok(None)` for event
/// kinds outside the payment-intent lifecycle; those are deliberate no-ops.
/// A payload without an intent id or `user` metadata entry is malformed and
/// rejected before any state mutation is attempted.
pub fn parse_event(payload: &[u8]) -> Result<Option<PaymentEvent>, ServiceError> {
    let envelope: Envelope = serde_json::from_slice(payload)
        .map_err(|e| ServiceError::BadRequest(format!("invalid webhook payload: {e}")))?;

    let kind = envelope
        .kind
        .strip_prefix("payment_intent.")
        .unwrap_or(&envelope.kind);
    if !matches!(kind, "created" | "succeeded" | "payment_failed" | "canceled") {
        return Ok(None);
    }

    let object = envelope.data.object;
    let intent_id = object.id;
    if intent_id.is_empty() {
        return Err(ServiceError::BadRequest("invalid webhook payload: missing intent id".into()));
    }
    let user = object
        .metadata
        .get("user")
        .filter(|u| !u.is_empty())
        .cloned()
        .ok_or_else(|| {
            ServiceError::BadRequest("invalid webhook payload: missing user metadata".into())
        })?;

    let event = match kind {
        "created" => PaymentEvent::Created { intent_id, user },
        "succeeded" => PaymentEvent::Succeeded {
            intent_id,
            user,
            message: None,
        },
        "payment_failed" => PaymentEvent::Failed {
            intent_id,
            user,
            message: object.last_payment_error.and_then(|e| e.message),
        },
        _ => PaymentEvent::Canceled {
            intent_id,
            user,
            message: object.cancellation_reason,
        },
    };
    Ok(Some(event))
}
