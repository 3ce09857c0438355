use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::errors::ServiceError;
use crate::payments::parse_event;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Payment processor webhook ingress. Signature verification runs before the
/// payload is parsed; without a configured secret (local development) it is
/// skipped. The processor retries on non-2xx, so handled events always
/// answer 200 even when they turn out to be lifecycle no-ops.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = &state.config.payment_webhook_secret {
        let header = headers
            .get("Stripe-Signature")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ServiceError::BadRequest("missing webhook signature".into()))?;
        verify_signature(
            secret,
            state.config.payment_webhook_tolerance_secs,
            header,
            &body,
        )?;
    }

    match parse_event(&body)? {
        Some(event) => state.services.payment_events.apply(event).await?,
        None => debug!("Ignoring webhook event outside the payment intent lifecycle"),
    }
    Ok((StatusCode::OK, "ok"))
}

/// Checks a `t=<unix>,v1=<hex hmac>` signature header: HMAC-SHA256 over
/// `"{t}.{payload}"`, with the timestamp bounded by the configured clock
/// tolerance to stop replays of captured deliveries.
fn verify_signature(
    secret: &str,
    tolerance_secs: u64,
    header: &str,
    payload: &[u8],
) -> Result<(), ServiceError> {
    let mut timestamp: Option<i64> = None;
    let mut signature: Option<&str> = None;
    for part in header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => timestamp = val.parse().ok(),
            (Some("v1"), Some(val)) => signature = Some(val),
            _ => {}
        }
    }
    let (timestamp, signature) = match (timestamp, signature) {
        (Some(t), Some(s)) => (t, s),
        _ => return Err(ServiceError::BadRequest("invalid webhook signature".into())),
    };

    let age = (Utc::now().timestamp() - timestamp).unsigned_abs();
    if age > tolerance_secs {
        return Err(ServiceError::BadRequest("stale webhook signature".into()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("invalid webhook secret".into()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if constant_time_eq(&expected, signature) {
        Ok(())
    } else {
        Err(ServiceError::BadRequest("invalid webhook signature".into()))
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_fresh_valid_signature() {
        let now = Utc::now().timestamp();
        let header = sign("whsec_test", now, b"{}");
        assert!(verify_signature("whsec_test", 300, &header, b"{}").is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now().timestamp();
        let header = sign("whsec_other", now, b"{}");
        assert!(verify_signature("whsec_test", 300, &header, b"{}").is_err());
    }

    #[test]
    fn rejects_tampered_payload() {
        let now = Utc::now().timestamp();
        let header = sign("whsec_test", now, b"{\"amount\":1}");
        assert!(verify_signature("whsec_test", 300, &header, b"{\"amount\":9}").is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let old = Utc::now().timestamp() - 4000;
        let header = sign("whsec_test", old, b"{}");
        assert!(verify_signature("whsec_test", 300, &header, b"{}").is_err());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(verify_signature("whsec_test", 300, "v1=abc", b"{}").is_err());
        assert!(verify_signature("whsec_test", 300, "", b"{}").is_err());
    }
}
