//! Call-recording processor used by the test suites.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::payments::{PaymentIntent, PaymentProcessor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub user: String,
}

#[derive(Default)]
pub struct MockPaymentProcessor {
    calls: Mutex<Vec<RecordedIntent>>,
    counter: AtomicU64,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedIntent> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        user: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedIntent {
                amount_minor,
                currency: currency.to_string(),
                user: user.to_string(),
            });
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_mock_{n}");
        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
        })
    }
}
