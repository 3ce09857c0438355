use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::models::{OrderRecord, StatusFilter};
use crate::store::{paged_query, OrderStore, Page, PageKey, PagedSource};

const MAX_PAGE_LIMIT: usize = 100;

/// Read side of the order lifecycle: history listing and single-order fetch.
#[derive(Clone)]
pub struct OrderQueryService {
    orders: Arc<dyn OrderStore>,
}

#[derive(Debug)]
pub struct HistoryPage {
    pub orders: Vec<OrderRecord>,
    pub next_cursor: Option<PageKey>,
}

struct UserOrders<'a> {
    store: &'a dyn OrderStore,
    user: &'a str,
}

#[async_trait]
impl<'a> PagedSource for UserOrders<'a> {
    type Item = OrderRecord;
    type Key = PageKey;

    async fn read_page(
        &self,
        start: Option<PageKey>,
    ) -> Result<Page<OrderRecord, PageKey>, ServiceError> {
        self.store.read_page(self.user, start).await
    }

    fn key_of(&self, item: &OrderRecord) -> PageKey {
        PageKey::of(item)
    }
}

impl OrderQueryService {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// One page of the user's order history, newest first. The open cart row
    /// never appears here, whatever the filter.
    pub async fn history(
        &self,
        user: &str,
        filter: StatusFilter,
        limit: usize,
        cursor: Option<PageKey>,
    ) -> Result<HistoryPage, ServiceError> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ServiceError::ValidationError("invalid pagination limit".into()));
        }
        let source = UserOrders {
            store: self.orders.as_ref(),
            user,
        };
        let page = paged_query(&source, limit, cursor, |record: &OrderRecord| {
            !record.is_cart() && filter.matches(record.status)
        })
        .await?;
        Ok(HistoryPage {
            orders: page.items,
            next_cursor: page.last_key,
        })
    }

    pub async fn get_order(&self, user: &str, intent: &str) -> Result<OrderRecord, ServiceError> {
        self.orders
            .get(user, intent)
            .await?
            .ok_or_else(|| ServiceError::NotFound("order not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderRecord, OrderStatus, DEFAULT_LOGS};
    use crate::store::memory::MemoryStore;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn order(user: &str, intent: &str, status: OrderStatus, created_at: i64) -> OrderRecord {
        OrderRecord {
            user_id: user.into(),
            intent: intent.into(),
            lines: Vec::new(),
            amount: dec!(10.00),
            status,
            location: None,
            logs: DEFAULT_LOGS.into(),
            created_at,
        }
    }

    #[tokio::test]
    async fn history_excludes_the_cart_row() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(order("alice", "cart", OrderStatus::InCart, 3000))
            .await
            .unwrap();
        store
            .put(order("alice", "pi_1", OrderStatus::PaymentSucceeded, 2000))
            .await
            .unwrap();
        let svc = OrderQueryService::new(store);

        let page = svc.history("alice", StatusFilter::All, 10, None).await.unwrap();
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].intent, "pi_1");
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn history_is_scoped_to_the_user() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(order("alice", "pi_1", OrderStatus::PaymentSucceeded, 2000))
            .await
            .unwrap();
        store
            .put(order("bob", "pi_2", OrderStatus::PaymentSucceeded, 2500))
            .await
            .unwrap();
        let svc = OrderQueryService::new(store);

        let page = svc.history("alice", StatusFilter::All, 10, None).await.unwrap();
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].user_id, "alice");
    }

    #[tokio::test]
    async fn history_rejects_invalid_limits() {
        let svc = OrderQueryService::new(Arc::new(MemoryStore::new()));
        for limit in [0, 101] {
            let err = svc
                .history("alice", StatusFilter::All, limit, None)
                .await
                .unwrap_err();
            assert_matches!(err, ServiceError::ValidationError(msg) if msg == "invalid pagination limit");
        }
    }

    #[tokio::test]
    async fn history_fills_the_limit_across_capped_filtered_reads() {
        // store reads capped at 2 rows; every other row fails the filter
        let store = Arc::new(MemoryStore::with_read_page_size(2));
        for i in 0..14 {
            let status = if i % 2 == 0 {
                OrderStatus::PaymentSucceeded
            } else {
                OrderStatus::PaymentFailed
            };
            store
                .put(order("alice", &format!("pi_{i}"), status, 1000 + i))
                .await
                .unwrap();
        }
        let svc = OrderQueryService::new(store);

        let first = svc
            .history("alice", StatusFilter::Succeeded, 5, None)
            .await
            .unwrap();
        assert_eq!(first.orders.len(), 5);
        assert!(first
            .orders
            .iter()
            .all(|o| o.status == OrderStatus::PaymentSucceeded));
        let cursor = first.next_cursor.clone().expect("more matches remain");

        let second = svc
            .history("alice", StatusFilter::Succeeded, 5, Some(cursor))
            .await
            .unwrap();
        assert_eq!(second.orders.len(), 2);
        assert!(second.next_cursor.is_none());

        // pages are disjoint and newest first
        let all: Vec<&str> = first
            .orders
            .iter()
            .chain(second.orders.iter())
            .map(|o| o.intent.as_str())
            .collect();
        let mut deduped = all.clone();
        deduped.dedup();
        assert_eq!(all.len(), deduped.len());
        assert!(first.orders[0].created_at > first.orders[4].created_at);
    }

    #[tokio::test]
    async fn canceled_filter_returns_failed_and_canceled() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(order("alice", "pi_1", OrderStatus::PaymentFailed, 1000))
            .await
            .unwrap();
        store
            .put(order("alice", "pi_2", OrderStatus::PaymentCanceled, 2000))
            .await
            .unwrap();
        store
            .put(order("alice", "pi_3", OrderStatus::PaymentSucceeded, 3000))
            .await
            .unwrap();
        let svc = OrderQueryService::new(store);

        let page = svc
            .history("alice", StatusFilter::Canceled, 10, None)
            .await
            .unwrap();
        let intents: Vec<&str> = page.orders.iter().map(|o| o.intent.as_str()).collect();
        assert_eq!(intents, vec!["pi_2", "pi_1"]);
    }

    #[tokio::test]
    async fn get_order_misses_are_not_found() {
        let svc = OrderQueryService::new(Arc::new(MemoryStore::new()));
        assert_matches!(
            svc.get_order("alice", "pi_404").await.unwrap_err(),
            ServiceError::NotFound(_)
        );
    }
}
