//! Store collaborator contracts and the paginated query helper.
//!
//! The production backend is [`sql`]; [`memory`] is an in-process backend
//! with the same semantics, used by the test suites.

pub mod memory;
pub mod sql;

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::{Location, OrderRecord, OrderStatus, Product};

/// Native continuation key of the order store: the key-position of the last
/// row a page read delivered. Opaque to callers, echoed back verbatim for
/// the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageKey {
    pub user: String,
    pub intent: String,
    pub created_at: i64,
}

/// Continuation key for product listing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductKey {
    pub id: String,
    pub created_at: i64,
}

/// One page of store reads plus the native continuation key; `None` means
/// the store reported exhaustion.
#[derive(Debug, Clone)]
pub struct Page<T, K> {
    pub items: Vec<T>,
    pub last_key: Option<K>,
}

/// Changed top-level fields of an order record. Only set fields are written,
/// so concurrent writers touching disjoint fields do not clobber each other.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub logs: Option<String>,
    pub location: Option<Location>,
}

/// Changed top-level fields of a product record.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub image1: Option<bool>,
    pub image2: Option<bool>,
    pub image3: Option<bool>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.image1.is_none()
            && self.image2.is_none()
            && self.image3.is_none()
    }
}

/// Canonical product store: single get, batched get, partial update.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Product>, ServiceError>;

    /// Fetches all listed products in a single batched read. Identifiers
    /// without a product are absent from the result; absence is the signal
    /// downstream uses to drop stale lines.
    async fn batch_get(&self, ids: &[String]) -> Result<HashMap<String, Product>, ServiceError>;

    async fn put(&self, product: Product) -> Result<(), ServiceError>;

    /// Partial-attribute update; fails with `NotFound` if the row is gone.
    async fn update(&self, id: &str, patch: ProductPatch) -> Result<(), ServiceError>;

    async fn delete(&self, id: &str) -> Result<(), ServiceError>;

    /// One capped page of products, newest first.
    async fn read_page(
        &self,
        start: Option<ProductKey>,
    ) -> Result<Page<Product, ProductKey>, ServiceError>;
}

/// Order store keyed by (user, intent).
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, user: &str, intent: &str) -> Result<Option<OrderRecord>, ServiceError>;

    /// Full-state write (create or overwrite) under the record's own key.
    async fn put(&self, record: OrderRecord) -> Result<(), ServiceError>;

    /// Partial-attribute update; fails with `NotFound` if the row is gone.
    async fn update(&self, user: &str, intent: &str, patch: OrderPatch)
        -> Result<(), ServiceError>;

    /// Atomic key migration: delete `(user, old_intent)` and insert `record`
    /// under its new key as a single all-or-nothing write. A crash cannot
    /// leave the user with neither record nor with both.
    async fn migrate_key(
        &self,
        user: &str,
        old_intent: &str,
        record: OrderRecord,
    ) -> Result<(), ServiceError>;

    /// One capped page of the user's order rows, newest first. The row cap
    /// is the store's own, independent of any caller-requested limit.
    async fn read_page(
        &self,
        user: &str,
        start: Option<PageKey>,
    ) -> Result<Page<OrderRecord, PageKey>, ServiceError>;
}

/// A source of capped page reads that [`paged_query`] can loop over.
#[async_trait]
pub trait PagedSource: Sync {
    type Item: Send;
    type Key: Clone + Send + Sync;

    async fn read_page(
        &self,
        start: Option<Self::Key>,
    ) -> Result<Page<Self::Item, Self::Key>, ServiceError>;

    /// Key-position of a delivered item, used as the continuation point when
    /// a query stops at its logical limit mid-page.
    fn key_of(&self, item: &Self::Item) -> Self::Key;
}

/// Cursor-based query helper. The underlying store caps every page read and
/// some fetched rows are filtered out post-read, so a single read rarely
/// satisfies the caller's logical limit; this keeps issuing reads from the
/// last key, accumulating post-filter matches, until the limit is reached or
/// the store reports exhaustion.
pub async fn paged_query<S, F>(
    source: &S,
    limit: usize,
    start: Option<S::Key>,
    mut keep: F,
) -> Result<Page<S::Item, S::Key>, ServiceError>
where
    S: PagedSource,
    F: FnMut(&S::Item) -> bool + Send,
{
    let mut items: Vec<S::Item> = Vec::new();
    let mut cursor = start;

    loop {
        let page = source.read_page(cursor.take()).await?;
        let exhausted = page.last_key.is_none();

        for item in page.items {
            if keep(&item) {
                items.push(item);
                if items.len() >= limit {
                    let last_key = items.last().map(|i| source.key_of(i));
                    return Ok(Page { items, last_key });
                }
            }
        }

        if exhausted {
            return Ok(Page {
                items,
                last_key: None,
            });
        }
        cursor = page.last_key;
    }
}

impl PageKey {
    pub fn of(record: &OrderRecord) -> Self {
        Self {
            user: record.user_id.clone(),
            intent: record.intent.clone(),
            created_at: record.created_at,
        }
    }
}

impl ProductKey {
    pub fn of(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            created_at: product.created_at,
        }
    }
}
