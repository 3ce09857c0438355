use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::models::{round2, LineItem, OrderRecord, CART_INTENT};
use crate::store::{OrderStore, ProductStore};

/// A client-submitted cart line: an id and a quantity, nothing more. Every
/// priced field is re-derived from the canonical product at write time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub count: i64,
}

/// Cart merge and replace engine.
#[derive(Clone)]
pub struct CartService {
    products: Arc<dyn ProductStore>,
    orders: Arc<dyn OrderStore>,
}

impl CartService {
    pub fn new(products: Arc<dyn ProductStore>, orders: Arc<dyn OrderStore>) -> Self {
        Self { products, orders }
    }

    /// Merges locally-held cart lines into the persisted cart. Union by
    /// product id, persisted line order first, quantity resolved per product
    /// as the larger of the two counts. Lines whose product no longer exists
    /// are dropped, and every surviving line is repriced from the canonical
    /// product before the cart is rewritten.
    #[instrument(skip(self, local), fields(user = %user, local_lines = local.len()))]
    pub async fn merge(&self, user: &str, local: Vec<CartLine>) -> Result<OrderRecord, ServiceError> {
        let local = collapse_max(local);
        let existing = self.orders.get(user, CART_INTENT).await?;

        let mut ids: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        if let Some(cart) = &existing {
            for line in &cart.lines {
                if seen.insert(line.product_id.as_str()) {
                    ids.push(line.product_id.clone());
                }
            }
        }
        for (id, _) in &local {
            if seen.insert(id.as_str()) {
                ids.push(id.clone());
            }
        }
        let canonical = self.products.batch_get(&ids).await?;

        let local_counts: HashMap<&str, i64> =
            local.iter().map(|(id, count)| (id.as_str(), *count)).collect();

        let mut lines: Vec<LineItem> = Vec::new();
        let mut placed: HashSet<&str> = HashSet::new();
        if let Some(cart) = &existing {
            for line in &cart.lines {
                if !placed.insert(line.product_id.as_str()) {
                    continue;
                }
                if let Some(product) = canonical.get(&line.product_id) {
                    let count = match local_counts.get(line.product_id.as_str()) {
                        Some(&lc) => lc.max(line.count),
                        None => line.count,
                    };
                    lines.push(LineItem::derive(product, count));
                } else {
                    debug!(product_id = %line.product_id, "Dropping cart line for missing product");
                }
            }
        }
        for (id, count) in &local {
            if placed.contains(id.as_str()) {
                continue;
            }
            if let Some(product) = canonical.get(id) {
                lines.push(LineItem::derive(product, *count));
            } else {
                debug!(product_id = %id, "Dropping cart line for missing product");
            }
        }

        let record = self.rebuild(user, existing, lines);
        self.orders.put(record.clone()).await?;
        Ok(record)
    }

    /// Replaces the persisted cart with exactly the submitted lines. The
    /// client list is authoritative for membership and quantities; for a
    /// product listed more than once the last occurrence wins.
    #[instrument(skip(self, items), fields(user = %user, lines = items.len()))]
    pub async fn replace(&self, user: &str, items: Vec<CartLine>) -> Result<OrderRecord, ServiceError> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for item in items {
            if item.count <= 0 {
                continue;
            }
            if !counts.contains_key(&item.product_id) {
                order.push(item.product_id.clone());
            }
            counts.insert(item.product_id, item.count);
        }

        let canonical = self.products.batch_get(&order).await?;
        let lines: Vec<LineItem> = order
            .iter()
            .filter_map(|id| canonical.get(id).map(|p| LineItem::derive(p, counts[id])))
            .collect();

        let existing = self.orders.get(user, CART_INTENT).await?;
        let record = self.rebuild(user, existing, lines);
        self.orders.put(record.clone()).await?;
        Ok(record)
    }

    /// The user's current cart view. A user without a persisted cart gets an
    /// empty one without a row being written; an existing cart is merged with
    /// no local lines, which reprices it against today's catalog.
    pub async fn get_cart(&self, user: &str) -> Result<OrderRecord, ServiceError> {
        match self.orders.get(user, CART_INTENT).await? {
            None => Ok(OrderRecord::empty_cart(user)),
            Some(_) => self.merge(user, Vec::new()).await,
        }
    }

    fn rebuild(
        &self,
        user: &str,
        existing: Option<OrderRecord>,
        lines: Vec<LineItem>,
    ) -> OrderRecord {
        let amount = round2(
            lines
                .iter()
                .map(|l| l.price * Decimal::from(l.count))
                .sum::<Decimal>(),
        );
        // timestamps, logs, and any checkout location survive cart rewrites
        let base = existing.unwrap_or_else(|| OrderRecord::empty_cart(user));
        OrderRecord {
            lines,
            amount,
            ..base
        }
    }
}

/// Drops non-positive counts and collapses duplicate ids to the largest
/// count, keeping first-occurrence order.
fn collapse_max(items: Vec<CartLine>) -> Vec<(String, i64)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, i64> = HashMap::new();
    for item in items {
        if item.count <= 0 {
            continue;
        }
        match counts.get_mut(&item.product_id) {
            Some(existing) => *existing = (*existing).max(item.count),
            None => {
                order.push(item.product_id.clone());
                counts.insert(item.product_id, item.count);
            }
        }
    }
    order
        .into_iter()
        .map(|id| {
            let count = counts[&id];
            (id, count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{now_millis, Location, OrderStatus, Product, DEFAULT_LOGS};
    use crate::store::memory::MemoryStore;
    use rust_decimal_macros::dec;

    fn product(id: &str, price: Decimal) -> Product {
        Product {
            id: id.into(),
            name: format!("Product {id}"),
            category: "misc".into(),
            price,
            image1: false,
            image2: true,
            image3: false,
            created_at: now_millis(),
        }
    }

    async fn setup(products: &[Product]) -> (Arc<MemoryStore>, CartService) {
        let store = Arc::new(MemoryStore::new());
        for p in products {
            ProductStore::put(store.as_ref(), p.clone()).await.unwrap();
        }
        let svc = CartService::new(store.clone(), store.clone());
        (store, svc)
    }

    fn line(id: &str, count: i64) -> CartLine {
        CartLine {
            product_id: id.into(),
            count,
        }
    }

    #[tokio::test]
    async fn merge_takes_max_count_per_product() {
        let (_, svc) = setup(&[product("p1", dec!(10.00)), product("p2", dec!(4.00))]).await;

        svc.merge("alice", vec![line("p1", 2), line("p2", 1)]).await.unwrap();
        let merged = svc.merge("alice", vec![line("p1", 1), line("p2", 5)]).await.unwrap();

        assert_eq!(merged.lines.len(), 2);
        assert_eq!(merged.lines[0].product_id, "p1");
        assert_eq!(merged.lines[0].count, 2);
        assert_eq!(merged.lines[1].count, 5);
        assert_eq!(merged.amount, dec!(40.00));
    }

    #[tokio::test]
    async fn merge_drops_lines_for_missing_products() {
        let (store, svc) = setup(&[product("p1", dec!(10.00)), product("p2", dec!(4.00))]).await;
        svc.merge("alice", vec![line("p1", 1), line("p2", 3)]).await.unwrap();

        ProductStore::delete(store.as_ref(), "p2").await.unwrap();
        let merged = svc.merge("alice", Vec::new()).await.unwrap();

        assert_eq!(merged.lines.len(), 1);
        assert_eq!(merged.lines[0].product_id, "p1");
        assert_eq!(merged.amount, dec!(10.00));
    }

    #[tokio::test]
    async fn merge_reprices_from_canonical_products() {
        let (store, svc) = setup(&[product("p1", dec!(10.00))]).await;
        svc.merge("alice", vec![line("p1", 2)]).await.unwrap();

        let mut cheaper = product("p1", dec!(7.50));
        cheaper.name = "Renamed".into();
        ProductStore::put(store.as_ref(), cheaper).await.unwrap();

        let merged = svc.merge("alice", Vec::new()).await.unwrap();
        assert_eq!(merged.lines[0].price, dec!(7.50));
        assert_eq!(merged.lines[0].name, "Renamed");
        assert_eq!(merged.amount, dec!(15.00));
    }

    #[tokio::test]
    async fn merge_discards_invalid_counts() {
        let (_, svc) = setup(&[product("p1", dec!(10.00)), product("p2", dec!(4.00))]).await;

        let merged = svc
            .merge("alice", vec![line("p1", 0), line("p2", -3), line("p2", 2)])
            .await
            .unwrap();

        assert_eq!(merged.lines.len(), 1);
        assert_eq!(merged.lines[0].product_id, "p2");
        assert_eq!(merged.lines[0].count, 2);
    }

    #[tokio::test]
    async fn merge_derives_line_fields_from_product() {
        let (_, svc) = setup(&[product("p1", dec!(9.99))]).await;
        let merged = svc.merge("alice", vec![line("p1", 1)]).await.unwrap();

        let l = &merged.lines[0];
        assert_eq!(l.name, "Product p1");
        assert_eq!(l.category, "misc");
        assert_eq!(l.image_slot, Some(2));
    }

    #[tokio::test]
    async fn merge_preserves_cart_metadata() {
        let (store, svc) = setup(&[product("p1", dec!(10.00))]).await;
        let first = svc.merge("alice", vec![line("p1", 1)]).await.unwrap();

        let mut with_location = first.clone();
        with_location.location = Some(Location {
            address: "1 Main St".into(),
            country: "US".into(),
        });
        OrderStore::put(store.as_ref(), with_location).await.unwrap();

        let merged = svc.merge("alice", vec![line("p1", 3)]).await.unwrap();
        assert_eq!(merged.created_at, first.created_at);
        assert_eq!(merged.logs, DEFAULT_LOGS);
        assert!(merged.location.is_some());
        assert_eq!(merged.status, OrderStatus::InCart);
    }

    #[tokio::test]
    async fn replace_is_authoritative_for_membership() {
        let (_, svc) = setup(&[
            product("p1", dec!(10.00)),
            product("p2", dec!(4.00)),
            product("p3", dec!(2.00)),
        ])
        .await;
        svc.merge("alice", vec![line("p1", 2), line("p2", 1)]).await.unwrap();

        let replaced = svc
            .replace("alice", vec![line("p2", 1), line("p3", 4), line("p2", 7)])
            .await
            .unwrap();

        let ids: Vec<&str> = replaced.lines.iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3"]);
        // last occurrence wins for duplicates
        assert_eq!(replaced.lines[0].count, 7);
        assert_eq!(replaced.amount, dec!(36.00));
    }

    #[tokio::test]
    async fn replace_with_no_lines_empties_the_cart() {
        let (_, svc) = setup(&[product("p1", dec!(10.00))]).await;
        svc.merge("alice", vec![line("p1", 2)]).await.unwrap();

        let replaced = svc.replace("alice", Vec::new()).await.unwrap();
        assert!(replaced.lines.is_empty());
        assert_eq!(replaced.amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn get_cart_without_row_returns_empty_view() {
        let (store, svc) = setup(&[]).await;
        let cart = svc.get_cart("alice").await.unwrap();

        assert!(cart.is_cart());
        assert!(cart.lines.is_empty());
        // the empty view is synthesized, not persisted
        assert!(OrderStore::get(store.as_ref(), "alice", CART_INTENT)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn get_cart_self_heals_stale_lines() {
        let (store, svc) = setup(&[product("p1", dec!(10.00)), product("p2", dec!(4.00))]).await;
        svc.merge("alice", vec![line("p1", 1), line("p2", 1)]).await.unwrap();
        ProductStore::delete(store.as_ref(), "p2").await.unwrap();

        let cart = svc.get_cart("alice").await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.amount, dec!(10.00));
    }
}
