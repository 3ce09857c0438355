//! In-memory store backend with the same contract as the SQL backend,
//! including the capped page reads. Used by the test suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::models::{OrderRecord, Product};
use crate::store::{
    OrderPatch, OrderStore, Page, PageKey, ProductKey, ProductPatch, ProductStore,
};

const DEFAULT_READ_PAGE_SIZE: usize = 25;

#[derive(Default)]
struct Inner {
    products: BTreeMap<String, Product>,
    orders: BTreeMap<(String, String), OrderRecord>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    read_page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_read_page_size(DEFAULT_READ_PAGE_SIZE)
    }

    /// A store whose page reads return at most `size` rows, regardless of
    /// the caller's logical limit.
    pub fn with_read_page_size(size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            read_page_size: size.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens after a panic in this process; tests
        // are the sole users, so propagating the panic is fine.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        Ok(self.lock().products.get(id).cloned())
    }

    async fn batch_get(&self, ids: &[String]) -> Result<HashMap<String, Product>, ServiceError> {
        let inner = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.products.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }

    async fn put(&self, product: Product) -> Result<(), ServiceError> {
        self.lock().products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn update(&self, id: &str, patch: ProductPatch) -> Result<(), ServiceError> {
        let mut inner = self.lock();
        let product = inner
            .products
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound("product not found".into()))?;
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(category) = patch.category {
            product.category = category;
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(image1) = patch.image1 {
            product.image1 = image1;
        }
        if let Some(image2) = patch.image2 {
            product.image2 = image2;
        }
        if let Some(image3) = patch.image3 {
            product.image3 = image3;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.lock().products.remove(id);
        Ok(())
    }

    async fn read_page(
        &self,
        start: Option<ProductKey>,
    ) -> Result<Page<Product, ProductKey>, ServiceError> {
        let inner = self.lock();
        let mut all: Vec<Product> = inner.products.values().cloned().collect();
        drop(inner);
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(key) = start {
            all.retain(|p| {
                p.created_at < key.created_at
                    || (p.created_at == key.created_at && p.id < key.id)
            });
        }
        all.truncate(self.read_page_size);
        let last_key = if all.len() == self.read_page_size {
            all.last().map(ProductKey::of)
        } else {
            None
        };
        Ok(Page {
            items: all,
            last_key,
        })
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get(&self, user: &str, intent: &str) -> Result<Option<OrderRecord>, ServiceError> {
        Ok(self
            .lock()
            .orders
            .get(&(user.to_string(), intent.to_string()))
            .cloned())
    }

    async fn put(&self, record: OrderRecord) -> Result<(), ServiceError> {
        self.lock()
            .orders
            .insert((record.user_id.clone(), record.intent.clone()), record);
        Ok(())
    }

    async fn update(
        &self,
        user: &str,
        intent: &str,
        patch: OrderPatch,
    ) -> Result<(), ServiceError> {
        let mut inner = self.lock();
        let record = inner
            .orders
            .get_mut(&(user.to_string(), intent.to_string()))
            .ok_or_else(|| ServiceError::NotFound("order not found".into()))?;
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(logs) = patch.logs {
            record.logs = logs;
        }
        if let Some(location) = patch.location {
            record.location = Some(location);
        }
        Ok(())
    }

    async fn migrate_key(
        &self,
        user: &str,
        old_intent: &str,
        record: OrderRecord,
    ) -> Result<(), ServiceError> {
        // Single lock acquisition: delete and insert are observed together.
        let mut inner = self.lock();
        inner
            .orders
            .remove(&(user.to_string(), old_intent.to_string()));
        inner
            .orders
            .insert((record.user_id.clone(), record.intent.clone()), record);
        Ok(())
    }

    async fn read_page(
        &self,
        user: &str,
        start: Option<PageKey>,
    ) -> Result<Page<OrderRecord, PageKey>, ServiceError> {
        let inner = self.lock();
        let mut rows: Vec<OrderRecord> = inner
            .orders
            .values()
            .filter(|r| r.user_id == user)
            .cloned()
            .collect();
        drop(inner);
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.intent.cmp(&a.intent))
        });
        if let Some(key) = start {
            rows.retain(|r| {
                r.created_at < key.created_at
                    || (r.created_at == key.created_at && r.intent < key.intent)
            });
        }
        rows.truncate(self.read_page_size);
        let last_key = if rows.len() == self.read_page_size {
            rows.last().map(PageKey::of)
        } else {
            None
        };
        Ok(Page {
            items: rows,
            last_key,
        })
    }
}
