use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{now_millis, round2, Product};
use crate::store::{
    paged_query, Page, PagedSource, ProductKey, ProductPatch, ProductStore,
};

const MAX_PAGE_LIMIT: usize = 100;

/// Canonical product administration and listing.
#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductStore>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub price: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub image1: Option<bool>,
    pub image2: Option<bool>,
    pub image3: Option<bool>,
}

#[derive(Debug)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub next_cursor: Option<ProductKey>,
}

struct ProductList<'a> {
    store: &'a dyn ProductStore,
}

#[async_trait]
impl<'a> PagedSource for ProductList<'a> {
    type Item = Product;
    type Key = ProductKey;

    async fn read_page(
        &self,
        start: Option<ProductKey>,
    ) -> Result<Page<Product, ProductKey>, ServiceError> {
        self.store.read_page(start).await
    }

    fn key_of(&self, item: &Product) -> ProductKey {
        ProductKey::of(item)
    }
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: CreateProductInput) -> Result<Product, ServiceError> {
        let id = match input.id {
            Some(id) if id.trim().is_empty() => {
                return Err(ServiceError::ValidationError("invalid product id".into()))
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError("invalid name".into()));
        }
        let category = input.category.trim().to_string();
        if category.is_empty() {
            return Err(ServiceError::ValidationError("invalid category".into()));
        }
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError("invalid price".into()));
        }

        let product = Product {
            id,
            name,
            category,
            price: round2(input.price),
            image1: false,
            image2: false,
            image3: false,
            created_at: now_millis(),
        };
        self.products.put(product.clone()).await?;
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: &str,
        input: UpdateProductInput,
    ) -> Result<Product, ServiceError> {
        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError("invalid name".into()));
            }
        }
        if let Some(category) = &input.category {
            if category.trim().is_empty() {
                return Err(ServiceError::ValidationError("invalid category".into()));
            }
        }
        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError("invalid price".into()));
            }
        }

        let patch = ProductPatch {
            name: input.name.map(|n| n.trim().to_string()),
            category: input.category.map(|c| c.trim().to_string()),
            price: input.price.map(round2),
            image1: input.image1,
            image2: input.image2,
            image3: input.image3,
        };
        self.products.update(id, patch).await?;
        self.products
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("product not found".into()))
    }

    pub async fn get_product(&self, id: &str) -> Result<Product, ServiceError> {
        self.products
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("product not found".into()))
    }

    /// Hard delete. Order lines referencing the product are dropped the next
    /// time a cart is merged or rebuilt, not here.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &str) -> Result<(), ServiceError> {
        self.products.delete(id).await?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    pub async fn list_products(
        &self,
        limit: usize,
        cursor: Option<ProductKey>,
    ) -> Result<ProductPage, ServiceError> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ServiceError::ValidationError("invalid pagination limit".into()));
        }
        let source = ProductList {
            store: self.products.as_ref(),
        };
        let page = paged_query(&source, limit, cursor, |_| true).await?;
        Ok(ProductPage {
            products: page.items,
            next_cursor: page.last_key,
        })
    }
}
