//! sea-orm backed store implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};

use crate::entities::{order, product};
use crate::errors::ServiceError;
use crate::models::{OrderRecord, OrderStatus, Product};
use crate::store::{
    OrderPatch, OrderStore, Page, PageKey, ProductKey, ProductPatch, ProductStore,
};

#[derive(Clone)]
pub struct SqlProductStore {
    db: Arc<DatabaseConnection>,
    read_page_size: u64,
}

impl SqlProductStore {
    pub fn new(db: Arc<DatabaseConnection>, read_page_size: u64) -> Self {
        Self { db, read_page_size }
    }
}

#[derive(Clone)]
pub struct SqlOrderStore {
    db: Arc<DatabaseConnection>,
    read_page_size: u64,
}

impl SqlOrderStore {
    pub fn new(db: Arc<DatabaseConnection>, read_page_size: u64) -> Self {
        Self { db, read_page_size }
    }
}

fn product_from_row(row: product::Model) -> Product {
    Product {
        id: row.id,
        name: row.name,
        category: row.category,
        price: row.price,
        image1: row.image1,
        image2: row.image2,
        image3: row.image3,
        created_at: row.created_at,
    }
}

fn product_to_row(p: &Product) -> product::ActiveModel {
    product::ActiveModel {
        id: Set(p.id.clone()),
        name: Set(p.name.clone()),
        category: Set(p.category.clone()),
        price: Set(p.price),
        image1: Set(p.image1),
        image2: Set(p.image2),
        image3: Set(p.image3),
        created_at: Set(p.created_at),
    }
}

fn order_from_row(row: order::Model) -> Result<OrderRecord, ServiceError> {
    let lines = serde_json::from_value(row.line_items)
        .map_err(|e| ServiceError::InternalError(format!("corrupt line items: {e}")))?;
    let location = row
        .location
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ServiceError::InternalError(format!("corrupt location: {e}")))?;
    let status = OrderStatus::parse(&row.status)
        .ok_or_else(|| ServiceError::InternalError(format!("unknown order status: {}", row.status)))?;

    Ok(OrderRecord {
        user_id: row.user_id,
        intent: row.intent,
        lines,
        amount: row.amount,
        status,
        location,
        logs: row.logs,
        created_at: row.created_at,
    })
}

fn order_to_row(record: &OrderRecord) -> Result<order::ActiveModel, ServiceError> {
    let line_items = serde_json::to_value(&record.lines)
        .map_err(|e| ServiceError::InternalError(format!("unencodable line items: {e}")))?;
    let location = record
        .location
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| ServiceError::InternalError(format!("unencodable location: {e}")))?;

    Ok(order::ActiveModel {
        user_id: Set(record.user_id.clone()),
        intent: Set(record.intent.clone()),
        line_items: Set(line_items),
        amount: Set(record.amount),
        status: Set(record.status.as_str().to_string()),
        location: Set(location),
        logs: Set(record.logs.clone()),
        created_at: Set(record.created_at),
    })
}

#[async_trait]
impl ProductStore for SqlProductStore {
    async fn get(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        let row = product::Entity::find_by_id(id.to_string())
            .one(&*self.db)
            .await?;
        Ok(row.map(product_from_row))
    }

    async fn batch_get(&self, ids: &[String]) -> Result<HashMap<String, Product>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        // Single batched read; missing ids simply do not come back.
        let rows = product::Entity::find()
            .filter(product::Column::Id.is_in(ids.iter().cloned()))
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), product_from_row(row)))
            .collect())
    }

    async fn put(&self, p: Product) -> Result<(), ServiceError> {
        product::Entity::insert(product_to_row(&p))
            .on_conflict(
                OnConflict::column(product::Column::Id)
                    .update_columns([
                        product::Column::Name,
                        product::Column::Category,
                        product::Column::Price,
                        product::Column::Image1,
                        product::Column::Image2,
                        product::Column::Image3,
                    ])
                    .to_owned(),
            )
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn update(&self, id: &str, patch: ProductPatch) -> Result<(), ServiceError> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut row = <product::ActiveModel as Default>::default();
        if let Some(name) = patch.name {
            row.name = Set(name);
        }
        if let Some(category) = patch.category {
            row.category = Set(category);
        }
        if let Some(price) = patch.price {
            row.price = Set(price);
        }
        if let Some(image1) = patch.image1 {
            row.image1 = Set(image1);
        }
        if let Some(image2) = patch.image2 {
            row.image2 = Set(image2);
        }
        if let Some(image3) = patch.image3 {
            row.image3 = Set(image3);
        }

        let result = product::Entity::update_many()
            .set(row)
            .filter(product::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("product not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        product::Entity::delete_by_id(id.to_string())
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn read_page(
        &self,
        start: Option<ProductKey>,
    ) -> Result<Page<Product, ProductKey>, ServiceError> {
        let mut query = product::Entity::find();
        if let Some(key) = start {
            query = query.filter(
                Condition::any()
                    .add(product::Column::CreatedAt.lt(key.created_at))
                    .add(
                        Condition::all()
                            .add(product::Column::CreatedAt.eq(key.created_at))
                            .add(product::Column::Id.lt(key.id)),
                    ),
            );
        }
        let rows = query
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id)
            .limit(self.read_page_size)
            .all(&*self.db)
            .await?;

        let exhausted = (rows.len() as u64) < self.read_page_size;
        let items: Vec<Product> = rows.into_iter().map(product_from_row).collect();
        let last_key = if exhausted {
            None
        } else {
            items.last().map(ProductKey::of)
        };
        Ok(Page { items, last_key })
    }
}

#[async_trait]
impl OrderStore for SqlOrderStore {
    async fn get(&self, user: &str, intent: &str) -> Result<Option<OrderRecord>, ServiceError> {
        let row = order::Entity::find_by_id((user.to_string(), intent.to_string()))
            .one(&*self.db)
            .await?;
        row.map(order_from_row).transpose()
    }

    async fn put(&self, record: OrderRecord) -> Result<(), ServiceError> {
        order::Entity::insert(order_to_row(&record)?)
            .on_conflict(
                OnConflict::columns([order::Column::UserId, order::Column::Intent])
                    .update_columns([
                        order::Column::LineItems,
                        order::Column::Amount,
                        order::Column::Status,
                        order::Column::Location,
                        order::Column::Logs,
                        order::Column::CreatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        user: &str,
        intent: &str,
        patch: OrderPatch,
    ) -> Result<(), ServiceError> {
        let mut row = <order::ActiveModel as Default>::default();
        if let Some(status) = patch.status {
            row.status = Set(status.as_str().to_string());
        }
        if let Some(logs) = patch.logs {
            row.logs = Set(logs);
        }
        if let Some(location) = patch.location {
            let value = serde_json::to_value(&location)
                .map_err(|e| ServiceError::InternalError(format!("unencodable location: {e}")))?;
            row.location = Set(Some(value));
        }

        let result = order::Entity::update_many()
            .set(row)
            .filter(order::Column::UserId.eq(user))
            .filter(order::Column::Intent.eq(intent))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("order not found".into()));
        }
        Ok(())
    }

    async fn migrate_key(
        &self,
        user: &str,
        old_intent: &str,
        record: OrderRecord,
    ) -> Result<(), ServiceError> {
        // The partition/sort key changes, which no partial update can
        // express: delete-of-old plus put-of-new must commit as a unit.
        let txn = self.db.begin().await?;
        order::Entity::delete_by_id((user.to_string(), old_intent.to_string()))
            .exec(&txn)
            .await?;
        order_to_row(&record)?.insert(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn read_page(
        &self,
        user: &str,
        start: Option<PageKey>,
    ) -> Result<Page<OrderRecord, PageKey>, ServiceError> {
        let mut query = order::Entity::find().filter(order::Column::UserId.eq(user));
        if let Some(key) = start {
            query = query.filter(
                Condition::any()
                    .add(order::Column::CreatedAt.lt(key.created_at))
                    .add(
                        Condition::all()
                            .add(order::Column::CreatedAt.eq(key.created_at))
                            .add(order::Column::Intent.lt(key.intent)),
                    ),
            );
        }
        let rows = query
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Intent)
            .limit(self.read_page_size)
            .all(&*self.db)
            .await?;

        let exhausted = (rows.len() as u64) < self.read_page_size;
        let items = rows
            .into_iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let last_key = if exhausted {
            None
        } else {
            items.last().map(PageKey::of)
        };
        Ok(Page { items, last_key })
    }
}
