//! Product catalogue.

use std::sync::Arc;

use boutique_storage::StorageBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;

const PRODUCTS_PREFIX: &str = "products/";

/// Largest page a listing returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// A catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Free text.
    #[serde(default)]
    pub description: Option<String>,
    /// Category name, stored lower-cased.
    #[serde(default)]
    pub category: Option<String>,
    /// Unit price in cents.
    pub price_cents: i64,
    /// Units available.
    pub stock: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Fields of a product to create, or to replace on update.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    /// Display name, not blank.
    pub name: String,
    /// Free text.
    #[serde(default)]
    pub description: Option<String>,
    /// Category name.
    #[serde(default)]
    pub category: Option<String>,
    /// Unit price in cents, not negative.
    pub price_cents: i64,
    /// Initial stock.
    #[serde(default)]
    pub stock: u32,
}

impl NewProduct {
    fn validated(self) -> Result<Self, ApiError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("product name must not be blank".to_string()));
        }
        if self.price_cents < 0 {
            return Err(ApiError::BadRequest("price must not be negative".to_string()));
        }

        let category = self
            .category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        Ok(Self {
            name,
            category,
            ..self
        })
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// By name, ascending.
    #[default]
    Name,
    /// By price, ascending.
    Price,
    /// Most recently created first.
    Newest,
}

/// Listing filter, order and page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    /// Only this category.
    #[serde(default)]
    pub category: Option<String>,
    /// Order.
    #[serde(default)]
    pub sort: ProductSort,
    /// Zero-based page index. Ignored without `size`.
    #[serde(default)]
    pub page: usize,
    /// Page size, at most [`MAX_PAGE_SIZE`]. Absent means everything.
    #[serde(default)]
    pub size: Option<usize>,
}

fn product_key(id: &Uuid) -> String {
    format!("{PRODUCTS_PREFIX}{id}")
}

fn not_found(id: &Uuid) -> ApiError {
    ApiError::NotFound(format!("Product not found: {id}"))
}

/// Products over a storage backend.
#[derive(Clone)]
pub struct ProductRepository {
    storage: Arc<dyn StorageBackend>,
    // Serializes read-modify-write of product records within this process.
    write_lock: Arc<Mutex<()>>,
}

impl ProductRepository {
    /// Creates a repository.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn store(&self, product: &Product) -> Result<(), ApiError> {
        self.storage
            .put(&product_key(&product.id), &serde_json::to_vec(product)?)
            .await?;
        Ok(())
    }

    /// Adds a product.
    pub async fn create(&self, new: NewProduct) -> Result<Product, ApiError> {
        let new = new.validated()?;

        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            category: new.category,
            price_cents: new.price_cents,
            stock: new.stock,
            created_at: Utc::now(),
        };
        self.store(&product).await?;

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Replaces a product's fields, keeping its id and creation time.
    pub async fn update(&self, id: &Uuid, new: NewProduct) -> Result<Product, ApiError> {
        let new = new.validated()?;
        let _guard = self.write_lock.lock().await;

        let mut product = self.get(id).await?.ok_or_else(|| not_found(id))?;
        product.name = new.name;
        product.description = new.description;
        product.category = new.category;
        product.price_cents = new.price_cents;
        product.stock = new.stock;
        self.store(&product).await?;

        info!(%id, "Product updated");
        Ok(product)
    }

    /// Returns a product by id.
    pub async fn get(&self, id: &Uuid) -> Result<Option<Product>, ApiError> {
        match self.storage.get(&product_key(id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Lists products matching `query`, sorted, then paged.
    pub async fn list(&self, query: &ProductQuery) -> Result<Vec<Product>, ApiError> {
        let category = query.category.as_ref().map(|c| c.trim().to_lowercase());

        let keys = self.storage.list(PRODUCTS_PREFIX).await?;
        let mut products: Vec<Product> = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.storage.get(&key).await? {
                let product: Product = serde_json::from_slice(&bytes)?;
                if category.is_none() || product.category == category {
                    products.push(product);
                }
            }
        }

        match query.sort {
            ProductSort::Name => products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
            ProductSort::Price => {
                products.sort_by(|a, b| a.price_cents.cmp(&b.price_cents).then(a.name.cmp(&b.name)))
            },
            ProductSort::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        let Some(size) = query.size else {
            return Ok(products);
        };
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ApiError::BadRequest(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        Ok(products
            .into_iter()
            .skip(query.page.saturating_mul(size))
            .take(size)
            .collect())
    }

    /// Removes a product.
    pub async fn delete(&self, id: &Uuid) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock().await;

        if !self.storage.delete(&product_key(id)).await? {
            return Err(not_found(id));
        }
        info!(%id, "Product deleted");
        Ok(())
    }

    /// Takes `quantity` units out of stock.
    ///
    /// Fails with `Conflict` when fewer units remain.
    pub async fn purchase(&self, id: &Uuid, quantity: u32) -> Result<Product, ApiError> {
        if quantity == 0 {
            return Err(ApiError::BadRequest("quantity must be at least 1".to_string()));
        }

        let _guard = self.write_lock.lock().await;

        let mut product = self.get(id).await?.ok_or_else(|| not_found(id))?;
        product.stock = product.stock.checked_sub(quantity).ok_or_else(|| {
            ApiError::Conflict(format!(
                "Insufficient stock: {} requested, {} available",
                quantity, product.stock
            ))
        })?;
        self.store(&product).await?;

        Ok(product)
    }
}
