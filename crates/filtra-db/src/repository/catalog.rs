//! # Product (Catalog) Repository
//!
//! Database operations for the authoritative product catalog.
//!
//! Pricing reads exclusively from here: a client-declared price never
//! reaches a computation, so tampering with the cart payload cannot move
//! a total.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{to_store_error, DbError, DbResult};
use filtra_core::{CatalogProduct, ProductType};
use filtra_pricing::{CatalogSource, StoreError};

/// Raw `products` row; converted into [`CatalogProduct`] at the edge.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    price_cents: i64,
    product_type: String,
    category_ids: String,
    excluded_from_discount: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for CatalogProduct {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<CatalogProduct> {
        let product_type = ProductType::parse(&row.product_type).ok_or_else(|| {
            DbError::invalid(
                "Product",
                format!("unrecognized product type '{}'", row.product_type),
            )
        })?;
        let category_ids: Vec<String> = serde_json::from_str(&row.category_ids)
            .map_err(|e| DbError::invalid("Product", format!("category_ids: {}", e)))?;

        Ok(CatalogProduct {
            id: row.id,
            sku: row.sku,
            name: row.name,
            price_cents: row.price_cents,
            product_type,
            category_ids,
            excluded_from_discount: row.excluded_from_discount,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, sku, name, price_cents, product_type, category_ids, \
     excluded_from_discount, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product row.
    pub async fn create(&self, product: &CatalogProduct) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        let category_ids = serde_json::to_string(&product.category_ids)
            .map_err(|e| DbError::invalid("Product", e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, product_type, category_ids,
                excluded_from_discount, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.product_type.as_str())
        .bind(&category_ids)
        .bind(product.excluded_from_discount)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CatalogProduct>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CatalogProduct::try_from).transpose()
    }

    /// Gets the active products among `ids`, in one query.
    ///
    /// Missing or inactive ids are simply absent from the result; the
    /// cart build turns that into a fatal unknown-product error.
    pub async fn get_active_many(&self, ids: &[String]) -> DbResult<Vec<CatalogProduct>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM products WHERE is_active = 1 AND id IN (",
            SELECT_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        qb.push(")");

        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        debug!(requested = ids.len(), found = rows.len(), "Fetched catalog products");

        rows.into_iter().map(CatalogProduct::try_from).collect()
    }

    /// Lists active products, sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<CatalogProduct>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
            SELECT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CatalogProduct::try_from).collect()
    }
}

impl CatalogSource for ProductRepository {
    async fn products_by_ids(&self, ids: &[String]) -> Result<Vec<CatalogProduct>, StoreError> {
        self.get_active_many(ids).await.map_err(to_store_error)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
