//! Postgres-backed catalog and stock counters.
//!
//! The conditional decrement is a single `UPDATE ... WHERE quantity_in_stock >= $2`, so
//! Postgres row locking is the only concurrency control; two competing checkouts can
//! never both take the last units.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use shopcart_core::{ProductId, StoreError};

use crate::gateway::{ensure_positive, DecrementOutcome, InventoryGateway, ProductCatalog};
use crate::product::{Product, StockSnapshot};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id                BIGINT PRIMARY KEY,
        title             TEXT NOT NULL,
        price             NUMERIC(12, 2) NOT NULL,
        quantity_in_stock BIGINT NOT NULL CHECK (quantity_in_stock >= 0)
    )
"#;

/// Postgres-backed inventory gateway and product catalog.
#[derive(Debug, Clone)]
pub struct PostgresInventory {
    pool: PgPool,
}

impl PostgresInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `products` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::unavailable(e.to_string())
}

/// Column value for an id; `None` when it is past `BIGINT` and so cannot be stored.
fn sql_id(product_id: ProductId) -> Option<i64> {
    i64::try_from(product_id.get()).ok()
}

fn gone(product_id: ProductId) -> StoreError {
    StoreError::Corrupt(format!("product {product_id} no longer exists"))
}

fn row_to_product(row: &sqlx::postgres::PgRow) -> Result<Product, StoreError> {
    let id: i64 = row.try_get("id").map_err(db_err)?;
    let id = u64::try_from(id).map_err(|_| StoreError::Corrupt(format!("negative product id {id}")))?;
    Ok(Product {
        id: ProductId::new(id),
        title: row.try_get("title").map_err(db_err)?,
        price: row.try_get::<Decimal, _>("price").map_err(db_err)?,
        quantity_in_stock: row.try_get("quantity_in_stock").map_err(db_err)?,
    })
}

#[async_trait]
impl InventoryGateway for PostgresInventory {
    async fn snapshot(&self, product_id: ProductId) -> Result<Option<StockSnapshot>, StoreError> {
        Ok(self.get(product_id).await?.map(|p| p.snapshot()))
    }

    async fn decrement(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<DecrementOutcome, StoreError> {
        ensure_positive(quantity)?;
        let Some(id) = sql_id(product_id) else {
            return Ok(DecrementOutcome::NotFound);
        };

        let row = sqlx::query(
            r#"
            UPDATE products
               SET quantity_in_stock = quantity_in_stock - $2
             WHERE id = $1 AND quantity_in_stock >= $2
         RETURNING price, quantity_in_stock
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some(row) = row {
            return Ok(DecrementOutcome::Reserved {
                unit_price: row.try_get("price").map_err(db_err)?,
                remaining: row.try_get("quantity_in_stock").map_err(db_err)?,
            });
        }

        // Nothing updated: either the product is gone or the stock was short.
        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity_in_stock FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(match available {
            Some(available) => DecrementOutcome::InsufficientStock { available },
            None => DecrementOutcome::NotFound,
        })
    }

    async fn increment(&self, product_id: ProductId, quantity: i64) -> Result<(), StoreError> {
        ensure_positive(quantity)?;
        let id = sql_id(product_id).ok_or_else(|| gone(product_id))?;

        let result = sqlx::query(
            "UPDATE products SET quantity_in_stock = quantity_in_stock + $2 WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(gone(product_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PostgresInventory {
    async fn create(&self, product: Product) -> Result<bool, StoreError> {
        let id = sql_id(product.id).ok_or_else(|| {
            StoreError::InvalidArgument(format!("product id {} out of range", product.id))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO products (id, title, price, quantity_in_stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&product.title)
        .bind(product.price)
        .bind(product.quantity_in_stock)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let Some(id) = sql_id(product_id) else {
            return Ok(None);
        };

        let row = sqlx::query(
            "SELECT id, title, price, quantity_in_stock FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query("SELECT id, title, price, quantity_in_stock FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(row_to_product).collect()
    }

    async fn update(&self, product: Product) -> Result<Option<Product>, StoreError> {
        let Some(id) = sql_id(product.id) else {
            return Ok(None);
        };

        let row = sqlx::query(
            r#"
            UPDATE products
               SET title = $2, price = $3, quantity_in_stock = $4
             WHERE id = $1
         RETURNING id, title, price, quantity_in_stock
            "#,
        )
        .bind(id)
        .bind(&product.title)
        .bind(product.price)
        .bind(product.quantity_in_stock)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn delete(&self, product_id: ProductId) -> Result<bool, StoreError> {
        let Some(id) = sql_id(product_id) else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }
}
