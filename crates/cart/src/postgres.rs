//! Postgres-backed cart store.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use shopcart_core::{CartId, ProductId, StoreError};

use crate::cart::{Cart, LineItem};
use crate::store::CartStore;

const CREATE_TABLES: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS carts (
        id BIGINT PRIMARY KEY
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cart_items (
        cart_id    BIGINT NOT NULL REFERENCES carts (id) ON DELETE CASCADE,
        product_id BIGINT NOT NULL,
        quantity   BIGINT NOT NULL CHECK (quantity > 0),
        PRIMARY KEY (cart_id, product_id)
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `carts` and `cart_items` tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for ddl in CREATE_TABLES {
            sqlx::query(ddl).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::unavailable(e.to_string())
}

fn to_sql(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidArgument(format!("{what} {value} out of range")))
}

/// Column value for a cart id; `None` past `BIGINT`, where no cart can be stored.
fn cart_sql_id(cart_id: CartId) -> Option<i64> {
    i64::try_from(cart_id.get()).ok()
}

fn from_sql(value: i64, what: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {what} {value}")))
}

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn get(&self, cart_id: CartId) -> Result<Option<Cart>, StoreError> {
        let Some(id) = cart_sql_id(cart_id) else {
            return Ok(None);
        };

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM carts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY product_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let product_id: i64 = row.try_get("product_id").map_err(db_err)?;
            let quantity: i64 = row.try_get("quantity").map_err(db_err)?;
            items.push(LineItem::new(
                ProductId::new(from_sql(product_id, "product id")?),
                quantity,
            ));
        }

        Ok(Some(Cart::from_items(cart_id, items)))
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        let id = to_sql(cart.id().get(), "cart id")?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("INSERT INTO carts (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for item in cart.items() {
            sqlx::query("INSERT INTO cart_items (cart_id, product_id, quantity) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(to_sql(item.product_id.get(), "product id")?)
                .bind(item.quantity)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, cart_id: CartId) -> Result<(), StoreError> {
        let Some(id) = cart_sql_id(cart_id) else {
            return Ok(());
        };

        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_ids_past_bigint_cannot_be_stored() {
        assert_eq!(cart_sql_id(CartId::new(7)), Some(7));
        assert_eq!(cart_sql_id(CartId::new(u64::MAX)), None);
        assert!(matches!(
            to_sql(u64::MAX, "cart id"),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}
