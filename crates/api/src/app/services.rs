use std::sync::Arc;

use shopcart_cart::{CartService, CartStore, InMemoryCartStore};
use shopcart_inventory::{InMemoryInventory, InventoryGateway, ProductCatalog};

use crate::config::{Config, StoreBackend};

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub carts: CartService,
    pub catalog: Arc<dyn ProductCatalog>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("carts", &self.carts)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Wire the cart service around the given collaborators.
    pub fn new<I>(inventory: Arc<I>, carts: Arc<dyn CartStore>, config: &Config) -> Self
    where
        I: InventoryGateway + ProductCatalog + 'static,
    {
        let cart_service = CartService::new(inventory.clone(), carts, config.checkout.validation_mode)
            .with_delete_attempts(config.checkout.cart_delete_attempts);

        Self {
            carts: cart_service,
            catalog: inventory,
        }
    }

    /// In-memory stores (tests/dev).
    pub fn in_memory(config: &Config) -> Self {
        Self::new(
            Arc::new(InMemoryInventory::new()),
            Arc::new(InMemoryCartStore::new()),
            config,
        )
    }
}

/// Pick the store backend named by the configuration.
pub async fn build_services(config: &Config) -> anyhow::Result<AppServices> {
    match &config.store {
        StoreBackend::Memory => {
            tracing::info!("using in-memory stores");
            Ok(AppServices::in_memory(config))
        }
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => build_postgres_services(config, database_url, *max_connections).await,
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres { .. } => {
            anyhow::bail!("SHOPCART_STORE=postgres but the postgres feature is not enabled")
        }
    }
}

#[cfg(feature = "postgres")]
async fn build_postgres_services(
    config: &Config,
    database_url: &str,
    max_connections: u32,
) -> anyhow::Result<AppServices> {
    use anyhow::Context;
    use shopcart_cart::PostgresCartStore;
    use shopcart_inventory::PostgresInventory;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;

    let inventory = PostgresInventory::new(pool.clone());
    inventory.migrate().await.context("failed to migrate products table")?;

    let carts = PostgresCartStore::new(pool);
    carts.migrate().await.context("failed to migrate cart tables")?;

    tracing::info!(max_connections, "using postgres stores");
    Ok(AppServices::new(Arc::new(inventory), Arc::new(carts), config))
}
