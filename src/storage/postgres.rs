//! PostgreSQL catalog source and listing sink

use async_trait::async_trait;
use deadpool_postgres::{
    Config as PgConfig, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime,
};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use super::{CatalogSource, RecordSink};
use crate::config::DatabaseConfig;
use crate::models::{Category, DarkStore, ListingRecord};
use crate::utils::error::StorageError;

/// Listing columns in insert order
pub const LISTING_COLUMNS: [&str; 20] = [
    "captured_at",
    "l1_category_id",
    "l2_category_id",
    "store_id",
    "rank",
    "variant_id",
    "variant_name",
    "product_id",
    "product_name",
    "selling_price",
    "mrp",
    "discount",
    "in_stock",
    "inventory",
    "is_sponsored",
    "image_url",
    "brand_id",
    "brand",
    "unit",
    "product_type",
];

/// Bind parameters a single PostgreSQL statement accepts
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Largest `insert_chunk_size` that keeps one chunk within [`MAX_BIND_PARAMETERS`]
pub const MAX_INSERT_CHUNK: usize = MAX_BIND_PARAMETERS / LISTING_COLUMNS.len();

/// Build a multi-row `INSERT` for `rows` listing records
pub fn insert_statement(table: &str, rows: usize) -> String {
    let width = LISTING_COLUMNS.len();
    let values: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        LISTING_COLUMNS.join(", "),
        values.join(", ")
    )
}

fn listing_schema(table: &str) -> String {
    let index_name = table.replace('.', "_");
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            captured_at TIMESTAMPTZ NOT NULL,
            l1_category_id TEXT NOT NULL,
            l2_category_id TEXT NOT NULL,
            store_id TEXT NOT NULL,
            rank INTEGER NOT NULL,
            variant_id TEXT NOT NULL,
            variant_name TEXT NOT NULL,
            product_id TEXT NOT NULL,
            product_name TEXT NOT NULL,
            selling_price REAL NOT NULL,
            mrp REAL NOT NULL,
            discount REAL NOT NULL,
            in_stock BOOLEAN NOT NULL,
            inventory INTEGER NOT NULL,
            is_sponsored BOOLEAN NOT NULL,
            image_url TEXT NOT NULL,
            brand_id TEXT NOT NULL,
            brand TEXT NOT NULL,
            unit TEXT NOT NULL,
            product_type TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_{index_name}_captured_at
            ON {table}(captured_at);

        CREATE INDEX IF NOT EXISTS idx_{index_name}_store_category
            ON {table}(store_id, l1_category_id, l2_category_id);
        "#
    )
}

fn record_params(record: &ListingRecord) -> [&(dyn ToSql + Sync); 20] {
    [
        &record.captured_at,
        &record.l1_category_id,
        &record.l2_category_id,
        &record.store_id,
        &record.rank,
        &record.variant_id,
        &record.variant_name,
        &record.product_id,
        &record.product_name,
        &record.selling_price,
        &record.mrp,
        &record.discount,
        &record.in_stock,
        &record.inventory,
        &record.is_sponsored,
        &record.image_url,
        &record.brand_id,
        &record.brand,
        &record.unit,
        &record.product_type,
    ]
}

/// PostgreSQL-backed catalog and sink sharing one connection pool
pub struct PostgresStore {
    pool: Pool,
    config: DatabaseConfig,
}

impl PostgresStore {
    /// Create the connection pool without connecting
    pub fn new(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let mut pg_config = PgConfig::new();
        pg_config.url = Some(config.url.clone());
        pg_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        pg_config.pool = Some(PoolConfig::new(config.pool_size));

        let pool = pg_config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        Ok(Self {
            pool,
            config: config.clone(),
        })
    }

    /// Create the pool and verify that PostgreSQL answers
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let store = Self::new(config)?;
        store.health_check().await?;
        tracing::info!(pool_size = config.pool_size, "Connected to PostgreSQL");
        Ok(store)
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for PostgresStore {
    async fn list_stores(&self) -> Result<Vec<DarkStore>, StorageError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT DISTINCT CAST(store_id AS TEXT) AS store_id, \
             CAST(lat AS DOUBLE PRECISION) AS lat, \
             CAST(lon AS DOUBLE PRECISION) AS lon \
             FROM {} \
             WHERE store_id IS NOT NULL AND lat IS NOT NULL AND lon IS NOT NULL",
            self.config.stores_table
        );

        let rows = client.query(sql.as_str(), &[]).await?;
        let stores = rows
            .iter()
            .map(|row| {
                Ok(DarkStore {
                    store_id: row.try_get("store_id")?,
                    lat: row.try_get("lat")?,
                    lon: row.try_get("lon")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

        tracing::debug!(count = stores.len(), table = %self.config.stores_table, "Listed stores");
        Ok(stores)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT DISTINCT CAST(l1_category_id AS TEXT) AS l1_id, \
             CAST(l2_category_id AS TEXT) AS l2_id \
             FROM {} \
             WHERE l1_category_id IS NOT NULL AND l2_category_id IS NOT NULL",
            self.config.categories_table
        );

        let rows = client.query(sql.as_str(), &[]).await?;
        let categories = rows
            .iter()
            .map(|row| {
                Ok(Category {
                    l1_id: row.try_get("l1_id")?,
                    l2_id: row.try_get("l2_id")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

        tracing::debug!(
            count = categories.len(),
            table = %self.config.categories_table,
            "Listed categories"
        );
        Ok(categories)
    }
}

#[async_trait]
impl RecordSink for PostgresStore {
    async fn prepare(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client
            .batch_execute(&listing_schema(&self.config.listings_table))
            .await?;
        tracing::debug!(table = %self.config.listings_table, "Listing table ready");
        Ok(())
    }

    async fn append(&self, records: &[ListingRecord]) -> Result<u64, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut client = self.pool.get().await?;
        // A page lands whole or not at all
        let tx = client.transaction().await?;
        let mut written = 0u64;

        for chunk in records.chunks(self.config.insert_chunk_size.clamp(1, MAX_INSERT_CHUNK)) {
            let sql = insert_statement(&self.config.listings_table, chunk.len());
            let params: Vec<&(dyn ToSql + Sync)> =
                chunk.iter().flat_map(record_params).collect();
            written += tx.execute(sql.as_str(), &params).await?;
        }

        tx.commit().await?;
        Ok(written)
    }
}
