//! PostgreSQL store
//!
//! One pooled connection per batch transaction. A transaction that is dropped
//! before `commit`/`rollback` detaches its connection from the pool and closes
//! it, which makes the server abort the open transaction.

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    is_sql_identifier, ConnectionConfig, DeviceAddress, DeviceId, PersistedRow, SchemaConfig,
    StorageError, TelemetryStore, TelemetryTransaction,
};
use deadpool_postgres::{
    Client, Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime,
};
use tokio_postgres::NoTls;
use tracing::{debug, instrument, warn};

use crate::error::{classify, from_pool_error, PersistenceError};

const APPLICATION_NAME: &str = "ruuvi-ingest";

/// Statements derived from the configured schema names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySql {
    pub resolve_device: String,
    pub insert_row: String,
}

impl TelemetrySql {
    /// Build statements, rejecting anything that is not a plain identifier
    pub fn new(schema: &SchemaConfig) -> Result<Self, PersistenceError> {
        for identifier in [
            &schema.telemetry_table,
            &schema.device_table,
            &schema.device_id_column,
            &schema.device_address_column,
            &schema.parameters_type,
        ] {
            if !is_sql_identifier(identifier) {
                return Err(PersistenceError::InvalidIdentifier {
                    identifier: identifier.clone(),
                });
            }
        }

        Ok(Self {
            resolve_device: format!(
                "SELECT {id}::bigint FROM {table} WHERE upper({address}) = $1 LIMIT 1",
                id = schema.device_id_column,
                table = schema.device_table,
                address = schema.device_address_column,
            ),
            insert_row: format!(
                "INSERT INTO {table} (device_id, captured_at, parameters) \
                 VALUES ($1::bigint, $2::timestamptz, \
                 ROW($3::float8, $4::float8, $5::int4, $6::int4, $7::int4)::{parameters})",
                table = schema.telemetry_table,
                parameters = schema.parameters_type,
            ),
        })
    }
}

/// Build a connection pool from the configured connection settings
pub fn create_pool(connection: &ConnectionConfig) -> Result<Pool, PersistenceError> {
    let mut cfg = Config::new();
    match &connection.url {
        Some(url) => cfg.url = Some(url.clone()),
        None => {
            cfg.host = Some(connection.host.clone());
            cfg.port = Some(connection.port);
            cfg.dbname = Some(connection.dbname.clone());
            cfg.user = Some(connection.user.clone());
            if !connection.password.is_empty() {
                cfg.password = Some(connection.password.clone());
            }
        }
    }
    let timeout = Duration::from_secs(connection.connect_timeout_secs);
    cfg.application_name = Some(APPLICATION_NAME.to_string());
    cfg.connect_timeout = Some(timeout);
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let mut pool_cfg = PoolConfig::new(connection.pool_size);
    pool_cfg.timeouts.wait = Some(timeout);
    pool_cfg.timeouts.create = Some(timeout);
    cfg.pool = Some(pool_cfg);

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| PersistenceError::PoolCreation {
            message: e.to_string(),
        })
}

/// Telemetry store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresTelemetryStore {
    pool: Pool,
    sql: Arc<TelemetrySql>,
}

impl PostgresTelemetryStore {
    /// Create a store; no connection is opened until the first `begin`
    pub fn new(connection: &ConnectionConfig, schema: &SchemaConfig) -> Result<Self, PersistenceError> {
        Self::with_pool(create_pool(connection)?, schema)
    }

    pub fn with_pool(pool: Pool, schema: &SchemaConfig) -> Result<Self, PersistenceError> {
        Ok(Self {
            pool,
            sql: Arc::new(TelemetrySql::new(schema)?),
        })
    }

    /// Verify the server is reachable
    pub async fn ping(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await.map_err(from_pool_error)?;
        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| classify(&e))?;
        debug!("postgres connection successful");
        Ok(())
    }

    pub fn sql(&self) -> &TelemetrySql {
        &self.sql
    }
}

impl TelemetryStore for PostgresTelemetryStore {
    type Transaction = PostgresTransaction;

    fn name(&self) -> &str {
        "postgres"
    }

    #[instrument(name = "postgres_store_begin", skip(self))]
    async fn begin(&self) -> Result<PostgresTransaction, StorageError> {
        let client = self.pool.get().await.map_err(from_pool_error)?;
        if let Err(e) = client.batch_execute("BEGIN").await {
            discard(client);
            return Err(classify(&e));
        }

        Ok(PostgresTransaction {
            client: Some(client),
            sql: Arc::clone(&self.sql),
        })
    }
}

/// Open transaction on a connection owned exclusively by one batch
pub struct PostgresTransaction {
    client: Option<Client>,
    sql: Arc<TelemetrySql>,
}

impl PostgresTransaction {
    fn client(&self) -> Result<&Client, StorageError> {
        self.client
            .as_ref()
            .ok_or_else(|| StorageError::connection("transaction already finished"))
    }

    async fn finish(mut self, statement: &'static str) -> Result<(), StorageError> {
        let client = self
            .client
            .take()
            .ok_or_else(|| StorageError::connection("transaction already finished"))?;
        match client.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                discard(client);
                Err(classify(&e))
            }
        }
    }
}

impl TelemetryTransaction for PostgresTransaction {
    async fn resolve_device(
        &mut self,
        address: &DeviceAddress,
    ) -> Result<Option<DeviceId>, StorageError> {
        let client = self.client()?;
        let statement = client
            .prepare_cached(&self.sql.resolve_device)
            .await
            .map_err(|e| classify(&e))?;
        let row = client
            .query_opt(&statement, &[&address.as_str()])
            .await
            .map_err(|e| classify(&e))?;

        row.map(|row| row.try_get::<_, i64>(0).map(DeviceId))
            .transpose()
            .map_err(|e| classify(&e))
    }

    async fn insert_row(&mut self, row: &PersistedRow) -> Result<(), StorageError> {
        let client = self.client()?;
        let statement = client
            .prepare_cached(&self.sql.insert_row)
            .await
            .map_err(|e| classify(&e))?;
        let p = &row.parameters;
        client
            .execute(
                &statement,
                &[
                    &row.device_id.0,
                    &row.captured_at,
                    &p.temperature,
                    &p.humidity,
                    &p.pressure,
                    &p.battery_mv,
                    &p.tx_power,
                ],
            )
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StorageError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), StorageError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!("transaction dropped while open, closing its connection");
            discard(client);
        }
    }
}

/// Detach a connection from the pool and close it
fn discard(client: Client) {
    drop(Object::take(client));
}
