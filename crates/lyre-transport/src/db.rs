//! Database capability implementation on top of sqlx.
//!
//! `sqlite3` opens a private in-memory database; `mysql` and `postgres`
//! connect to a server. Text columns are handed back as
//! [`Column::Bytes`] like binary ones.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use lyre_core::linkme::distributed_slice;
use lyre_core::{
    BoxedDbConnection, Bytes, Column, DB_CONNECT_REGISTRY, DbConnectFn, DbConnection, DbDriver,
    DbParams, DbValue, Row, TransportError, TransportResult,
};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Column as _, Row as _};
use tracing::{debug, info};

const MAX_CONNECTIONS: u32 = 4;

/// Binds `params` onto a query in order.
macro_rules! bind_all {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for value in $params {
            query = match value {
                DbValue::Null => query.bind(None::<String>),
                DbValue::Integer(v) => query.bind(*v),
                DbValue::Real(v) => query.bind(*v),
                DbValue::Text(v) => query.bind(v.clone()),
                DbValue::Bytes(v) => query.bind(v.to_vec()),
            };
        }
        query
    }};
}

/// Decodes column `$index` of `$row`, trying the common SQL types in turn.
macro_rules! decode_column {
    ($row:expr, $index:expr) => {{
        let row = $row;
        let index = $index;
        if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
            v.map_or(Column::Null, Column::Integer)
        } else if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
            v.map_or(Column::Null, |v| Column::Integer(v.into()))
        } else if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
            v.map_or(Column::Null, |v| Column::Integer(v.into()))
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
            v.map_or(Column::Null, |v| Column::Integer(v.into()))
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
            v.map_or(Column::Null, Column::Real)
        } else if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
            v.map_or(Column::Null, |v| Column::Real(v.into()))
        } else if let Ok(v) = row.try_get::<Option<String>, _>(index) {
            v.map_or(Column::Null, |v| Column::Bytes(Bytes::from(v)))
        } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
            v.map_or(Column::Null, |v| Column::Bytes(Bytes::from(v)))
        } else {
            debug!(index, "Unsupported column type, returning null");
            Column::Null
        }
    }};
}

/// Converts a driver row into a script row keyed by column name.
macro_rules! decode_row {
    ($row:expr) => {{
        let row = $row;
        row.columns()
            .iter()
            .map(|column| (column.name().to_string(), decode_column!(row, column.ordinal())))
            .collect::<Row>()
    }};
}

/// A pooled connection to one of the supported drivers.
#[derive(Debug, Clone)]
enum SqlPool {
    Sqlite(SqlitePool),
    MySql(MySqlPool),
    Postgres(PgPool),
}

fn database(e: sqlx::Error) -> TransportError {
    TransportError::Database(e.to_string())
}

#[async_trait]
impl DbConnection for SqlPool {
    async fn query(&self, sql: &str, params: &[DbValue]) -> TransportResult<Vec<Row>> {
        let rows: Vec<Row> = match self {
            Self::Sqlite(pool) => bind_all!(sqlx::query(sql), params)
                .fetch_all(pool)
                .await
                .map_err(database)?
                .iter()
                .map(|row| decode_row!(row))
                .collect(),
            Self::MySql(pool) => bind_all!(sqlx::query(sql), params)
                .fetch_all(pool)
                .await
                .map_err(database)?
                .iter()
                .map(|row| decode_row!(row))
                .collect(),
            Self::Postgres(pool) => bind_all!(sqlx::query(sql), params)
                .fetch_all(pool)
                .await
                .map_err(database)?
                .iter()
                .map(|row| decode_row!(row))
                .collect(),
        };
        Ok(rows)
    }

    async fn exec(&self, sql: &str, params: &[DbValue]) -> TransportResult<u64> {
        let affected = match self {
            Self::Sqlite(pool) => bind_all!(sqlx::query(sql), params)
                .execute(pool)
                .await
                .map_err(database)?
                .rows_affected(),
            Self::MySql(pool) => bind_all!(sqlx::query(sql), params)
                .execute(pool)
                .await
                .map_err(database)?
                .rows_affected(),
            Self::Postgres(pool) => bind_all!(sqlx::query(sql), params)
                .execute(pool)
                .await
                .map_err(database)?
                .rows_affected(),
        };
        Ok(affected)
    }
}

fn target(params: &DbParams) -> String {
    match params.driver {
        DbDriver::Sqlite3 => ":memory:".to_string(),
        _ => format!(
            "{}:{}/{}",
            params.host,
            params.port.map(|p| p.to_string()).unwrap_or_default(),
            params.database
        ),
    }
}

/// Opens a database connection.
///
/// This function is registered as the `DbConnectFn` capability.
pub async fn db_connect(params: DbParams) -> TransportResult<BoxedDbConnection> {
    params.validate()?;
    let target = target(&params);
    let failed = |e: sqlx::Error| TransportError::ConnectionFailed {
        target: target.clone(),
        reason: e.to_string(),
    };

    let pool = match params.driver {
        // Every pooled connection to `:memory:` would be its own database.
        DbDriver::Sqlite3 => SqlPool::Sqlite(
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::new().in_memory(true))
                .await
                .map_err(failed)?,
        ),
        DbDriver::Mysql => {
            let mut options = MySqlConnectOptions::new()
                .host(&params.host)
                .username(&params.username)
                .password(&params.password);
            if let Some(port) = params.port {
                options = options.port(port);
            }
            if !params.database.is_empty() {
                options = options.database(&params.database);
            }
            SqlPool::MySql(
                MySqlPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .connect_with(options)
                    .await
                    .map_err(failed)?,
            )
        }
        DbDriver::Postgres => {
            let mut options = PgConnectOptions::new()
                .host(&params.host)
                .username(&params.username)
                .password(&params.password);
            if let Some(port) = params.port {
                options = options.port(port);
            }
            if !params.database.is_empty() {
                options = options.database(&params.database);
            }
            SqlPool::Postgres(
                PgPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .connect_with(options)
                    .await
                    .map_err(failed)?,
            )
        }
    };

    info!(driver = ?params.driver, %target, "Database connected");
    Ok(Arc::new(pool))
}

#[distributed_slice(DB_CONNECT_REGISTRY)]
#[linkme(crate = lyre_core::linkme)]
static DB_CONNECT: DbConnectFn = |params| db_connect(params).boxed();
