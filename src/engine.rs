//! Database execution for quarry.
//!
//! A [`DataSource`] wraps a native sqlx pool for one of the supported
//! engines. Statements run through a [`Session`], which is a single
//! checked-out connection: either borrowed from the pool for one operation
//! or held by a [`Transaction`](crate::transaction::Transaction).
//!
//! Rows are decoded per driver, so booleans, decimals and temporal columns
//! arrive as their own [`Value`] variants.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{
    Column, Executor as _, MySql, MySqlConnection, MySqlPool, PgConnection, PgPool, Postgres, Row,
    Sqlite, SqliteConnection, SqlitePool, TypeInfo, ValueRef,
};
use tracing::{debug, info};

use crate::config::DataSourceConfig;
use crate::dialect::{Engine, Registry};
use crate::error::{QuarryError, QuarryResult};
use crate::sql::fragment::Statement;
use crate::value::{Record, Value};

/// A driver pool. CockroachDB speaks the PostgreSQL protocol.
#[derive(Debug, Clone)]
pub enum Pool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// A connection checked out of a [`Pool`]; returned to it on drop.
pub enum PooledConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    Sqlite(PoolConnection<Sqlite>),
}

/// Borrowed driver connection a [`Session`] runs on.
pub(crate) enum ConnRef<'c> {
    MySql(&'c mut MySqlConnection),
    Postgres(&'c mut PgConnection),
    Sqlite(&'c mut SqliteConnection),
}

impl PooledConnection {
    fn as_conn(&mut self) -> ConnRef<'_> {
        match self {
            PooledConnection::MySql(conn) => ConnRef::MySql(&mut **conn),
            PooledConnection::Postgres(conn) => ConnRef::Postgres(&mut **conn),
            PooledConnection::Sqlite(conn) => ConnRef::Sqlite(&mut **conn),
        }
    }
}

/// An open driver transaction. Dropping it unfinished rolls it back.
pub(crate) enum DbTransaction {
    MySql(sqlx::Transaction<'static, MySql>),
    Postgres(sqlx::Transaction<'static, Postgres>),
    Sqlite(sqlx::Transaction<'static, Sqlite>),
}

impl DbTransaction {
    pub(crate) fn as_conn(&mut self) -> ConnRef<'_> {
        match self {
            DbTransaction::MySql(tx) => ConnRef::MySql(&mut **tx),
            DbTransaction::Postgres(tx) => ConnRef::Postgres(&mut **tx),
            DbTransaction::Sqlite(tx) => ConnRef::Sqlite(&mut **tx),
        }
    }

    pub(crate) async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await,
            DbTransaction::Postgres(tx) => tx.commit().await,
            DbTransaction::Sqlite(tx) => tx.commit().await,
        }
    }

    pub(crate) async fn rollback(self) -> Result<(), sqlx::Error> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await,
            DbTransaction::Postgres(tx) => tx.rollback().await,
            DbTransaction::Sqlite(tx) => tx.rollback().await,
        }
    }
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl ExecResult {
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Generated key of the last inserted row, where the driver reports one
    /// (MySQL, SQLite).
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}

/// A connection pool bound to one engine.
#[derive(Debug, Clone)]
pub struct DataSource {
    pool: Pool,
    engine: Engine,
    logs: bool,
}

impl DataSource {
    /// Connect using a data-source configuration.
    ///
    /// The interpreter registry is validated first, so an engine with a gap
    /// in its renderers fails here rather than on the first query.
    pub async fn connect(config: &DataSourceConfig) -> QuarryResult<Self> {
        Registry::global().validate()?;

        let url = config.connection_url()?;
        let max = config.max_connections;
        let pool = match config.engine {
            Engine::MySql => Pool::MySql(
                MySqlPoolOptions::new()
                    .max_connections(max)
                    .connect(&url)
                    .await
                    .map_err(QuarryError::Connection)?,
            ),
            Engine::Postgres | Engine::Cockroach => Pool::Postgres(
                PgPoolOptions::new()
                    .max_connections(max)
                    .connect(&url)
                    .await
                    .map_err(QuarryError::Connection)?,
            ),
            Engine::Sqlite => Pool::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(max)
                    .connect(&url)
                    .await
                    .map_err(QuarryError::Connection)?,
            ),
        };

        info!(engine = %config.engine, database = %config.database, "connected");
        Ok(Self {
            pool,
            engine: config.engine,
            logs: config.logs,
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool, engine: Engine, logs: bool) -> Self {
        Self { pool, engine, logs }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn logs(&self) -> bool {
        self.logs
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub async fn acquire(&self) -> QuarryResult<PooledConnection> {
        let conn = match &self.pool {
            Pool::MySql(pool) => pool.acquire().await.map(PooledConnection::MySql),
            Pool::Postgres(pool) => pool.acquire().await.map(PooledConnection::Postgres),
            Pool::Sqlite(pool) => pool.acquire().await.map(PooledConnection::Sqlite),
        };
        conn.map_err(QuarryError::Connection)
    }

    pub(crate) async fn begin(&self) -> QuarryResult<DbTransaction> {
        let tx = match &self.pool {
            Pool::MySql(pool) => pool.begin().await.map(DbTransaction::MySql),
            Pool::Postgres(pool) => pool.begin().await.map(DbTransaction::Postgres),
            Pool::Sqlite(pool) => pool.begin().await.map(DbTransaction::Sqlite),
        };
        tx.map_err(|e| QuarryError::query("begin", "", e))
    }

    pub fn session<'c>(&self, conn: &'c mut PooledConnection) -> Session<'c> {
        Session::new(conn.as_conn(), self.engine, self.logs)
    }

    /// Run one statement on a pooled connection.
    pub async fn execute(&self, statement: &Statement) -> QuarryResult<u64> {
        let mut conn = self.acquire().await?;
        let result = self.session(&mut conn).execute(statement, "execute", "").await?;
        Ok(result.rows_affected())
    }

    /// Run one query on a pooled connection and return its rows.
    pub async fn fetch_all(&self, statement: &Statement) -> QuarryResult<Vec<Record>> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).fetch_all(statement, "fetch", "").await
    }

    pub async fn close(&self) {
        match &self.pool {
            Pool::MySql(pool) => pool.close().await,
            Pool::Postgres(pool) => pool.close().await,
            Pool::Sqlite(pool) => pool.close().await,
        }
    }
}

/// Bind every parameter of a statement onto a driver query. `$decimal`
/// maps a decimal for drivers without a native decimal encoder.
macro_rules! bind_params {
    ($query:expr, $params:expr, |$d:ident| $decimal:expr) => {{
        let mut query = $query;
        for value in $params {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(v) => query.bind(*v),
                Value::Int(v) => query.bind(*v),
                Value::Float(v) => query.bind(*v),
                Value::Decimal($d) => query.bind($decimal),
                Value::Text(v) => query.bind(v.clone()),
                Value::Date(v) => query.bind(*v),
                Value::Time(v) => query.bind(*v),
                Value::DateTime(v) => query.bind(*v),
            };
        }
        query
    }};
}

/// One connection plus the engine settings statements run with.
pub struct Session<'c> {
    conn: ConnRef<'c>,
    engine: Engine,
    logs: bool,
}

impl<'c> Session<'c> {
    pub(crate) fn new(conn: ConnRef<'c>, engine: Engine, logs: bool) -> Self {
        Self { conn, engine, logs }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// MySQL and PostgreSQL statements without parameters go over the
    /// simple-query path, which both accept for DDL and session commands.
    ///
    /// SQLite statements are never cached: a cached `SELECT *` keeps the
    /// column count it was prepared with and misreads rows once another
    /// connection alters the table.
    pub async fn execute(
        &mut self,
        statement: &Statement,
        operation: &'static str,
        table: &str,
    ) -> QuarryResult<ExecResult> {
        self.log(statement);
        let sql = statement.sql.as_str();
        let params = &statement.params;
        let result = match &mut self.conn {
            ConnRef::MySql(conn) => {
                let done = if params.is_empty() {
                    (&mut **conn).execute(sql).await
                } else {
                    bind_params!(sqlx::query::<MySql>(sql), params, |d| *d)
                        .execute(&mut **conn)
                        .await
                };
                done.map(|r| ExecResult {
                    rows_affected: r.rows_affected(),
                    last_insert_id: i64::try_from(r.last_insert_id()).ok(),
                })
            }
            ConnRef::Postgres(conn) => {
                let done = if params.is_empty() {
                    (&mut **conn).execute(sql).await
                } else {
                    bind_params!(sqlx::query::<Postgres>(sql), params, |d| *d)
                        .execute(&mut **conn)
                        .await
                };
                done.map(|r| ExecResult {
                    rows_affected: r.rows_affected(),
                    last_insert_id: None,
                })
            }
            ConnRef::Sqlite(conn) => {
                bind_params!(sqlx::query::<Sqlite>(sql).persistent(false), params, |d| d.to_string())
                    .execute(&mut **conn)
                    .await
                    .map(|r| ExecResult {
                        rows_affected: r.rows_affected(),
                        last_insert_id: Some(r.last_insert_rowid()),
                    })
            }
        };
        result.map_err(|e| QuarryError::query(operation, table, e))
    }

    pub async fn fetch_all(
        &mut self,
        statement: &Statement,
        operation: &'static str,
        table: &str,
    ) -> QuarryResult<Vec<Record>> {
        self.log(statement);
        let sql = statement.sql.as_str();
        let params = &statement.params;
        let wrap = |e: sqlx::Error| QuarryError::query(operation, table, e);
        match &mut self.conn {
            ConnRef::MySql(conn) => {
                let rows = if params.is_empty() {
                    (&mut **conn).fetch_all(sql).await
                } else {
                    bind_params!(sqlx::query::<MySql>(sql), params, |d| *d)
                        .fetch_all(&mut **conn)
                        .await
                }
                .map_err(wrap)?;
                rows.iter().map(|row| to_record(row, mysql_value)).collect()
            }
            ConnRef::Postgres(conn) => {
                let rows = if params.is_empty() {
                    (&mut **conn).fetch_all(sql).await
                } else {
                    bind_params!(sqlx::query::<Postgres>(sql), params, |d| *d)
                        .fetch_all(&mut **conn)
                        .await
                }
                .map_err(wrap)?;
                rows.iter().map(|row| to_record(row, pg_value)).collect()
            }
            ConnRef::Sqlite(conn) => {
                let rows =
                    bind_params!(sqlx::query::<Sqlite>(sql).persistent(false), params, |d| d.to_string())
                        .fetch_all(&mut **conn)
                        .await
                        .map_err(wrap)?;
                rows.iter().map(|row| to_record(row, sqlite_value)).collect()
            }
        }
    }

    fn log(&self, statement: &Statement) {
        if self.logs {
            info!(engine = %self.engine, "{}", statement.inline());
        } else {
            debug!(
                engine = %self.engine,
                sql = %statement.sql,
                params = statement.params.len(),
                "statement"
            );
        }
    }
}

/// Convert a driver row to a Record, keeping column order.
fn to_record<R>(
    row: &R,
    decode: fn(&R, usize, &str) -> Result<Value, sqlx::Error>,
) -> QuarryResult<Record>
where
    R: Row,
    usize: sqlx::ColumnIndex<R>,
{
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row
            .try_get_raw(i)
            .map_err(|e| QuarryError::query("decode", name, e))?;
        if raw.is_null() {
            record.insert(name, Value::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();
        let value = decode(row, i, &type_name)
            .map_err(|_| QuarryError::decode(name, "a supported column type"))?;
        record.insert(name, value);
    }
    Ok(record)
}

fn text_of_bytes(bytes: Vec<u8>) -> Value {
    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
}

fn unsigned(n: u64) -> Value {
    match i64::try_from(n) {
        Ok(n) => Value::Int(n),
        Err(_) => Value::Decimal(Decimal::from(n)),
    }
}

/// How a non-null cell is read, chosen from the driver's type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoder {
    Bool,
    I16,
    I32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
    Date,
    Time,
    DateTime,
    DateTimeUtc,
    Bytes,
    Text,
    /// First decoder that accepts the cell.
    Fallback,
}

fn pg_decoder(type_name: &str) -> Decoder {
    match type_name {
        "BOOL" => Decoder::Bool,
        "INT2" => Decoder::I16,
        "INT4" => Decoder::I32,
        "INT8" => Decoder::I64,
        "FLOAT4" => Decoder::F32,
        "FLOAT8" => Decoder::F64,
        "NUMERIC" => Decoder::Decimal,
        "DATE" => Decoder::Date,
        "TIME" => Decoder::Time,
        "TIMESTAMP" => Decoder::DateTime,
        "TIMESTAMPTZ" => Decoder::DateTimeUtc,
        "BYTEA" => Decoder::Bytes,
        _ => Decoder::Text,
    }
}

fn mysql_decoder(type_name: &str) -> Decoder {
    match type_name {
        // TINYINT(1)
        "BOOLEAN" => Decoder::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Decoder::I64,
        name if name.ends_with(" UNSIGNED") => Decoder::U64,
        "FLOAT" => Decoder::F32,
        "DOUBLE" => Decoder::F64,
        "DECIMAL" => Decoder::Decimal,
        "DATE" => Decoder::Date,
        "TIME" => Decoder::Time,
        "DATETIME" | "TIMESTAMP" => Decoder::DateTime,
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => Decoder::Bytes,
        "VARCHAR" | "CHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET"
        | "JSON" => Decoder::Text,
        _ => Decoder::Fallback,
    }
}

fn decode_cell<DB, R>(row: &R, i: usize, decoder: Decoder) -> Result<Value, sqlx::Error>
where
    DB: sqlx::Database,
    R: Row<Database = DB>,
    usize: sqlx::ColumnIndex<R>,
    bool: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    i16: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    i32: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    i64: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    f32: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    f64: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    Decimal: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    NaiveDate: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    NaiveTime: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    NaiveDateTime: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    DateTime<Utc>: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    Vec<u8>: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
    String: sqlx::Type<DB> + for<'r> sqlx::Decode<'r, DB>,
{
    Ok(match decoder {
        Decoder::Bool => Value::Bool(row.try_get(i)?),
        Decoder::I16 => Value::Int(row.try_get::<i16, _>(i)?.into()),
        Decoder::I32 => Value::Int(row.try_get::<i32, _>(i)?.into()),
        Decoder::I64 => Value::Int(row.try_get(i)?),
        Decoder::F32 => Value::Float(row.try_get::<f32, _>(i)?.into()),
        Decoder::F64 => Value::Float(row.try_get(i)?),
        Decoder::Decimal => Value::Decimal(row.try_get(i)?),
        Decoder::Date => Value::Date(row.try_get(i)?),
        Decoder::Time => Value::Time(row.try_get(i)?),
        Decoder::DateTime => Value::DateTime(row.try_get(i)?),
        Decoder::DateTimeUtc => Value::DateTime(row.try_get::<DateTime<Utc>, _>(i)?.naive_utc()),
        Decoder::Bytes => text_of_bytes(row.try_get(i)?),
        Decoder::Text => Value::Text(row.try_get(i)?),
        // U64 and Fallback need driver-specific types; callers handle them.
        Decoder::U64 | Decoder::Fallback => Value::Text(row.try_get(i)?),
    })
}

fn pg_value(row: &PgRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    decode_cell(row, i, pg_decoder(type_name))
}

fn mysql_value(row: &MySqlRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    match mysql_decoder(type_name) {
        Decoder::U64 => Ok(unsigned(row.try_get(i)?)),
        // YEAR, BIT and anything newer.
        Decoder::Fallback => row
            .try_get::<String, _>(i)
            .map(Value::Text)
            .or_else(|_| row.try_get::<i64, _>(i).map(Value::Int))
            .or_else(|_| row.try_get::<u64, _>(i).map(unsigned))
            .or_else(|_| row.try_get::<f64, _>(i).map(Value::Float)),
        decoder => decode_cell(row, i, decoder),
    }
}

/// SQLite reports the storage class of each value, so booleans read back
/// as integers and dates as text; `FromValue` coerces both.
fn sqlite_value(row: &SqliteRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    Ok(match type_name {
        "INTEGER" => Value::Int(row.try_get(i)?),
        "REAL" => Value::Float(row.try_get(i)?),
        "BOOLEAN" => Value::Bool(row.try_get(i)?),
        "BLOB" => text_of_bytes(row.try_get(i)?),
        _ => Value::Text(row.try_get(i)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    async fn sqlite() -> DataSource {
        let path = std::env::temp_dir().join(format!(
            "quarry-engine-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let config = DataSourceConfig::new(Engine::Sqlite, path.display().to_string());
        DataSource::connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_values() {
        let source = sqlite().await;
        source
            .execute(&Statement::raw(
                "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, score REAL, note TEXT, \
                 active BOOLEAN, born DATE, seen DATETIME, price NUMERIC)",
            ))
            .await
            .unwrap();
        let born = NaiveDate::from_ymd_opt(1990, 4, 2).unwrap();
        let seen = born.and_hms_opt(8, 30, 0).unwrap();
        let insert = Statement {
            sql: "INSERT INTO t (name, score, note, active, born, seen, price) VALUES (?, ?, ?, ?, ?, ?, ?)"
                .into(),
            params: vec![
                Value::from("a"),
                Value::Float(1.5),
                Value::Null,
                Value::Bool(true),
                Value::Date(born),
                Value::DateTime(seen),
                Value::Decimal("12.25".parse().unwrap()),
            ],
        };
        assert_eq!(source.execute(&insert).await.unwrap(), 1);

        let rows = source
            .fetch_all(&Statement::raw("SELECT id, name, score, note, active, born, seen, price FROM t"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(
            row.columns().collect::<Vec<_>>(),
            vec!["id", "name", "score", "note", "active", "born", "seen", "price"]
        );
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get("name"), Some(&Value::from("a")));
        assert_eq!(row.get("score"), Some(&Value::Float(1.5)));
        assert_eq!(row.get("note"), Some(&Value::Null));

        use crate::value::FromValue;
        let cell = |c: &str| row.get(c).cloned().unwrap_or(Value::Null);
        assert!(bool::from_value(cell("active"), "active").unwrap());
        assert_eq!(NaiveDate::from_value(cell("born"), "born").unwrap(), born);
        assert_eq!(NaiveDateTime::from_value(cell("seen"), "seen").unwrap(), seen);
        assert_eq!(
            Decimal::from_value(cell("price"), "price").unwrap(),
            "12.25".parse::<Decimal>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_driver_error_is_wrapped() {
        let source = sqlite().await;
        let err = source
            .fetch_all(&Statement::raw("SELECT * FROM missing_table"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuarryError::QueryFailed { operation: "fetch", .. }));
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_driver_error() {
        let config = DataSourceConfig::new(Engine::Sqlite, "/nonexistent-dir/quarry/app.db");
        let err = DataSource::connect(&config).await.unwrap_err();
        assert!(matches!(err, QuarryError::Connection(_)));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_cached_select_sees_added_column() {
        let source = sqlite().await;
        source
            .execute(&Statement::raw("CREATE TABLE roles (id INTEGER PRIMARY KEY, label TEXT)"))
            .await
            .unwrap();
        source
            .execute(&Statement::raw("INSERT INTO roles (label) VALUES ('admin')"))
            .await
            .unwrap();
        let select = Statement::raw("SELECT * FROM roles");
        assert_eq!(source.fetch_all(&select).await.unwrap().len(), 1);

        source
            .execute(&Statement::raw("ALTER TABLE roles ADD COLUMN rank INTEGER DEFAULT 0"))
            .await
            .unwrap();
        let rows = source.fetch_all(&select).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("rank"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_postgres_decoders() {
        let cases = [
            ("BOOL", Decoder::Bool),
            ("INT2", Decoder::I16),
            ("INT4", Decoder::I32),
            ("INT8", Decoder::I64),
            ("FLOAT8", Decoder::F64),
            ("NUMERIC", Decoder::Decimal),
            ("DATE", Decoder::Date),
            ("TIME", Decoder::Time),
            ("TIMESTAMP", Decoder::DateTime),
            ("TIMESTAMPTZ", Decoder::DateTimeUtc),
            ("BYTEA", Decoder::Bytes),
            ("VARCHAR", Decoder::Text),
            ("TEXT", Decoder::Text),
        ];
        for (name, decoder) in cases {
            assert_eq!(pg_decoder(name), decoder, "{name}");
        }
    }

    #[test]
    fn test_mysql_decoders() {
        let cases = [
            ("BOOLEAN", Decoder::Bool),
            ("TINYINT", Decoder::I64),
            ("INT", Decoder::I64),
            ("BIGINT UNSIGNED", Decoder::U64),
            ("INT UNSIGNED", Decoder::U64),
            ("DOUBLE", Decoder::F64),
            ("DECIMAL", Decoder::Decimal),
            ("DATE", Decoder::Date),
            ("DATETIME", Decoder::DateTime),
            ("TIMESTAMP", Decoder::DateTime),
            ("TIME", Decoder::Time),
            ("BLOB", Decoder::Bytes),
            ("ENUM", Decoder::Text),
            ("YEAR", Decoder::Fallback),
        ];
        for (name, decoder) in cases {
            assert_eq!(mysql_decoder(name), decoder, "{name}");
        }
    }

    #[test]
    fn test_unsigned_overflow_becomes_decimal() {
        assert_eq!(unsigned(7), Value::Int(7));
        assert_eq!(unsigned(u64::MAX), Value::Decimal(Decimal::from(u64::MAX)));
    }
}

