//! Single warehouse connection over the sqlx Postgres driver.
use derive_builder::Builder;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{ConnectOptions, Connection};

use crate::config::{CONNECT_TIMEOUT, DEFAULT_PORT};
use crate::sql::Dialect;

/// Inner connection variants
#[derive(Debug)]
enum ConnectionInner {
    Postgres(PgConnection),
    #[cfg(test)]
    Sqlite(sqlx::SqliteConnection),
}

/// A live session against the warehouse
///
/// Statements run one at a time on this single connection; the pipeline never
/// opens a second one.
#[derive(Debug)]
pub struct Warehouse {
    inner: ConnectionInner,
}

#[derive(Builder)]
pub struct ConnectArgs {
    #[builder(setter(into))]
    host: String,
    #[builder(default = "DEFAULT_PORT")]
    port: u16,
    #[builder(setter(into))]
    database: String,
    #[builder(setter(into))]
    username: String,
    #[builder(setter(into))]
    password: String,
    #[builder(default)]
    ssl_mode: PgSslMode,
}

/// Open a connection, failing if the cluster does not answer within `CONNECT_TIMEOUT`
pub async fn connect(args: ConnectArgs) -> Result<Warehouse, sqlx::Error> {
    let ConnectArgs {
        host,
        port,
        database,
        username,
        password,
        ssl_mode,
    } = args;

    let connect_options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .database(&database)
        .username(&username)
        .password(&password)
        .ssl_mode(ssl_mode);

    tracing::info!(%host, port, %database, %username, "connecting to warehouse");

    let conn = tokio::time::timeout(CONNECT_TIMEOUT, connect_options.connect())
        .await
        .map_err(|_| sqlx::Error::PoolTimedOut)??;

    Ok(Warehouse {
        inner: ConnectionInner::Postgres(conn),
    })
}

impl Warehouse {
    /// Open an in-memory SQLite database for testing
    #[cfg(test)]
    pub async fn sqlite_in_memory() -> Result<Self, sqlx::Error> {
        let conn = sqlx::SqliteConnection::connect("sqlite::memory:").await?;
        Ok(Warehouse {
            inner: ConnectionInner::Sqlite(conn),
        })
    }

    /// Borrow the underlying SQLite connection (tests only)
    #[cfg(test)]
    pub fn sqlite_connection(&mut self) -> &mut sqlx::SqliteConnection {
        match &mut self.inner {
            ConnectionInner::Sqlite(conn) => conn,
            ConnectionInner::Postgres(_) => panic!("Not a SQLite connection"),
        }
    }

    /// Dialect statements must be rendered in for this connection
    pub fn dialect(&self) -> Dialect {
        match &self.inner {
            ConnectionInner::Postgres(_) => Dialect::Redshift,
            #[cfg(test)]
            ConnectionInner::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Execute one statement and return the number of rows it affected
    ///
    /// Uses the simple query protocol, so DDL and `COPY` run exactly as written.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        match &mut self.inner {
            ConnectionInner::Postgres(conn) => {
                let result = sqlx::raw_sql(sql).execute(&mut *conn).await?;
                Ok(result.rows_affected())
            }
            #[cfg(test)]
            ConnectionInner::Sqlite(conn) => {
                let result = sqlx::raw_sql(sql).execute(&mut *conn).await?;
                Ok(result.rows_affected())
            }
        }
    }

    /// Run a query returning a single integer, such as `SELECT COUNT(*) ...`
    pub async fn fetch_count(&mut self, sql: &str) -> Result<i64, sqlx::Error> {
        match &mut self.inner {
            ConnectionInner::Postgres(conn) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(&mut *conn)
                    .await
            }
            #[cfg(test)]
            ConnectionInner::Sqlite(conn) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .fetch_one(&mut *conn)
                    .await
            }
        }
    }

    /// Close the session cleanly
    pub async fn close(self) -> Result<(), sqlx::Error> {
        match self.inner {
            ConnectionInner::Postgres(conn) => conn.close().await,
            #[cfg(test)]
            ConnectionInner::Sqlite(conn) => conn.close().await,
        }
    }
}
