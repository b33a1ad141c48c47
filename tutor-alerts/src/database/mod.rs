//! Database module.
//!
//! Notification records and identity lookups live in one SQLite file opened
//! in WAL mode, so list and stats reads never wait on acknowledgement writes.

pub mod models;
pub mod repositories;
pub mod retry;
pub mod time;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// Database connection pool type alias.
pub type DbPool = Pool<Sqlite>;

/// Upper bound for the default pool size.
const MAX_DEFAULT_POOL_SIZE: u32 = 8;

/// How long SQLite itself waits on the writer lock before reporting busy.
///
/// Kept short: [`retry::with_write_retry`] owns the longer wait so it can
/// stay inside one request.
pub const STORE_BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Connection acquisition limit, matched to the client request timeout.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pool size: one reader per core, at least two, capped.
pub fn default_pool_size() -> u32 {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(2);
    cores.clamp(2, MAX_DEFAULT_POOL_SIZE)
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Open the notification store.
///
/// In-memory URLs (`sqlite::memory:`) are pinned to a single connection that
/// never expires, since every SQLite connection would otherwise open its own
/// empty database.
pub async fn init_pool_with_size(
    database_url: &str,
    max_connections: u32,
) -> Result<DbPool, sqlx::Error> {
    let in_memory = is_in_memory(database_url);
    let max_connections = if in_memory { 1 } else { max_connections.max(1) };

    let connect_options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(STORE_BUSY_TIMEOUT)
        .create_if_missing(true);

    let mut options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT);
    if in_memory {
        options = options.min_connections(1).idle_timeout(None).max_lifetime(None);
    }

    let pool = options.connect_with(connect_options).await?;
    tracing::info!(max_connections, in_memory, "Notification store opened");
    Ok(pool)
}

/// Open the notification store with [`default_pool_size`] connections.
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    init_pool_with_size(database_url, default_pool_size()).await
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Notification schema up to date");
    Ok(())
}
