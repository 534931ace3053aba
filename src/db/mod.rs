pub mod bookings;
pub mod identity;
pub mod lessons;
pub mod messages;
pub mod notifications;
pub mod progress;
pub mod ratings;
pub mod schools;
pub mod sessions;

pub use bookings::*;
pub use identity::*;
pub use lessons::*;
pub use messages::*;
pub use notifications::*;
pub use progress::*;
pub use ratings::*;
pub use schools::*;
pub use sessions::*;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a pool on a file database in WAL mode, creating the file if needed.
pub async fn connect(url: &str, max_connections: u32) -> Result<Pool<Sqlite>, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Starts a transaction that takes the write lock up front (`BEGIN IMMEDIATE`).
///
/// Concurrent writers queue on the busy timeout instead of failing with `SQLITE_BUSY`.
pub async fn begin_write(
    pool: &Pool<Sqlite>,
) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}
