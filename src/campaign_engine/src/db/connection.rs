//! SQLite connection helpers.
//!
//! The engine opens one connection per long-running thread: the scheduler
//! loop holds one and every worker holds its own. [`connect_sqlite`] applies
//! the PRAGMAs that make that access pattern safe on a shared database file:
//! - WAL journaling, so workers can load task bundles while the scheduler's
//!   claim transaction writes;
//! - `foreign_keys=ON`, so the cascade and RESTRICT rules declared by the
//!   schema are actually enforced;
//! - a 5s busy timeout, so a worker that collides with another immediate
//!   transaction waits out the short lock window instead of surfacing
//!   SQLITE_BUSY mid-state-machine.

use anyhow::Context;
use diesel::connection::SimpleConnection;
use diesel::{Connection, SqliteConnection};

/// Applied to every engine connection before it is handed out.
const CONNECTION_PRAGMAS: &str = "\
    PRAGMA journal_mode=WAL;\n\
    PRAGMA foreign_keys=ON;\n\
    PRAGMA busy_timeout=5000;";

/// Open a SQLite connection configured for the engine's
/// thread-per-loop access pattern.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)
        .with_context(|| format!("open sqlite database {database_url}"))?;
    conn.batch_execute(CONNECTION_PRAGMAS)
        .context("apply connection pragmas")?;
    Ok(conn)
}
