//! Database plumbing: connection setup and embedded migrations.

pub mod connection;
pub mod migrate;
