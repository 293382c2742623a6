//! Database module for PostgreSQL connectivity
//!
//! Pools created here are read-only at the session level: every connection
//! starts with `default_transaction_read_only=on`.

pub mod connection;

pub use connection::{connect_options, init_pool, DbPool};
