//! Database layer - the single warehouse connection

pub mod connection;

pub use connection::{ConnectArgs, ConnectArgsBuilder, Warehouse, connect};
