//! Database layer for Huddle

mod connection;
mod migrations;
pub mod queue;
pub mod records;

pub use connection::Database;
pub use queue::QueueStats;
