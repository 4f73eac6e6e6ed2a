//! Application layer: the aggregate coordinator.

pub mod collections;
pub mod command_handlers;
pub mod fanout;
pub mod query_handlers;
