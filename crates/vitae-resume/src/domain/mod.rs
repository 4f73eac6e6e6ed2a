//! Domain layer: documents, commands and saga outcomes.

pub mod commands;
pub mod documents;
pub mod saga;
