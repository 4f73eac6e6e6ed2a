//! Vitae API library: configuration, state, routes and error mapping,
//! shared by the server binary and the integration tests.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
