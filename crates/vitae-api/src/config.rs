//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use vitae_resume::application::fanout::FanOutPolicy;

use crate::error::AppError;

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum pool connections.
    pub db_max_connections: u32,
    /// Concurrency and deadline for child fan-out.
    pub fan_out: FanOutPolicy,
    /// OTLP collector endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 3000_u16)?;
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10_u32)?;
        let max_in_flight = parse_or(&lookup, "FANOUT_MAX_IN_FLIGHT", 8_usize)?;
        let deadline_ms = parse_or(&lookup, "FANOUT_DEADLINE_MS", 5_000_u64)?;
        if max_in_flight == 0 {
            return Err(AppError::Config("FANOUT_MAX_IN_FLIGHT must be positive".into()));
        }
        if deadline_ms == 0 {
            return Err(AppError::Config("FANOUT_DEADLINE_MS must be positive".into()));
        }
        let otlp_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            host,
            port,
            db_max_connections,
            fan_out: FanOutPolicy {
                max_in_flight,
                deadline: Duration::from_millis(deadline_ms),
            },
            otlp_endpoint,
        })
    }

    /// The address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}
