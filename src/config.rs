// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! The JWT signing key must come from the environment (or a secret binding
//! that injects it there); there is no built-in fallback key.

use chrono::{FixedOffset, Offset, Utc};
use std::env;

/// Default number of members shown on the leaderboard.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// Default session token lifetime.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Which user store implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Cloud Firestore (or the Firestore emulator).
    Firestore,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Storage backend
    pub store_backend: StoreBackend,
    /// Number of entries returned by the leaderboard
    pub leaderboard_size: usize,
    /// Lifetime of issued session tokens, in hours
    pub session_ttl_hours: i64,
    /// Zone used when truncating login instants to calendar dates
    pub calendar_offset: FixedOffset,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            calendar_offset: Utc.fix(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .trim()
            .to_string()
            .into_bytes();
        if jwt_signing_key.is_empty() {
            return Err(ConfigError::Invalid("JWT_SIGNING_KEY"));
        }

        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("SESSION_TTL_HOURS"));
        }

        let leaderboard_size = parse_or("LEADERBOARD_SIZE", DEFAULT_LEADERBOARD_SIZE)?;
        if leaderboard_size == 0 {
            return Err(ConfigError::Invalid("LEADERBOARD_SIZE"));
        }

        let offset_hours: i32 = parse_or("CALENDAR_UTC_OFFSET_HOURS", 0)?;
        let calendar_offset = FixedOffset::east_opt(offset_hours * 3600)
            .ok_or(ConfigError::Invalid("CALENDAR_UTC_OFFSET_HOURS"))?;

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend: env::var("STORE_BACKEND")
                .map(|v| v.parse())
                .unwrap_or(Ok(StoreBackend::Firestore))?,
            leaderboard_size,
            session_ttl_hours,
            calendar_offset,
            jwt_signing_key,
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
