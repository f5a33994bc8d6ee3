//! Configuration for Wicket
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Wicket - identity gateway for wallet-style challenge authentication
#[derive(Parser, Debug, Clone)]
#[command(name = "wicket")]
#[command(about = "Identity gateway with password and challenge-signature authentication")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store fallback, default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "wicket")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Path to the key-pool catalogue, a JSON array of
    /// {"account": "0x..", "privateKey": "0x.."} entries
    #[arg(long, env = "KEY_POOL_PATH", default_value = "./accounts.json")]
    pub key_pool_path: String,

    /// Challenge time-to-live in seconds (0 disables expiry)
    #[arg(long, env = "CHALLENGE_TTL_SECONDS", default_value = "300")]
    pub challenge_ttl_seconds: u64,

    /// Interval between challenge-registry sweeper runs in seconds
    #[arg(long, env = "CHALLENGE_SWEEP_SECONDS", default_value = "60")]
    pub challenge_sweep_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Challenge TTL as a Duration, None when expiry is disabled
    pub fn challenge_ttl(&self) -> Option<std::time::Duration> {
        if self.challenge_ttl_seconds == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.challenge_ttl_seconds))
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if self.challenge_sweep_seconds == 0 {
            return Err("CHALLENGE_SWEEP_SECONDS must be greater than zero".to_string());
        }

        Ok(())
    }
}
