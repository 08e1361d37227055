//! Configuration for OpenCafe
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::crypto::FieldKey;
use crate::types::{CafeError, Result};

/// Seed for the master key in dev mode when none is given
const DEV_MASTER_SEED: &[u8] = b"opencafe-dev-only-insecure-master-key";

/// OpenCafe - café and loyalty-program backend
#[derive(Parser, Debug, Clone)]
#[command(name = "opencafe")]
#[command(about = "Café and loyalty-program backend: admins, points, menus and cards")]
pub struct Args {
    /// Unique node identifier, recorded in audit events
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (insecure default master key, in-memory
    /// fallback when MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Path of the encrypted database config file
    #[arg(long, env = "CONFIG_PATH", default_value = "opencafe/db.cfg")]
    pub config_path: PathBuf,

    /// Base64 master key sealing the config file (required in production)
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// MongoDB connection URI, used when creating a new config file
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name, used when the URI names none
    #[arg(long, env = "MONGODB_DB", default_value = "opencafe")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Upper bound on each store round-trip made by token resolution
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value = "5000")]
    pub store_timeout_ms: u64,

    /// JSONL audit log path (optional)
    #[arg(long, env = "AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,

    /// Create a head admin with this name if no admin exists yet.
    /// Its token is printed once on stdout.
    #[arg(long, env = "BOOTSTRAP_HEAD")]
    pub bootstrap_head: Option<String>,
}

impl Args {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Master key for the config file. Dev mode falls back to a fixed,
    /// insecure key so a dev config survives restarts.
    pub fn master_key(&self) -> Result<FieldKey> {
        match &self.encryption_key {
            Some(encoded) => FieldKey::from_base64(encoded),
            None if self.dev_mode => Ok(FieldKey::from_bytes(Sha256::digest(DEV_MASTER_SEED).into())),
            None => Err(CafeError::Config(
                "ENCRYPTION_KEY is required in production mode".into(),
            )),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode && self.encryption_key.is_none() {
            return Err("ENCRYPTION_KEY is required in production mode".to_string());
        }

        if self.store_timeout_ms == 0 {
            return Err("STORE_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Defaults for tests and embedding: dev mode, nothing read from the
    /// process environment.
    pub fn dev_defaults() -> Self {
        Self {
            node_id: Uuid::new_v4(),
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
            dev_mode: true,
            config_path: PathBuf::from("opencafe/db.cfg"),
            encryption_key: None,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "opencafe".to_string(),
            log_level: "info".to_string(),
            store_timeout_ms: 5000,
            audit_log: None,
            bootstrap_head: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "opencafe",
            "--dev-mode",
            "--listen",
            "127.0.0.1:9000",
            "--store-timeout-ms",
            "250",
            "--bootstrap-head",
            "Owner",
        ])
        .unwrap();

        assert!(args.dev_mode);
        assert_eq!(args.listen.port(), 9000);
        assert_eq!(args.store_timeout(), Duration::from_millis(250));
        assert_eq!(args.bootstrap_head.as_deref(), Some("Owner"));
    }

    #[test]
    fn test_production_requires_key() {
        let mut args = Args::dev_defaults();
        args.dev_mode = false;
        assert!(args.validate().is_err());
        assert!(args.master_key().is_err());

        args.encryption_key = Some(FieldKey::generate().to_base64());
        assert!(args.validate().is_ok());
        assert!(args.master_key().is_ok());
    }

    #[test]
    fn test_dev_master_key_is_stable() {
        let args = Args::dev_defaults();
        assert_eq!(args.master_key().unwrap(), args.master_key().unwrap());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut args = Args::dev_defaults();
        args.store_timeout_ms = 0;
        assert!(args.validate().is_err());
    }
}
