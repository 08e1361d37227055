//! OpenCafe server binary

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opencafe::{
    auth::Role,
    config::Args,
    db::{MongoClient, Stores},
    dbcfg::{ConfigFile, DbConfig},
    logging::AuditLogger,
    server,
    services::{admins::create_admin, Context},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("opencafe={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  OpenCafe");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Config file: {}", args.config_path.display());
    info!("Store timeout: {}ms", args.store_timeout_ms);
    info!("======================================");

    // Connection details and collection keys live in the sealed config file
    let master = args.master_key()?;
    let db_config = ConfigFile::new(&args.config_path).load_or_create(&master, || {
        let mut config = DbConfig::from_connection_string(&args.mongodb_uri)?;
        if config.name.is_empty() {
            config.name = args.mongodb_db.clone();
        }
        Ok(config)
    })?;
    let keys = Arc::new(db_config.key_provider()?);

    let stores = match MongoClient::new(&db_config.connection_string(), &db_config.name).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Stores::mongo(&client).await?
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                Stores::in_memory()
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let audit = AuditLogger::new(args.node_id.to_string());
    if let Some(path) = &args.audit_log {
        if let Err(e) = audit.init_file(path.clone()).await {
            warn!("Failed to open audit log {}: {}", path.display(), e);
        }
    }

    let ctx = Context::new(stores, keys, audit, args.store_timeout());

    if let Some(name) = &args.bootstrap_head {
        if ctx.stores.admins.find_all().await?.is_empty() {
            let (_, issued) = create_admin(&ctx, name, vec![Role::Head], None).await?;
            info!("Created head admin '{}'", name);
            // Shown once; only the ciphertext is stored
            println!("Head admin token: {}", issued.plaintext.as_str());
        } else {
            info!("Admins already exist, skipping head bootstrap");
        }
    }

    let state = Arc::new(AppState::new(args, ctx));
    server::run(state).await?;

    Ok(())
}
