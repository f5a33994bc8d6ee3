//! Wicket - identity gateway for wallet-style challenge authentication

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wicket::{
    auth::JwtValidator,
    challenge::ChallengeRegistry,
    config::Args,
    db::{IdentityStore, MemoryIdentityStore, MongoClient, MongoIdentityStore},
    keypool::KeyPool,
    server::{self, AppState},
    services::AuthFlowService,
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
                .unwrap_or_else(|_| format!("wicket={log_level},info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Wicket - Identity Gateway");
    info!("  \"A small gate within the gate\"");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Key pool: {}", args.key_pool_path);
    info!(
        "Challenge TTL: {}",
        if args.challenge_ttl_seconds == 0 {
            "disabled".to_string()
        } else {
            format!("{}s", args.challenge_ttl_seconds)
        }
    );
    info!("======================================");

    // Identity store: MongoDB, with an in-memory fallback in dev mode
    let store: Arc<dyn IdentityStore> =
        match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => match MongoIdentityStore::new(&client).await {
                Ok(store) => {
                    info!("Identity store ready (MongoDB)");
                    Arc::new(store)
                }
                Err(e) => {
                    error!("Failed to initialize identity store: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                if args.dev_mode {
                    warn!("MongoDB unavailable (dev mode, using in-memory store): {}", e);
                    Arc::new(MemoryIdentityStore::new())
                } else {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        };

    // Key-pool catalogue, read once at startup
    let pool = match KeyPool::load(&args.key_pool_path) {
        Ok(pool) => {
            info!("Key pool loaded: {} accounts", pool.len());
            pool
        }
        Err(e) => {
            if args.dev_mode {
                warn!("Key pool unavailable (dev mode, empty pool): {}", e);
                KeyPool::empty()
            } else {
                error!("Failed to load key pool: {}", e);
                std::process::exit(1);
            }
        }
    };

    let jwt = if args.dev_mode && args.jwt_secret.is_none() {
        warn!("Using dev-mode JWT secret");
        JwtValidator::new_dev()
    } else {
        match JwtValidator::new(args.jwt_secret(), args.jwt_expiry_seconds) {
            Ok(jwt) => jwt,
            Err(e) => {
                error!("JWT configuration error: {}", e);
                std::process::exit(1);
            }
        }
    };

    let challenges = Arc::new(ChallengeRegistry::new(args.challenge_ttl()));
    let auth = Arc::new(AuthFlowService::new(
        Arc::clone(&store),
        Arc::clone(&challenges),
        jwt,
        Arc::new(pool),
    ));

    let state = Arc::new(AppState::new(args, store, challenges, auth));
    server::run(state).await?;

    Ok(())
}
