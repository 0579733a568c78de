//! nostr-market entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis (user directory)
//! 3. Build the session store and challenge service
//! 4. Spawn the expired-session sweep
//! 5. Build router with API routes, CORS and security headers
//! 6. Start Axum server
//!
//! Also supports `keygen` subcommand for generating test keypairs.

use axum::http::{header, HeaderName, HeaderValue, Method};
use nostr_market::{
    auth::{keys, AppState, ChallengeService, SessionStore, SystemClock},
    cleanup,
    config::Config,
    middleware::security_headers,
    routes,
    storage::RedisUserDirectory,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use zeroize::Zeroizing;

/// Generate a fresh Ed25519 keypair; returns (npub, seed hex).
fn keygen() -> Result<(String, Zeroizing<String>), keys::KeyError> {
    use ed25519_dalek::SigningKey;

    let mut seed = Zeroizing::new([0u8; 32]);
    rand::fill(&mut *seed);

    let signing_key = SigningKey::from_bytes(&seed);
    let npub = keys::encode_public_key(signing_key.verifying_key().as_bytes())?;

    Ok((npub, Zeroizing::new(hex::encode(*seed))))
}

fn print_keygen_usage() {
    eprintln!("Usage: nostr-market keygen");
    eprintln!();
    eprintln!("Generate an Ed25519 keypair for exercising the challenge flow.");
    eprintln!("Prints the npub on the first line and the 32-byte seed (hex) on the second.");
    eprintln!("Register the npub via POST /users, sign challenges with the seed.");
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    // No configured origins: deny all cross-origin requests.
    if origins.is_empty() {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins.iter().cloned()))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(nostr_market::auth::middleware::SESSION_TOKEN_HEADER),
        ])
}

#[tokio::main]
async fn main() {
    // Check for keygen subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "keygen" {
        if args.len() != 2 {
            print_keygen_usage();
            std::process::exit(1);
        }

        match keygen() {
            Ok((npub, seed_hex)) => {
                println!("{}", npub);
                println!("{}", seed_hex.as_str());
            }
            Err(e) => {
                eprintln!("Error generating keypair: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting nostr-market on {}", config.bind_addr);

    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("Invalid Redis URL");

    // Verify Redis connection
    redis_client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect to Redis");

    let users = Arc::new(RedisUserDirectory::new(redis_client));

    let policy = config.issue_policy();
    let store = SessionStore::new(Arc::new(SystemClock), config.session_lifetime_secs);
    let service = Arc::new(ChallengeService::new(store, users.clone()).with_policy(policy));
    tracing::info!(
        lifetime_secs = config.session_lifetime_secs,
        policy = ?policy,
        "Challenge service ready"
    );

    if config.session_sweep_interval_secs > 0 {
        tokio::spawn(cleanup::run_sweep_loop(
            service.clone(),
            Duration::from_secs(config.session_sweep_interval_secs),
        ));
    }

    let state = AppState { service, users };

    let app = routes::api_router()
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(axum::middleware::from_fn(security_headers))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
