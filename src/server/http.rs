//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one spawned task per connection, manual
//! route dispatch.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::challenge::{self, ChallengeRegistry};
use crate::config::Args;
use crate::db::IdentityStore;
use crate::routes::{self, BoxBody};
use crate::services::AuthFlowService;
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn IdentityStore>,
    pub challenges: Arc<ChallengeRegistry>,
    pub auth: Arc<AuthFlowService>,
}

impl AppState {
    pub fn new(
        args: Args,
        store: Arc<dyn IdentityStore>,
        challenges: Arc<ChallengeRegistry>,
        auth: Arc<AuthFlowService>,
    ) -> Self {
        Self {
            args,
            store,
            challenges,
            auth,
        }
    }
}

/// Run the gateway until the process is stopped
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Wicket listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    // Start the challenge sweeper if expiry is configured
    if state.args.challenge_ttl().is_some() {
        challenge::spawn_sweeper_task(
            Arc::clone(&state.challenges),
            Duration::from_secs(state.args.challenge_sweep_seconds),
        );
        info!(
            "Challenge sweeper started (TTL={}s, sweep every {}s)",
            state.args.challenge_ttl_seconds, state.args.challenge_sweep_seconds
        );
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/") => routes::root_banner(),
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Passwordless flow
        (Method::GET, "/challenge") => routes::handle_challenge(req, state).await,
        (Method::POST, "/sign") => routes::handle_sign(req, state).await,
        (Method::POST, "/verify") => routes::handle_verify(req, state).await,

        // Password flow and session confirmation
        (Method::POST, "/token") => routes::handle_token(req, state).await,
        (Method::POST, "/verify-token") => routes::handle_verify_token(req, state).await,
        (Method::POST, "/register") => routes::handle_register(req, state).await,

        // Identity administration
        (Method::GET, "/users") => routes::handle_list_users(state).await,
        (Method::GET, "/users/active") => routes::handle_active_users(state).await,
        (Method::DELETE, p) if p.starts_with("/users/") => {
            let email = p.trim_start_matches("/users/").to_string();
            routes::handle_delete_user(state, &email).await
        }
        (Method::PATCH, p) if p.starts_with("/users/") => {
            let email = p.trim_start_matches("/users/").to_string();
            routes::handle_patch_user(req, state, &email).await
        }

        // CORS preflight
        (Method::OPTIONS, _) => routes::cors_preflight(),

        _ => routes::error_json(hyper::StatusCode::NOT_FOUND, "Not found", None),
    };

    Ok(response)
}
