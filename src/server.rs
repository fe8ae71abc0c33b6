use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    Router,
    extract::{ConnectInfo, FromRef, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    analysis::{PipelineOptions, PlaylistPipeline},
    api::{self, response::error_body},
    config::Config,
    error::{AppError, Result},
    management::{RateLimiter, SessionStore, TaskRegistry},
    spotify::{MusicApi, OAuthApi, SpotifyAuth, SpotifyClient},
};

/// Shared state of the web service, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub oauth: Arc<dyn OAuthApi>,
    pub pipeline: Arc<PlaylistPipeline>,
    pub sessions: SessionStore,
    pub rate_limiter: Arc<RateLimiter>,
    pub tasks: TaskRegistry,
    cookie_key: Key,
}

impl AppState {
    pub fn new(config: Config, api: Arc<dyn MusicApi>, oauth: Arc<dyn OAuthApi>) -> Self {
        // Key::from needs 64 bytes of key material
        let cookie_key = Key::from(Sha512::digest(config.session_secret.as_bytes()).as_slice());

        Self {
            pipeline: Arc::new(PlaylistPipeline::new(api, PipelineOptions::from(&config))),
            sessions: SessionStore::new(config.session_lifetime_hours),
            rate_limiter: Arc::new(RateLimiter::per_minute(config.rate_limit_per_minute)),
            tasks: TaskRegistry::new(),
            config: Arc::new(config),
            oauth,
            cookie_key,
        }
    }

    /// State wired to the real Spotify endpoints.
    pub fn from_config(config: Config) -> Result<Self> {
        let api = Arc::new(SpotifyClient::from_config(&config)?);
        let oauth = Arc::new(SpotifyAuth::from_config(&config)?);
        Ok(Self::new(config, api, oauth))
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if state.rate_limiter.check(&client).await {
        return next.run(request).await;
    }

    warn!(%client, "rate limit exceeded");
    let retry_after = state.rate_limiter.window().as_secs();
    let mut response = error_body(
        StatusCode::TOO_MANY_REQUESTS,
        format!("Too many requests, retry after {} seconds", retry_after),
    );
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/me", get(api::me))
        .route("/api/playlists", get(api::playlists))
        .route("/api/playlist/{id}/analyze", get(api::analyze))
        .route("/api/playlist/{id}/changes", get(api::changes))
        .route("/api/playlist/{id}/similar", get(api::similar))
        .route("/api/playlist/{id}/similar/add", post(api::add_similar))
        .route("/api/optimize/{id}", post(api::optimize))
        .route("/api/optimize/{id}/tasks", post(api::submit_optimize))
        .route("/api/tasks/{task_id}", get(api::task_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(api::health))
        .route("/", get(api::index))
        .route("/login", get(api::login))
        .route("/callback", get(api::callback))
        .route("/logout", get(api::logout).post(api::logout))
        .route("/dashboard", get(api::dashboard))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_api_server(config: Config) -> Result<()> {
    let addr = SocketAddr::from_str(&config.server_address).map_err(|e| {
        AppError::Config(format!(
            "invalid server address {}: {}",
            config.server_address, e
        ))
    })?;

    let app = router(AppState::from_config(config)?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
