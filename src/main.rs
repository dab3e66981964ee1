//! Classroom Hub Backend
//!
//! Realtime class notices, lesson plan and chat over SQLite, with identity-provider
//! sign-in and a daily school meal lookup.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod feeds;
mod meal;
mod models;
mod role;
mod session;
mod store;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::Sessions;
use config::{Config, ConfigError};
use db::Repository;
use meal::MealClient;
use role::RoleGate;
use session::FirebaseIdentityProvider;
use store::{AccessRules, RealtimeStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: RealtimeStore,
    pub sessions: Arc<Sessions>,
    pub gate: Arc<RoleGate>,
    pub meal: Arc<MealClient>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Classroom Hub Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Moderator: {}", config.moderator_email);

    if config.firebase_api_key.is_none() {
        tracing::warn!("No identity provider key (FIREBASE_API_KEY). Sign-in will fail!");
    }
    if config.meal.office_code.is_none() || config.meal.school_code.is_none() {
        tracing::warn!("School codes not configured (NEIS_OFFICE_CODE, NEIS_SCHOOL_CODE)");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;

    let gate = RoleGate::new(config.moderator_email.clone());
    let store = RealtimeStore::new(Repository::new(pool), AccessRules::new(gate.clone()));
    let provider = Arc::new(FirebaseIdentityProvider::new(
        config.identity_url.clone(),
        config.firebase_api_key.clone(),
    ));

    let state = AppState {
        store,
        sessions: Arc::new(Sessions::new(provider)),
        gate: Arc::new(gate),
        meal: Arc::new(MealClient::new(config.meal_url.clone())),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sessions = Arc::clone(&state.sessions);

    // Routes behind a live session
    let api_routes = Router::new()
        .route("/notices", get(api::list_notices).post(api::create_notice))
        .route("/learning", get(api::list_lessons).post(api::create_lesson))
        .route("/chats", get(api::list_messages).post(api::send_message))
        .route("/meal", get(api::get_meal))
        .route("/assignments", get(api::get_assignments))
        .route("/live/{feed}", get(api::live_feed))
        .layer(middleware::from_fn(move |req, next| {
            auth::session_auth_layer(Arc::clone(&sessions), req, next)
        }));

    // Sign-in and sign-out; GET resolves the session itself
    let session_routes = Router::new().route(
        "/session",
        get(api::get_session)
            .post(api::sign_in)
            .delete(api::sign_out),
    );

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", session_routes.merge(api_routes))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
