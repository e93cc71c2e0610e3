//! Permissioned records backend over PostgreSQL: role-gated generic CRUD on
//! a fixed set of entities, field-level encryption for person data, and CSV
//! bulk imports. All state a handler needs travels in [`AppState`].

use axum::{extract::State, middleware::from_fn_with_state, response::Json, routing::get, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod handlers;
pub mod imports;
pub mod middleware;
pub mod permissions;
pub mod schema;

use auth::AuthGateway;
use crypto::FieldCipher;

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub auth: AuthGateway,
    pub cipher: FieldCipher,
}

impl AppState {
    pub fn new(db: PgPool, security: &config::SecurityConfig) -> Self {
        Self {
            db,
            auth: AuthGateway::new(&security.jwt_secret),
            cipher: FieldCipher::new(&security.encryption_key),
        }
    }
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(public_auth_routes())
        .merge(protected_routes(state.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_auth_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::public::auth;

    Router::new()
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/needs-setup", get(auth::needs_setup))
        .route("/api/auth/setup", post(auth::setup))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use axum::routing::post;
    use handlers::protected::{imports, records, users};

    Router::new()
        .route("/api/auth/create-user", post(users::create_user))
        // Static segments win over the generic captures below, so the
        // import routes can share the /api prefix.
        .route("/api/condominios/import", post(imports::import_condominios))
        .route("/api/artigos/import", post(imports::import_artigos))
        .route("/api/pessoas/import", post(imports::import_pessoas))
        // Generic whitelisted CRUD; delete dispatches the guarded variants.
        .route("/api/:table", get(records::list).post(records::create))
        .route(
            "/api/:table/:id",
            get(records::get_by_id)
                .put(records::update)
                .delete(records::delete),
        )
        .route_layer(from_fn_with_state(state, middleware::jwt_auth_middleware))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match database::manager::health_check(&state.db).await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    Json(json!({ "status": "ok", "database": database }))
}
