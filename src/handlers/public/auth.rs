//! Unauthenticated endpoints: login, first-run detection and first-run setup.

use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;
use uuid::Uuid;

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
}

/// POST /api/auth/signin - Verify credentials and issue a bearer token.
///
/// Unknown emails and wrong passwords answer identically so callers cannot
/// probe which accounts exist.
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> ApiResult<Value> {
    let (email, password) = match (required(payload.email), required(payload.password)) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(ApiError::invalid_input("Email and password are required")),
    };

    let row = sqlx::query("SELECT id, password FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    let Some(row) = row else {
        return Err(ApiError::unauthenticated("Invalid credentials"));
    };
    let user_id: String = row.try_get("id")?;
    let stored_hash: String = row.try_get("password")?;
    if !auth::verify_password(&password, &stored_hash) {
        return Err(ApiError::unauthenticated("Invalid credentials"));
    }

    let id = Uuid::parse_str(&user_id)
        .map_err(|e| ApiError::internal("Malformed id in users table", e))?;
    let token = state.auth.issue(id, &email)?;

    let full_name: Option<String> =
        sqlx::query_scalar("SELECT full_name FROM profiles WHERE user_id = $1")
            .bind(&user_id)
            .fetch_optional(&state.db)
            .await?
            .flatten();
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1")
        .bind(&user_id)
        .fetch_optional(&state.db)
        .await?;

    Ok(Json(json!({
        "token": token,
        "user": {
            "id": user_id,
            "email": email,
            "full_name": full_name,
            "role": role,
        },
    })))
}

/// GET /api/auth/needs-setup - Report whether any account exists yet.
pub async fn needs_setup(State(state): State<AppState>) -> ApiResult<Value> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    Ok(Json(json!({ "needsSetup": count == 0 })))
}

/// POST /api/auth/setup - Create the first admin account.
///
/// Refused as soon as any user exists, whatever the payload says. The new
/// account gets the `admin` role and a profile in the same transaction.
pub async fn setup(
    State(state): State<AppState>,
    Json(payload): Json<SetupRequest>,
) -> ApiResult<Value> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    if count > 0 {
        return Err(ApiError::invalid_input("Setup already completed"));
    }

    let (email, password) = match (required(payload.email), required(payload.password)) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(ApiError::invalid_input("Email and password are required")),
    };
    if password.chars().count() < 6 {
        return Err(ApiError::invalid_input(
            "Password must be at least 6 characters",
        ));
    }
    let full_name = payload
        .full_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Administrador".to_string());

    let hashed = auth::hash_password(&password)?;
    let user_id = Uuid::new_v4().to_string();

    let mut tx = state.db.begin().await?;
    sqlx::query("INSERT INTO users (id, email, password, created_at) VALUES ($1, $2, $3, NOW())")
        .bind(&user_id)
        .bind(&email)
        .bind(&hashed)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO profiles (id, user_id, full_name, created_at) VALUES ($1, $2, $3, NOW())",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&user_id)
    .bind(&full_name)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "INSERT INTO user_roles (id, user_id, role, created_at) VALUES ($1, $2, 'admin', NOW())",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&user_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(email = %email, "first admin account created");
    Ok(Json(json!({ "message": "First admin user created successfully" })))
}

/// Missing and empty string are both "not provided".
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
