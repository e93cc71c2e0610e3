//! Account provisioning, restricted to admin callers.

use axum::{extract::State, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::permissions::{self, Role};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

/// POST /api/auth/create-user - Provision an account with a role.
///
/// Admin-only: the caller's stored role decides, not anything in the token.
/// User, profile and role rows land in one transaction.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<Value> {
    let caller_role = permissions::role_of(&state.db, user.id).await?;
    if caller_role != Some(Role::Admin) {
        return Err(ApiError::forbidden("Only admins can create users"));
    }

    let (email, password, role) = match (
        required(payload.email),
        required(payload.password),
        required(payload.role),
    ) {
        (Some(email), Some(password), Some(role)) => (email, password, role),
        _ => {
            return Err(ApiError::invalid_input(
                "Email, password and role are required",
            ))
        }
    };
    if password.chars().count() < 6 {
        return Err(ApiError::invalid_input(
            "Password must be at least 6 characters",
        ));
    }
    if Role::parse(&role).is_none() {
        return Err(ApiError::invalid_input("Invalid role"));
    }

    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::invalid_input("Email already registered"));
    }

    let full_name = payload.full_name.filter(|name| !name.is_empty());
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
    sqlx::query("INSERT INTO user_roles (id, user_id, role, created_at) VALUES ($1, $2, $3, NOW())")
        .bind(Uuid::new_v4().to_string())
        .bind(&user_id)
        .bind(&role)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(email = %email, role = %role, "account provisioned");
    Ok(Json(json!({ "id": user_id, "message": "User created successfully" })))
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
