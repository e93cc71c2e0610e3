//! Generic record endpoints over the whitelisted entities, plus the
//! guarded delete routes for condominios and artigos.
//!
//! Every handler resolves the entity first, so an unknown table answers 400
//! before any credential is spent on a permission lookup, then consults the
//! permission matrix for the caller's role.

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde_json::{json, Value};

use crate::database::RecordStore;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::permissions::{self, resource_for_entity, Operation};
use crate::schema;
use crate::AppState;

/// GET /api/:table - List every record of one entity.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table): Path<String>,
) -> ApiResult<Vec<Value>> {
    let entity = schema::entity(&table)?;
    permissions::require(&state.db, user.id, resource_for_entity(&table), Operation::Read).await?;

    let store = RecordStore::new(state.db.clone(), state.cipher.clone());
    Ok(Json(store.list(entity).await?))
}

/// GET /api/:table/:id - Fetch a single record.
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let entity = schema::entity(&table)?;
    permissions::require(&state.db, user.id, resource_for_entity(&table), Operation::Read).await?;

    let store = RecordStore::new(state.db.clone(), state.cipher.clone());
    Ok(Json(store.get(entity, &id).await?))
}

/// POST /api/:table - Insert a record from a JSON object body.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let entity = schema::entity(&table)?;
    permissions::require(
        &state.db,
        user.id,
        resource_for_entity(&table),
        Operation::Create,
    )
    .await?;

    let Value::Object(data) = body else {
        return Err(ApiError::invalid_input("Request body must be a JSON object"));
    };

    let store = RecordStore::new(state.db.clone(), state.cipher.clone());
    let id = store.create(entity, data).await?;
    Ok(Json(json!({ "id": id, "message": "Created successfully" })))
}

/// PUT /api/:table/:id - Update the named fields of a record.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let entity = schema::entity(&table)?;
    permissions::require(
        &state.db,
        user.id,
        resource_for_entity(&table),
        Operation::Update,
    )
    .await?;

    let Value::Object(data) = body else {
        return Err(ApiError::invalid_input("Request body must be a JSON object"));
    };

    let store = RecordStore::new(state.db.clone(), state.cipher.clone());
    store.update(entity, &id, data).await?;
    Ok(Json(json!({ "message": "Updated successfully" })))
}

/// DELETE /api/:table/:id - Remove a record.
///
/// Condominios and artigos get the guarded variant here rather than via
/// dedicated routes: a static route would shadow the GET and PUT methods of
/// the generic capture for those paths.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let entity = schema::entity(&table)?;
    permissions::require(
        &state.db,
        user.id,
        resource_for_entity(&table),
        Operation::Delete,
    )
    .await?;

    let store = RecordStore::new(state.db.clone(), state.cipher.clone());
    let message = match table.as_str() {
        "condominios" => {
            store.delete_condominio(&id).await?;
            "Condomínio excluído com sucesso."
        }
        "artigos" => {
            store.delete_artigo(&id).await?;
            "Código excluído com sucesso."
        }
        _ => {
            store.delete(entity, &id).await?;
            "Deleted successfully"
        }
    };
    Ok(Json(json!({ "message": message })))
}
