//! CSV import endpoints. Each requires create permission on the target
//! resource and hands the payload to the matching import protocol.

use axum::{extract::State, http::StatusCode, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::imports::{self, ArtigoImport, CondominioImport, ImportReport, PessoaImport};
use crate::middleware::AuthUser;
use crate::permissions::{self, Operation};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub csv_content: Option<String>,
}

/// POST /api/condominios/import - Load complexes from a one-column CSV.
pub async fn import_condominios(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ImportRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    permissions::require(&state.db, user.id, "condominios", Operation::Create).await?;

    let report = imports::run_import(
        &state.db,
        &CondominioImport,
        payload.csv_content.as_deref(),
    )
    .await?;
    Ok(report_response(report))
}

/// POST /api/artigos/import - Load article codes from a numero,nome CSV.
pub async fn import_artigos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ImportRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    permissions::require(&state.db, user.id, "artigos", Operation::Create).await?;

    let report =
        imports::run_import(&state.db, &ArtigoImport, payload.csv_content.as_deref()).await?;
    Ok(report_response(report))
}

/// POST /api/pessoas/import - Load person records, with optional links to a
/// complex and to article codes resolved by name.
pub async fn import_pessoas(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ImportRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    permissions::require(&state.db, user.id, "pessoas", Operation::Create).await?;

    let protocol = PessoaImport::new(state.cipher.clone());
    let report =
        imports::run_import(&state.db, &protocol, payload.csv_content.as_deref()).await?;
    Ok(report_response(report))
}

/// A run with only failed rows answers 400; any inserted row makes it 200.
fn report_response(report: ImportReport) -> (StatusCode, Json<Value>) {
    let status = if report.is_failure() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(json!({ "message": report.message, "errors": report.errors })),
    )
}
