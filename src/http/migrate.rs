use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use super::error::json_rejection;
use crate::{
    import::{migrate_batch, ImportBatch},
    model::Caller,
    state::AppState,
    AppResult,
};

/// Client-pushed migration of the caller's legacy records. Does nothing when
/// the caller already has local horses.
pub async fn migrate(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<ImportBatch>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(batch) = payload.map_err(json_rejection)?;
    let outcome = migrate_batch(&state.pool, &state.uploads, &caller.tenant_id, &batch).await?;
    let report = outcome.report();
    Ok(Json(json!({
        "success": true,
        "migrated": outcome.migrated(),
        "imported": report.imported,
        "skipped": report.skipped,
    })))
}
