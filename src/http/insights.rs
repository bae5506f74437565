use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    model::Caller,
    reminders::{derive_alerts, Alert},
    repo::{horses, pregnancies, vaccines, visits},
    state::AppState,
    stats::{summarize, StableStats},
    time::today,
    AppResult,
};

pub async fn check_admin(caller: Caller) -> Json<Value> {
    Json(json!({ "isAdmin": caller.is_admin }))
}

pub async fn reminders(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Vec<Alert>>> {
    let horses = horses::list_scoped(&state.pool, caller.scope()).await?;
    let vaccines = vaccines::list(&state.pool, &caller.tenant_id).await?;
    let pregnancies = pregnancies::list(&state.pool, &caller.tenant_id).await?;
    Ok(Json(derive_alerts(&vaccines, &pregnancies, &horses, today())))
}

pub async fn stats(State(state): State<AppState>, caller: Caller) -> AppResult<Json<StableStats>> {
    let horses = horses::list_scoped(&state.pool, caller.scope()).await?;
    let visits = visits::list(&state.pool, &caller.tenant_id).await?;
    let vaccines = vaccines::list(&state.pool, &caller.tenant_id).await?;
    let pregnancies = pregnancies::list(&state.pool, &caller.tenant_id).await?;
    Ok(Json(summarize(&horses, &visits, &vaccines, &pregnancies)))
}
