use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{blank_to_none, db_error, get_day, get_label, non_empty};
use crate::{
    model::{Visit, VisitInput},
    time::now_ms,
    AppResult,
};

pub(crate) const COLUMNS: &str =
    "id, tenant_id, remote_id, horse_id, date, vet_name, visit_type, notes, created_at";

pub(crate) fn from_row(row: &SqliteRow) -> AppResult<Visit> {
    let get = |err: sqlx::Error| db_error(err, "visit_decode");
    Ok(Visit {
        id: row.try_get("id").map_err(get)?,
        tenant_id: row.try_get("tenant_id").map_err(get)?,
        remote_id: row.try_get("remote_id").map_err(get)?,
        horse_id: row.try_get("horse_id").map_err(get)?,
        date: get_day(row, "date")?,
        vet_name: row.try_get("vet_name").map_err(get)?,
        visit_type: get_label(row, "visit_type")?,
        notes: row.try_get("notes").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

pub async fn add(
    pool: &SqlitePool,
    tenant_id: &str,
    input: &VisitInput,
    remote_id: Option<&str>,
) -> AppResult<Visit> {
    non_empty(&input.vet_name, "vetName")?;
    let sql = format!(
        "INSERT INTO visits (tenant_id, remote_id, horse_id, date, vet_name, visit_type, notes, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(tenant_id)
        .bind(remote_id)
        .bind(input.horse_id)
        .bind(input.date.to_string())
        .bind(input.vet_name.trim())
        .bind(input.visit_type.as_str())
        .bind(blank_to_none(&input.notes))
        .bind(now_ms())
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "visit_add"))?;
    from_row(&row)
}

pub async fn get(pool: &SqlitePool, id: i64, tenant_id: &str) -> AppResult<Option<Visit>> {
    let sql = format!("SELECT {COLUMNS} FROM visits WHERE id = ? AND tenant_id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "visit_get"))?;
    row.as_ref().map(from_row).transpose()
}

/// Newest visit first.
pub async fn list(pool: &SqlitePool, tenant_id: &str) -> AppResult<Vec<Visit>> {
    let sql =
        format!("SELECT {COLUMNS} FROM visits WHERE tenant_id = ? ORDER BY date DESC, id DESC");
    let rows = sqlx::query(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "visit_list"))?;
    rows.iter().map(from_row).collect()
}

pub async fn list_for_horse(pool: &SqlitePool, horse_id: i64) -> AppResult<Vec<Visit>> {
    let sql =
        format!("SELECT {COLUMNS} FROM visits WHERE horse_id = ? ORDER BY date DESC, id DESC");
    let rows = sqlx::query(&sql)
        .bind(horse_id)
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "visit_list_for_horse"))?;
    rows.iter().map(from_row).collect()
}

pub async fn delete(pool: &SqlitePool, id: i64, tenant_id: &str) -> AppResult<Option<Visit>> {
    let sql = format!("DELETE FROM visits WHERE id = ? AND tenant_id = ? RETURNING {COLUMNS}");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "visit_delete"))?;
    row.as_ref().map(from_row).transpose()
}

pub async fn count(pool: &SqlitePool, tenant_id: &str) -> AppResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM visits WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "visit_count"))
}
