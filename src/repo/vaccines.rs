use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{blank_to_none, db_error, get_day, get_opt_day, non_empty};
use crate::{
    model::{Vaccine, VaccineInput},
    time::now_ms,
    AppResult,
};

pub(crate) const COLUMNS: &str =
    "id, tenant_id, remote_id, horse_id, vaccine_type, date, next_date, notes, created_at";

pub(crate) fn from_row(row: &SqliteRow) -> AppResult<Vaccine> {
    let get = |err: sqlx::Error| db_error(err, "vaccine_decode");
    Ok(Vaccine {
        id: row.try_get("id").map_err(get)?,
        tenant_id: row.try_get("tenant_id").map_err(get)?,
        remote_id: row.try_get("remote_id").map_err(get)?,
        horse_id: row.try_get("horse_id").map_err(get)?,
        vaccine_type: row.try_get("vaccine_type").map_err(get)?,
        date: get_day(row, "date")?,
        next_date: get_opt_day(row, "next_date")?,
        notes: row.try_get("notes").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

pub async fn add(
    pool: &SqlitePool,
    tenant_id: &str,
    input: &VaccineInput,
    remote_id: Option<&str>,
) -> AppResult<Vaccine> {
    non_empty(&input.vaccine_type, "type")?;
    let sql = format!(
        "INSERT INTO vaccines (tenant_id, remote_id, horse_id, vaccine_type, date, next_date, notes, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(tenant_id)
        .bind(remote_id)
        .bind(input.horse_id)
        .bind(input.vaccine_type.trim())
        .bind(input.date.to_string())
        .bind(input.next_date.map(|d| d.to_string()))
        .bind(blank_to_none(&input.notes))
        .bind(now_ms())
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "vaccine_add"))?;
    from_row(&row)
}

pub async fn get(pool: &SqlitePool, id: i64, tenant_id: &str) -> AppResult<Option<Vaccine>> {
    let sql = format!("SELECT {COLUMNS} FROM vaccines WHERE id = ? AND tenant_id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "vaccine_get"))?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list(pool: &SqlitePool, tenant_id: &str) -> AppResult<Vec<Vaccine>> {
    let sql =
        format!("SELECT {COLUMNS} FROM vaccines WHERE tenant_id = ? ORDER BY date DESC, id DESC");
    let rows = sqlx::query(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "vaccine_list"))?;
    rows.iter().map(from_row).collect()
}

pub async fn list_for_horse(pool: &SqlitePool, horse_id: i64) -> AppResult<Vec<Vaccine>> {
    let sql =
        format!("SELECT {COLUMNS} FROM vaccines WHERE horse_id = ? ORDER BY date DESC, id DESC");
    let rows = sqlx::query(&sql)
        .bind(horse_id)
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "vaccine_list_for_horse"))?;
    rows.iter().map(from_row).collect()
}

pub async fn delete(pool: &SqlitePool, id: i64, tenant_id: &str) -> AppResult<Option<Vaccine>> {
    let sql = format!("DELETE FROM vaccines WHERE id = ? AND tenant_id = ? RETURNING {COLUMNS}");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "vaccine_delete"))?;
    row.as_ref().map(from_row).transpose()
}

pub async fn count(pool: &SqlitePool, tenant_id: &str) -> AppResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM vaccines WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "vaccine_count"))
}
