use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{db_error, get_day, get_label, non_empty};
use crate::{
    model::{Pregnancy, PregnancyInput},
    time::{expected_foaling_date, now_ms},
    AppResult,
};

pub(crate) const COLUMNS: &str = "id, tenant_id, remote_id, horse_id, mating_date, \
                                  stallion_name, status, expected_date, created_at";

pub(crate) fn from_row(row: &SqliteRow) -> AppResult<Pregnancy> {
    let get = |err: sqlx::Error| db_error(err, "pregnancy_decode");
    Ok(Pregnancy {
        id: row.try_get("id").map_err(get)?,
        tenant_id: row.try_get("tenant_id").map_err(get)?,
        remote_id: row.try_get("remote_id").map_err(get)?,
        horse_id: row.try_get("horse_id").map_err(get)?,
        mating_date: get_day(row, "mating_date")?,
        stallion_name: row.try_get("stallion_name").map_err(get)?,
        status: get_label(row, "status")?,
        expected_date: get_day(row, "expected_date")?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

/// Insert a pregnancy. The expected date is derived here from the mating date.
pub async fn add(
    pool: &SqlitePool,
    tenant_id: &str,
    input: &PregnancyInput,
    remote_id: Option<&str>,
) -> AppResult<Pregnancy> {
    non_empty(&input.stallion_name, "stallionName")?;
    let expected = expected_foaling_date(input.mating_date);
    let sql = format!(
        "INSERT INTO pregnancies (tenant_id, remote_id, horse_id, mating_date, stallion_name, status, expected_date, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(tenant_id)
        .bind(remote_id)
        .bind(input.horse_id)
        .bind(input.mating_date.to_string())
        .bind(input.stallion_name.trim())
        .bind(input.status.as_str())
        .bind(expected.to_string())
        .bind(now_ms())
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "pregnancy_add"))?;
    from_row(&row)
}

pub async fn get(pool: &SqlitePool, id: i64, tenant_id: &str) -> AppResult<Option<Pregnancy>> {
    let sql = format!("SELECT {COLUMNS} FROM pregnancies WHERE id = ? AND tenant_id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "pregnancy_get"))?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list(pool: &SqlitePool, tenant_id: &str) -> AppResult<Vec<Pregnancy>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM pregnancies WHERE tenant_id = ? ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "pregnancy_list"))?;
    rows.iter().map(from_row).collect()
}

pub async fn list_for_horse(pool: &SqlitePool, horse_id: i64) -> AppResult<Vec<Pregnancy>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM pregnancies WHERE horse_id = ? ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query(&sql)
        .bind(horse_id)
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "pregnancy_list_for_horse"))?;
    rows.iter().map(from_row).collect()
}

pub async fn delete(pool: &SqlitePool, id: i64, tenant_id: &str) -> AppResult<Option<Pregnancy>> {
    let sql =
        format!("DELETE FROM pregnancies WHERE id = ? AND tenant_id = ? RETURNING {COLUMNS}");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "pregnancy_delete"))?;
    row.as_ref().map(from_row).transpose()
}

pub async fn count(pool: &SqlitePool, tenant_id: &str) -> AppResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM pregnancies WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "pregnancy_count"))
}
