use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use super::{
    blank_to_none, db_error, get_label, non_empty, pregnancies, vaccines, visits, Scope,
};
use crate::{
    model::{DeletedHorse, Horse, HorseInput},
    time::now_ms,
    AppError, AppResult,
};

const COLUMNS: &str = "id, tenant_id, remote_id, name, age, breed, gender, image, \
                       father_name, mother_name, cert_image, created_at";

fn validate(input: &HorseInput) -> AppResult<()> {
    non_empty(&input.name, "name")?;
    non_empty(&input.breed, "breed")?;
    if input.age < 0 {
        return Err(AppError::invalid_field("age", "Age cannot be negative")
            .with_context("age", input.age.to_string()));
    }
    Ok(())
}

pub(crate) fn from_row(row: &SqliteRow) -> AppResult<Horse> {
    let get = |err: sqlx::Error| db_error(err, "horse_decode");
    Ok(Horse {
        id: row.try_get("id").map_err(get)?,
        tenant_id: row.try_get("tenant_id").map_err(get)?,
        remote_id: row.try_get("remote_id").map_err(get)?,
        name: row.try_get("name").map_err(get)?,
        age: row.try_get("age").map_err(get)?,
        breed: row.try_get("breed").map_err(get)?,
        gender: get_label(row, "gender")?,
        image: row.try_get("image").map_err(get)?,
        father_name: row.try_get("father_name").map_err(get)?,
        mother_name: row.try_get("mother_name").map_err(get)?,
        cert_image: row.try_get("cert_image").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

pub async fn add(
    pool: &SqlitePool,
    tenant_id: &str,
    input: &HorseInput,
    remote_id: Option<&str>,
) -> AppResult<Horse> {
    validate(input)?;
    let sql = format!(
        "INSERT INTO horses (tenant_id, remote_id, name, age, breed, gender, image, \
         father_name, mother_name, cert_image, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(tenant_id)
        .bind(remote_id)
        .bind(input.name.trim())
        .bind(input.age)
        .bind(input.breed.trim())
        .bind(input.gender.as_str())
        .bind(blank_to_none(&input.image))
        .bind(blank_to_none(&input.father_name))
        .bind(blank_to_none(&input.mother_name))
        .bind(blank_to_none(&input.cert_image))
        .bind(now_ms())
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "horse_add"))?;
    from_row(&row)
}

pub async fn get(pool: &SqlitePool, id: i64, tenant_id: &str) -> AppResult<Option<Horse>> {
    let sql = format!("SELECT {COLUMNS} FROM horses WHERE id = ? AND tenant_id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "horse_get"))?;
    row.as_ref().map(from_row).transpose()
}

/// Look a horse up regardless of its tenant.
pub async fn get_any(pool: &SqlitePool, id: i64) -> AppResult<Option<Horse>> {
    let sql = format!("SELECT {COLUMNS} FROM horses WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "horse_get_any"))?;
    row.as_ref().map(from_row).transpose()
}

pub async fn get_scoped(pool: &SqlitePool, id: i64, scope: Scope<'_>) -> AppResult<Option<Horse>> {
    match scope {
        Scope::Tenant(tenant) => get(pool, id, tenant).await,
        Scope::Admin => get_any(pool, id).await,
    }
}

pub async fn list(pool: &SqlitePool, tenant_id: &str) -> AppResult<Vec<Horse>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM horses WHERE tenant_id = ? ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query(&sql)
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "horse_list"))?;
    rows.iter().map(from_row).collect()
}

pub async fn list_all(pool: &SqlitePool) -> AppResult<Vec<Horse>> {
    let sql = format!("SELECT {COLUMNS} FROM horses ORDER BY created_at DESC, id DESC");
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .map_err(|err| db_error(err, "horse_list_all"))?;
    rows.iter().map(from_row).collect()
}

pub async fn list_scoped(pool: &SqlitePool, scope: Scope<'_>) -> AppResult<Vec<Horse>> {
    match scope {
        Scope::Tenant(tenant) => list(pool, tenant).await,
        Scope::Admin => list_all(pool).await,
    }
}

pub async fn update_scoped(
    pool: &SqlitePool,
    id: i64,
    scope: Scope<'_>,
    input: &HorseInput,
) -> AppResult<Option<Horse>> {
    validate(input)?;
    let filter = match scope {
        Scope::Tenant(_) => "id = ? AND tenant_id = ?",
        Scope::Admin => "id = ?",
    };
    let sql = format!(
        "UPDATE horses SET name = ?, age = ?, breed = ?, gender = ?, image = ?, \
         father_name = ?, mother_name = ?, cert_image = ? WHERE {filter} RETURNING {COLUMNS}"
    );
    let mut query = sqlx::query(&sql)
        .bind(input.name.trim())
        .bind(input.age)
        .bind(input.breed.trim())
        .bind(input.gender.as_str())
        .bind(blank_to_none(&input.image))
        .bind(blank_to_none(&input.father_name))
        .bind(blank_to_none(&input.mother_name))
        .bind(blank_to_none(&input.cert_image))
        .bind(id);
    if let Scope::Tenant(tenant) = scope {
        query = query.bind(tenant);
    }
    let row = query
        .fetch_optional(pool)
        .await
        .map_err(|err| db_error(err, "horse_update"))?;
    row.as_ref().map(from_row).transpose()
}

/// Delete a tenant's horse and everything recorded against it.
pub async fn delete(pool: &SqlitePool, id: i64, tenant_id: &str) -> AppResult<Option<DeletedHorse>> {
    delete_cascade(pool, id, Scope::Tenant(tenant_id)).await
}

/// Delete any tenant's horse and everything recorded against it.
pub async fn delete_any(pool: &SqlitePool, id: i64) -> AppResult<Option<DeletedHorse>> {
    delete_cascade(pool, id, Scope::Admin).await
}

pub async fn delete_scoped(
    pool: &SqlitePool,
    id: i64,
    scope: Scope<'_>,
) -> AppResult<Option<DeletedHorse>> {
    match scope {
        Scope::Tenant(tenant) => delete(pool, id, tenant).await,
        Scope::Admin => delete_any(pool, id).await,
    }
}

async fn delete_cascade(
    pool: &SqlitePool,
    id: i64,
    scope: Scope<'_>,
) -> AppResult<Option<DeletedHorse>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| db_error(err, "horse_delete_begin"))?;

    let sql = match scope {
        Scope::Tenant(_) => format!("SELECT {COLUMNS} FROM horses WHERE id = ? AND tenant_id = ?"),
        Scope::Admin => format!("SELECT {COLUMNS} FROM horses WHERE id = ?"),
    };
    let mut query = sqlx::query(&sql).bind(id);
    if let Scope::Tenant(tenant) = scope {
        query = query.bind(tenant);
    }
    let Some(row) = query
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| db_error(err, "horse_delete_lookup"))?
    else {
        return Ok(None);
    };
    let horse = from_row(&row)?;

    let visit_rows = sqlx::query(&format!(
        "SELECT {} FROM visits WHERE horse_id = ? ORDER BY id",
        visits::COLUMNS
    ))
    .bind(id)
    .fetch_all(&mut *tx)
    .await
    .map_err(|err| db_error(err, "horse_delete_visits"))?;
    let vaccine_rows = sqlx::query(&format!(
        "SELECT {} FROM vaccines WHERE horse_id = ? ORDER BY id",
        vaccines::COLUMNS
    ))
    .bind(id)
    .fetch_all(&mut *tx)
    .await
    .map_err(|err| db_error(err, "horse_delete_vaccines"))?;
    let pregnancy_rows = sqlx::query(&format!(
        "SELECT {} FROM pregnancies WHERE horse_id = ? ORDER BY id",
        pregnancies::COLUMNS
    ))
    .bind(id)
    .fetch_all(&mut *tx)
    .await
    .map_err(|err| db_error(err, "horse_delete_pregnancies"))?;

    let deleted = DeletedHorse {
        horse,
        visits: visit_rows
            .iter()
            .map(visits::from_row)
            .collect::<AppResult<_>>()?,
        vaccines: vaccine_rows
            .iter()
            .map(vaccines::from_row)
            .collect::<AppResult<_>>()?,
        pregnancies: pregnancy_rows
            .iter()
            .map(pregnancies::from_row)
            .collect::<AppResult<_>>()?,
    };

    for table in ["visits", "vaccines", "pregnancies"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE horse_id = ?"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|err| db_error(err, "horse_delete_dependents").with_context("table", table))?;
    }
    sqlx::query("DELETE FROM horses WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|err| db_error(err, "horse_delete"))?;

    tx.commit()
        .await
        .map_err(|err| db_error(err, "horse_delete_commit"))?;

    info!(
        target: "stablebook",
        event = "horse_deleted",
        horse_id = id,
        visits = deleted.visits.len(),
        vaccines = deleted.vaccines.len(),
        pregnancies = deleted.pregnancies.len()
    );
    Ok(Some(deleted))
}

pub async fn count(pool: &SqlitePool, tenant_id: &str) -> AppResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM horses WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "horse_count"))
}

pub async fn count_all(pool: &SqlitePool) -> AppResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM horses")
        .fetch_one(pool)
        .await
        .map_err(|err| db_error(err, "horse_count_all"))
}
