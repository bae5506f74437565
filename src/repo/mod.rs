//! Local store adapter: one module per record table, all scoped by tenant.

use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::{
    error::RECORD_DECODE,
    model::EntityKind,
    time::parse_day,
    AppError, AppResult,
};

pub mod horses;
pub mod pregnancies;
pub mod vaccines;
pub mod visits;

/// Whose rows an operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Tenant(&'a str),
    /// Every tenant's rows. Only granted to callers on the admin allow-list.
    Admin,
}

impl<'a> Scope<'a> {
    pub fn tenant(self) -> Option<&'a str> {
        match self {
            Scope::Tenant(t) => Some(t),
            Scope::Admin => None,
        }
    }
}

/// Attach the remote document id to a local row.
pub async fn set_remote_id(
    pool: &SqlitePool,
    kind: EntityKind,
    id: i64,
    scope: Scope<'_>,
    remote_id: &str,
) -> AppResult<()> {
    let table = kind.table();
    let res = match scope {
        Scope::Tenant(tenant) => {
            let sql = format!("UPDATE {table} SET remote_id = ? WHERE id = ? AND tenant_id = ?");
            sqlx::query(&sql)
                .bind(remote_id)
                .bind(id)
                .bind(tenant)
                .execute(pool)
                .await
        }
        Scope::Admin => {
            let sql = format!("UPDATE {table} SET remote_id = ? WHERE id = ?");
            sqlx::query(&sql)
                .bind(remote_id)
                .bind(id)
                .execute(pool)
                .await
        }
    }
    .map_err(|err| db_error(err, "set_remote_id").with_context("table", table))?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found(kind.label(), id));
    }
    Ok(())
}

pub(crate) fn db_error(err: sqlx::Error, operation: &'static str) -> AppError {
    AppError::from(err).with_context("operation", operation)
}

pub(crate) fn get_day(row: &SqliteRow, column: &str) -> AppResult<NaiveDate> {
    let raw: String = row
        .try_get(column)
        .map_err(|err| db_error(err, "decode_row"))?;
    parse_day(&raw).ok_or_else(|| {
        AppError::new(RECORD_DECODE, format!("Invalid date stored in {column}"))
            .with_context("value", raw)
    })
}

pub(crate) fn get_opt_day(row: &SqliteRow, column: &str) -> AppResult<Option<NaiveDate>> {
    let raw: Option<String> = row
        .try_get(column)
        .map_err(|err| db_error(err, "decode_row"))?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_day(value).map(Some).ok_or_else(|| {
            AppError::new(RECORD_DECODE, format!("Invalid date stored in {column}"))
                .with_context("value", value.to_string())
        }),
    }
}

pub(crate) fn get_label<T>(row: &SqliteRow, column: &str) -> AppResult<T>
where
    T: std::str::FromStr<Err = crate::model::UnknownLabel>,
{
    let raw: String = row
        .try_get(column)
        .map_err(|err| db_error(err, "decode_row"))?;
    raw.parse().map_err(|err: crate::model::UnknownLabel| {
        AppError::new(RECORD_DECODE, err.to_string()).with_context("column", column.to_string())
    })
}

pub(crate) fn non_empty(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(AppError::missing_field(field))
    } else {
        Ok(())
    }
}

/// Blank optional text is stored as NULL.
pub(crate) fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
