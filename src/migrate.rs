use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use sqlx::{Executor, Row, SqlitePool};
use std::collections::HashMap;

use crate::time::now_ms;
use tracing::{error, info};

static ADD_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^ALTER\s+TABLE\s+(\w+)\s+ADD\s+COLUMN\s+(\w+)")
        .expect("add column pattern to compile")
});

fn preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\t'], " ");
    let trimmed = one_line.trim();
    if trimmed.len() > 160 {
        let cut = trimmed
            .char_indices()
            .map(|(idx, _)| idx)
            .take_while(|idx| *idx <= 160)
            .last()
            .unwrap_or(0);
        format!("{}…", &trimmed[..cut])
    } else {
        trimmed.to_string()
    }
}

static MIGRATIONS: &[(&str, &str)] = &[
    (
        "202601100900_initial.sql",
        include_str!("../migrations/202601100900_initial.sql"),
    ),
    (
        "202601101200_horse_lineage.sql",
        include_str!("../migrations/202601101200_horse_lineage.sql"),
    ),
    (
        "202601101300_tenant_indexes.sql",
        include_str!("../migrations/202601101300_tenant_indexes.sql"),
    ),
];

fn strip_comments(raw_sql: &str) -> String {
    raw_sql
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.is_empty() || t.starts_with("--"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn checksum(cleaned: &str) -> String {
    format!("{:x}", Sha256::digest(cleaned.as_bytes()))
}

/// Names of the embedded migration files, in application order.
pub fn migration_names() -> impl Iterator<Item = &'static str> {
    MIGRATIONS.iter().map(|(name, _)| *name)
}

pub async fn apply_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    pool.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
           version   TEXT PRIMARY KEY,\
           applied_at INTEGER NOT NULL,\
           checksum TEXT NOT NULL\
         )",
    )
    .await?;

    let rows = sqlx::query("SELECT version, checksum FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    let mut applied: HashMap<String, String> = HashMap::new();
    for r in rows {
        if let (Ok(v), Ok(c)) = (
            r.try_get::<String, _>("version"),
            r.try_get::<String, _>("checksum"),
        ) {
            applied.insert(v, c);
        }
    }

    for (filename, raw_sql) in MIGRATIONS {
        let cleaned = strip_comments(raw_sql);
        let checksum = checksum(&cleaned);

        if let Some(stored) = applied.get(*filename) {
            if stored != &checksum {
                anyhow::bail!("migration {} edited after application", filename);
            }
            info!(target: "stablebook", event = "migration_skip_file", file = %filename);
            continue;
        }

        let mut tx = pool.begin().await?;
        for stmt in cleaned.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            let upper = s.to_ascii_uppercase();
            if upper == "BEGIN" || upper == "COMMIT" {
                continue;
            }
            // Columns may already exist on databases created by the legacy
            // server, which patched the schema in place.
            if let Some(caps) = ADD_COLUMN.captures(s) {
                let table = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let col = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                let exists: Option<i64> = sqlx::query_scalar(
                    "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
                )
                .bind(table)
                .bind(col)
                .fetch_optional(&mut *tx)
                .await?;
                if exists.is_some() {
                    info!(target: "stablebook", event = "migration_stmt_skip", file = %filename, sql = %preview(s));
                    continue;
                }
            }
            info!(target: "stablebook", event = "migration_stmt", file = %filename, sql = %preview(s));
            if let Err(e) = sqlx::query(s).execute(&mut *tx).await {
                error!(target: "stablebook", event = "migration_stmt_error", file = %filename, sql = %preview(s), error = %e);
                return Err(e.into());
            }
        }

        sqlx::query(
            "INSERT INTO schema_migrations (version, applied_at, checksum) VALUES (?, ?, ?)",
        )
        .bind(*filename)
        .bind(now_ms())
        .bind(&checksum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(target: "stablebook", event = "migration_file_applied", file = %filename);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect sqlite::memory:")
    }

    #[test]
    fn strip_comments_drops_comment_and_blank_lines() {
        let cleaned = strip_comments("-- header\n\nCREATE TABLE t (id INTEGER);\n  -- tail\n");
        assert_eq!(cleaned, "CREATE TABLE t (id INTEGER);");
    }

    #[test]
    fn preview_truncates_long_statements() {
        let long = "x".repeat(400);
        let out = preview(&long);
        assert!(out.ends_with('…'));
        assert!(out.len() < 400);
    }

    #[tokio::test]
    async fn applying_twice_is_a_no_op() {
        let pool = memory_pool().await;
        apply_migrations(&pool).await.expect("first run");
        apply_migrations(&pool).await.expect("second run");

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(applied as usize, migration_names().count());
    }

    #[tokio::test]
    async fn lineage_columns_tolerate_legacy_schema() {
        let pool = memory_pool().await;
        // A legacy database that already gained father_name by hand.
        sqlx::query(
            "CREATE TABLE horses (id INTEGER PRIMARY KEY AUTOINCREMENT, tenant_id TEXT NOT NULL, \
             remote_id TEXT, name TEXT NOT NULL, age INTEGER NOT NULL, breed TEXT NOT NULL, \
             gender TEXT NOT NULL, image TEXT, created_at INTEGER NOT NULL, father_name TEXT)",
        )
        .execute(&pool)
        .await
        .expect("legacy table");

        apply_migrations(&pool).await.expect("migrations");

        let cols: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('horses')")
                .fetch_all(&pool)
                .await
                .expect("columns");
        for expected in ["father_name", "mother_name", "cert_image"] {
            assert!(cols.iter().any(|c| c == expected), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn edited_migration_is_rejected() {
        let pool = memory_pool().await;
        apply_migrations(&pool).await.expect("migrations");
        sqlx::query("UPDATE schema_migrations SET checksum = 'tampered' WHERE version = ?")
            .bind("202601100900_initial.sql")
            .execute(&pool)
            .await
            .expect("tamper");

        let err = apply_migrations(&pool).await.expect_err("tampered checksum");
        assert!(err.to_string().contains("edited after application"));
    }
}
