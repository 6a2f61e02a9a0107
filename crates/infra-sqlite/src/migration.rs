// Schema migrations

use crate::error::map_sqlx_error;
use mailqueue_core::error::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

/// (version, name, sql) in apply order
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "initial schema",
        include_str!("../migrations/001_initial_schema.sql"),
    ),
    (
        2,
        "cancel requested flag",
        include_str!("../migrations/002_cancel_requested.sql"),
    ),
];

/// Bring the schema up to the latest version. Each pending migration runs in
/// its own transaction together with its `schema_version` row.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(map_sqlx_error)?;

    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;

    let pending: Vec<_> = MIGRATIONS.iter().filter(|(v, _, _)| *v > current).collect();
    if pending.is_empty() {
        info!(schema_version = current, "Schema up to date");
        return Ok(());
    }

    for (version, name, sql) in pending {
        info!(version, name, "Applying migration");
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
        execute_script(&mut tx, sql).await?;
        sqlx::query(
            "INSERT INTO schema_version (version, applied_at)
             VALUES (?, CAST(strftime('%s', 'now') AS INTEGER) * 1000)",
        )
        .bind(*version)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
    }

    info!(from = current, "Migrations applied");
    Ok(())
}

/// Statements are `;`-separated; `--` comment lines are dropped
async fn execute_script(tx: &mut Transaction<'_, Sqlite>, sql: &str) -> Result<()> {
    for chunk in sql.split(';') {
        let statement = chunk
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
    }
    Ok(())
}
