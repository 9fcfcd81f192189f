use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;

use crate::models::schema::{Mode, StoredWorkflow};

pub struct StateDb(pub SqlitePool);

const LAST_MODE_KEY: &str = "last-mode";

/// Open (creating if missing) the state database under `dir`. Holds one
/// workflow snapshot per editing mode plus the last-active mode.
pub async fn init_state_db(dir: &Path) -> Result<StateDb, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create data dir {}: {}", dir.display(), e))?;

    let db_path = dir.join("patchbay.db");
    let connect_options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            format!(
                "Failed to connect to state database at {}: {}",
                db_path.display(),
                e
            )
        })?;

    create_tables(&pool).await?;
    Ok(StateDb(pool))
}

/// In-memory variant for tests and dry runs. Single connection: every
/// pooled connection to `:memory:` would otherwise see its own database.
pub async fn init_in_memory() -> Result<StateDb, String> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| format!("Failed to open in-memory state database: {}", e))?;
    create_tables(&pool).await?;
    Ok(StateDb(pool))
}

async fn create_tables(pool: &SqlitePool) -> Result<(), String> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS workflow_snapshots (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to create workflow_snapshots table: {}", e))?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to create app_state table: {}", e))?;

    Ok(())
}

/// Persist a workflow snapshot under its mode's key.
pub async fn save_snapshot(pool: &SqlitePool, workflow: &StoredWorkflow) -> Result<(), String> {
    let value = serde_json::to_string(workflow)
        .map_err(|e| format!("Failed to encode workflow snapshot: {}", e))?;

    sqlx::query(
        "INSERT INTO workflow_snapshots (key, value, updated_at) VALUES (?, ?, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
    )
    .bind(workflow.mode.storage_key())
    .bind(&value)
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to save workflow snapshot: {}", e))?;

    Ok(())
}

pub async fn load_snapshot(
    pool: &SqlitePool,
    mode: Mode,
) -> Result<Option<StoredWorkflow>, String> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT value FROM workflow_snapshots WHERE key = ?")
            .bind(mode.storage_key())
            .fetch_optional(pool)
            .await
            .map_err(|e| format!("Failed to load workflow snapshot: {}", e))?;

    match row {
        Some((value,)) => serde_json::from_str(&value)
            .map(Some)
            .map_err(|e| format!("Failed to decode stored workflow: {}", e)),
        None => Ok(None),
    }
}

pub async fn save_last_mode(pool: &SqlitePool, mode: Mode) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO app_state (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(LAST_MODE_KEY)
    .bind(mode.storage_key())
    .execute(pool)
    .await
    .map_err(|e| format!("Failed to save last mode: {}", e))?;
    Ok(())
}

pub async fn load_last_mode(pool: &SqlitePool) -> Result<Mode, String> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM app_state WHERE key = ?")
        .bind(LAST_MODE_KEY)
        .fetch_optional(pool)
        .await
        .map_err(|e| format!("Failed to load last mode: {}", e))?;

    Ok(match row.as_ref().map(|(v,)| v.as_str()) {
        Some("tool") => Mode::Tool,
        _ => Mode::Workflow,
    })
}
