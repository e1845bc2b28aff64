use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::db::DbPool;
use crate::error::Result;
use crate::types::config::DashboardConfig;

pub const API_URL_ENV: &str = "RCAVIEW_API_URL";

/// Stored config JSON as written, `{}` when nothing is stored yet.
pub fn config_raw_db(pool: &DbPool) -> Result<Value> {
    let conn = pool.get()?;
    let result: Option<String> = match conn.query_row(
        "SELECT value FROM config WHERE key = 'main'",
        [],
        |row| row.get(0),
    ) {
        Ok(json) => Some(json),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };
    match result {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Value::Object(Default::default())),
    }
}

pub fn config_get_db(pool: &DbPool) -> Result<DashboardConfig> {
    Ok(parse_config(config_raw_db(pool)?))
}

pub fn config_set_db(pool: &DbPool, config: &DashboardConfig) -> Result<()> {
    let json = serde_json::to_string(config)?;
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO config (key, value) VALUES ('main', ?1)
         ON CONFLICT(key) DO UPDATE SET value = ?1, updated_at = datetime('now')",
        [json],
    )?;
    Ok(())
}

/// Deep-merge `patch` into the stored config and persist the typed result.
pub fn config_update_db(pool: &DbPool, patch: &Value) -> Result<DashboardConfig> {
    let mut current = config_raw_db(pool)?;
    merge_json(&mut current, patch);
    let config = parse_config(current);
    config_set_db(pool, &config)?;
    Ok(config)
}

/// Import `~/.rcaview/dashboard.json` as a patch over the stored config.
pub fn config_import_file(pool: &DbPool, path: &Path) -> Result<DashboardConfig> {
    let text = std::fs::read_to_string(path)?;
    let patch: Value = serde_json::from_str(&text)?;
    let config = config_update_db(pool, &patch)?;
    info!(path = %path.display(), "imported dashboard config file");
    Ok(config)
}

/// Typed view of stored JSON. An invalid time range table is dropped in
/// favour of the default table; anything else unreadable yields defaults.
pub fn parse_config(mut value: Value) -> DashboardConfig {
    match serde_json::from_value::<DashboardConfig>(value.clone()) {
        Ok(config) => config,
        Err(e) => {
            let had_table = value
                .as_object_mut()
                .and_then(|map| map.remove("timeRanges"))
                .is_some();
            if had_table {
                if let Ok(config) = serde_json::from_value::<DashboardConfig>(value) {
                    warn!(error = %e, "invalid time range table in config, using default");
                    return config;
                }
            }
            warn!(error = %e, "unreadable dashboard config, using defaults");
            DashboardConfig::default()
        }
    }
}

/// `RCAVIEW_API_URL` overrides the stored backend URL.
pub fn apply_env_overrides(config: DashboardConfig) -> DashboardConfig {
    with_api_url(config, std::env::var(API_URL_ENV).ok())
}

fn with_api_url(mut config: DashboardConfig, url: Option<String>) -> DashboardConfig {
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
        config.api_base_url = url.trim().to_string();
    }
    config
}

fn merge_json(base: &mut Value, patch: &Value) {
    if let (Value::Object(base_map), Value::Object(patch_map)) = (base, patch) {
        for (key, value) in patch_map {
            match base_map.get_mut(key) {
                Some(existing) if existing.is_object() && value.is_object() => {
                    merge_json(existing, value);
                }
                _ => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub fn config_get(pool: tauri::State<'_, DbPool>) -> std::result::Result<DashboardConfig, String> {
    config_get_db(&pool).map(apply_env_overrides).map_err(|e| e.to_string())
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub fn config_update(
    pool: tauri::State<'_, DbPool>,
    state: tauri::State<'_, crate::state::AppState>,
    patch: Value,
) -> std::result::Result<DashboardConfig, String> {
    let config = config_update_db(&pool, &patch).map_err(|e| e.to_string())?;
    let config = apply_env_overrides(config);
    state.reconfigure(&config).map_err(|e| e.to_string())?;
    Ok(config)
}
