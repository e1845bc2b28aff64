pub mod api;
pub mod charts;
pub mod commands;
pub mod db;
pub mod error;
pub mod events;
pub mod export;
pub mod filters;
pub mod history;
pub mod keychain;
pub mod migrations;
pub mod options;
pub mod rca;
pub mod refresh;
pub mod requests;
pub mod session;
pub mod state;
pub mod timerange;
pub mod types;
pub mod watcher;
pub mod zoom;

use tracing_subscriber::EnvFilter;

/// Initialize structured logging with tracing.
/// Respects RUST_LOG env var; defaults to `info` level for the rcaview crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rcaview=info,rcaview_lib=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load `.env` from the project root (parent of src-tauri/).
pub fn load_dotenv() {
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let project_root = manifest_dir.parent().unwrap_or(manifest_dir);
    dotenvy::from_path(project_root.join(".env")).ok();
}

/// Open the database under `data_dir` and bring the schema up to date.
pub fn open_store(data_dir: &std::path::Path) -> error::Result<db::DbPool> {
    let db_path = data_dir.join("state").join("rcaview.sqlite");
    let pool = db::create_pool(&db_path)?;
    db::init_db(&pool)?;
    migrations::run_pending(&pool)?;
    Ok(pool)
}

/// Forward watcher events: config file edits are imported and announced,
/// new exports are announced.
#[cfg(feature = "desktop")]
fn spawn_file_watch(app: tauri::AppHandle, pool: db::DbPool, data_dir: std::path::PathBuf) {
    use notify::{RecursiveMode, Watcher};
    use tauri::Manager;

    let config_path = watcher::config_file_path(&data_dir);
    let exports = export::export_dir(&data_dir);
    if let Err(e) = std::fs::create_dir_all(&exports) {
        tracing::warn!(error = %e, "cannot create export dir, file watch disabled");
        return;
    }
    let (tx, rx) = std::sync::mpsc::channel();
    let mut fs_watcher = match watcher::create_watcher(tx, config_path.clone(), exports.clone()) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "file watcher unavailable");
            return;
        }
    };
    for dir in [&data_dir, &exports] {
        if let Err(e) = fs_watcher.watch(dir, RecursiveMode::NonRecursive) {
            tracing::warn!(error = %e, dir = %dir.display(), "cannot watch directory");
        }
    }

    std::thread::spawn(move || {
        let _keep_alive = fs_watcher;
        for event in rx {
            match event {
                watcher::WatchEvent::ConfigChanged => {
                    match commands::config::config_import_file(&pool, &config_path) {
                        Ok(config) => {
                            let config = commands::config::apply_env_overrides(config);
                            let app_state = app.state::<state::AppState>();
                            if let Err(e) = app_state.reconfigure(&config) {
                                tracing::warn!(error = %e, "config file rejected");
                                continue;
                            }
                            events::emit_event(&app, events::event_names::CONFIG_CHANGED, config).ok();
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to import config file"),
                    }
                }
                watcher::WatchEvent::ExportChanged { path } => {
                    tracing::debug!(path = %path.display(), "export file changed");
                }
            }
        }
    });
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_tracing();
    load_dotenv();

    let data_dir = db::rcaview_data_dir().expect("Failed to resolve data directory");
    let pool = open_store(&data_dir).expect("Failed to initialize database");

    let config_path = watcher::config_file_path(&data_dir);
    if config_path.exists() {
        if let Err(e) = commands::config::config_import_file(&pool, &config_path) {
            tracing::warn!(error = %e, "ignoring dashboard.json");
        }
    }
    let config = commands::config::config_get_db(&pool)
        .map(commands::config::apply_env_overrides)
        .expect("Failed to load dashboard config");
    let app_state = state::AppState::new(
        &config,
        keychain::resolve_token(),
        data_dir.clone(),
        timerange::local_now(),
    )
    .expect("Failed to build dashboard state");

    let watch_pool = pool.clone();
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(pool)
        .manage(app_state)
        .setup(move |app| {
            spawn_file_watch(app.handle().clone(), watch_pool, data_dir);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::config::config_get,
            commands::config::config_update,
            commands::credentials::credentials_set,
            commands::credentials::credentials_exists,
            commands::credentials::credentials_delete,
            commands::dashboard::session_view,
            commands::dashboard::session_to_url,
            commands::dashboard::session_from_url,
            commands::dashboard::time_range_select,
            commands::dashboard::zoom_in,
            commands::dashboard::zoom_out,
            commands::dashboard::chart_zoom,
            commands::dashboard::chart_reset_zoom,
            commands::dashboard::data_source_switch,
            commands::dashboard::series_scales_set,
            commands::dashboard::filters_apply,
            commands::dashboard::filters_reset,
            commands::dashboard::table_sort,
            commands::dashboard::table_page,
            commands::dashboard::rca_scroll,
            commands::dashboard::refresh_toggle,
            commands::fetch::history_fetch,
            commands::fetch::series_fetch,
            commands::fetch::options_load,
            commands::fetch::rca_tree_fetch,
            commands::fetch::rca_select,
            commands::fetch::export_csv,
            commands::fetch::exports_recent,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_store_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_store(dir.path()).unwrap();
        assert!(dir.path().join("state").join("rcaview.sqlite").exists());
        assert_eq!(
            migrations::applied(&pool).unwrap().len(),
            migrations::all_migrations().len()
        );
        // Opening again is a no-op.
        open_store(dir.path()).unwrap();
    }
}
