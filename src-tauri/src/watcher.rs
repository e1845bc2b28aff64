use notify::{Event, EventKind, RecommendedWatcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

pub const CONFIG_FILE_NAME: &str = "dashboard.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// `dashboard.json` was written; re-import it.
    ConfigChanged,
    /// A CSV appeared or changed in the export directory.
    ExportChanged { path: PathBuf },
}

pub fn config_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

pub fn classify_event(event: &Event, config_path: &Path, export_dir: &Path) -> Option<WatchEvent> {
    match event.kind {
        EventKind::Modify(_) | EventKind::Create(_) => {
            for path in &event.paths {
                if path == config_path {
                    return Some(WatchEvent::ConfigChanged);
                }
                let is_csv = path.extension().is_some_and(|ext| ext == "csv");
                if is_csv && path.parent() == Some(export_dir) {
                    return Some(WatchEvent::ExportChanged { path: path.clone() });
                }
            }
            None
        }
        _ => None,
    }
}

pub fn create_watcher(
    tx: mpsc::Sender<WatchEvent>,
    config_path: PathBuf,
    export_dir: PathBuf,
) -> Result<RecommendedWatcher, notify::Error> {
    let watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            if let Some(watch_event) = classify_event(&event, &config_path, &export_dir) {
                let _ = tx.send(watch_event);
            }
        }
    })?;
    Ok(watcher)
}
