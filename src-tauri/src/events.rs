use serde::{Deserialize, Serialize};

use crate::timerange::ResolvedRange;
use crate::zoom::ZoomControls;

/// Event names as constants; the front-end listens on the same strings.
pub mod event_names {
    pub const REFRESH_TICK: &str = "dashboard:refresh";
    pub const WINDOW_CHANGED: &str = "dashboard:window-changed";
    pub const OPTIONS_LOADED: &str = "options:loaded";
    pub const CONFIG_CHANGED: &str = "config:changed";
    pub const EXPORT_WRITTEN: &str = "export:written";
}

/// Payload of [`event_names::WINDOW_CHANGED`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowChanged {
    pub range: ResolvedRange,
    pub controls: ZoomControls,
}

#[cfg(feature = "desktop")]
pub fn emit_event<R: tauri::Runtime, T: Serialize + Clone>(
    app: &tauri::AppHandle<R>,
    event: &str,
    payload: T,
) -> Result<(), String> {
    use tauri::Emitter;
    app.emit(event, payload).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::event_names::*;
    use super::*;

    #[test]
    fn event_names_match_ipc_contract() {
        assert_eq!(REFRESH_TICK, "dashboard:refresh");
        assert_eq!(WINDOW_CHANGED, "dashboard:window-changed");
        assert_eq!(OPTIONS_LOADED, "options:loaded");
        assert_eq!(CONFIG_CHANGED, "config:changed");
        assert_eq!(EXPORT_WRITTEN, "export:written");
    }

    #[test]
    fn window_changed_payload_shape() {
        let payload = WindowChanged {
            range: ResolvedRange {
                start_time: "2024-01-01 11:45:00".to_string(),
                end_time: "2024-01-01 12:00:00".to_string(),
            },
            controls: ZoomControls {
                current_label: "Last 15 minutes".to_string(),
                custom: false,
                zoom_in_enabled: true,
                zoom_out_enabled: true,
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["range"]["start_time"], "2024-01-01 11:45:00");
        assert_eq!(json["controls"]["currentLabel"], "Last 15 minutes");
    }
}
