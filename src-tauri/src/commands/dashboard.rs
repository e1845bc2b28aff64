use reqwest::Url;
use tauri::{AppHandle, State};

use crate::charts::{ChartZoomResult, ZoomRequest};
use crate::events::{emit_event, event_names, WindowChanged};
use crate::filters::FilterSelection;
use crate::rca::Connector;
use crate::session::{DashboardSession, SessionView};
use crate::state::AppState;
use crate::timerange::{local_now, ResolvedRange};
use crate::types::source::DataSource;
use crate::zoom::{ZoomControls, ZoomOutcome};

fn window_changed(app: &AppHandle, range: ResolvedRange, session: &DashboardSession) {
    let payload = WindowChanged {
        range,
        controls: ZoomControls::from(session.cursor()),
    };
    if let Err(e) = emit_event(app, event_names::WINDOW_CHANGED, payload) {
        tracing::warn!(error = %e, "failed to emit window change");
    }
}

#[tauri::command]
pub fn session_view(state: State<'_, AppState>) -> SessionView {
    state.session().view()
}

#[tauri::command]
pub fn session_to_url(state: State<'_, AppState>, base: String) -> Result<String, String> {
    let base = Url::parse(&base).map_err(|e| e.to_string())?;
    Ok(state.session().to_url(&base).to_string())
}

/// Replace the session with one restored from `url` (page load, back/forward).
#[tauri::command]
pub fn session_from_url(
    pool: State<'_, crate::db::DbPool>,
    state: State<'_, AppState>,
    url: String,
) -> Result<SessionView, String> {
    let url = Url::parse(&url).map_err(|e| e.to_string())?;
    let config = crate::commands::config::config_get_db(&pool).map_err(|e| e.to_string())?;
    let restored = DashboardSession::from_url(&config, &url, local_now()).map_err(|e| e.to_string())?;
    let mut session = state.session();
    *session = restored;
    Ok(session.view())
}

#[tauri::command]
pub fn time_range_select(
    app: AppHandle,
    state: State<'_, AppState>,
    label: String,
) -> Result<ResolvedRange, String> {
    let mut session = state.session();
    let range = session
        .select_time_range(&label, local_now())
        .map_err(|e| e.to_string())?;
    window_changed(&app, range.clone(), &session);
    Ok(range)
}

#[tauri::command]
pub fn zoom_in(app: AppHandle, state: State<'_, AppState>) -> Result<ZoomOutcome, String> {
    let mut session = state.session();
    let now = local_now();
    let outcome = session.zoom_in(now).map_err(|e| e.to_string())?;
    if outcome.moved() {
        let range = session.cursor().resolve(now).map_err(|e| e.to_string())?;
        window_changed(&app, range, &session);
    }
    Ok(outcome)
}

#[tauri::command]
pub fn zoom_out(app: AppHandle, state: State<'_, AppState>) -> Result<ZoomOutcome, String> {
    let mut session = state.session();
    let now = local_now();
    let outcome = session.zoom_out(now).map_err(|e| e.to_string())?;
    if outcome.moved() {
        let range = session.cursor().resolve(now).map_err(|e| e.to_string())?;
        window_changed(&app, range, &session);
    }
    Ok(outcome)
}

#[tauri::command]
pub fn chart_zoom(
    app: AppHandle,
    state: State<'_, AppState>,
    request: ZoomRequest,
) -> Result<ChartZoomResult, String> {
    let mut session = state.session();
    let result = session
        .chart_zoom(request, local_now())
        .map_err(|e| e.to_string())?;
    if let ChartZoomResult::Refetch { range, .. } = &result {
        window_changed(&app, range.clone(), &session);
    }
    Ok(result)
}

#[tauri::command]
pub fn chart_reset_zoom(state: State<'_, AppState>) -> SessionView {
    let mut session = state.session();
    session.reset_chart_zoom();
    session.view()
}

#[tauri::command]
pub fn data_source_switch(state: State<'_, AppState>, source: DataSource) -> SessionView {
    let mut session = state.session();
    session.switch_data_source(source);
    session.view()
}

#[tauri::command]
pub fn series_scales_set(state: State<'_, AppState>, scales: Vec<String>) -> Vec<String> {
    let mut session = state.session();
    session.set_scales(scales);
    session.scales().iter().cloned().collect()
}

#[tauri::command]
pub fn filters_apply(state: State<'_, AppState>, selection: FilterSelection) -> FilterSelection {
    let mut session = state.session();
    session.apply_filters(selection);
    session.filters().clone()
}

#[tauri::command]
pub fn filters_reset(state: State<'_, AppState>) {
    state.session().reset_filters();
}

#[tauri::command]
pub fn table_sort(state: State<'_, AppState>, column: String) -> crate::history::TableState {
    let mut session = state.session();
    session.sort_by(&column);
    session.table().clone()
}

#[tauri::command]
pub fn table_page(state: State<'_, AppState>, page: u32) -> crate::history::TableState {
    let mut session = state.session();
    session.set_page(page);
    session.table().clone()
}

#[tauri::command]
pub fn rca_scroll(state: State<'_, AppState>, depth: usize, offset: f64) -> Vec<Connector> {
    let mut session = state.session();
    session.rca_mut().set_scroll(depth, offset);
    session.rca().connectors()
}

/// Start or stop periodic refresh. Each tick tells the front-end to re-run
/// its fetch sequence.
#[tauri::command]
pub async fn refresh_toggle(
    app: AppHandle,
    state: State<'_, AppState>,
    enabled: bool,
) -> Result<bool, String> {
    let mut refresh = state.refresh();
    if enabled {
        refresh.start(move || {
            if let Err(e) = emit_event(&app, event_names::REFRESH_TICK, ()) {
                tracing::warn!(error = %e, "failed to emit refresh tick");
            }
        });
    } else {
        refresh.stop();
    }
    Ok(refresh.is_running())
}
