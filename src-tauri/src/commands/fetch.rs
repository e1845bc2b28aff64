//! Backend fetches. Each command takes a request token while holding the
//! session lock, releases the lock for the HTTP call, then hands the
//! response back to the session, which drops it if a newer request for the
//! same key was issued in the meantime.

use tauri::{AppHandle, State};
use tracing::debug;

use crate::db::DbPool;
use crate::events::{emit_event, event_names};
use crate::export::{export_dir, export_list, save_export, ExportRecord};
use crate::options::{load_options, OptionSet};
use crate::rca::Transition;
use crate::session::SessionView;
use crate::state::AppState;
use crate::timerange::local_now;
use crate::types::anomaly::HistoricalPage;
use crate::types::series::AnomalySeries;
use crate::types::tree::TreeNode;

#[tauri::command]
pub async fn history_fetch(state: State<'_, AppState>) -> Result<Option<HistoricalPage>, String> {
    let (token, req) = state
        .session()
        .begin_history(local_now())
        .map_err(|e| e.to_string())?;
    let page = state
        .client()
        .fetch_history(&req)
        .await
        .map_err(|e| e.to_string())?;
    let mut session = state.session();
    Ok(session
        .accept_history(&token, page)
        .then(|| session.history().cloned())
        .flatten())
}

#[tauri::command]
pub async fn series_fetch(state: State<'_, AppState>) -> Result<Option<Vec<AnomalySeries>>, String> {
    let (token, req) = state
        .session()
        .begin_series(local_now())
        .map_err(|e| e.to_string())?;
    let series = state
        .client()
        .fetch_series(&req)
        .await
        .map_err(|e| e.to_string())?;
    let mut session = state.session();
    Ok(session
        .accept_series(&token, series)
        .then(|| session.charts().panels().to_vec()))
}

#[tauri::command]
pub async fn options_load(
    app: AppHandle,
    pool: State<'_, DbPool>,
    state: State<'_, AppState>,
) -> Result<Option<OptionSet>, String> {
    let (token, source) = {
        let session = state.session();
        (session.begin_options(), session.data_source())
    };
    let client = state.client();
    let options = load_options(&pool, &client, source, state.options_ttl_secs())
        .await
        .map_err(|e| e.to_string())?;
    let accepted = state.session().accept_options(&token, options.clone());
    if !accepted {
        return Ok(None);
    }
    if let Err(e) = emit_event(&app, event_names::OPTIONS_LOADED, options.clone()) {
        tracing::warn!(error = %e, "failed to emit options event");
    }
    Ok(Some(options))
}

#[tauri::command]
pub async fn rca_tree_fetch(state: State<'_, AppState>) -> Result<Option<Vec<TreeNode>>, String> {
    let (token, req) = state
        .session()
        .begin_rca_tree(local_now())
        .map_err(|e| e.to_string())?;
    let roots = state
        .client()
        .fetch_rca_tree(&req)
        .await
        .map_err(|e| e.to_string())?;
    let mut session = state.session();
    Ok(session
        .accept_rca_tree(&token, roots)
        .then(|| session.rca().level(0).to_vec()))
}

/// Click on a tree node; fetches the next level when the node does not
/// carry its children.
#[tauri::command]
pub async fn rca_select(
    state: State<'_, AppState>,
    depth: usize,
    index: usize,
) -> Result<SessionView, String> {
    let (transition, token) = {
        let mut session = state.session();
        let transition = session.rca_select(depth, index).map_err(|e| e.to_string())?;
        (transition, session.begin_rca_children())
    };
    if let Transition::LoadChildren {
        depth,
        detail_params,
    } = transition
    {
        let children = state
            .client()
            .fetch_rca_children(&detail_params)
            .await
            .map_err(|e| e.to_string())?;
        let accepted = state
            .session()
            .accept_rca_children(&token, depth, children)
            .map_err(|e| e.to_string())?;
        if !accepted {
            debug!(depth, "rca children superseded");
        }
    }
    Ok(state.session().view())
}

#[tauri::command]
pub async fn export_csv(
    app: AppHandle,
    pool: State<'_, DbPool>,
    state: State<'_, AppState>,
) -> Result<ExportRecord, String> {
    let req = state
        .session()
        .export_request(local_now())
        .map_err(|e| e.to_string())?;
    let csv = state
        .client()
        .export_csv(&req)
        .await
        .map_err(|e| e.to_string())?;
    let record = save_export(&pool, &export_dir(state.data_dir()), &req, &csv)
        .map_err(|e| e.to_string())?;
    if let Err(e) = emit_event(&app, event_names::EXPORT_WRITTEN, record.clone()) {
        tracing::warn!(error = %e, "failed to emit export event");
    }
    Ok(record)
}

#[tauri::command]
pub fn exports_recent(pool: State<'_, DbPool>, limit: Option<u32>) -> Result<Vec<ExportRecord>, String> {
    export_list(&pool, limit.unwrap_or(20)).map_err(|e| e.to_string())
}
