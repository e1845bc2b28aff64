use tauri::State;

use crate::keychain;
use crate::state::AppState;

#[tauri::command]
pub fn credentials_set(state: State<'_, AppState>, token: String) -> Result<(), String> {
    keychain::token_set(&token).map_err(|e| e.to_string())?;
    state
        .set_token(Some(token.trim().to_string()))
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn credentials_exists() -> Result<bool, String> {
    keychain::token_exists().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn credentials_delete(state: State<'_, AppState>) -> Result<(), String> {
    keychain::token_delete().map_err(|e| e.to_string())?;
    state
        .set_token(keychain::resolve_token())
        .map_err(|e| e.to_string())
}
