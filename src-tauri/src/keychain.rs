use tracing::debug;

use crate::error::{DashboardError, Result};

const SERVICE: &str = "dev.rcaview";
const TOKEN_KEY: &str = "api_token";
pub const TOKEN_ENV: &str = "RCAVIEW_API_TOKEN";

fn entry() -> Result<keyring::Entry> {
    Ok(keyring::Entry::new(SERVICE, TOKEN_KEY)?)
}

/// Store the backend API token in the OS keychain.
pub fn token_set(token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(DashboardError::Keychain("API token must not be empty".to_string()));
    }
    entry()?.set_password(token)?;
    debug!("API token stored in keychain");
    Ok(())
}

/// Retrieve the API token from the OS keychain. Returns None if not set.
pub fn token_get() -> Result<Option<String>> {
    match entry()?.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn token_delete() -> Result<()> {
    match entry()?.delete_credential() {
        Ok(()) => {
            debug!("API token deleted from keychain");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => Ok(()), // Already gone
        Err(e) => Err(e.into()),
    }
}

pub fn token_exists() -> Result<bool> {
    Ok(token_get()?.is_some())
}

/// Keychain token first, then `RCAVIEW_API_TOKEN`. A keychain that cannot be
/// read counts as empty.
pub fn resolve_token() -> Option<String> {
    let stored = token_get().unwrap_or_else(|e| {
        debug!(error = %e, "keychain unavailable");
        None
    });
    pick_token(stored, std::env::var(TOKEN_ENV).ok())
}

fn pick_token(stored: Option<String>, env: Option<String>) -> Option<String> {
    stored
        .into_iter()
        .chain(env)
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}
