use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Proof that a fetch was issued; compared against the latest token for its
/// key when the response arrives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestToken {
    pub key: String,
    pub seq: u64,
}

/// Shared by every guard in the process, so a session rebuilt from a URL
/// never reissues a sequence number an older session handed out.
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Tracks the latest issued token per state key so late responses from
/// superseded requests can be dropped.
pub struct RequestGuard {
    latest: Mutex<HashMap<String, u64>>,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a token for `key`, superseding every earlier one for that key.
    pub fn issue(&self, key: &str) -> RequestToken {
        // Sequence is drawn under the lock so the map never moves backwards.
        let mut map = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let seq = NEXT_SEQ.fetch_add(1, Ordering::SeqCst);
        map.insert(key.to_string(), seq);
        debug!(key, seq, "issued request token");
        RequestToken {
            key: key.to_string(),
            seq,
        }
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        let map = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&token.key) == Some(&token.seq)
    }

    /// Hand back `response` only if `token` is still the latest for its key.
    pub fn accept<T>(&self, token: &RequestToken, response: T) -> Option<T> {
        if self.is_current(token) {
            Some(response)
        } else {
            debug!(key = %token.key, seq = token.seq, "discarding stale response");
            None
        }
    }

    /// Invalidate every outstanding token, e.g. when the session resets.
    pub fn invalidate_all(&self) {
        let mut map = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        map.clear();
    }

    pub fn len(&self) -> usize {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RequestGuard {
    fn default() -> Self {
        Self::new()
    }
}
