//! Continuation tokens and page types for ordered list scans.
//!
//! Lists are ordered by display name, tie-broken by id. A token records
//! the last `(name, id)` pair a client has seen; the next page starts
//! strictly after it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

/// Decoded continuation cursor.
///
/// The wire form is the unpadded base64url encoding of
/// `{"lastName":…,"lastUID":…}`; field order is part of the format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueToken {
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "lastUID")]
    pub last_id: String,
}

impl ContinueToken {
    pub fn new(last_name: impl Into<String>, last_id: impl Into<String>) -> Self {
        Self {
            last_name: last_name.into(),
            last_id: last_id.into(),
        }
    }

    pub fn encode(&self) -> String {
        // Serializing two strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> HubResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|e| HubError::InvalidContinueToken(format!("not base64url: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| HubError::InvalidContinueToken(format!("bad cursor payload: {e}")))
    }
}

/// Encodes a cursor positioned after `(last_name, last_id)`.
pub fn encode(last_name: &str, last_id: &str) -> String {
    ContinueToken::new(last_name, last_id).encode()
}

/// Decodes a cursor into its `(last_name, last_id)` pair.
pub fn decode(token: &str) -> HubResult<(String, String)> {
    let token = ContinueToken::decode(token)?;
    Ok((token.last_name, token.last_id))
}

/// Parameters for one list page.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// Maximum rows fetched from the store; `None` is unlimited.
    pub limit: Option<u64>,
    /// Resume strictly after this position.
    pub after: Option<ContinueToken>,
}

impl PageRequest {
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn after(mut self, token: ContinueToken) -> Self {
        self.after = Some(token);
        self
    }
}

/// One page of a list scan.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present when the store holds rows past the end of this page.
    pub next: Option<ContinueToken>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
        }
    }
}
