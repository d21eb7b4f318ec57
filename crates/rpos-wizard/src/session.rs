//! Per-browser session state for the registration flow.
//!
//! Sessions are keyed by an opaque uuid carried in an HttpOnly cookie and
//! held in an in-process map. Every field a stage writes is a typed
//! `Option`, so prerequisite checks are plain `is_some()` calls rather than
//! string-key probing.

use std::collections::{BTreeMap, HashMap};

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "rpos_session";

// ---------------------------------------------------------------------------
// Stage data
// ---------------------------------------------------------------------------

/// Stage 1: device identity. `confirmed` distinguishes auto-detected values
/// (written on first render) from values the user submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage1Data {
    pub device_ip: String,
    pub device_name: String,
    pub confirmed: bool,
}

/// Stage 2: employee identity, password already stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage2Data {
    pub employee_id: String,
    pub username: String,
}

/// Validated credentials, written only after a successful upstream check.
/// Gate key for the waiting page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Stage 3: shop details as submitted (or pre-filled and accepted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage3Data {
    pub outlet_name: String,
    pub manager_name: Option<String>,
    pub address: String,
}

/// One-shot redirect-back payload: field errors plus the input to restore.
/// Consumed by the next GET of the stage it was flashed for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flash {
    pub errors: BTreeMap<String, String>,
    pub old: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// RegistrationSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationSession {
    pub stage1: Option<Stage1Data>,
    pub stage2: Option<Stage2Data>,
    pub credentials: Option<Credentials>,
    pub location_code: Option<i64>,
    pub stage3: Option<Stage3Data>,
    pub flash: Option<Flash>,
    pub created_at: DateTime<Utc>,
}

impl RegistrationSession {
    fn new() -> Self {
        Self {
            stage1: None,
            stage2: None,
            credentials: None,
            location_code: None,
            stage3: None,
            flash: None,
            created_at: Utc::now(),
        }
    }
}

impl Default for RegistrationSession {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// In-process session map. The enclosing deployment keys everything by the
/// cookie; concurrent sessions from different browsers never touch the same
/// entry.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<Uuid, RegistrationSession>>,
}

/// Outcome of matching the request cookie against the store. `created` is
/// true when a fresh session (and cookie) was issued.
pub struct ResolvedSession {
    pub id: Uuid,
    pub created: bool,
}

impl ResolvedSession {
    /// Append the `Set-Cookie` header when this request created the session.
    pub fn attach(&self, mut resp: Response) -> Response {
        if self.created {
            let value = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            if let Ok(hv) = HeaderValue::from_str(&value) {
                resp.headers_mut().append(header::SET_COOKIE, hv);
            }
        }
        resp
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the caller's session, or create one. A cookie whose id is not in
    /// the map (expired store, restart) gets a fresh id, never a revived one.
    pub async fn resolve(&self, headers: &HeaderMap) -> ResolvedSession {
        if let Some(id) = session_id_from_headers(headers) {
            if self.inner.read().await.contains_key(&id) {
                return ResolvedSession { id, created: false };
            }
        }
        let id = Uuid::new_v4();
        self.inner
            .write()
            .await
            .insert(id, RegistrationSession::new());
        ResolvedSession { id, created: true }
    }

    /// Clone of the current session state (empty session if unknown).
    pub async fn snapshot(&self, id: Uuid) -> RegistrationSession {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutate the session in place under the write lock.
    pub async fn update<F>(&self, id: Uuid, f: F)
    where
        F: FnOnce(&mut RegistrationSession),
    {
        let mut map = self.inner.write().await;
        f(map.entry(id).or_default());
    }

    /// Remove and return the pending flash, if any.
    pub async fn take_flash(&self, id: Uuid) -> Option<Flash> {
        let mut map = self.inner.write().await;
        map.get_mut(&id).and_then(|s| s.flash.take())
    }
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
