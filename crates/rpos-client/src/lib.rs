//! HTTP client for the upstream registration API and the optional local
//! companion agent.
//!
//! Every method is a single synchronous round trip with the configured
//! timeout and no retry. "Best-effort" methods (`fetch_location`,
//! `fetch_approval_status`, agent probes) never return an error; they log
//! and degrade to the caller's documented fallback instead.

use std::time::Duration;

use rpos_config::WizardConfig;
use rpos_schemas::{
    ApprovalFlag, ApprovalStatus, EmployeeRecord, LocationRecord, RegistrationRecord,
};
use serde_json::Value;
use tracing::{debug, warn};

pub mod error;
pub mod extract;

pub use error::ClientError;

use extract::{first_str, lookup_i64, lookup_str, success_flag};

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Shared upstream client. Cheap to clone; both inner `reqwest::Client`s are
/// reference-counted.
#[derive(Clone)]
pub struct ApiClient {
    api: reqwest::Client,
    agent: reqwest::Client,
    base: String,
    agent_base: String,
}

impl ApiClient {
    pub fn new(cfg: &WizardConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.production.timeout_secs));
        if !cfg.production.verify_ssl {
            // Tunnel-style upstream URLs ship self-signed certs.
            builder = builder.danger_accept_invalid_certs(true);
        }
        let api = builder
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let agent = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.local_agent.timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            api,
            agent,
            base: cfg.production.url.trim_end_matches('/').to_string(),
            agent_base: cfg.local_agent.url.trim_end_matches('/').to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Employee lookup
    // -----------------------------------------------------------------------

    /// `GET {base}/api/user/{employee_id}`.
    ///
    /// Errors on transport failure, non-2xx, or an unsuccessful envelope;
    /// the credential-check stage treats all of those as an invalid password.
    pub async fn fetch_employee(&self, employee_id: &str) -> Result<EmployeeRecord, ClientError> {
        let url = format!("{}/api/user/{}", self.base, employee_id);
        let body = self.get_json(&self.api, &url).await?;

        if !success_flag(&body) {
            return Err(ClientError::Api {
                status: None,
                message: format!("employee lookup unsuccessful for {employee_id}"),
            });
        }

        Ok(EmployeeRecord {
            employee_id: lookup_str(&body, "employee_id")
                .unwrap_or_else(|| employee_id.to_string()),
            name: lookup_str(&body, "name").unwrap_or_default(),
            username: lookup_str(&body, "username").unwrap_or_default(),
            password: lookup_str(&body, "password").unwrap_or_default(),
            location_code: lookup_i64(&body, "location_code"),
        })
    }

    // -----------------------------------------------------------------------
    // Location lookup
    // -----------------------------------------------------------------------

    /// `GET {base}/api/location/{code}`, falling back to the plural
    /// `/api/locations/{code}` variant. Best-effort: `None` on any failure.
    pub async fn fetch_location(&self, code: i64) -> Option<LocationRecord> {
        for (i, prefix) in ["/api/location/", "/api/locations/"].iter().enumerate() {
            let url = format!("{}{}{}", self.base, prefix, code);
            match self.get_json(&self.api, &url).await {
                Ok(body) if success_flag(&body) => {
                    if i > 0 {
                        debug!(location_code = code, "location resolved via fallback endpoint");
                    }
                    return Some(location_from_body(&body, code));
                }
                Ok(_) => {
                    warn!(location_code = code, %url, "location lookup unsuccessful");
                }
                Err(err) => {
                    warn!(location_code = code, %url, %err, "location lookup failed");
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Registration create
    // -----------------------------------------------------------------------

    /// `POST {base}/api/rpos-login`. Any 2xx, or a body declaring
    /// `success|found: true`, counts as success.
    pub async fn create_registration(&self, rec: &RegistrationRecord) -> Result<(), ClientError> {
        let url = format!("{}/api/rpos-login", self.base);
        let resp = self
            .api
            .post(&url)
            .json(rec)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        // A non-2xx that still carries a success envelope counts.
        if let Ok(body) = resp.json::<Value>().await {
            if success_flag(&body) {
                return Ok(());
            }
        }

        Err(ClientError::Api {
            status: Some(status.as_u16()),
            message: format!("registration create rejected for device {}", rec.device_id),
        })
    }

    // -----------------------------------------------------------------------
    // Approval status
    // -----------------------------------------------------------------------

    /// `GET {base}/api/rpos-login/status?device_id=&employee_id=`, falling
    /// back to the `/api/rpos-login-status` variant. Best-effort: any
    /// failure yields the pending (not approved) status.
    pub async fn fetch_approval_status(
        &self,
        device_id: &str,
        employee_id: &str,
    ) -> ApprovalStatus {
        for path in ["/api/rpos-login/status", "/api/rpos-login-status"] {
            let url = format!("{}{}", self.base, path);
            let req = self
                .api
                .get(&url)
                .query(&[("device_id", device_id), ("employee_id", employee_id)]);

            let body = match req.send().await {
                Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                    Ok(v) => v,
                    Err(err) => {
                        warn!(device_id, %url, %err, "approval status decode failed");
                        continue;
                    }
                },
                Ok(resp) => {
                    debug!(device_id, %url, status = %resp.status(), "approval status non-2xx");
                    continue;
                }
                Err(err) => {
                    warn!(device_id, %url, %err, "approval status request failed");
                    continue;
                }
            };

            let flag = normalize_approval(&body);
            return ApprovalStatus {
                approved: flag.is_approved(),
                approval_flag: flag,
                device_id: device_id.to_string(),
                employee_id: employee_id.to_string(),
            };
        }

        ApprovalStatus::pending(device_id, employee_id)
    }

    // -----------------------------------------------------------------------
    // Local companion agent
    // -----------------------------------------------------------------------

    /// `GET {local}/api/lan-ip`, opportunistic with a short timeout.
    pub async fn agent_lan_ip(&self) -> Option<String> {
        self.agent_probe("/api/lan-ip", "lan_ip").await
    }

    /// `GET {local}/api/device-name`, opportunistic with a short timeout.
    pub async fn agent_device_name(&self) -> Option<String> {
        self.agent_probe("/api/device-name", "device_name").await
    }

    async fn agent_probe(&self, path: &str, field: &str) -> Option<String> {
        let url = format!("{}{}", self.agent_base, path);
        let body = match self.get_json(&self.agent, &url).await {
            Ok(v) => v,
            Err(err) => {
                debug!(%url, %err, "local agent probe failed");
                return None;
            }
        };
        if !success_flag(&body) {
            return None;
        }
        body.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    // -----------------------------------------------------------------------
    // Shared request plumbing
    // -----------------------------------------------------------------------

    async fn get_json(&self, client: &reqwest::Client, url: &str) -> Result<Value, ClientError> {
        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: Some(status.as_u16()),
                message: format!("GET {url}"),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Payload shaping
// ---------------------------------------------------------------------------

/// The location payload lives under `location`, `data`, or at the envelope
/// root depending on the upstream revision.
fn location_from_body(body: &Value, code: i64) -> LocationRecord {
    let payload = body
        .get("location")
        .filter(|v| v.is_object())
        .or_else(|| body.get("data").filter(|v| v.is_object()))
        .unwrap_or(body);

    LocationRecord {
        location_code: lookup_i64(payload, "location_code").or(Some(code)),
        location_name: first_str(payload, &["location_name", "locationName"]).unwrap_or_default(),
        manager: first_str(payload, &["manager", "manager_name"]).unwrap_or_default(),
        address: first_str(payload, &["address"]).unwrap_or_default(),
        email: first_str(payload, &["email", "email_id", "emailId"]).unwrap_or_default(),
        fax: first_str(payload, &["fax"]).unwrap_or_default(),
        telephone: first_str(payload, &["telephone", "phone"]).unwrap_or_default(),
    }
}

/// Normalize the approval signals the upstream has used across revisions:
/// `approval_flag` / `approvalFlag` (single char), `status == "approved"`,
/// `approved == true`. Anything else is pending.
pub fn normalize_approval(body: &Value) -> ApprovalFlag {
    if let Some(flag) = lookup_str(body, "approval_flag") {
        return ApprovalFlag::from_flag_str(&flag);
    }
    if let Some(status) = body.get("status").and_then(Value::as_str) {
        if status.eq_ignore_ascii_case("approved") {
            return ApprovalFlag::Approved;
        }
    }
    if body.get("approved").and_then(Value::as_bool) == Some(true) {
        return ApprovalFlag::Approved;
    }
    ApprovalFlag::Pending
}
