//! Request and response types for all rpos-wizard HTTP endpoints.
//!
//! Stage GET endpoints return JSON view models a front-end renders; HTML
//! templating is out of scope by contract. No business logic lives here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::machine::WIZARD_STAGES;

// ---------------------------------------------------------------------------
// Progress rail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StageMeta {
    pub number: u8,
    pub title: &'static str,
    pub path: &'static str,
}

pub fn stage_list() -> Vec<StageMeta> {
    WIZARD_STAGES
        .iter()
        .map(|s| StageMeta {
            number: s.number(),
            title: s.title(),
            path: s.path(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Form payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StageOneForm {
    #[serde(default)]
    pub device_ip: String,
    #[serde(default)]
    pub device_name: String,
}

#[derive(Debug, Deserialize)]
pub struct StageTwoForm {
    #[serde(default)]
    pub employee_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize)]
pub struct StageThreeForm {
    #[serde(default)]
    pub outlet_name: String,
    #[serde(default)]
    pub manager_name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct WaitingQuery {
    pub check_status: Option<String>,
    pub device_id: Option<String>,
    pub employee_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Stage views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StageOneView {
    pub device_ip: String,
    pub device_name: String,
    pub confirmed: bool,
    pub stages: Vec<StageMeta>,
    pub current_stage: u8,
    pub errors: BTreeMap<String, String>,
    pub old: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTwoView {
    pub employee_id: String,
    pub username: String,
    pub stages: Vec<StageMeta>,
    pub current_stage: u8,
    pub errors: BTreeMap<String, String>,
    pub old: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageThreeView {
    pub outlet_name: String,
    pub manager_name: String,
    pub address: String,
    /// True when the upstream location lookup succeeded; the pre-filled
    /// fields render read-only in that case.
    pub location_found: bool,
    pub read_only: bool,
    pub stages: Vec<StageMeta>,
    pub current_stage: u8,
    pub errors: BTreeMap<String, String>,
    pub old: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitingView {
    pub approved: bool,
    pub device_id: String,
    pub employee_id: String,
    /// Client poll cadence: one status check per interval, up to the cap.
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub home_path: &'static str,
    pub stages: Vec<StageMeta>,
    pub current_stage: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeView {
    pub device_name: String,
    pub device_ip: String,
    pub employee_id: String,
    pub outlet_name: String,
}

// ---------------------------------------------------------------------------
// JSON API endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeSummary {
    pub id: String,
    pub name: String,
}

/// Normalized employee payload for client-side auto-fill.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeAutofillResponse {
    pub success: bool,
    pub employee: EmployeeSummary,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceUnavailableResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectIpResponse {
    pub success: bool,
    pub ip: String,
    pub is_private: bool,
    pub note: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}
