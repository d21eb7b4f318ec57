//! Axum router and all HTTP handlers for rpos-wizard.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.  All handlers are `pub(crate)` so the scenario tests
//! in `tests/` can compose the router directly.
//!
//! Failure policy, uniform across handlers: user-input problems flash field
//! errors and redirect back; upstream failures degrade to the stage's
//! documented fallback; a missing session prerequisite redirects to the
//! earliest unmet stage. Nothing here returns a 5xx of its own.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use rpos_schemas::{ApprovalFlag, RegistrationRecord};
use tracing::{error, info, warn};

use crate::{
    api_types::{
        stage_list, DetectIpResponse, EmployeeAutofillResponse, EmployeeSummary, HealthResponse,
        HomeView, ServiceUnavailableResponse, StageOneForm, StageOneView, StageThreeForm,
        StageThreeView, StageTwoForm, StageTwoView, WaitingQuery, WaitingView,
    },
    detect,
    machine::{entry_redirect, Stage},
    session::{Credentials, Flash, Stage1Data, Stage2Data, Stage3Data},
    state::AppState,
};

/// Client poll cadence advertised by the waiting view.
const POLL_INTERVAL_MS: u64 = 5_000;
const MAX_POLL_ATTEMPTS: u32 = 120;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(stage_one))
        .route("/stage-1", post(store_stage_one))
        .route("/stage-2", get(stage_two).post(store_stage_two))
        .route("/stage-3", get(stage_three).post(store_stage_three))
        .route("/waiting-for-approval", get(waiting))
        .route("/home", get(home))
        .route("/api/employee/:employee_id", get(employee_by_id))
        .route("/api/detect-ip", get(detect_ip))
        .route("/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /  (stage 1: device identify)
// ---------------------------------------------------------------------------

pub(crate) async fn stage_one(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let sess = st.sessions.resolve(&headers).await;
    let snap = st.sessions.snapshot(sess.id).await;
    let flash = st.sessions.take_flash(sess.id).await.unwrap_or_default();

    // Once the user has confirmed, revisits show the stored values; before
    // that, every render re-detects.
    let (device_ip, device_name, confirmed) = match snap.stage1 {
        Some(s1) if s1.confirmed => (s1.device_ip, s1.device_name, true),
        _ => {
            let ip = detect::detect_lan_ip(&headers, &st.client).await;
            let name = detect::detect_device_name(&st.client).await;
            st.sessions
                .update(sess.id, |s| {
                    s.stage1 = Some(Stage1Data {
                        device_ip: ip.clone(),
                        device_name: name.clone(),
                        confirmed: false,
                    })
                })
                .await;
            (ip, name, false)
        }
    };

    let view = StageOneView {
        device_ip,
        device_name,
        confirmed,
        stages: stage_list(),
        current_stage: Stage::DeviceIdentify.number(),
        errors: flash.errors,
        old: flash.old,
    };
    sess.attach(Json(view).into_response())
}

// ---------------------------------------------------------------------------
// POST /stage-1
// ---------------------------------------------------------------------------

pub(crate) async fn store_stage_one(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<StageOneForm>,
) -> Response {
    let sess = st.sessions.resolve(&headers).await;

    let mut errors = BTreeMap::new();
    if form.device_ip.trim().is_empty() {
        errors.insert(
            "device_ip".to_string(),
            "The device ip field is required.".to_string(),
        );
    } else if form.device_ip.trim().parse::<Ipv4Addr>().is_err() {
        errors.insert(
            "device_ip".to_string(),
            "The device ip must be a valid IPv4 address.".to_string(),
        );
    }
    require_text(&mut errors, "device_name", &form.device_name, 255);

    if !errors.is_empty() {
        let old = BTreeMap::from([
            ("device_ip".to_string(), form.device_ip),
            ("device_name".to_string(), form.device_name),
        ]);
        st.sessions
            .update(sess.id, |s| s.flash = Some(Flash { errors, old }))
            .await;
        return sess.attach(Redirect::to(Stage::DeviceIdentify.path()).into_response());
    }

    st.sessions
        .update(sess.id, |s| {
            s.stage1 = Some(Stage1Data {
                device_ip: form.device_ip.trim().to_string(),
                device_name: form.device_name.trim().to_string(),
                confirmed: true,
            })
        })
        .await;

    sess.attach(Redirect::to(Stage::UserConfig.path()).into_response())
}

// ---------------------------------------------------------------------------
// GET /stage-2  (user config)
// ---------------------------------------------------------------------------

pub(crate) async fn stage_two(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let sess = st.sessions.resolve(&headers).await;
    let snap = st.sessions.snapshot(sess.id).await;

    if let Some(back) = entry_redirect(Stage::UserConfig, &snap) {
        return sess.attach(Redirect::to(back.path()).into_response());
    }

    let flash = st.sessions.take_flash(sess.id).await.unwrap_or_default();
    let defaults = snap.stage2.unwrap_or(Stage2Data {
        employee_id: String::new(),
        username: String::new(),
    });

    let view = StageTwoView {
        employee_id: defaults.employee_id,
        username: defaults.username,
        stages: stage_list(),
        current_stage: Stage::UserConfig.number(),
        errors: flash.errors,
        old: flash.old,
    };
    sess.attach(Json(view).into_response())
}

// ---------------------------------------------------------------------------
// POST /stage-2
// ---------------------------------------------------------------------------

pub(crate) async fn store_stage_two(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<StageTwoForm>,
) -> Response {
    let sess = st.sessions.resolve(&headers).await;
    let snap = st.sessions.snapshot(sess.id).await;

    if let Some(back) = entry_redirect(Stage::UserConfig, &snap) {
        return sess.attach(Redirect::to(back.path()).into_response());
    }

    let mut errors = BTreeMap::new();
    require_text(&mut errors, "employee_id", &form.employee_id, 50);
    require_text(&mut errors, "username", &form.username, 50);
    if form.password.is_empty() {
        errors.insert(
            "password".to_string(),
            "The password field is required.".to_string(),
        );
    } else if form.password != form.password_confirmation {
        errors.insert(
            "password".to_string(),
            "The password confirmation does not match.".to_string(),
        );
    }

    if errors.is_empty() {
        // Credential check against the upstream record. Transport errors,
        // non-2xx, unsuccessful envelopes, and plain mismatches all land in
        // the same branch: fail closed, generic message.
        let employee_id = form.employee_id.trim();
        let valid = match st.client.fetch_employee(employee_id).await {
            Ok(rec) => {
                let ok = !rec.password.is_empty() && rec.password == form.password;
                if ok {
                    match rec.location_code {
                        Some(code) => {
                            info!(employee_id, location_code = code, "location code stored in session");
                            st.sessions
                                .update(sess.id, |s| s.location_code = Some(code))
                                .await;
                        }
                        None => {
                            warn!(employee_id, "location code not found in employee record");
                        }
                    }
                }
                ok
            }
            Err(err) => {
                warn!(employee_id, %err, "employee lookup failed; treating as invalid");
                false
            }
        };

        if valid {
            st.sessions
                .update(sess.id, |s| {
                    s.stage2 = Some(Stage2Data {
                        employee_id: form.employee_id.trim().to_string(),
                        username: form.username.trim().to_string(),
                    });
                    s.credentials = Some(Credentials {
                        username: form.username.trim().to_string(),
                        password: form.password.clone(),
                    });
                })
                .await;
            return sess.attach(Redirect::to(Stage::ShopDetails.path()).into_response());
        }

        errors.insert(
            "password".to_string(),
            "The password does not match the database password.".to_string(),
        );
    }

    // Preserve everything except the password.
    let old = BTreeMap::from([
        ("employee_id".to_string(), form.employee_id),
        ("username".to_string(), form.username),
    ]);
    st.sessions
        .update(sess.id, |s| s.flash = Some(Flash { errors, old }))
        .await;
    sess.attach(Redirect::to(Stage::UserConfig.path()).into_response())
}

// ---------------------------------------------------------------------------
// GET /stage-3  (shop details)
// ---------------------------------------------------------------------------

pub(crate) async fn stage_three(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let sess = st.sessions.resolve(&headers).await;
    let snap = st.sessions.snapshot(sess.id).await;

    if let Some(back) = entry_redirect(Stage::ShopDetails, &snap) {
        return sess.attach(Redirect::to(back.path()).into_response());
    }

    let flash = st.sessions.take_flash(sess.id).await.unwrap_or_default();

    let location = match snap.location_code {
        Some(code) => {
            let found = st.client.fetch_location(code).await;
            if found.is_none() {
                warn!(location_code = code, "location data not found; falling back to session values");
            }
            found
        }
        None => {
            warn!("location code not found in session");
            None
        }
    };

    let stored = snap.stage3.unwrap_or(Stage3Data {
        outlet_name: String::new(),
        manager_name: None,
        address: String::new(),
    });

    let (outlet_name, manager_name, address, location_found) = match &location {
        Some(loc) => (
            loc.location_name.clone(),
            loc.manager.clone(),
            loc.address.clone(),
            true,
        ),
        None => (
            stored.outlet_name,
            stored.manager_name.unwrap_or_default(),
            stored.address,
            false,
        ),
    };

    let view = StageThreeView {
        outlet_name,
        manager_name,
        address,
        location_found,
        read_only: location_found,
        stages: stage_list(),
        current_stage: Stage::ShopDetails.number(),
        errors: flash.errors,
        old: flash.old,
    };
    sess.attach(Json(view).into_response())
}

// ---------------------------------------------------------------------------
// POST /stage-3
// ---------------------------------------------------------------------------

pub(crate) async fn store_stage_three(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<StageThreeForm>,
) -> Response {
    let sess = st.sessions.resolve(&headers).await;
    let snap = st.sessions.snapshot(sess.id).await;

    if let Some(back) = entry_redirect(Stage::ShopDetails, &snap) {
        return sess.attach(Redirect::to(back.path()).into_response());
    }

    let mut errors = BTreeMap::new();
    require_text(&mut errors, "outlet_name", &form.outlet_name, 255);
    if !form.manager_name.trim().is_empty() && form.manager_name.chars().count() > 255 {
        errors.insert(
            "manager_name".to_string(),
            "The manager name may not be greater than 255 characters.".to_string(),
        );
    }
    require_text(&mut errors, "address", &form.address, 500);

    if !errors.is_empty() {
        let old = BTreeMap::from([
            ("outlet_name".to_string(), form.outlet_name),
            ("manager_name".to_string(), form.manager_name),
            ("address".to_string(), form.address),
        ]);
        st.sessions
            .update(sess.id, |s| s.flash = Some(Flash { errors, old }))
            .await;
        return sess.attach(Redirect::to(Stage::ShopDetails.path()).into_response());
    }

    let manager_name = {
        let trimmed = form.manager_name.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };
    st.sessions
        .update(sess.id, |s| {
            s.stage3 = Some(Stage3Data {
                outlet_name: form.outlet_name.trim().to_string(),
                manager_name,
                address: form.address.trim().to_string(),
            })
        })
        .await;

    // Best-effort registration insert. The wizard holds no separate admin
    // identity, so admin_employee_id mirrors employee_id (the upstream
    // defaults a blank the same way). Failure never blocks navigation: the
    // waiting page is still useful for manual admin intervention.
    let device_id = snap
        .stage1
        .as_ref()
        .map(|s1| s1.device_name.clone())
        .unwrap_or_default();
    let lan_ip = snap
        .stage1
        .as_ref()
        .map(|s1| s1.device_ip.clone())
        .unwrap_or_default();
    let employee_id = snap
        .stage2
        .as_ref()
        .map(|s2| s2.employee_id.clone())
        .unwrap_or_default();

    if device_id.is_empty() || employee_id.is_empty() || lan_ip.is_empty() {
        error!(
            %device_id,
            %employee_id,
            %lan_ip,
            "registration insert skipped; required fields missing"
        );
    } else {
        let record = RegistrationRecord {
            device_id,
            employee_id: employee_id.clone(),
            admin_employee_id: employee_id,
            lan_ip,
            approval_flag: ApprovalFlag::Pending,
        };
        match st.client.create_registration(&record).await {
            Ok(()) => info!(device_id = %record.device_id, "registration record created"),
            Err(err) => {
                error!(device_id = %record.device_id, %err, "registration insert failed")
            }
        }
    }

    sess.attach(Redirect::to(Stage::Waiting.path()).into_response())
}

// ---------------------------------------------------------------------------
// GET /waiting-for-approval
// ---------------------------------------------------------------------------

pub(crate) async fn waiting(
    State(st): State<Arc<AppState>>,
    Query(query): Query<WaitingQuery>,
    headers: HeaderMap,
) -> Response {
    let sess = st.sessions.resolve(&headers).await;
    let snap = st.sessions.snapshot(sess.id).await;

    if let Some(back) = entry_redirect(Stage::Waiting, &snap) {
        return sess.attach(Redirect::to(back.path()).into_response());
    }

    // Query params let the AJAX poll carry its own identity; the session is
    // the source of truth otherwise.
    let device_id = query
        .device_id
        .or_else(|| snap.stage1.as_ref().map(|s1| s1.device_name.clone()))
        .unwrap_or_default();
    let employee_id = query
        .employee_id
        .or_else(|| snap.stage2.as_ref().map(|s2| s2.employee_id.clone()))
        .unwrap_or_default();

    let status = st.client.fetch_approval_status(&device_id, &employee_id).await;

    if query.check_status.as_deref() == Some("1") || accepts_json(&headers) {
        return sess.attach(Json(status).into_response());
    }

    let view = WaitingView {
        approved: status.approved,
        device_id,
        employee_id,
        poll_interval_ms: POLL_INTERVAL_MS,
        max_poll_attempts: MAX_POLL_ATTEMPTS,
        home_path: Stage::Home.path(),
        stages: stage_list(),
        current_stage: Stage::Waiting.number(),
    };
    sess.attach(Json(view).into_response())
}

// ---------------------------------------------------------------------------
// GET /home
// ---------------------------------------------------------------------------

pub(crate) async fn home(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let sess = st.sessions.resolve(&headers).await;
    let snap = st.sessions.snapshot(sess.id).await;

    let view = HomeView {
        device_name: snap
            .stage1
            .as_ref()
            .map(|s1| s1.device_name.clone())
            .unwrap_or_default(),
        device_ip: snap
            .stage1
            .as_ref()
            .map(|s1| s1.device_ip.clone())
            .unwrap_or_default(),
        employee_id: snap
            .stage2
            .as_ref()
            .map(|s2| s2.employee_id.clone())
            .unwrap_or_default(),
        outlet_name: snap
            .stage3
            .as_ref()
            .map(|s3| s3.outlet_name.clone())
            .unwrap_or_default(),
    };
    sess.attach(Json(view).into_response())
}

// ---------------------------------------------------------------------------
// GET /api/employee/:employee_id
// ---------------------------------------------------------------------------

pub(crate) async fn employee_by_id(
    State(st): State<Arc<AppState>>,
    Path(employee_id): Path<String>,
) -> Response {
    match st.client.fetch_employee(&employee_id).await {
        Ok(rec) => Json(EmployeeAutofillResponse {
            success: true,
            employee: EmployeeSummary {
                id: rec.employee_id,
                name: rec.name,
            },
            username: rec.username,
            location_code: rec.location_code,
        })
        .into_response(),
        Err(err) => {
            warn!(%employee_id, %err, "employee service unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ServiceUnavailableResponse {
                    success: false,
                    message: "Employee service unavailable. Please try again later.",
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/detect-ip
// ---------------------------------------------------------------------------

pub(crate) async fn detect_ip(headers: HeaderMap) -> Response {
    let ip = detect::client_ip_from_headers(&headers);
    Json(DetectIpResponse {
        success: true,
        ip: ip.map(|i| i.to_string()).unwrap_or_default(),
        is_private: ip.map(detect::is_private_ipv4).unwrap_or(false),
        note: "For the LAN address, use a client-side probe; this is the IP as seen by the server.",
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_text(errors: &mut BTreeMap<String, String>, field: &str, value: &str, max: usize) {
    let label = field.replace('_', " ");
    if value.trim().is_empty() {
        errors.insert(field.to_string(), format!("The {label} field is required."));
    } else if value.chars().count() > max {
        errors.insert(
            field.to_string(),
            format!("The {label} may not be greater than {max} characters."),
        );
    }
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_flags_empty_and_overlong() {
        let mut errors = BTreeMap::new();
        require_text(&mut errors, "outlet_name", "  ", 255);
        assert_eq!(
            errors.get("outlet_name").unwrap(),
            "The outlet name field is required."
        );

        let mut errors = BTreeMap::new();
        require_text(&mut errors, "employee_id", &"x".repeat(51), 50);
        assert!(errors
            .get("employee_id")
            .unwrap()
            .contains("greater than 50"));

        let mut errors = BTreeMap::new();
        require_text(&mut errors, "username", "e1", 50);
        assert!(errors.is_empty());
    }

    #[test]
    fn accepts_json_checks_accept_header() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_json(&headers));
        headers.insert(header::ACCEPT, "text/html".parse().unwrap());
        assert!(!accepts_json(&headers));
        headers.insert(
            header::ACCEPT,
            "application/json, text/plain".parse().unwrap(),
        );
        assert!(accepts_json(&headers));
    }
}
