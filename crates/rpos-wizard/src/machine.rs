//! The wizard's stage machine.
//!
//! The flow is linear with no cycles except the waiting-page poll:
//!
//! `DeviceIdentify -> UserConfig -> ShopDetails -> Waiting -> Home`
//!
//! Entry to each stage is gated on a session key written by an earlier
//! stage. A visit whose gate fails redirects to the earliest unmet stage;
//! that is navigation, not an error.

use crate::session::RegistrationSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DeviceIdentify,
    UserConfig,
    ShopDetails,
    Waiting,
    Home,
}

/// Stages shown in the wizard's progress rail, in order.
pub const WIZARD_STAGES: [Stage; 4] = [
    Stage::DeviceIdentify,
    Stage::UserConfig,
    Stage::ShopDetails,
    Stage::Waiting,
];

impl Stage {
    pub fn path(self) -> &'static str {
        match self {
            Stage::DeviceIdentify => "/",
            Stage::UserConfig => "/stage-2",
            Stage::ShopDetails => "/stage-3",
            Stage::Waiting => "/waiting-for-approval",
            Stage::Home => "/home",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::DeviceIdentify => "Device Identify",
            Stage::UserConfig => "User Config",
            Stage::ShopDetails => "Shop Details",
            Stage::Waiting => "Waiting",
            Stage::Home => "Home",
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Stage::DeviceIdentify => 1,
            Stage::UserConfig => 2,
            Stage::ShopDetails => 3,
            Stage::Waiting => 4,
            Stage::Home => 0,
        }
    }

    /// Whether this stage's entry gate is satisfied by the session.
    pub fn gate_met(self, session: &RegistrationSession) -> bool {
        match self {
            Stage::DeviceIdentify => true,
            Stage::UserConfig => session.stage1.is_some(),
            Stage::ShopDetails => session.stage2.is_some(),
            Stage::Waiting => session.credentials.is_some(),
            // Home renders whatever the session holds; approval gating is the
            // waiting page's concern.
            Stage::Home => true,
        }
    }
}

/// The first stage whose work is still missing from the session.
///
/// `credentials` counts as part of stage 2's work: a failed credential check
/// leaves both `stage2` and `credentials` unwritten.
pub fn earliest_unmet(session: &RegistrationSession) -> Stage {
    if session.stage1.is_none() {
        Stage::DeviceIdentify
    } else if session.stage2.is_none() || session.credentials.is_none() {
        Stage::UserConfig
    } else if session.stage3.is_none() {
        Stage::ShopDetails
    } else {
        Stage::Waiting
    }
}

/// Where to send a request for `target`, or `None` when it may proceed.
pub fn entry_redirect(target: Stage, session: &RegistrationSession) -> Option<Stage> {
    if target.gate_met(session) {
        None
    } else {
        Some(earliest_unmet(session))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
