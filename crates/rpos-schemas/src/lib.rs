//! Shared record types for the device-registration wizard.
//!
//! Everything here crosses a boundary: either the upstream API (employee,
//! location, registration records) or the wizard's own JSON responses.
//! No business logic beyond approval-flag normalization lives in this crate.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ApprovalFlag
// ---------------------------------------------------------------------------

/// Single-character administrator sign-off status on a registration record.
///
/// The upstream stores `'Y'` / `'N'`; anything that is not an exact
/// (case-insensitive, trimmed) `Y` normalizes to [`ApprovalFlag::Pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalFlag {
    #[serde(rename = "Y")]
    Approved,
    #[serde(rename = "N")]
    Pending,
}

impl ApprovalFlag {
    /// Normalize a loose upstream flag string.
    pub fn from_flag_str(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("Y") {
            ApprovalFlag::Approved
        } else {
            ApprovalFlag::Pending
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalFlag::Approved => "Y",
            ApprovalFlag::Pending => "N",
        }
    }

    pub fn is_approved(self) -> bool {
        matches!(self, ApprovalFlag::Approved)
    }
}

// ---------------------------------------------------------------------------
// EmployeeRecord
// ---------------------------------------------------------------------------

/// Employee row as resolved from the upstream user lookup.
///
/// `password` is the stored credential the wizard compares case-sensitively
/// against user input; it never leaves the server process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub name: String,
    pub username: String,
    pub password: String,
    pub location_code: Option<i64>,
}

// ---------------------------------------------------------------------------
// LocationRecord
// ---------------------------------------------------------------------------

/// Shop/location master row keyed by `location_code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    pub location_code: Option<i64>,
    pub location_name: String,
    pub manager: String,
    pub address: String,
    pub email: String,
    pub fax: String,
    pub telephone: String,
}

// ---------------------------------------------------------------------------
// RegistrationRecord
// ---------------------------------------------------------------------------

/// Pending device registration as written to the upstream at the end of
/// stage 3 and polled by the waiting page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub device_id: String,
    pub employee_id: String,
    pub admin_employee_id: String,
    pub lan_ip: String,
    pub approval_flag: ApprovalFlag,
}

// ---------------------------------------------------------------------------
// ApprovalStatus
// ---------------------------------------------------------------------------

/// Result of an approval-status lookup, already normalized.
///
/// A failed lookup is representable: `approved = false`, flag `Pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub approved: bool,
    pub approval_flag: ApprovalFlag,
    pub device_id: String,
    pub employee_id: String,
}

impl ApprovalStatus {
    /// The fail-closed default used when every status endpoint fails.
    pub fn pending(device_id: &str, employee_id: &str) -> Self {
        Self {
            approved: false,
            approval_flag: ApprovalFlag::Pending,
            device_id: device_id.to_string(),
            employee_id: employee_id.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_normalizes_only_exact_y() {
        assert_eq!(ApprovalFlag::from_flag_str("Y"), ApprovalFlag::Approved);
        assert_eq!(ApprovalFlag::from_flag_str("y"), ApprovalFlag::Approved);
        assert_eq!(ApprovalFlag::from_flag_str(" Y "), ApprovalFlag::Approved);
        assert_eq!(ApprovalFlag::from_flag_str("N"), ApprovalFlag::Pending);
        assert_eq!(ApprovalFlag::from_flag_str("yes"), ApprovalFlag::Pending);
        assert_eq!(ApprovalFlag::from_flag_str(""), ApprovalFlag::Pending);
    }

    #[test]
    fn flag_serializes_as_single_char() {
        assert_eq!(
            serde_json::to_string(&ApprovalFlag::Approved).unwrap(),
            "\"Y\""
        );
        assert_eq!(
            serde_json::to_string(&ApprovalFlag::Pending).unwrap(),
            "\"N\""
        );
    }

    #[test]
    fn registration_record_wire_shape() {
        let rec = RegistrationRecord {
            device_id: "PC-1".to_string(),
            employee_id: "E1".to_string(),
            admin_employee_id: "E1".to_string(),
            lan_ip: "192.168.1.10".to_string(),
            approval_flag: ApprovalFlag::Pending,
        };
        let v: serde_json::Value = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["device_id"], "PC-1");
        assert_eq!(v["approval_flag"], "N");
    }

    #[test]
    fn pending_status_is_fail_closed() {
        let st = ApprovalStatus::pending("PC-1", "E1");
        assert!(!st.approved);
        assert_eq!(st.approval_flag, ApprovalFlag::Pending);
    }
}
