//! Ordered alias-key extraction over loosely-shaped upstream JSON.
//!
//! The upstream has shipped several envelope shapes over time. Rather than
//! duck-typing at every call site, each field is resolved through one fixed
//! rule order: direct key, then nested `user.`, then nested `data.`, then
//! the camelCase variant of the key. First match wins; `null` never matches.

use serde_json::Value;

/// Resolve `field` against the documented rule order.
pub fn lookup<'a>(v: &'a Value, field: &str) -> Option<&'a Value> {
    let camel = camel_case(field);
    let candidates = [
        v.get(field),
        v.get("user").and_then(|u| u.get(field)),
        v.get("data").and_then(|d| d.get(field)),
        v.get(camel.as_str()),
    ];
    candidates.into_iter().flatten().find(|c| !c.is_null())
}

/// String form of a field, accepting bare numbers as their decimal text.
pub fn lookup_str(v: &Value, field: &str) -> Option<String> {
    match lookup(v, field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer form of a field, accepting numeric strings.
pub fn lookup_i64(v: &Value, field: &str) -> Option<i64> {
    match lookup(v, field)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First non-null string among several literal key candidates on one object.
pub fn first_str(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match v.get(*k) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Whether the envelope declares application-level success.
///
/// The upstream has used both `success: true` and `found: true`; absence of
/// either is failure.
pub fn success_flag(v: &Value) -> bool {
    ["success", "found"]
        .iter()
        .any(|k| v.get(*k).and_then(Value::as_bool).unwrap_or(false))
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for ch in field.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
