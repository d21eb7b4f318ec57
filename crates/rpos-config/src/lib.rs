//! Layered configuration for the device-registration wizard.
//!
//! Merge order: built-in defaults < optional YAML file < environment
//! variables. The effective config is serialized to canonical JSON and
//! hashed (SHA-256) so startup logs can carry a stable fingerprint.
//!
//! Environment lookups are injected as a closure so tests never mutate
//! process-global state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

/// Upstream production API endpoint (employee / location / registration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteApiConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Disable for tunnel-style upstream URLs with self-signed certs.
    pub verify_ssl: bool,
}

/// Optional companion agent on the device's local network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAgentConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, `host:port`.
    pub addr: String,
}

/// Effective wizard configuration after layering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    pub production: RemoteApiConfig,
    pub local_agent: LocalAgentConfig,
    pub server: ServerConfig,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            production: RemoteApiConfig {
                url: "http://localhost:5000".to_string(),
                timeout_secs: 10,
                verify_ssl: true,
            },
            local_agent: LocalAgentConfig {
                url: "http://localhost:5001".to_string(),
                timeout_secs: 2,
            },
            server: ServerConfig {
                addr: "127.0.0.1:8080".to_string(),
            },
        }
    }
}

/// A fully-layered config plus its canonical form and fingerprint.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: WizardConfig,
    pub config_hash: String,
    pub canonical_json: String,
}

// ---------------------------------------------------------------------------
// Environment overlay
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum EnvKind {
    Str,
    U64,
    Bool,
}

/// Env var name → JSON pointer into the merged config document.
const ENV_OVERRIDES: &[(&str, &str, EnvKind)] = &[
    ("RPOS_API_URL", "/production/url", EnvKind::Str),
    ("RPOS_API_TIMEOUT_SECS", "/production/timeout_secs", EnvKind::U64),
    ("RPOS_API_VERIFY_SSL", "/production/verify_ssl", EnvKind::Bool),
    ("RPOS_LOCAL_AGENT_URL", "/local_agent/url", EnvKind::Str),
    (
        "RPOS_LOCAL_AGENT_TIMEOUT_SECS",
        "/local_agent/timeout_secs",
        EnvKind::U64,
    ),
    ("RPOS_WIZARD_ADDR", "/server/addr", EnvKind::Str),
];

fn parse_env_value(name: &str, raw: &str, kind: EnvKind) -> Result<Value> {
    match kind {
        EnvKind::Str => Ok(Value::String(raw.to_string())),
        EnvKind::U64 => {
            let n: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} must be an integer, got {raw:?}"))?;
            Ok(Value::from(n))
        }
        EnvKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
            other => anyhow::bail!("{name} must be a boolean, got {other:?}"),
        },
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Layer defaults, then each YAML doc in order, then environment overrides.
///
/// `env` is any lookup, usually `|k| std::env::var(k).ok()`.
pub fn load<F>(yaml_docs: &[&str], env: F) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = serde_json::to_value(WizardConfig::default())
        .context("default config serialize failed")?;

    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    for (name, pointer, kind) in ENV_OVERRIDES {
        if let Some(raw) = env(name) {
            let parsed = parse_env_value(name, &raw, *kind)?;
            // Pointers always exist: the default document defines every path.
            if let Some(slot) = merged.pointer_mut(pointer) {
                *slot = parsed;
            }
        }
    }

    let config: WizardConfig =
        serde_json::from_value(merged.clone()).context("effective config has invalid shape")?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());

    Ok(LoadedConfig {
        config,
        config_hash,
        canonical_json,
    })
}

/// Load from the process environment, with an optional YAML file named by
/// `RPOS_CONFIG`.
pub fn load_from_env() -> Result<LoadedConfig> {
    let docs: Vec<String> = match std::env::var("RPOS_CONFIG").ok() {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {path}"))?;
            vec![raw]
        }
        None => Vec::new(),
    };
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load(&doc_refs, |k| std::env::var(k).ok())
}

// ---------------------------------------------------------------------------
// Merge / canonicalize / hash
// ---------------------------------------------------------------------------

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // Key order is made deterministic by rebuilding every object as a sorted
    // map before serializing.
    fn sort(v: &Value) -> Value {
        match v {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = serde_json::Map::new();
                for k in keys {
                    out.insert(k.clone(), sort(&map[k]));
                }
                Value::Object(out)
            }
            Value::Array(arr) => Value::Array(arr.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string(&sort(v)).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
