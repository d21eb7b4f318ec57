//! Device identity detection for stage 1.
//!
//! Detection ladders, best answer first, empty string when nothing works
//! (the browser-side script is the final fallback):
//!
//! LAN IP:      forwarded headers -> local agent -> shell interface dump
//! Device name: local agent -> process hostname -> shell hostname commands

use std::net::Ipv4Addr;

use axum::http::HeaderMap;
use rpos_client::ApiClient;
use tokio::process::Command;
use tracing::debug;

/// Proxy-injected client address headers, in priority order.
pub const FORWARDED_HEADERS: [&str; 7] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

// ---------------------------------------------------------------------------
// Header inspection
// ---------------------------------------------------------------------------

/// First valid IPv4 among the forwarded headers. Comma lists (classic
/// `X-Forwarded-For`) yield their first entry.
pub fn client_ip_from_headers(headers: &HeaderMap) -> Option<Ipv4Addr> {
    for name in FORWARDED_HEADERS {
        let Some(raw) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let first = raw.split(',').next().unwrap_or("").trim();
        if let Ok(ip) = first.parse::<Ipv4Addr>() {
            return Some(ip);
        }
    }
    None
}

/// RFC1918 plus link-local.
pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    a == 10 || (a == 172 && (16..=31).contains(&b)) || (a == 192 && b == 168) || (a == 169 && b == 254)
}

// ---------------------------------------------------------------------------
// Detection ladders
// ---------------------------------------------------------------------------

pub async fn detect_lan_ip(headers: &HeaderMap, client: &ApiClient) -> String {
    if let Some(ip) = client_ip_from_headers(headers) {
        return ip.to_string();
    }

    if let Some(ip) = client.agent_lan_ip().await {
        if ip.parse::<Ipv4Addr>().is_ok() {
            return ip;
        }
        debug!(%ip, "local agent returned a non-IPv4 lan_ip");
    }

    for cmd in ["ifconfig", "ipconfig"] {
        if let Some(output) = shell_output(cmd, &[]).await {
            if let Some(ip) = first_private_ipv4(&output) {
                return ip.to_string();
            }
        }
    }

    String::new()
}

pub async fn detect_device_name(client: &ApiClient) -> String {
    if let Some(name) = client.agent_device_name().await {
        return name;
    }

    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    if is_usable_hostname(&hostname) {
        return hostname;
    }

    for (cmd, args) in [
        ("hostname", &[][..]),
        ("hostnamectl", &["hostname"][..]),
        ("uname", &["-n"][..]),
    ] {
        if let Some(output) = shell_output(cmd, args).await {
            let name = output.trim();
            if is_usable_hostname(name) {
                return name.to_string();
            }
        }
    }

    String::new()
}

fn is_usable_hostname(name: &str) -> bool {
    !name.is_empty() && name != "localhost" && name != "127.0.0.1"
}

/// First private dotted-quad found in free-form command output.
pub fn first_private_ipv4(text: &str) -> Option<Ipv4Addr> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|tok| !tok.is_empty())
        .filter_map(|tok| tok.parse::<Ipv4Addr>().ok())
        .find(|ip| is_private_ipv4(*ip) && !ip.is_loopback())
}

async fn shell_output(cmd: &str, args: &[&str]) -> Option<String> {
    let out = Command::new(cmd).args(args).output().await.ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&out.stdout).into_owned();
    (!text.trim().is_empty()).then_some(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
