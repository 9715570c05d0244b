//! Client fingerprint extraction.
//!
//! Derives the `{device_name, ip_address}` pair that binds a token to its
//! originating client. Best-effort and infallible: unparseable input falls
//! back to the raw string.

use std::net::IpAddr;

/// The `{device_name, ip_address}` pair derived from request metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFingerprint {
    pub device_name: String,
    pub ip_address: String,
}

impl ClientFingerprint {
    #[must_use]
    pub fn new(device_name: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            ip_address: ip_address.into(),
        }
    }

    /// Derive a fingerprint from raw request metadata.
    ///
    /// `device_name` is the raw user-agent header (empty if absent).
    /// `ip_address` prefers the first segment of a forwarded-for header,
    /// falling back to the socket remote address.
    #[must_use]
    pub fn derive(
        user_agent: Option<&str>,
        forwarded_for: Option<&str>,
        remote_addr: Option<&str>,
    ) -> Self {
        let device_name = user_agent.unwrap_or_default().to_string();

        let raw_ip = forwarded_for
            .and_then(|header| header.split(',').next())
            .filter(|segment| !segment.trim().is_empty())
            .or(remote_addr)
            .unwrap_or_default();

        Self {
            device_name,
            ip_address: normalize_ip(raw_ip),
        }
    }
}

/// Strip IPv6 brackets and port suffixes, then validate as an IP literal.
/// Falls back to the trimmed raw string when parsing fails.
fn normalize_ip(raw: &str) -> String {
    let trimmed = raw.trim();

    let candidate = if let Some(rest) = trimmed.strip_prefix('[') {
        // Bracketed IPv6, possibly with a port: [::1]:8080
        rest.split(']').next().unwrap_or(rest)
    } else if trimmed.matches(':').count() == 1 {
        // IPv4 with a port: 1.2.3.4:56
        trimmed.split(':').next().unwrap_or(trimmed)
    } else {
        // Bare IPv4, bare IPv6, or junk
        trimmed
    };

    match candidate.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => trimmed.to_string(),
    }
}
