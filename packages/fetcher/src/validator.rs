//! URL validation for SSRF protection.
//!
//! Every rung of the escalation ladder passes a URL through
//! this validator before dialing out, not only the direct-HTTP rung.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::error::{SecurityError, SecurityResult};

/// Validates URLs before they are fetched, blocking:
/// - internal services (`localhost`, `127.0.0.1`)
/// - private IP ranges (`10.x`, `172.16.x`, `192.168.x`)
/// - cloud metadata services (`169.254.x`)
/// - non-HTTP(S) schemes (`file://`, `ftp://`)
#[derive(Debug, Clone)]
pub struct UrlValidator {
    allowed_schemes: HashSet<String>,
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<ipnet::IpNet>,
    allowed_hosts: HashSet<String>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlValidator {
    pub fn new() -> Self {
        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: [
                "localhost",
                "127.0.0.1",
                "::1",
                "[::1]",
                "0.0.0.0",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs: vec![
                "10.0.0.0/8".parse().unwrap(),
                "172.16.0.0/12".parse().unwrap(),
                "192.168.0.0/16".parse().unwrap(),
                "169.254.0.0/16".parse().unwrap(),
                "127.0.0.0/8".parse().unwrap(),
                "::1/128".parse().unwrap(),
                "fc00::/7".parse().unwrap(),
                "fe80::/10".parse().unwrap(),
            ],
            allowed_hosts: HashSet::new(),
        }
    }

    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into());
        self
    }

    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into());
        self
    }

    pub fn block_cidr(mut self, cidr: ipnet::IpNet) -> Self {
        self.blocked_cidrs.push(cidr);
        self
    }

    /// Validate a URL without touching the network.
    pub fn validate(&self, url: &str) -> SecurityResult<()> {
        let parsed = url::Url::parse(url)?;

        if !self.allowed_schemes.contains(parsed.scheme()) {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        let host = parsed.host_str().ok_or(SecurityError::NoHost)?;

        if self.allowed_hosts.contains(host) {
            return Ok(());
        }

        if self.blocked_hosts.contains(host) {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            for cidr in &self.blocked_cidrs {
                if cidr.contains(&ip) {
                    return Err(SecurityError::BlockedCidr(ip.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Validate a URL and resolve DNS to catch rebinding attacks, where a
    /// hostname resolves to an internal IP only at request time.
    pub async fn validate_with_dns(&self, url: &str) -> SecurityResult<()> {
        self.validate(url)?;

        let parsed = url::Url::parse(url)?;
        let host = parsed.host_str().ok_or(SecurityError::NoHost)?;

        if self.allowed_hosts.contains(host) {
            return Ok(());
        }
        if host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        let port = parsed.port().unwrap_or(match parsed.scheme() {
            "https" => 443,
            _ => 80,
        });

        let addrs = tokio::net::lookup_host(format!("{host}:{port}"))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;

        for addr in addrs {
            let ip = addr.ip();
            for cidr in &self.blocked_cidrs {
                if cidr.contains(&ip) {
                    return Err(SecurityError::BlockedCidr(format!(
                        "DNS for {host} resolved to blocked IP {ip}"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_localhost() {
        let validator = UrlValidator::new();
        assert!(validator.validate("http://localhost/").is_err());
        assert!(validator.validate("http://127.0.0.1/").is_err());
        assert!(validator.validate("http://[::1]/").is_err());
    }

    #[test]
    fn blocks_private_ips() {
        let validator = UrlValidator::new();
        assert!(validator.validate("http://10.0.0.1/").is_err());
        assert!(validator.validate("http://172.16.0.1/").is_err());
        assert!(validator.validate("http://192.168.1.1/").is_err());
    }

    #[test]
    fn blocks_metadata_services() {
        let validator = UrlValidator::new();
        assert!(validator.validate("http://169.254.169.254/").is_err());
        assert!(validator
            .validate("http://metadata.google.internal/")
            .is_err());
    }

    #[test]
    fn blocks_non_http_schemes() {
        let validator = UrlValidator::new();
        assert!(validator.validate("file:///etc/passwd").is_err());
        assert!(validator.validate("ftp://example.com/").is_err());
    }

    #[test]
    fn allows_public_urls() {
        let validator = UrlValidator::new();
        assert!(validator.validate("https://example.com/").is_ok());
        assert!(validator.validate("http://example.org/").is_ok());
    }

    #[test]
    fn allowed_hosts_bypass() {
        let validator = UrlValidator::new().allow_host("localhost");
        assert!(validator.validate("http://localhost/").is_ok());
    }
}
