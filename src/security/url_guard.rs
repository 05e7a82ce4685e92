//! SSRF-safe validation for outbound HTTP targets.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::NodeError;

/// Cloud metadata IPs that must never be reachable from node config.
const METADATA_IPS: [[u8; 4]; 3] = [[169, 254, 169, 254], [169, 254, 170, 2], [100, 100, 100, 200]];

/// Metadata hostnames blocked before any DNS resolution happens.
const METADATA_HOSTNAMES: &[&str] = &[
    "metadata.google.internal",
    "metadata.goog",
    "instance-data",
];

/// Policy for the URL guard. The defaults are the security posture; tests
/// relax individual switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardPolicy {
    pub allowed_schemes: Vec<String>,
    pub block_loopback: bool,
    pub block_private: bool,
    pub block_link_local: bool,
    pub block_metadata: bool,
    /// Extra denylisted hostnames on top of the built-in metadata set.
    #[serde(default)]
    pub denied_hosts: Vec<String>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["https".into(), "http".into()],
            block_loopback: true,
            block_private: true,
            block_link_local: true,
            block_metadata: true,
            denied_hosts: Vec::new(),
        }
    }
}

/// Applied by every executor issuing outbound calls from node
/// configuration. Hostnames are resolved at dispatch time, not at
/// config-save time, to defeat DNS rebinding.
#[derive(Debug, Clone)]
pub struct UrlGuard {
    policy: GuardPolicy,
}

impl UrlGuard {
    pub fn new(policy: GuardPolicy) -> Self {
        Self { policy }
    }

    /// Validate an outbound target. Rejection is a non-retryable
    /// [`NodeError::Security`].
    pub async fn validate(&self, raw_url: &str) -> Result<Url, NodeError> {
        let url = Url::parse(raw_url)
            .map_err(|_| NodeError::Security(format!("invalid URL: {raw_url}")))?;

        if !self
            .policy
            .allowed_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(url.scheme()))
        {
            return Err(NodeError::Security(format!(
                "blocked scheme: {}",
                url.scheme()
            )));
        }

        let host = match url.host() {
            Some(url::Host::Domain(d)) => d.to_ascii_lowercase(),
            Some(url::Host::Ipv4(ip)) => ip.to_string(),
            Some(url::Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(NodeError::Security(format!("URL has no host: {raw_url}"))),
        };

        if self.policy.block_metadata && METADATA_HOSTNAMES.contains(&host.as_str()) {
            return Err(NodeError::Security(format!("blocked metadata host: {host}")));
        }
        if self.policy.denied_hosts.iter().any(|d| d.eq_ignore_ascii_case(&host)) {
            return Err(NodeError::Security(format!("denied host: {host}")));
        }

        for ip in self.resolve(&host).await? {
            if let Some(reason) = self.blocked_ip_reason(&ip) {
                tracing::warn!(host = %host, ip = %ip, reason, "url guard rejected target");
                return Err(NodeError::Security(format!(
                    "blocked address for {host}: {ip} ({reason})"
                )));
            }
        }
        Ok(url)
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, NodeError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|_| NodeError::Security(format!("DNS resolution failed for {host}")))?;
        let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
        if ips.is_empty() {
            return Err(NodeError::Security(format!(
                "DNS resolution failed for {host}"
            )));
        }
        Ok(ips)
    }

    fn blocked_ip_reason(&self, ip: &IpAddr) -> Option<&'static str> {
        match ip {
            IpAddr::V4(v4) => {
                if self.policy.block_metadata && METADATA_IPS.contains(&v4.octets()) {
                    return Some("metadata endpoint");
                }
                if self.policy.block_loopback && v4.is_loopback() {
                    return Some("loopback");
                }
                if self.policy.block_link_local && v4.is_link_local() {
                    return Some("link-local");
                }
                if self.policy.block_private && (v4.is_private() || v4.octets()[0] == 0) {
                    return Some("private range");
                }
                None
            }
            IpAddr::V6(v6) => {
                if let Some(mapped) = v6.to_ipv4_mapped() {
                    return self.blocked_ip_reason(&IpAddr::V4(mapped));
                }
                if self.policy.block_loopback && v6.is_loopback() {
                    return Some("loopback");
                }
                if self.policy.block_link_local && (v6.segments()[0] & 0xffc0) == 0xfe80 {
                    return Some("link-local");
                }
                if self.policy.block_private && (v6.segments()[0] & 0xfe00) == 0xfc00 {
                    return Some("private range");
                }
                None
            }
        }
    }

    /// Build an HTTP client whose DNS resolution and redirects both go
    /// through this guard, so rebinding between validation and dispatch
    /// cannot bypass it.
    pub fn guarded_client(&self, timeout: Duration) -> Result<reqwest::Client, NodeError> {
        let resolver = GuardedResolver {
            guard: self.clone(),
        };
        let redirect_guard = self.clone();
        let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= 3 {
                return attempt.error(NodeError::Security("too many redirects".into()));
            }
            match redirect_guard.check_redirect(attempt.url()) {
                Ok(()) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        });

        reqwest::Client::builder()
            .redirect(redirect_policy)
            .dns_resolver(Arc::new(resolver))
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::Security(format!("HTTP client build failed: {e}")))
    }

    /// Synchronous scheme/host screening for redirect hops; resolved
    /// addresses are re-checked by the guarded resolver.
    fn check_redirect(&self, url: &Url) -> Result<(), NodeError> {
        if !self
            .policy
            .allowed_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(url.scheme()))
        {
            return Err(NodeError::Security(format!(
                "blocked redirect scheme: {}",
                url.scheme()
            )));
        }
        if let Some(host) = url.host_str() {
            let host = host.to_ascii_lowercase();
            if self.policy.block_metadata && METADATA_HOSTNAMES.contains(&host.as_str()) {
                return Err(NodeError::Security(format!(
                    "blocked redirect to metadata host: {host}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for UrlGuard {
    fn default() -> Self {
        Self::new(GuardPolicy::default())
    }
}

struct GuardedResolver {
    guard: UrlGuard,
}

impl reqwest::dns::Resolve for GuardedResolver {
    fn resolve(&self, name: reqwest::dns::Name) -> reqwest::dns::Resolving {
        let guard = self.guard.clone();
        let host = name.as_str().to_string();
        Box::pin(async move {
            let ips = guard.resolve(&host).await?;
            for ip in &ips {
                if let Some(reason) = guard.blocked_ip_reason(ip) {
                    return Err(NodeError::Security(format!(
                        "blocked address for {host}: {ip} ({reason})"
                    ))
                    .into());
                }
            }
            let addrs: Vec<std::net::SocketAddr> = ips
                .into_iter()
                .map(|ip| std::net::SocketAddr::new(ip, 0))
                .collect();
            Ok(Box::new(addrs.into_iter()) as reqwest::dns::Addrs)
        })
    }
}
