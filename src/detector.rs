//! Public IP detection.

use crate::config::Config;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that knows the caller's public IPv4 address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Determine the current address.
    async fn resolve(&self) -> Result<Ipv4Addr>;
}

/// Always answers with a configured address.
#[derive(Debug, Clone, Copy)]
pub struct FixedIp(pub Ipv4Addr);

#[async_trait]
impl IpResolver for FixedIp {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        tracing::debug!("Using fixed IP {}", self.0);
        Ok(self.0)
    }
}

/// Asks a "what is my IP" service. One request per call, no fallback.
pub struct RemoteIpResolver {
    client: reqwest::Client,
    service: String,
}

impl RemoteIpResolver {
    /// Create a resolver for `service`.
    ///
    /// With `verify_tls` false the service's certificate is not checked.
    pub fn new(service: impl Into<String>, verify_tls: bool) -> Result<Self> {
        let service = service.into();

        if !verify_tls {
            tracing::warn!(
                "TLS certificate verification disabled for {}",
                service
            );
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| DdnsError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, service })
    }

    /// The endpoint being queried.
    pub fn service(&self) -> &str {
        &self.service
    }
}

#[async_trait]
impl IpResolver for RemoteIpResolver {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.service)
            .send()
            .await
            .map_err(|e| DdnsError::Resolution(format!("{}: {}", self.service, e)))?;

        if !response.status().is_success() {
            return Err(DdnsError::Resolution(format!(
                "HTTP {} from {}",
                response.status(),
                self.service
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DdnsError::Resolution(format!("{}: {}", self.service, e)))?;
        let ip_str = text.trim();

        match ip_str.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => {
                tracing::debug!("Detected IPv4 {} from {}", ip, self.service);
                Ok(ip)
            }
            Ok(IpAddr::V6(ip)) => Err(DdnsError::Resolution(format!(
                "{} answered with IPv6 address {}",
                self.service, ip
            ))),
            Err(_) => Err(DdnsError::Resolution(format!(
                "Invalid IP response: {}",
                ip_str
            ))),
        }
    }
}

/// Pick the resolver the configuration asks for.
pub fn from_config(config: &Config) -> Result<Box<dyn IpResolver>> {
    match config.ip_override()? {
        Some(ip) => Ok(Box::new(FixedIp(ip))),
        None => Ok(Box::new(RemoteIpResolver::new(
            config.ip_service.clone(),
            config.verify_tls,
        )?)),
    }
}
