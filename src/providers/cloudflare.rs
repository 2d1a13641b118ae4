//! Cloudflare DNS provider (API v4).

use super::{Credentials, DnsProvider, DnsRecord};
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare DNS provider.
pub struct CloudflareProvider {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<CloudflareError>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct PatchRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    content: String,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(credentials: Credentials, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DdnsError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/client/v4{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Credentials::ApiKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
            Credentials::ApiToken(token) => request.bearer_auth(token),
        }
    }

    /// Send a request and unwrap the Cloudflare response envelope.
    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: CloudflareResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => return Err(provider_error(format!("HTTP {}", status))),
        };

        if !status.is_success() || !envelope.success {
            let msg = envelope
                .errors
                .first()
                .map(|e| match e.code {
                    Some(code) => format!("{} (code {})", e.message, code),
                    None => e.message.clone(),
                })
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(provider_error(msg));
        }

        envelope
            .result
            .ok_or_else(|| provider_error("Response carried no result".to_string()))
    }
}

fn provider_error(message: String) -> DdnsError {
    DdnsError::Provider {
        provider: "cloudflare".to_string(),
        message,
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn resolve_zone(&self, name: &str) -> Result<String> {
        tracing::debug!("Looking up zone {}", name);

        let request = self.client.get(self.url("/zones")).query(&[("name", name)]);
        let zones: Vec<Zone> = self.call(request).await?;

        zones
            .into_iter()
            .find(|z| z.name.eq_ignore_ascii_case(name))
            .map(|z| {
                tracing::debug!("Zone {} has ID {}", name, z.id);
                z.id
            })
            .ok_or_else(|| DdnsError::ZoneNotFound(name.to_string()))
    }

    async fn find_records(&self, zone_id: &str, hostname: &str) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Looking up {}", hostname);

        let request = self
            .client
            .get(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .query(&[("name", hostname)]);
        let records: Vec<DnsRecord> = self.call(request).await?;

        Ok(records
            .into_iter()
            .filter(|r| r.name.eq_ignore_ascii_case(hostname))
            .collect())
    }

    async fn create_record(&self, zone_id: &str, hostname: &str, ip: Ipv4Addr) -> Result<String> {
        tracing::debug!("Registering {} -> {}", hostname, ip);

        let body = CreateRequest {
            record_type: "A",
            name: hostname,
            content: ip.to_string(),
            ttl: 1,
            proxied: false,
        };
        let request = self
            .client
            .post(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .json(&body);
        let created: CreatedRecord = self.call(request).await?;

        Ok(created.id)
    }

    async fn update_record(&self, zone_id: &str, record_id: &str, ip: Ipv4Addr) -> Result<()> {
        tracing::debug!("Updating record {} -> {}", record_id, ip);

        let body = PatchRequest {
            record_type: "A",
            content: ip.to_string(),
        };
        let request = self
            .client
            .patch(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)))
            .json(&body);
        let _: serde_json::Value = self.call(request).await?;

        Ok(())
    }
}
