//! DNS provider implementations.

mod cloudflare;

pub use cloudflare::CloudflareProvider;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// A DNS record as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-assigned identifier.
    pub id: String,
    /// Fully qualified record name.
    pub name: String,
    /// Record type ("A", "CNAME", ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Record content as returned by the provider.
    pub content: String,
}

impl DnsRecord {
    /// Whether the record already points at `ip`.
    pub fn points_to(&self, ip: Ipv4Addr) -> bool {
        self.content.trim().parse::<Ipv4Addr>().ok() == Some(ip)
    }
}

/// API credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Account email plus global API key.
    ApiKey { email: String, key: String },
    /// Scoped API token.
    ApiToken(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey { email, .. } => f
                .debug_struct("ApiKey")
                .field("email", email)
                .field("key", &"<REDACTED>")
                .finish(),
            Credentials::ApiToken(_) => f.debug_tuple("ApiToken").field(&"<REDACTED>").finish(),
        }
    }
}

/// Zone and record operations against a DNS provider.
///
/// Every call is one round-trip; nothing is cached between calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Look up the ID of the zone called `name`.
    async fn resolve_zone(&self, name: &str) -> Result<String>;

    /// All records in the zone whose name equals `hostname`, of any type.
    async fn find_records(&self, zone_id: &str, hostname: &str) -> Result<Vec<DnsRecord>>;

    /// Create an A record and return its ID.
    async fn create_record(&self, zone_id: &str, hostname: &str, ip: Ipv4Addr) -> Result<String>;

    /// Point an existing record at `ip`, forcing its type to A.
    async fn update_record(&self, zone_id: &str, record_id: &str, ip: Ipv4Addr) -> Result<()>;
}
