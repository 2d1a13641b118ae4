//! Configuration management for cf-ddns.

use crate::error::{DdnsError, Result};
use crate::providers::Credentials;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Main configuration structure.
///
/// Loaded from TOML and then overlaid with command-line flags. Nothing in here
/// is global; the resolved values are handed to each component on
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cloudflare credentials.
    #[serde(default)]
    pub cloudflare: CloudflareConfig,

    /// Zone name (e.g. "example.com").
    #[serde(default)]
    pub zone_name: Option<String>,

    /// Zone ID. When set, the zone lookup call is skipped.
    #[serde(default)]
    pub zone_id: Option<String>,

    /// Hostnames to keep updated (relative labels, "@" or FQDNs in the zone).
    #[serde(default)]
    pub hostnames: Vec<String>,

    /// Fixed IP to publish instead of querying the echo service.
    #[serde(default)]
    pub ip_address: Option<String>,

    /// Verify TLS certificates when querying the echo service (default: true).
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// "What is my IP" endpoint.
    #[serde(default = "default_ip_service")]
    pub ip_service: String,

    /// Where the last published IP is kept.
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Log level name (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_ip_service() -> String {
    "https://api.ipify.org".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Cloudflare credentials.
///
/// Either `api_token`, or both `email` and `api_key`. Values starting with `$`
/// are read from the environment.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CloudflareConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl std::fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// What a reconciliation pass operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub zone_name: String,
    pub zone_id: Option<String>,
    /// Fully qualified hostnames.
    pub hostnames: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cloudflare: CloudflareConfig::default(),
            zone_name: None,
            zone_id: None,
            hostnames: Vec::new(),
            ip_address: None,
            verify_tls: true,
            ip_service: default_ip_service(),
            state_file: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdnsError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("cf-ddns").join("config.toml"))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check that everything needed for a pass is present.
    pub fn validate(&self) -> Result<()> {
        self.credentials()?;
        self.target()?;
        self.ip_override()?;
        Ok(())
    }

    /// Build provider credentials, preferring a scoped API token.
    pub fn credentials(&self) -> Result<Credentials> {
        let cf = &self.cloudflare;

        if let Some(token) = non_empty(&cf.api_token) {
            return Ok(Credentials::ApiToken(resolve_secret(token)?));
        }

        match (non_empty(&cf.email), non_empty(&cf.api_key)) {
            (Some(email), Some(key)) => Ok(Credentials::ApiKey {
                email: resolve_secret(email)?,
                key: resolve_secret(key)?,
            }),
            (None, Some(_)) => Err(DdnsError::Config(
                "Cloudflare email is required with an API key".to_string(),
            )),
            (Some(_), None) => Err(DdnsError::Config(
                "Cloudflare API key is required with an email".to_string(),
            )),
            (None, None) => Err(DdnsError::Config(
                "Cloudflare credentials missing: set an API token or email and API key"
                    .to_string(),
            )),
        }
    }

    /// Zone and fully qualified hostnames for the reconciler.
    pub fn target(&self) -> Result<Target> {
        let zone_name = non_empty(&self.zone_name)
            .map(|z| z.trim_end_matches('.').to_ascii_lowercase())
            .ok_or_else(|| DdnsError::Config("Zone name is required".to_string()))?;

        let mut hostnames: Vec<String> = Vec::new();
        let configured = self
            .hostnames
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty());

        for raw in configured {
            let fqdn = qualify_hostname(raw, &zone_name)?;
            if hostnames.contains(&fqdn) {
                tracing::debug!("Skipping duplicate hostname {} ({})", raw, fqdn);
                continue;
            }
            hostnames.push(fqdn);
        }

        if hostnames.is_empty() {
            return Err(DdnsError::Config(
                "At least one hostname is required".to_string(),
            ));
        }

        Ok(Target {
            zone_name,
            zone_id: non_empty(&self.zone_id).map(str::to_string),
            hostnames,
        })
    }

    /// Parsed `ip_address` override, if configured.
    pub fn ip_override(&self) -> Result<Option<Ipv4Addr>> {
        match non_empty(&self.ip_address) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                DdnsError::Config(format!("ip_address is not an IPv4 address: {}", raw))
            }),
        }
    }

    /// Configured log level; unknown names fall back to info.
    pub fn log_level(&self) -> tracing::Level {
        parse_log_level(&self.log_level)
    }

    /// Location of the stored IP.
    pub fn state_path(&self) -> PathBuf {
        if let Some(path) = &self.state_file {
            return path.clone();
        }

        dirs::data_local_dir()
            .map(|p| p.join("cf-ddns").join("last-ip"))
            .unwrap_or_else(|| PathBuf::from("cf-ddns.last-ip"))
    }
}

/// Turn a configured hostname into an FQDN inside `zone`.
///
/// A single label is taken relative to the zone. Anything with a dot must
/// already be a name inside the zone.
pub fn qualify_hostname(hostname: &str, zone: &str) -> Result<String> {
    let host = hostname.trim_end_matches('.').to_ascii_lowercase();

    if host == "@" || host == zone {
        Ok(zone.to_string())
    } else if host.ends_with(&format!(".{}", zone)) {
        Ok(host)
    } else if host.contains('.') {
        Err(DdnsError::Config(format!(
            "Hostname {} is not inside zone {}",
            hostname, zone
        )))
    } else {
        Ok(format!("{}.{}", host, zone))
    }
}

/// Map a textual level name to a tracing level.
pub fn parse_log_level(name: &str) -> tracing::Level {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve environment variable references (values starting with $).
///
/// An unset or empty variable is a configuration error.
pub(crate) fn resolve_secret(value: &str) -> Result<String> {
    let Some(var_name) = value.strip_prefix('$') else {
        return Ok(value.to_string());
    };

    match std::env::var(var_name) {
        Ok(resolved) if !resolved.trim().is_empty() => Ok(resolved),
        _ => Err(DdnsError::Config(format!(
            "environment variable {} not set",
            var_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            cloudflare: CloudflareConfig {
                email: Some("ops@example.com".to_string()),
                api_key: Some("key".to_string()),
                api_token: None,
            },
            zone_name: Some("example.com".to_string()),
            hostnames: vec!["vpn".to_string()],
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.verify_tls);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.ip_service, "https://api.ipify.org");
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            zone_name = "example.com"
            hostnames = ["vpn", "home.example.com"]
            verify_tls = false
            state_file = "/var/lib/cf-ddns/last-ip"

            [cloudflare]
            api_token = "abc"
            "#,
        )
        .unwrap();

        assert!(!config.verify_tls);
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.state_path(),
            PathBuf::from("/var/lib/cf-ddns/last-ip")
        );
        assert_eq!(
            config.target().unwrap().hostnames,
            vec!["vpn.example.com", "home.example.com"]
        );
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load_from(Path::new("/nonexistent/cf-ddns.toml")).unwrap();
        assert!(config.hostnames.is_empty());
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_credentials() {
        let mut config = valid();
        config.cloudflare = CloudflareConfig::default();
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));

        config.cloudflare.email = Some("ops@example.com".to_string());
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_validate_missing_zone_and_hosts() {
        let mut config = valid();
        config.zone_name = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));

        let mut config = valid();
        config.hostnames = vec![String::new()];
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_ip_override() {
        let mut config = valid();
        assert_eq!(config.ip_override().unwrap(), None);

        config.ip_address = Some("203.0.113.7".to_string());
        assert_eq!(
            config.ip_override().unwrap(),
            Some(Ipv4Addr::new(203, 0, 113, 7))
        );

        config.ip_address = Some("2001:db8::1".to_string());
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_token_preferred_over_key() {
        let mut config = valid();
        config.cloudflare.api_token = Some("token".to_string());
        assert!(matches!(
            config.credentials().unwrap(),
            Credentials::ApiToken(t) if t == "token"
        ));
    }

    #[test]
    fn test_zone_id_passthrough() {
        let mut config = valid();
        config.zone_id = Some("023e105f4ecef8ad9ca31a8372d0c353".to_string());
        assert_eq!(
            config.target().unwrap().zone_id.as_deref(),
            Some("023e105f4ecef8ad9ca31a8372d0c353")
        );
    }

    #[test]
    fn test_qualify_hostname() {
        let q = |h: &str| qualify_hostname(h, "example.com").unwrap();
        assert_eq!(q("vpn"), "vpn.example.com");
        assert_eq!(q("@"), "example.com");
        assert_eq!(q("example.com."), "example.com");
        assert_eq!(q("VPN.Example.com"), "vpn.example.com");
        assert_eq!(q("a.b.example.com"), "a.b.example.com");
    }

    #[test]
    fn test_qualify_hostname_outside_zone() {
        for host in ["vpn.example.org", "a.b", "notexample.com"] {
            assert!(
                matches!(
                    qualify_hostname(host, "example.com"),
                    Err(DdnsError::Config(_))
                ),
                "{} should be rejected",
                host
            );
        }
    }

    #[test]
    fn test_target_rejects_foreign_fqdn() {
        let mut config = valid();
        config.hostnames = vec!["vpn".to_string(), "vpn.example.org".to_string()];
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_target_dedups_hostnames() {
        let mut config = valid();
        config.hostnames = vec![
            "vpn".to_string(),
            "home".to_string(),
            "vpn.example.com".to_string(),
            "VPN.example.com.".to_string(),
            "@".to_string(),
            "example.com".to_string(),
        ];
        assert_eq!(
            config.target().unwrap().hostnames,
            vec!["vpn.example.com", "home.example.com", "example.com"]
        );
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_log_level("WARNING"), tracing::Level::WARN);
        assert_eq!(parse_log_level(" error "), tracing::Level::ERROR);
        assert_eq!(parse_log_level("verbose"), tracing::Level::INFO);
        assert_eq!(parse_log_level(""), tracing::Level::INFO);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", valid().cloudflare);
        assert!(!rendered.contains("\"key\""));
        assert!(rendered.contains("<REDACTED>"));
    }

    #[test]
    fn test_resolve_secret_with_value() {
        assert_eq!(resolve_secret("plain_value").unwrap(), "plain_value");
    }

    #[test]
    fn test_resolve_secret_with_existing_var() {
        std::env::set_var("TEST_CF_DDNS_VAR", "resolved_value");
        assert_eq!(resolve_secret("$TEST_CF_DDNS_VAR").unwrap(), "resolved_value");
        std::env::remove_var("TEST_CF_DDNS_VAR");
    }

    #[test]
    fn test_validate_unset_token_var() {
        let mut config = valid();
        config.cloudflare.api_token = Some("$CF_DDNS_TEST_UNSET_TOKEN".to_string());

        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, DdnsError::Config(ref m) if m.contains("CF_DDNS_TEST_UNSET_TOKEN"))
        );
        assert!(config.credentials().is_err());
    }

    #[test]
    fn test_validate_unset_key_var() {
        let mut config = valid();
        config.cloudflare.api_key = Some("$CF_DDNS_TEST_UNSET_KEY".to_string());
        assert!(matches!(config.validate(), Err(DdnsError::Config(_))));
    }
}
