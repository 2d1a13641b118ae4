//! One reconciliation pass: resolve the IP, compare, fix DNS, remember the IP.

use crate::config::Target;
use crate::detector::IpResolver;
use crate::error::{DdnsError, Result};
use crate::providers::DnsProvider;
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;

/// What happened to a single hostname during a pass.
#[derive(Debug)]
pub enum HostOutcome {
    /// No record existed; one was created.
    Created { record_id: String },
    /// The single record was stale and now points at the new IP.
    Updated { record_id: String, previous: String },
    /// The single record already matched.
    Unchanged,
    /// Lookup or mutation failed; nothing else was attempted for this host.
    Failed(DdnsError),
}

impl HostOutcome {
    /// Whether this outcome issued a create or update call that succeeded.
    pub fn mutated(&self) -> bool {
        matches!(self, HostOutcome::Created { .. } | HostOutcome::Updated { .. })
    }
}

/// Summary of a completed pass.
#[derive(Debug)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub ip: Ipv4Addr,
    pub stored_ip: Option<Ipv4Addr>,
    pub hosts: Vec<(String, HostOutcome)>,
    /// `Some(Ok)` when the store was written, `Some(Err)` when writing failed,
    /// `None` when the stored IP was already current.
    pub state_write: Option<Result<()>>,
}

impl PassReport {
    /// Hostnames whose reconciliation failed.
    pub fn failed(&self) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|(_, outcome)| matches!(outcome, HostOutcome::Failed(_)))
            .map(|(host, _)| host.as_str())
            .collect()
    }

    /// Number of create/update calls that went through.
    pub fn mutations(&self) -> usize {
        self.hosts.iter().filter(|(_, o)| o.mutated()).count()
    }
}

/// Drives a pass over the configured hostnames.
pub struct Reconciler<'a> {
    target: &'a Target,
    resolver: &'a dyn IpResolver,
    store: &'a dyn StateStore,
    provider: &'a dyn DnsProvider,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        target: &'a Target,
        resolver: &'a dyn IpResolver,
        store: &'a dyn StateStore,
        provider: &'a dyn DnsProvider,
    ) -> Self {
        Self {
            target,
            resolver,
            store,
            provider,
        }
    }

    /// Run one pass.
    ///
    /// Fails only when the IP can't be resolved or the zone can't be found.
    /// Per-hostname problems end up in the report.
    pub async fn run(&self) -> Result<PassReport> {
        let started_at = Utc::now();

        let ip = self.resolver.resolve().await?;

        let stored_ip = match self.store.get().await {
            Ok(Some(stored)) => Some(stored),
            Ok(None) => {
                tracing::info!("No IP stored yet");
                None
            }
            Err(e) => {
                tracing::warn!("{}; treating as no stored IP", e);
                None
            }
        };
        tracing::debug!(
            "Stored IP: {}, External IP: {}",
            stored_ip.map(|s| s.to_string()).unwrap_or_default(),
            ip
        );

        let zone_id = match &self.target.zone_id {
            Some(id) => id.clone(),
            None => self.provider.resolve_zone(&self.target.zone_name).await?,
        };

        let mut hosts = Vec::with_capacity(self.target.hostnames.len());
        for hostname in &self.target.hostnames {
            let outcome = match self.reconcile_host(&zone_id, hostname, ip).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("{}: {}", hostname, e);
                    HostOutcome::Failed(e)
                }
            };
            hosts.push((hostname.clone(), outcome));
        }

        let state_write = if stored_ip != Some(ip) {
            let result = self.store.put(ip).await;
            if let Err(e) = &result {
                tracing::error!("{}", e);
            }
            Some(result)
        } else {
            None
        };

        Ok(PassReport {
            started_at,
            ip,
            stored_ip,
            hosts,
            state_write,
        })
    }

    async fn reconcile_host(
        &self,
        zone_id: &str,
        hostname: &str,
        ip: Ipv4Addr,
    ) -> Result<HostOutcome> {
        let mut records = self.provider.find_records(zone_id, hostname).await?;
        tracing::debug!("{} has {} record(s)", hostname, records.len());

        match records.len() {
            0 => {
                let record_id = self.provider.create_record(zone_id, hostname, ip).await?;
                tracing::info!("Registered {} -> {}", hostname, ip);
                Ok(HostOutcome::Created { record_id })
            }
            1 => {
                let record = records.remove(0);
                if record.points_to(ip) {
                    tracing::info!("{} already points to {}", hostname, ip);
                    return Ok(HostOutcome::Unchanged);
                }

                if record.kind != "A" {
                    tracing::warn!(
                        "{} is a {} record; it will be rewritten as A",
                        hostname,
                        record.kind
                    );
                }

                self.provider.update_record(zone_id, &record.id, ip).await?;
                tracing::info!("Updated {}: {} -> {}", hostname, record.content, ip);
                Ok(HostOutcome::Updated {
                    record_id: record.id,
                    previous: record.content,
                })
            }
            count => Err(DdnsError::AmbiguousRecords {
                hostname: hostname.to_string(),
                count,
            }),
        }
    }
}
