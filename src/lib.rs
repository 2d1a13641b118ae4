//! # cf-ddns
//!
//! Keeps Cloudflare "A" records pointed at the machine's current public IPv4
//! address.
//!
//! Each run resolves the external IP, compares it with the last stored value
//! and with the records Cloudflare holds, then creates or updates records
//! where they diverge.
//!
//! ## Usage
//!
//! ```bash
//! # Reconcile vpn.example.com
//! cf-ddns --cf-api-token '$CF_API_TOKEN' --cf-zone-name example.com update vpn
//!
//! # Show what would be compared, without changing anything
//! cf-ddns status vpn
//!
//! # Check credentials and zone
//! cf-ddns validate
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod providers;
pub mod reconciler;
pub mod store;

pub use config::Config;
pub use detector::IpResolver;
pub use error::{DdnsError, Result};
pub use reconciler::{PassReport, Reconciler};
