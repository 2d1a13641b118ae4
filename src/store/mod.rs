//! Persistence of the last published IP between runs.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Last-known IP storage.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The stored IP, or `None` on a first run.
    async fn get(&self) -> Result<Option<Ipv4Addr>>;

    /// Replace the stored IP.
    async fn put(&self, ip: Ipv4Addr) -> Result<()>;
}
