//! In-memory state store.

use super::StateStore;
use crate::error::Result;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Keeps the IP in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ip: Mutex<Option<Ipv4Addr>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `ip`.
    pub fn with_ip(ip: Ipv4Addr) -> Self {
        Self {
            ip: Mutex::new(Some(ip)),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `put` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self) -> Result<Option<Ipv4Addr>> {
        Ok(*self.ip.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn put(&self, ip: Ipv4Addr) -> Result<()> {
        *self.ip.lock().unwrap_or_else(|e| e.into_inner()) = Some(ip);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        assert_eq!(store.get().await.unwrap(), None);

        let ip = Ipv4Addr::new(192, 0, 2, 10);
        store.put(ip).await.unwrap();

        assert_eq!(store.get().await.unwrap(), Some(ip));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_seeded() {
        let ip = Ipv4Addr::new(192, 0, 2, 10);
        let store = MemoryStore::with_ip(ip);

        assert_eq!(store.get().await.unwrap(), Some(ip));
        assert_eq!(store.write_count(), 0);
    }
}
