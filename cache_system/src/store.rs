//! In-process object cache
//!
//! [`MemoryObjectCache`] is the in-tree [`ObjectCache`]: grouped entries
//! with expiry, held behind one async lock. It backs the ephemeral driver
//! and can be handed to the manager as the host object cache for
//! single-process deployments.

use crate::codec::as_counter;
use crate::drivers::shared_memory::ObjectCache;
use crate::errors::{CacheError, CacheResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            // Past the clock's range the entry simply never expires
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Groups = HashMap<String, HashMap<String, MemoryEntry>>;

/// Grouped key-value store with per-entry expiry
#[derive(Debug, Default)]
pub struct MemoryObjectCache {
    groups: RwLock<Groups>,
}

impl MemoryObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries in `group`
    pub async fn len(&self, group: &str) -> usize {
        let now = Instant::now();
        let groups = self.groups.read().await;
        groups
            .get(group)
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, group: &str) -> bool {
        self.len(group).await == 0
    }

    /// Drop every expired entry, returning how many went
    pub async fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut groups = self.groups.write().await;
        let mut purged = 0u64;
        for entries in groups.values_mut() {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            purged += (before - entries.len()) as u64;
        }
        groups.retain(|_, entries| !entries.is_empty());
        purged
    }

    /// Remove the keys of `group` starting with `prefix`
    pub async fn remove_prefixed(&self, group: &str, prefix: &str) -> u64 {
        let mut groups = self.groups.write().await;
        let Some(entries) = groups.get_mut(group) else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        (before - entries.len()) as u64
    }
}

#[async_trait]
impl ObjectCache for MemoryObjectCache {
    fn is_active(&self) -> bool {
        true
    }

    async fn get(&self, group: &str, key: &str) -> CacheResult<Option<Value>> {
        let now = Instant::now();
        {
            let groups = self.groups.read().await;
            match groups.get(group).and_then(|entries| entries.get(key)) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: reclaim it, unless a writer replaced it meanwhile
        let mut groups = self.groups.write().await;
        if let Some(entries) = groups.get_mut(group) {
            if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                entries.remove(key);
            }
        }
        Ok(None)
    }

    async fn set(
        &self,
        group: &str,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let mut groups = self.groups.write().await;
        groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), MemoryEntry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, group: &str, key: &str) -> CacheResult<bool> {
        let mut groups = self.groups.write().await;
        Ok(groups
            .get_mut(group)
            .and_then(|entries| entries.remove(key))
            .is_some())
    }

    async fn increment(&self, group: &str, key: &str, offset: i64) -> CacheResult<i64> {
        let now = Instant::now();
        let mut groups = self.groups.write().await;
        let entries = groups.entry(group.to_string()).or_default();

        match entries.get_mut(key).filter(|entry| !entry.is_expired(now)) {
            Some(entry) => {
                let current = as_counter(&entry.value)
                    .ok_or_else(|| CacheError::NotNumeric(key.to_string()))?;
                let next = current
                    .checked_add(offset)
                    .ok_or_else(|| CacheError::Overflow(key.to_string()))?;
                entry.value = Value::from(next);
                Ok(next)
            }
            None => {
                entries.insert(key.to_string(), MemoryEntry::new(Value::from(offset), None));
                Ok(offset)
            }
        }
    }

    async fn flush_group(&self, group: &str) -> CacheResult<u64> {
        let mut groups = self.groups.write().await;
        Ok(groups
            .remove(group)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0))
    }
}
