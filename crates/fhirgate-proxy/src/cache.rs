//! The subject -> Practitioner Details cache — the only
//! writable shared state in the whole pipeline.
//!
//! A trait abstracting the cache so production code depends on a
//! capability, not a concrete DashMap, plus a TTL-based in-memory
//! implementation safe for concurrent lookup/insert. Duplicate resolution
//! on a cache miss is explicitly allowed: two workers racing on the same
//! subject may each resolve and insert, and both writes are equivalent
//! since resolution is a pure function of upstream state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::graph::PractitionerDetails;

/// Abstraction over the subject -> `PractitionerDetails` cache, so the
/// resolver depends on a capability rather than a concrete backend.
#[async_trait]
pub trait GraphResolverCache: Send + Sync {
    async fn get(&self, subject: &str) -> Option<Arc<PractitionerDetails>>;
    async fn insert(&self, subject: String, details: PractitionerDetails) -> Arc<PractitionerDetails>;
    fn cleanup_expired(&self) -> usize;
}

struct CachedEntry {
    details: Arc<PractitionerDetails>,
    expires_at: Instant,
}

/// TTL-based in-memory cache, keyed by subject, expiry-only invalidation.
pub struct LocalGraphResolverCache {
    entries: DashMap<String, CachedEntry>,
    ttl: Duration,
}

impl LocalGraphResolverCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

#[async_trait]
impl GraphResolverCache for LocalGraphResolverCache {
    async fn get(&self, subject: &str) -> Option<Arc<PractitionerDetails>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(subject) {
            if entry.expires_at > now {
                return Some(Arc::clone(&entry.details));
            }
            drop(entry);
            self.entries.remove(subject);
        }
        None
    }

    async fn insert(
        &self,
        subject: String,
        details: PractitionerDetails,
    ) -> Arc<PractitionerDetails> {
        let details = Arc::new(details);
        self.entries.insert(
            subject,
            CachedEntry {
                details: Arc::clone(&details),
                expires_at: Instant::now() + self.ttl,
            },
        );
        details
    }

    fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn empty_details(practitioner_id: &str) -> PractitionerDetails {
        PractitionerDetails {
            practitioner_id: practitioner_id.to_string(),
            care_teams: Default::default(),
            organizations: Default::default(),
            practitioner_roles: Default::default(),
            groups: Default::default(),
            organization_affiliations: Default::default(),
            locations: Default::default(),
            location_hierarchy: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = LocalGraphResolverCache::new(Duration::from_secs(60));
        assert!(cache.get("sub-1").await.is_none());
        cache.insert("sub-1".into(), empty_details("prac-1")).await;
        let hit = cache.get("sub-1").await.unwrap();
        assert_eq!(hit.practitioner_id, "prac-1");
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = LocalGraphResolverCache::new(Duration::from_millis(1));
        cache.insert("sub-1".into(), empty_details("prac-1")).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("sub-1").await.is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_expired_only() {
        let cache = LocalGraphResolverCache::new(Duration::from_millis(1));
        cache.insert("sub-1".into(), empty_details("prac-1")).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.insert("sub-2".into(), empty_details("prac-2")).await;
        // sub-1 expired, sub-2 fresh
        let removed = cache.cleanup_expired();
        assert_eq!(removed, 1);
        assert!(cache.get("sub-2").await.is_some());
    }
}
