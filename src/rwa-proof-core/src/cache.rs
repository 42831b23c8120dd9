//! Response cache for data sources.
//!
//! Wraps any source in a TTL cache keyed by canonical token. Only successful
//! answers are cached; an outage is retried on the next evaluation. Entries
//! are never served past their TTL and can be dropped early with
//! [`CachedSource::invalidate`].

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::ProofError;
use crate::identifier::TokenIdentifier;
use crate::sources::{
    CollateralPosition, ComplianceReport, CustodyRecord, CustodyRegistry, LendingProtocolScanner,
    MetadataSource, RegulatoryRegistry,
};
use crate::types::AssetMetadata;

/// A cached answer.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL reaches past any representable instant.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// In-memory map with a fixed TTL. A zero TTL stores nothing.
#[derive(Debug)]
pub struct TtlCache<V> {
    memory: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        self.memory
            .read()
            .ok()
            .and_then(|cache| cache.get(key).filter(|e| e.is_fresh()).map(|e| e.value.clone()))
    }

    /// Store a value for one TTL.
    pub fn insert(&self, key: &str, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        let entry = CacheEntry {
            value,
            expires_at: Instant::now().checked_add(self.ttl),
        };
        if let Ok(mut cache) = self.memory.write() {
            // Drop expired entries so the map stays bounded by live keys
            cache.retain(|_, e| e.is_fresh());
            cache.insert(key.to_string(), entry);
        }
    }

    /// Remove one key.
    pub fn invalidate(&self, key: &str) {
        if let Ok(mut cache) = self.memory.write() {
            cache.remove(key);
        }
    }

    /// Remove everything.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.memory.write() {
            cache.clear();
        }
    }

    /// Number of fresh entries.
    pub fn len(&self) -> usize {
        self.memory
            .read()
            .map(|cache| cache.values().filter(|e| e.is_fresh()).count())
            .unwrap_or(0)
    }

    /// True when no fresh entry is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A data source behind a response cache.
///
/// Implements each source trait the wrapped source implements; every role
/// has its own table so one registry can serve several roles.
pub struct CachedSource<S> {
    inner: S,
    metadata: TtlCache<Option<AssetMetadata>>,
    custody: TtlCache<CustodyRecord>,
    compliance: TtlCache<ComplianceReport>,
    positions: TtlCache<Vec<CollateralPosition>>,
}

impl<S> CachedSource<S> {
    /// Wrap `inner` with the given TTL.
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            metadata: TtlCache::new(ttl),
            custody: TtlCache::new(ttl),
            compliance: TtlCache::new(ttl),
            positions: TtlCache::new(ttl),
        }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached answer for one token.
    pub fn invalidate(&self, token: &TokenIdentifier) {
        let key = token.canonical();
        self.metadata.invalidate(&key);
        self.custody.invalidate(&key);
        self.compliance.invalidate(&key);
        self.positions.invalidate(&key);
        debug!(token = %key, "Cache: invalidated");
    }

    /// Drop every cached answer.
    pub fn clear(&self) {
        self.metadata.clear();
        self.custody.clear();
        self.compliance.clear();
        self.positions.clear();
    }
}

/// Serve from `cache` or call `fetch` and remember a successful answer.
async fn cached<V, F>(
    cache: &TtlCache<V>,
    token: &TokenIdentifier,
    fetch: F,
) -> Result<V, ProofError>
where
    V: Clone,
    F: std::future::Future<Output = Result<V, ProofError>>,
{
    let key = token.canonical();
    if let Some(value) = cache.get(&key) {
        trace!(token = %key, "Cache: hit");
        return Ok(value);
    }
    let value = fetch.await?;
    cache.insert(&key, value.clone());
    Ok(value)
}

#[async_trait]
impl<S: MetadataSource> MetadataSource for CachedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn resolve(&self, token: &TokenIdentifier) -> Result<Option<AssetMetadata>, ProofError> {
        cached(&self.metadata, token, self.inner.resolve(token)).await
    }
}

#[async_trait]
impl<S: CustodyRegistry> CustodyRegistry for CachedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn lookup(&self, token: &TokenIdentifier) -> Result<CustodyRecord, ProofError> {
        cached(&self.custody, token, self.inner.lookup(token)).await
    }
}

#[async_trait]
impl<S: RegulatoryRegistry> RegulatoryRegistry for CachedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn check(&self, token: &TokenIdentifier) -> Result<ComplianceReport, ProofError> {
        cached(&self.compliance, token, self.inner.check(token)).await
    }
}

#[async_trait]
impl<S: LendingProtocolScanner> LendingProtocolScanner for CachedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn scan(&self, token: &TokenIdentifier) -> Result<Vec<CollateralPosition>, ProofError> {
        cached(&self.positions, token, self.inner.scan(token)).await
    }
}
