//! Shared helpers for the integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rwa_proof_core::fixtures::DemoRegistry;
use rwa_proof_core::{
    AssetMetadata, CollateralPosition, CollateralVerifier, ComplianceReport, CustodyRecord, CustodyRegistry,
    ExistenceVerifier, LegalityVerifier, LendingProtocolScanner, MetadataSource, ProofCategory,
    ProofEngine, ProofError, ProofResult, ProofVerifier, RegulatoryRegistry, TokenIdentifier,
};

pub const SOURCE_TIMEOUT: Duration = Duration::from_millis(200);
pub const VERIFIER_TIMEOUT: Duration = Duration::from_millis(500);

/// Wraps a verifier and counts how often it is dispatched.
pub struct CountingVerifier {
    inner: Arc<dyn ProofVerifier>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingVerifier {
    pub fn wrap(inner: Arc<dyn ProofVerifier>) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ProofVerifier for CountingVerifier {
    fn category(&self) -> ProofCategory {
        self.inner.category()
    }

    async fn verify(&self, token: &TokenIdentifier) -> ProofResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(token).await
    }
}

/// A source that answers from the demo registry after a delay.
pub struct SlowSource {
    delay: Duration,
    inner: DemoRegistry,
}

impl SlowSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: DemoRegistry::demo(),
        }
    }
}

#[async_trait]
impl MetadataSource for SlowSource {
    fn name(&self) -> &str {
        "slow-registry"
    }

    async fn resolve(&self, token: &TokenIdentifier) -> Result<Option<AssetMetadata>, ProofError> {
        tokio::time::sleep(self.delay).await;
        self.inner.resolve(token).await
    }
}

#[async_trait]
impl CustodyRegistry for SlowSource {
    fn name(&self) -> &str {
        "slow-registry"
    }

    async fn lookup(&self, token: &TokenIdentifier) -> Result<CustodyRecord, ProofError> {
        tokio::time::sleep(self.delay).await;
        self.inner.lookup(token).await
    }
}

#[async_trait]
impl RegulatoryRegistry for SlowSource {
    fn name(&self) -> &str {
        "slow-registry"
    }

    async fn check(&self, token: &TokenIdentifier) -> Result<ComplianceReport, ProofError> {
        tokio::time::sleep(self.delay).await;
        self.inner.check(token).await
    }
}

#[async_trait]
impl LendingProtocolScanner for SlowSource {
    fn name(&self) -> &str {
        "slow-registry"
    }

    async fn scan(&self, token: &TokenIdentifier) -> Result<Vec<CollateralPosition>, ProofError> {
        tokio::time::sleep(self.delay).await;
        self.inner.scan(token).await
    }
}

/// Sources for each role of an engine under test.
pub struct Sources {
    pub metadata: Vec<Arc<dyn MetadataSource>>,
    pub custody: Vec<Arc<dyn CustodyRegistry>>,
    pub regulatory: Vec<Arc<dyn RegulatoryRegistry>>,
    pub lending: Vec<Arc<dyn LendingProtocolScanner>>,
}

impl Sources {
    /// The demonstration registry in every role.
    pub fn demo() -> Self {
        let registry = Arc::new(DemoRegistry::demo());
        Self {
            metadata: vec![registry.clone() as Arc<dyn MetadataSource>],
            custody: vec![registry.clone() as Arc<dyn CustodyRegistry>],
            regulatory: vec![registry as Arc<dyn RegulatoryRegistry>],
            lending: DemoRegistry::demo_scanners()
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn LendingProtocolScanner>)
                .collect(),
        }
    }

    pub fn engine(self) -> ProofEngine {
        ProofEngine::new(
            self.metadata,
            Arc::new(ExistenceVerifier::new(self.custody, SOURCE_TIMEOUT)),
            Arc::new(LegalityVerifier::new(self.regulatory, SOURCE_TIMEOUT)),
            Arc::new(CollateralVerifier::new(self.lending, SOURCE_TIMEOUT)),
            VERIFIER_TIMEOUT,
        )
        .unwrap()
        .with_source_timeout(SOURCE_TIMEOUT)
    }
}
