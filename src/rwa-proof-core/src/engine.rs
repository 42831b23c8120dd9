//! Verification aggregator.
//!
//! This module implements the complete evaluation flow:
//! 1. Identifier parsing (no source is touched on failure)
//! 2. Metadata resolution, first answering source wins
//! 3. Existence, legality and collateral verifiers, run concurrently
//! 4. Proof invariant check
//! 5. Worst-of-three risk derivation
//! 6. Audit log append (non-fatal on failure)
//!
//! ## Degradation
//!
//! - A verifier that times out or panics becomes `pending` for its category
//! - Unreachable or slow metadata sources are skipped; if none resolves the
//!   token, the evaluation fails with `AssetNotFound`
//! - Cancellation drops every in-flight verifier and source request

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::audit::AuditLog;
use crate::cache::CachedSource;
use crate::config::GatewayConfig;
use crate::error::ProofError;
use crate::fixtures::DemoRegistry;
use crate::https::HttpsClient;
use crate::identifier::TokenIdentifier;
use crate::sources::{CustodyRegistry, LendingProtocolScanner, MetadataSource, RegulatoryRegistry};
use crate::types::{
    AssetMetadata, OverallRisk, ProofCategory, ProofResult, ProofSet, VerificationRecord,
};
use crate::verifier::{CollateralVerifier, ExistenceVerifier, LegalityVerifier, ProofVerifier};

const DEGRADED_METHOD: &str = "N/A";

/// The RWA proof engine.
///
/// Holds no per-evaluation state; one engine serves any number of
/// concurrent evaluations.
pub struct ProofEngine {
    /// Metadata sources, tried in order.
    metadata_sources: Vec<Arc<dyn MetadataSource>>,
    /// Existence verifier.
    existence: Arc<dyn ProofVerifier>,
    /// Legality verifier.
    legality: Arc<dyn ProofVerifier>,
    /// Collateral verifier.
    collateral: Arc<dyn ProofVerifier>,
    /// Upper bound on each verifier.
    verifier_timeout: Duration,
    /// Upper bound on each metadata request.
    source_timeout: Duration,
    /// Tamper-evident record of completed evaluations.
    audit_log: Option<AuditLog>,
}

impl ProofEngine {
    /// Create an engine from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::ConfigError`] if a verifier is placed in the
    /// wrong category slot or the timeout is zero.
    pub fn new(
        metadata_sources: Vec<Arc<dyn MetadataSource>>,
        existence: Arc<dyn ProofVerifier>,
        legality: Arc<dyn ProofVerifier>,
        collateral: Arc<dyn ProofVerifier>,
        verifier_timeout: Duration,
    ) -> Result<Self, ProofError> {
        for (expected, verifier) in [
            (ProofCategory::Existence, &existence),
            (ProofCategory::Legality, &legality),
            (ProofCategory::Collateral, &collateral),
        ] {
            if verifier.category() != expected {
                return Err(ProofError::ConfigError {
                    message: format!(
                        "{} verifier supplied for the {expected} slot",
                        verifier.category()
                    ),
                });
            }
        }
        if verifier_timeout.is_zero() {
            return Err(ProofError::ConfigError {
                message: "verifier_timeout must be positive".into(),
            });
        }

        Ok(Self {
            metadata_sources,
            existence,
            legality,
            collateral,
            verifier_timeout,
            source_timeout: GatewayConfig::default().source_timeout,
            audit_log: None,
        })
    }

    /// Create an engine backed by HTTPS registries.
    ///
    /// An endpoint listed under several roles shares one client and one
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, a client cannot be
    /// built, or the audit log cannot be opened.
    pub fn with_config(config: GatewayConfig) -> Result<Self, ProofError> {
        config.validate()?;
        info!(
            metadata = config.metadata_endpoints.len(),
            custody = config.custody_endpoints.len(),
            regulatory = config.regulatory_endpoints.len(),
            lending = config.lending_endpoints.len(),
            cache_ttl_ms = u64::try_from(config.cache_ttl.as_millis()).unwrap_or(u64::MAX),
            "ProofEngine: starting initialization"
        );

        let mut clients: HashMap<String, Arc<CachedSource<HttpsClient>>> = HashMap::new();
        let all_endpoints = config
            .metadata_endpoints
            .iter()
            .chain(&config.custody_endpoints)
            .chain(&config.regulatory_endpoints)
            .chain(&config.lending_endpoints);
        for url in all_endpoints {
            if !clients.contains_key(url) {
                debug!(url = %url, "ProofEngine: creating HTTPS client");
                let client = HttpsClient::new(url, config.source_timeout)?;
                clients.insert(
                    url.clone(),
                    Arc::new(CachedSource::new(client, config.cache_ttl)),
                );
            }
        }
        let pick = |urls: &[String]| -> Vec<Arc<CachedSource<HttpsClient>>> {
            urls.iter()
                .filter_map(|url| clients.get(url).cloned())
                .collect()
        };

        let metadata_sources = pick(&config.metadata_endpoints)
            .into_iter()
            .map(|c| c as Arc<dyn MetadataSource>)
            .collect();
        let custody = pick(&config.custody_endpoints)
            .into_iter()
            .map(|c| c as Arc<dyn CustodyRegistry>)
            .collect();
        let regulatory = pick(&config.regulatory_endpoints)
            .into_iter()
            .map(|c| c as Arc<dyn RegulatoryRegistry>)
            .collect();
        let lending = pick(&config.lending_endpoints)
            .into_iter()
            .map(|c| c as Arc<dyn LendingProtocolScanner>)
            .collect();

        let mut engine = Self::new(
            metadata_sources,
            Arc::new(ExistenceVerifier::new(custody, config.source_timeout)),
            Arc::new(LegalityVerifier::new(regulatory, config.source_timeout)),
            Arc::new(CollateralVerifier::new(lending, config.source_timeout)),
            config.verifier_timeout,
        )?
        .with_source_timeout(config.source_timeout);

        if let Some(path) = &config.audit_log {
            info!(path = %path.display(), "ProofEngine: opening audit log");
            engine.audit_log = Some(AuditLog::open(path.clone())?);
        }

        info!("ProofEngine: initialization complete");
        Ok(engine)
    }

    /// Engine over the in-memory demonstration registry.
    #[must_use]
    pub fn demo() -> Self {
        let defaults = GatewayConfig::default();
        let registry = Arc::new(DemoRegistry::demo());
        let scanners: Vec<Arc<dyn LendingProtocolScanner>> = DemoRegistry::demo_scanners()
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn LendingProtocolScanner>)
            .collect();

        Self {
            metadata_sources: vec![Arc::clone(&registry) as Arc<dyn MetadataSource>],
            existence: Arc::new(ExistenceVerifier::new(
                vec![Arc::clone(&registry) as Arc<dyn CustodyRegistry>],
                defaults.source_timeout,
            )),
            legality: Arc::new(LegalityVerifier::new(
                vec![registry as Arc<dyn RegulatoryRegistry>],
                defaults.source_timeout,
            )),
            collateral: Arc::new(CollateralVerifier::new(scanners, defaults.source_timeout)),
            verifier_timeout: defaults.verifier_timeout,
            source_timeout: defaults.source_timeout,
            audit_log: None,
        }
    }

    /// Record every completed evaluation in `log`.
    #[must_use]
    pub fn with_audit_log(mut self, log: AuditLog) -> Self {
        self.audit_log = Some(log);
        self
    }

    /// Bound each metadata request by `timeout` instead of the default.
    ///
    /// A zero timeout is ignored.
    #[must_use]
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.source_timeout = timeout;
        }
        self
    }

    /// The attached audit log, if any.
    pub fn audit_log(&self) -> Option<&AuditLog> {
        self.audit_log.as_ref()
    }

    /// Upper bound on each metadata request.
    pub fn source_timeout(&self) -> Duration {
        self.source_timeout
    }

    /// Upper bound on each verifier.
    pub fn verifier_timeout(&self) -> Duration {
        self.verifier_timeout
    }

    /// Evaluate a raw token identifier.
    ///
    /// # Errors
    ///
    /// - [`ProofError::MalformedIdentifier`] if `raw` does not parse
    /// - [`ProofError::AssetNotFound`] if no metadata source knows the token
    /// - [`ProofError::InternalInconsistency`] if a verifier breaks the
    ///   proof invariants
    #[instrument(skip(self))]
    pub async fn evaluate(&self, raw: &str) -> Result<VerificationRecord, ProofError> {
        let token = TokenIdentifier::parse(raw)?;
        let metadata = self.resolve_metadata(&token).await?;

        let (existence, legality, collateral) = tokio::join!(
            self.run_verifier(self.existence.as_ref(), &token),
            self.run_verifier(self.legality.as_ref(), &token),
            self.run_verifier(self.collateral.as_ref(), &token),
        );
        let proofs = ProofSet {
            existence,
            legality,
            collateral,
        };

        for category in ProofCategory::ALL {
            if let Err(reason) = proofs.get(category).check_invariants() {
                error!(category = %category, reason = %reason, "Verifier broke proof invariants");
                return Err(ProofError::InternalInconsistency { category, reason });
            }
        }

        let overall_risk = OverallRisk::derive(proofs.statuses());
        let record = VerificationRecord {
            token_id: token,
            metadata,
            proofs,
            overall_risk,
            overall_message: overall_risk.message().to_string(),
            generated_at: Utc::now(),
        };

        info!(
            token = %record.token_id,
            risk = ?record.overall_risk,
            existence = ?record.proofs.existence.status,
            legality = ?record.proofs.legality.status,
            collateral = ?record.proofs.collateral.status,
            "Evaluation complete"
        );

        if let Some(log) = &self.audit_log {
            if let Err(e) = log.append(&record) {
                warn!("Audit log append failed: {}", e);
            }
        }

        Ok(record)
    }

    /// Evaluate, giving up as soon as `cancel` holds `true`.
    ///
    /// A dropped sender never cancels.
    ///
    /// # Errors
    ///
    /// [`ProofError::Cancelled`] on cancellation; otherwise as
    /// [`ProofEngine::evaluate`].
    pub async fn evaluate_with_cancel(
        &self,
        raw: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<VerificationRecord, ProofError> {
        tokio::select! {
            biased;
            () = cancelled(&mut cancel) => {
                info!("Evaluation cancelled");
                Err(ProofError::Cancelled)
            }
            result = self.evaluate(raw) => result,
        }
    }

    async fn resolve_metadata(&self, token: &TokenIdentifier) -> Result<AssetMetadata, ProofError> {
        let mut unreachable = 0usize;
        for source in &self.metadata_sources {
            match tokio::time::timeout(self.source_timeout, source.resolve(token)).await {
                Ok(Ok(Some(metadata))) => {
                    debug!(source = %source.name(), "Metadata resolved");
                    return Ok(metadata);
                },
                Ok(Ok(None)) => {
                    debug!(source = %source.name(), "Metadata source does not know token");
                },
                Ok(Err(e)) => {
                    unreachable += 1;
                    warn!(source = %source.name(), error = %e, "Metadata source unreachable");
                },
                Err(_) => {
                    unreachable += 1;
                    warn!(
                        source = %source.name(),
                        timeout = ?self.source_timeout,
                        "Metadata source timed out"
                    );
                },
            }
        }

        if unreachable > 0 && unreachable == self.metadata_sources.len() {
            warn!(token = %token, "Every metadata source unreachable");
        }
        Err(ProofError::AssetNotFound {
            token: token.canonical(),
        })
    }

    /// Run one verifier under the timeout, turning a timeout or panic into
    /// a `pending` proof.
    async fn run_verifier(
        &self,
        verifier: &dyn ProofVerifier,
        token: &TokenIdentifier,
    ) -> ProofResult {
        let category = verifier.category();
        let guarded = AssertUnwindSafe(verifier.verify(token)).catch_unwind();

        match tokio::time::timeout(self.verifier_timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                error!(category = %category, "Verifier panicked");
                ProofResult::pending(
                    format!("{category} verifier"),
                    DEGRADED_METHOD,
                    format!("{category} verifier failed unexpectedly; no determination made"),
                )
            },
            Err(_) => {
                warn!(category = %category, timeout = ?self.verifier_timeout, "Verifier timed out");
                ProofResult::pending(
                    format!("{category} verifier"),
                    DEGRADED_METHOD,
                    format!(
                        "{category} verifier timed out after {:?}",
                        self.verifier_timeout
                    ),
                )
            },
        }
    }
}

/// Resolves once the channel holds `true`; never resolves if the sender is
/// dropped first.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
