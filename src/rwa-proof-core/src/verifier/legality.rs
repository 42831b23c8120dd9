//! Legality proof: is the issuance compliant?

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use super::{gather, ProofVerifier};
use crate::identifier::TokenIdentifier;
use crate::sources::{ComplianceReport, RegulatoryRegistry};
use crate::types::{ProofCategory, ProofResult};

const METHOD: &str = "Compliance Check";

/// Verifies issuer registration and compliance attestations.
///
/// Reports from several registries are merged: a requirement counts as met
/// when any reachable registry says it is met. A flag from any registry
/// fails the proof.
pub struct LegalityVerifier {
    registries: Vec<Arc<dyn RegulatoryRegistry>>,
    source_timeout: Duration,
}

impl LegalityVerifier {
    /// Create a verifier over the given registries.
    pub fn new(registries: Vec<Arc<dyn RegulatoryRegistry>>, source_timeout: Duration) -> Self {
        Self {
            registries,
            source_timeout,
        }
    }
}

/// One warning per unmet requirement.
fn missing_requirements(reports: &[&ComplianceReport]) -> Vec<String> {
    let mut missing = Vec::new();
    if !reports.iter().any(|r| r.issuer_registered) {
        let issuer = reports
            .iter()
            .find_map(|r| r.issuer.as_deref())
            .unwrap_or("unknown issuer");
        let authorities: Vec<&str> = reports.iter().map(|r| r.authority.as_str()).collect();
        missing.push(format!(
            "issuer {issuer} is not registered with {}",
            authorities.join(", ")
        ));
    }
    if !reports.iter().any(|r| r.kyc_attested) {
        missing.push("missing KYC attestation".to_string());
    }
    if !reports.iter().any(|r| r.aml_attested) {
        missing.push("missing AML attestation".to_string());
    }
    missing
}

#[async_trait]
impl ProofVerifier for LegalityVerifier {
    fn category(&self) -> ProofCategory {
        ProofCategory::Legality
    }

    #[instrument(skip_all, fields(token = %token))]
    async fn verify(&self, token: &TokenIdentifier) -> ProofResult {
        let queries = self
            .registries
            .iter()
            .map(|r| (r.name().to_string(), r.check(token)))
            .collect();
        let gathered = gather(queries, self.source_timeout).await;

        if let Some(pending) = gathered.total_outage(ProofCategory::Legality, METHOD) {
            return pending;
        }

        let reports: Vec<&ComplianceReport> = gathered.reachable.iter().map(|(_, r)| r).collect();

        let flags: Vec<String> = reports
            .iter()
            .filter_map(|r| {
                r.flagged
                    .as_ref()
                    .map(|reason| format!("contract flagged by {}: {reason}", r.authority))
            })
            .collect();
        if let Some(flagger) = reports.iter().find(|r| r.flagged.is_some()) {
            let result =
                ProofResult::failed(flagger.authority.as_str(), flagger.method.as_str(), flags)
                    .with_evidence(flagger.evidence.clone());
            return gathered.finish(result);
        }

        let primary = reports[0];
        let mut evidence: Vec<String> = Vec::new();
        for report in &reports {
            for e in &report.evidence {
                if !evidence.contains(e) {
                    evidence.push(e.clone());
                }
            }
        }

        let missing = missing_requirements(&reports);
        let result = if missing.is_empty() {
            ProofResult::verified(primary.authority.as_str(), primary.method.as_str())
        } else {
            ProofResult::warning(primary.authority.as_str(), primary.method.as_str(), missing)
        };
        gathered.finish(result.with_evidence(evidence))
    }
}
