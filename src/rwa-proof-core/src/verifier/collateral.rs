//! Collateral proof: is the asset pledged in more than one lending venue?

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, warn};

use super::{gather, ProofVerifier};
use crate::identifier::TokenIdentifier;
use crate::sources::{CollateralPosition, LendingProtocolScanner};
use crate::types::{ProofCategory, ProofExtra, ProofResult};

const METHOD: &str = "On-chain Scan";

/// Scans lending protocols for positions that reuse the same token.
///
/// - no position anywhere: verified
/// - one protocol: warning
/// - two or more independent protocols: failed (rehypothecation)
pub struct CollateralVerifier {
    scanners: Vec<Arc<dyn LendingProtocolScanner>>,
    source_timeout: Duration,
}

impl CollateralVerifier {
    /// Create a verifier over the given scanners.
    pub fn new(scanners: Vec<Arc<dyn LendingProtocolScanner>>, source_timeout: Duration) -> Self {
        Self {
            scanners,
            source_timeout,
        }
    }
}

/// One position per protocol. Several scanners may report the same
/// position; matching is case-insensitive on the protocol name.
fn independent_matches<'a>(
    positions: impl Iterator<Item = &'a CollateralPosition>,
) -> Vec<&'a CollateralPosition> {
    let mut seen: Vec<&'a CollateralPosition> = Vec::new();
    for position in positions {
        if !seen
            .iter()
            .any(|p| p.protocol.eq_ignore_ascii_case(&position.protocol))
        {
            seen.push(position);
        }
    }
    seen
}

#[async_trait]
impl ProofVerifier for CollateralVerifier {
    fn category(&self) -> ProofCategory {
        ProofCategory::Collateral
    }

    #[instrument(skip_all, fields(token = %token))]
    async fn verify(&self, token: &TokenIdentifier) -> ProofResult {
        let queries = self
            .scanners
            .iter()
            .map(|s| (s.name().to_string(), s.scan(token)))
            .collect();
        let gathered = gather(queries, self.source_timeout).await;

        if let Some(pending) = gathered.total_outage(ProofCategory::Collateral, METHOD) {
            return pending;
        }

        let scanner_names: Vec<&str> = gathered.reachable.iter().map(|(n, _)| n.as_str()).collect();
        let source = scanner_names.join(", ");
        let matches = independent_matches(gathered.reachable.iter().flat_map(|(_, p)| p.iter()));
        let protocols: Vec<String> = matches.iter().map(|p| p.protocol.clone()).collect();
        let evidence: Vec<String> = matches.iter().map(|p| p.tx_ref.clone()).collect();

        let result = match matches.as_slice() {
            [] => ProofResult::verified(source, METHOD).with_evidence(
                scanner_names
                    .iter()
                    .map(|n| format!("{n}: no collateral found"))
                    .collect(),
            ),
            [only] => ProofResult::warning(
                source,
                METHOD,
                vec![format!(
                    "collateral position found on {} (tx: {})",
                    only.protocol, only.tx_ref
                )],
            )
            .with_evidence(evidence),
            _ => {
                warn!(
                    protocols = ?protocols,
                    "Token pledged on multiple lending protocols"
                );
                ProofResult::failed(
                    source,
                    METHOD,
                    vec![format!(
                        "pledged as collateral on {} independent protocols ({}): rehypothecation risk",
                        protocols.len(),
                        protocols.join(", ")
                    )],
                )
                .with_evidence(evidence)
            },
        };

        gathered.finish(result.with_extra(ProofExtra::Collateral {
            matched_protocols: protocols,
        }))
    }
}
