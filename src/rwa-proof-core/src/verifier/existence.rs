//! Existence proof: is the token bound to a real asset held by a custodian?

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{gather, ProofVerifier};
use crate::identifier::TokenIdentifier;
use crate::sources::{CustodyRecord, CustodyRegistry};
use crate::types::{ProofCategory, ProofExtra, ProofResult};

const METHOD: &str = "Registry Lookup";

/// Verifies existence against one or more custodial registries.
pub struct ExistenceVerifier {
    registries: Vec<Arc<dyn CustodyRegistry>>,
    source_timeout: Duration,
}

impl ExistenceVerifier {
    /// Create a verifier over the given registries.
    pub fn new(registries: Vec<Arc<dyn CustodyRegistry>>, source_timeout: Duration) -> Self {
        Self {
            registries,
            source_timeout,
        }
    }
}

#[async_trait]
impl ProofVerifier for ExistenceVerifier {
    fn category(&self) -> ProofCategory {
        ProofCategory::Existence
    }

    #[instrument(skip_all, fields(token = %token))]
    async fn verify(&self, token: &TokenIdentifier) -> ProofResult {
        let queries = self
            .registries
            .iter()
            .map(|r| (r.name().to_string(), r.lookup(token)))
            .collect();
        let gathered = gather(queries, self.source_timeout).await;

        if let Some(pending) = gathered.total_outage(ProofCategory::Existence, METHOD) {
            return pending;
        }

        // An explicit denial from any registry outweighs bindings elsewhere
        let denials: Vec<_> = gathered
            .reachable
            .iter()
            .filter_map(|(name, record)| match record {
                CustodyRecord::Denied { reason } => Some((name, reason)),
                _ => None,
            })
            .collect();
        if let Some((first, _)) = denials.first() {
            let warnings = denials
                .iter()
                .map(|(name, reason)| format!("{name} denies the asset binding: {reason}"))
                .collect();
            return gathered.finish(ProofResult::failed(first.as_str(), METHOD, warnings));
        }

        let mut bound = gathered.reachable.iter().filter_map(|(_, record)| match record {
            CustodyRecord::Bound {
                custodian,
                method,
                record_urls,
                tx_hash,
                notes,
            } => Some((custodian, method, record_urls, tx_hash, notes)),
            _ => None,
        });
        if let Some((custodian, method, urls, tx_hash, first_notes)) = bound.next() {
            let mut evidence = urls.clone();
            let mut notes = first_notes.clone();
            for (_, _, more_urls, _, more_notes) in bound {
                for url in more_urls {
                    if !evidence.contains(url) {
                        evidence.push(url.clone());
                    }
                }
                for note in more_notes {
                    if !notes.contains(note) {
                        notes.push(note.clone());
                    }
                }
            }
            debug!(custodian = %custodian, "Custody binding found");
            let result = ProofResult::verified(custodian.as_str(), method.as_str())
                .with_evidence(evidence)
                .with_extra(ProofExtra::Existence {
                    tx_hash: tx_hash.clone(),
                    notes,
                });
            return gathered.finish(result);
        }

        let ambiguous: Vec<_> = gathered
            .reachable
            .iter()
            .filter_map(|(name, record)| match record {
                CustodyRecord::Ambiguous { reason } => Some(format!("{name}: {reason}")),
                _ => None,
            })
            .collect();
        if !ambiguous.is_empty() {
            let source = gathered.reachable[0].0.as_str();
            return gathered.finish(ProofResult::warning(source, METHOD, ambiguous));
        }

        let names: Vec<&str> = gathered.reachable.iter().map(|(n, _)| n.as_str()).collect();
        gathered.finish(ProofResult::pending(
            names.join(", "),
            METHOD,
            format!("no custody record found for {token}"),
        ))
    }
}
