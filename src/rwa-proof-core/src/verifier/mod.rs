//! Proof verifiers.
//!
//! Each verifier owns the data sources for one proof category, queries all
//! of them in parallel, and folds their answers into a single
//! [`ProofResult`].
//!
//! ## Outage Rules
//!
//! - Some sources unreachable: best determination from the rest, plus a
//!   warning naming the unreachable sources. A determination that would be
//!   `verified` becomes `warning`, since verified proofs carry no warnings.
//! - All sources unreachable (or none configured): `pending`, never
//!   `verified` or `failed`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ProofError;
use crate::identifier::TokenIdentifier;
use crate::types::{ProofCategory, ProofResult, ProofStatus};

mod collateral;
mod existence;
mod legality;

pub use collateral::CollateralVerifier;
pub use existence::ExistenceVerifier;
pub use legality::LegalityVerifier;

/// Capability shared by the existence, legality and collateral verifiers.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    /// Category this verifier proves.
    fn category(&self) -> ProofCategory;

    /// Gather evidence and return a determination.
    ///
    /// Data-source faults are absorbed into the result; this never fails.
    async fn verify(&self, token: &TokenIdentifier) -> ProofResult;
}

/// Answers from the sources of one verifier, split by reachability.
pub(crate) struct Gathered<T> {
    /// `(source name, answer)` in configuration order.
    pub reachable: Vec<(String, T)>,
    /// Names of sources that failed or timed out.
    pub unreachable: Vec<String>,
}

impl<T> Gathered<T> {
    /// Warning naming the unreachable sources, if any.
    pub fn outage_warning(&self) -> Option<String> {
        if self.unreachable.is_empty() {
            None
        } else {
            Some(format!(
                "data sources unreachable: {}",
                self.unreachable.join(", ")
            ))
        }
    }

    /// `pending` result for a total outage, or `None` if any source answered.
    pub fn total_outage(&self, category: ProofCategory, method: &str) -> Option<ProofResult> {
        if !self.reachable.is_empty() {
            return None;
        }
        let warning = if self.unreachable.is_empty() {
            format!("no {category} data sources configured")
        } else {
            format!(
                "all {category} data sources unreachable: {}",
                self.unreachable.join(", ")
            )
        };
        warn!(category = %category, "{}", warning);
        Some(ProofResult::pending(
            format!("{category} data sources"),
            method,
            warning,
        ))
    }

    /// Apply partial-outage rules to a determination.
    pub fn finish(&self, mut result: ProofResult) -> ProofResult {
        if let Some(warning) = self.outage_warning() {
            if result.status == ProofStatus::Verified {
                result.status = ProofStatus::Warning;
            }
            result.warnings.push(warning);
        }
        result
    }
}

/// Query every source in parallel, each bounded by `timeout`.
pub(crate) async fn gather<T, F>(queries: Vec<(String, F)>, timeout: Duration) -> Gathered<T>
where
    F: Future<Output = Result<T, ProofError>>,
{
    let futures = queries.into_iter().map(|(name, query)| async move {
        let outcome = match tokio::time::timeout(timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(ProofError::unavailable(
                &name,
                format!("timed out after {timeout:?}"),
            )),
        };
        (name, outcome)
    });

    let mut gathered = Gathered {
        reachable: Vec::new(),
        unreachable: Vec::new(),
    };
    for (name, outcome) in futures::future::join_all(futures).await {
        match outcome {
            Ok(answer) => {
                debug!(source = %name, "Data source answered");
                gathered.reachable.push((name, answer));
            },
            Err(e) => {
                warn!(source = %name, error = %e, "Data source unreachable");
                gathered.unreachable.push(name);
            },
        }
    }
    gathered
}
