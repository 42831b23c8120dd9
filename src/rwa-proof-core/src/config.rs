//! Configuration for the proof engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProofError;

/// Configuration for the RWA proof gateway.
///
/// Durations are given in milliseconds in the JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Registry endpoints serving asset metadata, tried in order.
    pub metadata_endpoints: Vec<String>,
    /// Custodial registry endpoints for the existence proof.
    pub custody_endpoints: Vec<String>,
    /// Regulatory registry endpoints for the legality proof.
    pub regulatory_endpoints: Vec<String>,
    /// Lending-protocol scanner endpoints for the collateral proof.
    pub lending_endpoints: Vec<String>,
    /// Upper bound on one verifier, including all its sources.
    #[serde(with = "millis")]
    pub verifier_timeout: Duration,
    /// Upper bound on one data-source request.
    #[serde(with = "millis")]
    pub source_timeout: Duration,
    /// TTL for cached data-source responses. Zero disables caching.
    #[serde(with = "millis")]
    pub cache_ttl: Duration,
    /// Append completed evaluations to this audit log.
    pub audit_log: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            metadata_endpoints: vec!["https://registry.rwa-proof.io".into()],
            custody_endpoints: vec!["https://registry.rwa-proof.io".into()],
            regulatory_endpoints: vec!["https://registry.rwa-proof.io".into()],
            lending_endpoints: vec!["https://registry.rwa-proof.io".into()],
            verifier_timeout: Duration::from_secs(5),
            source_timeout: Duration::from_secs(3),
            cache_ttl: Duration::ZERO,
            audit_log: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a JSON file. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::ConfigError`] if the file cannot be read,
    /// parsed, or fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self, ProofError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ProofError::ConfigError {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| ProofError::ConfigError {
            message: format!("invalid config {}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that timeouts are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::ConfigError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ProofError> {
        if self.verifier_timeout.is_zero() {
            return Err(ProofError::ConfigError {
                message: "verifier_timeout must be positive".into(),
            });
        }
        if self.source_timeout.is_zero() {
            return Err(ProofError::ConfigError {
                message: "source_timeout must be positive".into(),
            });
        }
        if self.source_timeout > self.verifier_timeout {
            return Err(ProofError::ConfigError {
                message: format!(
                    "source_timeout ({:?}) exceeds verifier_timeout ({:?})",
                    self.source_timeout, self.verifier_timeout
                ),
            });
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
