//! Error types for proof evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProofCategory;

/// Grammar accepted by the token identifier parser.
pub const IDENTIFIER_GRAMMAR: &str = "asset:<chainId>/0x<contractAddress>/<tokenId>";

/// Segment of a token identifier that failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSegment {
    /// The `asset:` scheme prefix.
    Scheme,
    /// The decimal chain id.
    ChainId,
    /// The `0x`-prefixed contract address.
    ContractAddress,
    /// The decimal token id local to the contract.
    LocalTokenId,
}

impl fmt::Display for IdentifierSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scheme => "scheme",
            Self::ChainId => "chainId",
            Self::ContractAddress => "contractAddress",
            Self::LocalTokenId => "localTokenId",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The raw identifier does not match the identifier grammar.
    #[error("Malformed token identifier {raw:?}{}: expected {}", segment_suffix(.segment), IDENTIFIER_GRAMMAR)]
    MalformedIdentifier {
        /// The input exactly as supplied.
        raw: String,
        /// Offending segment, when it can be determined.
        segment: Option<IdentifierSegment>,
    },

    /// No metadata source could resolve the identifier to an asset.
    #[error("Asset not found: {token}")]
    AssetNotFound {
        /// Canonical form of the identifier that was looked up.
        token: String,
    },

    /// A data source could not be reached or returned garbage.
    #[error("Data source {source_name} unavailable: {message}")]
    DataSourceUnavailable {
        /// Name of the data source.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// The caller cancelled the evaluation.
    #[error("Evaluation cancelled")]
    Cancelled,

    /// A verifier produced a result that breaks the proof invariants.
    #[error("Internal inconsistency in {category} proof: {reason}")]
    InternalInconsistency {
        /// Category whose verifier misbehaved.
        category: ProofCategory,
        /// Which invariant was broken.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message.
        message: String,
    },

    /// Audit log error.
    #[error("Audit log error: {message}")]
    AuditError {
        /// Error message.
        message: String,
    },
}

fn segment_suffix(segment: &Option<IdentifierSegment>) -> String {
    match segment {
        Some(s) => format!(" (bad {s})"),
        None => String::new(),
    }
}

/// Caller-facing state an error maps to.
///
/// Every error kind maps to exactly one state so a presentation layer
/// never has to collapse two failures into one screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerState {
    /// Ask the user for a corrected identifier.
    CorrectInput,
    /// Show a "not found" state, distinct from a failed verification.
    NotFound,
    /// Offer a retry.
    Retry,
    /// Report a defect.
    Defect,
}

impl ProofError {
    pub(crate) fn malformed(raw: &str, segment: Option<IdentifierSegment>) -> Self {
        Self::MalformedIdentifier {
            raw: raw.to_string(),
            segment,
        }
    }

    pub(crate) fn unavailable(source_name: &str, message: impl Into<String>) -> Self {
        Self::DataSourceUnavailable {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Check if retrying the same request can succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DataSourceUnavailable { .. })
    }

    /// Map this error to the state a caller should present.
    #[must_use]
    pub fn caller_state(&self) -> CallerState {
        match self {
            Self::MalformedIdentifier { .. } => CallerState::CorrectInput,
            Self::AssetNotFound { .. } => CallerState::NotFound,
            Self::Cancelled | Self::DataSourceUnavailable { .. } => CallerState::Retry,
            Self::InternalInconsistency { .. }
            | Self::ConfigError { .. }
            | Self::AuditError { .. } => CallerState::Defect,
        }
    }
}
