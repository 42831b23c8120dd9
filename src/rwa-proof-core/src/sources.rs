//! External data sources consulted by the verifiers.
//!
//! Each trait is one capability of an external collaborator: a metadata
//! registry, a custodial registry, a regulatory registry, or a
//! lending-protocol scanner. Implementations report an unreachable or
//! misbehaving backend as [`ProofError::DataSourceUnavailable`]; the
//! verifiers absorb those errors and degrade the proof status instead of
//! failing the evaluation.
//!
//! [`crate::https::HttpsClient`] implements every trait against a REST
//! registry; [`crate::fixtures`] provides static in-memory implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProofError;
use crate::identifier::TokenIdentifier;
use crate::types::AssetMetadata;

/// Resolves a token to its asset description.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Stable name used in logs and warnings.
    fn name(&self) -> &str;

    /// Look up metadata. `Ok(None)` means the source does not know the token.
    async fn resolve(&self, token: &TokenIdentifier) -> Result<Option<AssetMetadata>, ProofError>;
}

/// What a custodial registry says about a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "binding")]
pub enum CustodyRecord {
    /// The registry binds the token to an asset it holds.
    Bound {
        /// Custodian holding the asset.
        custodian: String,
        /// Signature scheme or attestation used by the custodian.
        method: String,
        /// Links to the registry record.
        #[serde(default)]
        record_urls: Vec<String>,
        /// Transaction anchoring the binding on-chain.
        #[serde(default)]
        tx_hash: Option<String>,
        /// Registry remarks on the binding that are not references.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        notes: Vec<String>,
    },
    /// The registry has an entry but it does not settle the binding.
    Ambiguous {
        /// Why the entry is inconclusive.
        reason: String,
    },
    /// The registry has no entry.
    Missing,
    /// The registry explicitly denies the binding.
    Denied {
        /// Why the binding is denied.
        reason: String,
    },
}

/// Queries a custodial or land registry for the asset backing a token.
#[async_trait]
pub trait CustodyRegistry: Send + Sync {
    /// Stable name used in logs and warnings.
    fn name(&self) -> &str;

    /// Look up the custody record.
    async fn lookup(&self, token: &TokenIdentifier) -> Result<CustodyRecord, ProofError>;
}

/// What a regulatory registry says about a token's issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Authority that produced the report.
    pub authority: String,
    /// Method used (e.g. "EIP-712 Signature", "Smart Contract Analysis").
    pub method: String,
    /// Issuer named by the contract, if any.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Issuer is registered with the authority.
    pub issuer_registered: bool,
    /// A KYC attestation is attached to the issuing contract.
    pub kyc_attested: bool,
    /// An AML attestation is attached to the issuing contract.
    pub aml_attested: bool,
    /// Set when the contract is flagged non-compliant or fraudulent.
    #[serde(default)]
    pub flagged: Option<String>,
    /// Supporting references.
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Checks issuer registration and compliance attestations.
#[async_trait]
pub trait RegulatoryRegistry: Send + Sync {
    /// Stable name used in logs and warnings.
    fn name(&self) -> &str;

    /// Produce a compliance report.
    async fn check(&self, token: &TokenIdentifier) -> Result<ComplianceReport, ProofError>;
}

/// An outstanding lending position using the token as collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralPosition {
    /// Lending protocol holding the position.
    pub protocol: String,
    /// Transaction reference of the deposit.
    pub tx_ref: String,
}

/// Scans lending protocols for collateral positions.
#[async_trait]
pub trait LendingProtocolScanner: Send + Sync {
    /// Stable name used in logs and warnings.
    fn name(&self) -> &str;

    /// All outstanding positions referencing the token.
    async fn scan(&self, token: &TokenIdentifier) -> Result<Vec<CollateralPosition>, ProofError>;
}
