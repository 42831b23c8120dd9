//! Proof and verification record types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifier::TokenIdentifier;

/// Proof category, one per verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofCategory {
    /// The asset exists and is bound to the token.
    Existence,
    /// The issuance complies with regulatory requirements.
    Legality,
    /// The asset is not pledged in conflicting venues.
    Collateral,
}

impl ProofCategory {
    /// All categories in evaluation order.
    pub const ALL: [ProofCategory; 3] = [Self::Existence, Self::Legality, Self::Collateral];

    /// Lowercase name used in logs and warnings.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Existence => "existence",
            Self::Legality => "legality",
            Self::Collateral => "collateral",
        }
    }
}

impl fmt::Display for ProofCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofStatus {
    /// Positive determination.
    Verified,
    /// Determination made with caveats.
    Warning,
    /// Negative determination.
    Failed,
    /// No determination could be made.
    Pending,
}

impl ProofStatus {
    /// Rank used for aggregation: `Failed > Warning > Pending > Verified`.
    #[must_use]
    pub fn severity(&self) -> u8 {
        match self {
            Self::Verified => 0,
            Self::Pending => 1,
            Self::Warning => 2,
            Self::Failed => 3,
        }
    }

    /// The worse of two statuses.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Risk classification derived from the three proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallRisk {
    /// All three proofs verified.
    Safe,
    /// No failure, but at least one warning or pending proof.
    Warning,
    /// At least one proof failed.
    Danger,
}

impl OverallRisk {
    /// Worst-of-three derivation. The result does not depend on the order
    /// of the statuses.
    #[must_use]
    pub fn derive(statuses: [ProofStatus; 3]) -> Self {
        let worst = statuses
            .into_iter()
            .fold(ProofStatus::Verified, ProofStatus::worst);
        match worst {
            ProofStatus::Failed => Self::Danger,
            ProofStatus::Warning | ProofStatus::Pending => Self::Warning,
            ProofStatus::Verified => Self::Safe,
        }
    }

    /// Fixed human-readable message for this risk level.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Safe => "Low risk asset (Safe to Invest)",
            Self::Warning => "Medium risk asset (Caution Advised)",
            Self::Danger => "High risk asset (Do Not Invest)",
        }
    }
}

/// Category-specific payload attached to a proof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ProofExtra {
    /// Nothing category-specific.
    #[default]
    None,
    /// On-chain transaction binding the token to the custody record.
    #[serde(rename_all = "camelCase")]
    Existence {
        /// Transaction hash, when the registry supplied one.
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_hash: Option<String>,
        /// Registry remarks on the binding.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        notes: Vec<String>,
    },
    /// Lending protocols holding the token as collateral.
    #[serde(rename_all = "camelCase")]
    Collateral {
        /// Protocol names, one per independent match.
        matched_protocols: Vec<String>,
    },
}

/// Outcome of one verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResult {
    /// Proof status.
    pub status: ProofStatus,
    /// Data origin consulted (custodian, regulator, oracle).
    pub source: String,
    /// Verification technique used.
    pub method: String,
    /// When a positive determination was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    /// References supporting the determination.
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Human-readable caveats.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Category-specific payload.
    #[serde(default)]
    pub extra: ProofExtra,
}

impl ProofResult {
    /// A positive determination. Verified proofs never carry warnings.
    pub fn verified(source: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            status: ProofStatus::Verified,
            source: source.into(),
            method: method.into(),
            verified_at: Some(Utc::now()),
            evidence: Vec::new(),
            warnings: Vec::new(),
            extra: ProofExtra::None,
        }
    }

    /// A determination with caveats.
    ///
    /// Stamped with `verified_at`: the sources were consulted and answered,
    /// so a determination was made even though it is not a clean pass.
    pub fn warning(
        source: impl Into<String>,
        method: impl Into<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            status: ProofStatus::Warning,
            source: source.into(),
            method: method.into(),
            verified_at: Some(Utc::now()),
            evidence: Vec::new(),
            warnings,
            extra: ProofExtra::None,
        }
    }

    /// A negative determination.
    ///
    /// Stamped with `verified_at` like [`ProofResult::warning`]; only
    /// [`ProofResult::pending`] leaves it unset.
    pub fn failed(
        source: impl Into<String>,
        method: impl Into<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            status: ProofStatus::Failed,
            source: source.into(),
            method: method.into(),
            verified_at: Some(Utc::now()),
            evidence: Vec::new(),
            warnings,
            extra: ProofExtra::None,
        }
    }

    /// No determination could be made.
    pub fn pending(source: impl Into<String>, method: impl Into<String>, warning: String) -> Self {
        Self {
            status: ProofStatus::Pending,
            source: source.into(),
            method: method.into(),
            verified_at: None,
            evidence: Vec::new(),
            warnings: vec![warning],
            extra: ProofExtra::None,
        }
    }

    /// Attach evidence references.
    #[must_use]
    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }

    /// Attach a category-specific payload.
    #[must_use]
    pub fn with_extra(mut self, extra: ProofExtra) -> Self {
        self.extra = extra;
        self
    }

    /// Check the status/warnings invariants.
    ///
    /// # Errors
    ///
    /// Returns a description of the broken invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.status {
            ProofStatus::Verified if !self.warnings.is_empty() => Err(format!(
                "verified proof carries {} warning(s)",
                self.warnings.len()
            )),
            ProofStatus::Failed if self.warnings.is_empty() => {
                Err("failed proof carries no warnings".into())
            },
            ProofStatus::Pending if self.verified_at.is_some() => {
                Err("pending proof carries a verification timestamp".into())
            },
            _ => Ok(()),
        }
    }
}

/// Kind of real-world asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// Land or buildings.
    RealEstate,
    /// Debt instrument.
    Bond,
    /// Physical commodity.
    Commodity,
    /// Artwork.
    Art,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// Informational asset description from a metadata source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    /// Display name.
    pub name: String,
    /// Asset kind.
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    /// Physical location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Valuation, free-form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Issuing entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Custodian holding the asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custodian: Option<String>,
    /// Issue date as supplied by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_date: Option<String>,
    /// Decentralized identifier of the asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
}

impl AssetMetadata {
    /// Metadata with only the required fields set.
    pub fn new(name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            name: name.into(),
            asset_type,
            location: None,
            value: None,
            description: None,
            issuer: None,
            custodian: None,
            issued_date: None,
            did: None,
        }
    }
}

/// The three proofs of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSet {
    /// Existence proof.
    pub existence: ProofResult,
    /// Legality proof.
    pub legality: ProofResult,
    /// Collateral proof.
    pub collateral: ProofResult,
}

impl ProofSet {
    /// Proof for a category.
    #[must_use]
    pub fn get(&self, category: ProofCategory) -> &ProofResult {
        match category {
            ProofCategory::Existence => &self.existence,
            ProofCategory::Legality => &self.legality,
            ProofCategory::Collateral => &self.collateral,
        }
    }

    /// Statuses in category order.
    #[must_use]
    pub fn statuses(&self) -> [ProofStatus; 3] {
        [
            self.existence.status,
            self.legality.status,
            self.collateral.status,
        ]
    }
}

/// Result of evaluating one token identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    /// The evaluated token.
    pub token_id: TokenIdentifier,
    /// Asset description.
    pub metadata: AssetMetadata,
    /// Per-category proofs.
    pub proofs: ProofSet,
    /// Worst-of-three risk.
    pub overall_risk: OverallRisk,
    /// Fixed message for `overall_risk`.
    pub overall_message: String,
    /// When the evaluation completed.
    pub generated_at: DateTime<Utc>,
}
