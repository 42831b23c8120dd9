//! Static in-memory data sources.
//!
//! [`DemoRegistry`] answers from tables filled in with builder calls and can
//! play every source role. [`DemoRegistry::demo`] and
//! [`DemoRegistry::demo_scanners`] reproduce the three demonstration assets:
//!
//! | Token | Existence | Legality | Collateral | Risk |
//! |-------|-----------|----------|------------|------|
//! | [`DEMO_SAFE`] | verified | verified | verified | safe |
//! | [`DEMO_DANGER`] | warning | verified | failed | danger |
//! | [`DEMO_CAUTION`] | verified | warning | verified | warning |
//!
//! [`OfflineSource`] is unreachable in every role.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ProofError;
use crate::identifier::TokenIdentifier;
use crate::sources::{
    CollateralPosition, ComplianceReport, CustodyRecord, CustodyRegistry, LendingProtocolScanner,
    MetadataSource, RegulatoryRegistry,
};
use crate::types::{AssetMetadata, AssetType};

/// Demonstration asset whose three proofs all verify.
pub const DEMO_SAFE: &str = "asset:1/0xABCD1234/001";
/// Demonstration asset pledged on two lending protocols.
pub const DEMO_DANGER: &str = "asset:1/0xABCD1234/666";
/// Demonstration asset with partial compliance.
pub const DEMO_CAUTION: &str = "asset:1/0xABCD1234/333";

const FSC: &str = "Financial Supervisory Commission";

/// In-memory registry keyed by token.
///
/// Unknown tokens resolve to no metadata, a [`CustodyRecord::Missing`]
/// record and no collateral positions. A compliance check for a token
/// without a stored report fails as unavailable, since the registry has no
/// basis for any determination.
#[derive(Debug, Clone, Default)]
pub struct DemoRegistry {
    name: String,
    metadata: HashMap<TokenIdentifier, AssetMetadata>,
    custody: HashMap<TokenIdentifier, CustodyRecord>,
    compliance: HashMap<TokenIdentifier, ComplianceReport>,
    positions: HashMap<TokenIdentifier, Vec<CollateralPosition>>,
}

impl DemoRegistry {
    /// Empty registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Store asset metadata.
    #[must_use]
    pub fn with_metadata(mut self, token: TokenIdentifier, metadata: AssetMetadata) -> Self {
        self.metadata.insert(token, metadata);
        self
    }

    /// Store a custody record.
    #[must_use]
    pub fn with_custody(mut self, token: TokenIdentifier, record: CustodyRecord) -> Self {
        self.custody.insert(token, record);
        self
    }

    /// Store a compliance report.
    #[must_use]
    pub fn with_compliance(mut self, token: TokenIdentifier, report: ComplianceReport) -> Self {
        self.compliance.insert(token, report);
        self
    }

    /// Store collateral positions.
    #[must_use]
    pub fn with_positions(
        mut self,
        token: TokenIdentifier,
        positions: Vec<CollateralPosition>,
    ) -> Self {
        self.positions.insert(token, positions);
        self
    }

    /// Metadata, custody and compliance tables for the demonstration assets.
    ///
    /// Collateral comes from [`DemoRegistry::demo_scanners`].
    #[must_use]
    pub fn demo() -> Self {
        Self::new("Demo Registry")
            .with_metadata(demo_token(DEMO_SAFE), safe_metadata())
            .with_custody(
                demo_token(DEMO_SAFE),
                CustodyRecord::Bound {
                    custodian: "Land Bank of Taiwan".into(),
                    method: "VC Signature".into(),
                    record_urls: vec!["https://www.landbank.com.tw/".into()],
                    notes: Vec::new(),
                    tx_hash: Some("0x1234567890abcdef".into()),
                },
            )
            .with_compliance(
                demo_token(DEMO_SAFE),
                ComplianceReport {
                    authority: FSC.into(),
                    method: "EIP-712 Signature".into(),
                    issuer: Some("Fubon Financial Holdings".into()),
                    issuer_registered: true,
                    kyc_attested: true,
                    aml_attested: true,
                    flagged: None,
                    evidence: vec!["https://www.fsc.gov.tw/ch/index.jsp".into()],
                },
            )
            .with_metadata(demo_token(DEMO_DANGER), danger_metadata())
            .with_custody(
                demo_token(DEMO_DANGER),
                CustodyRecord::Ambiguous {
                    reason: "custodian information missing; no matching land registry record"
                        .into(),
                },
            )
            .with_compliance(
                demo_token(DEMO_DANGER),
                ComplianceReport {
                    authority: "Issuing contract".into(),
                    method: "On-chain Metadata".into(),
                    issuer: None,
                    issuer_registered: true,
                    kyc_attested: true,
                    aml_attested: true,
                    flagged: None,
                    evidence: Vec::new(),
                },
            )
            .with_metadata(demo_token(DEMO_CAUTION), caution_metadata())
            .with_custody(
                demo_token(DEMO_CAUTION),
                CustodyRecord::Bound {
                    custodian: "Regional Bank".into(),
                    method: "VC Signature".into(),
                    record_urls: Vec::new(),
                    tx_hash: None,
                    notes: vec![
                        "attestation issued outside the major financial institutions; \
                         independent confirmation recommended"
                            .into(),
                    ],
                },
            )
            .with_compliance(
                demo_token(DEMO_CAUTION),
                ComplianceReport {
                    authority: FSC.into(),
                    method: "Smart Contract Analysis".into(),
                    issuer: Some("Nangang Property Development".into()),
                    issuer_registered: false,
                    kyc_attested: false,
                    aml_attested: false,
                    flagged: None,
                    evidence: Vec::new(),
                },
            )
    }

    /// One scanner per lending protocol, with the two positions that make
    /// [`DEMO_DANGER`] a rehypothecation case.
    #[must_use]
    pub fn demo_scanners() -> Vec<Self> {
        vec![
            Self::new("Aave").with_positions(
                demo_token(DEMO_DANGER),
                vec![CollateralPosition {
                    protocol: "Aave".into(),
                    tx_ref: "https://etherscan.io/tx/0x12345678".into(),
                }],
            ),
            Self::new("Compound").with_positions(
                demo_token(DEMO_DANGER),
                vec![CollateralPosition {
                    protocol: "Compound".into(),
                    tx_ref: "https://etherscan.io/tx/0xabcdef01".into(),
                }],
            ),
            Self::new("Ondo"),
        ]
    }
}

fn demo_token(raw: &str) -> TokenIdentifier {
    match TokenIdentifier::parse(raw) {
        Ok(token) => token,
        Err(e) => unreachable!("demo identifier {raw} is malformed: {e}"),
    }
}

fn safe_metadata() -> AssetMetadata {
    AssetMetadata {
        location: Some("100 Songren Road, Xinyi District, Taipei".into()),
        value: Some("10707.66 ETH (~$40,000,000 USD)".into()),
        description: Some(
            "Revenue rights in the Tao Zhu Yin Yuan residence, quarterly distributions".into(),
        ),
        issuer: Some("Fubon Financial Holdings".into()),
        custodian: Some("Land Bank of Taiwan".into()),
        issued_date: Some("2025-01-15".into()),
        did: Some("did:web:fubon.com:assets:001".into()),
        ..AssetMetadata::new(
            "Tao Zhu Yin Yuan #2025-001 Revenue Rights",
            AssetType::RealEstate,
        )
    }
}

fn danger_metadata() -> AssetMetadata {
    AssetMetadata {
        location: Some("7 Xinyi Road Section 5, Xinyi District, Taipei".into()),
        value: Some("100 ETH (~$300,000 USD)".into()),
        description: Some("Rental revenue rights for a Taipei 101 office".into()),
        issuer: Some("Unknown issuer".into()),
        custodian: Some("Unconfirmed".into()),
        issued_date: Some("2024-12-01".into()),
        ..AssetMetadata::new("Taipei 101 Office #666 Revenue Rights", AssetType::RealEstate)
    }
}

fn caution_metadata() -> AssetMetadata {
    AssetMetadata {
        location: Some("3 Yuanqu Street, Nangang District, Taipei".into()),
        value: Some("30 ETH (~$90,000 USD)".into()),
        description: Some("Office rental revenue from Nangang Software Park".into()),
        issuer: Some("Nangang Property Development".into()),
        custodian: Some("Regional Bank".into()),
        issued_date: Some("2025-02-10".into()),
        ..AssetMetadata::new(
            "Nangang Software Park #333 Revenue Rights",
            AssetType::RealEstate,
        )
    }
}

#[async_trait]
impl MetadataSource for DemoRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, token: &TokenIdentifier) -> Result<Option<AssetMetadata>, ProofError> {
        Ok(self.metadata.get(token).cloned())
    }
}

#[async_trait]
impl CustodyRegistry for DemoRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, token: &TokenIdentifier) -> Result<CustodyRecord, ProofError> {
        Ok(self
            .custody
            .get(token)
            .cloned()
            .unwrap_or(CustodyRecord::Missing))
    }
}

#[async_trait]
impl RegulatoryRegistry for DemoRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, token: &TokenIdentifier) -> Result<ComplianceReport, ProofError> {
        self.compliance.get(token).cloned().ok_or_else(|| {
            ProofError::unavailable(&self.name, format!("no compliance report on file for {token}"))
        })
    }
}

#[async_trait]
impl LendingProtocolScanner for DemoRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, token: &TokenIdentifier) -> Result<Vec<CollateralPosition>, ProofError> {
        Ok(self.positions.get(token).cloned().unwrap_or_default())
    }
}

/// A source that is never reachable.
#[derive(Debug, Clone)]
pub struct OfflineSource {
    name: String,
}

impl OfflineSource {
    /// Offline source with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn outage(&self) -> ProofError {
        ProofError::unavailable(&self.name, "connection refused")
    }
}

#[async_trait]
impl MetadataSource for OfflineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, _token: &TokenIdentifier) -> Result<Option<AssetMetadata>, ProofError> {
        Err(self.outage())
    }
}

#[async_trait]
impl CustodyRegistry for OfflineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, _token: &TokenIdentifier) -> Result<CustodyRecord, ProofError> {
        Err(self.outage())
    }
}

#[async_trait]
impl RegulatoryRegistry for OfflineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, _token: &TokenIdentifier) -> Result<ComplianceReport, ProofError> {
        Err(self.outage())
    }
}

#[async_trait]
impl LendingProtocolScanner for OfflineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, _token: &TokenIdentifier) -> Result<Vec<CollateralPosition>, ProofError> {
        Err(self.outage())
    }
}
