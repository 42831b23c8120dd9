//! End-to-end evaluations of the demonstration assets.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rwa_proof_core::fixtures::{DEMO_CAUTION, DEMO_DANGER, DEMO_SAFE};
use rwa_proof_core::{
    CollateralVerifier, ExistenceVerifier, IdentifierSegment, LegalityVerifier, OverallRisk,
    ProofEngine, ProofError, ProofExtra, ProofStatus, IDENTIFIER_GRAMMAR,
};

use crate::common::{CountingVerifier, Sources, SOURCE_TIMEOUT, VERIFIER_TIMEOUT};

#[tokio::test]
async fn test_all_verified_is_safe() {
    let record = ProofEngine::demo().evaluate(DEMO_SAFE).await.unwrap();

    assert_eq!(record.overall_risk, OverallRisk::Safe);
    assert_eq!(record.overall_message, "Low risk asset (Safe to Invest)");
    assert_eq!(record.token_id.canonical(), "asset:1/0xabcd1234/001");
    assert_eq!(
        record.proofs.statuses(),
        [ProofStatus::Verified; 3]
    );

    let existence = &record.proofs.existence;
    assert_eq!(existence.source, "Land Bank of Taiwan");
    assert_eq!(existence.method, "VC Signature");
    assert_eq!(existence.evidence, vec!["https://www.landbank.com.tw/"]);
    assert!(matches!(
        existence.extra,
        ProofExtra::Existence {
            tx_hash: Some(_),
            ..
        }
    ));

    let collateral = &record.proofs.collateral;
    assert_eq!(
        collateral.evidence,
        vec![
            "Aave: no collateral found",
            "Compound: no collateral found",
            "Ondo: no collateral found",
        ]
    );
    assert!(record.generated_at >= existence.verified_at.unwrap());
}

#[tokio::test]
async fn test_rehypothecated_asset_is_danger() {
    let record = ProofEngine::demo().evaluate(DEMO_DANGER).await.unwrap();

    assert_eq!(record.overall_risk, OverallRisk::Danger);
    assert_eq!(record.overall_message, "High risk asset (Do Not Invest)");
    assert_eq!(record.proofs.existence.status, ProofStatus::Warning);
    assert!(!record.proofs.existence.warnings.is_empty());
    assert_eq!(record.proofs.legality.status, ProofStatus::Verified);

    let collateral = &record.proofs.collateral;
    assert_eq!(collateral.status, ProofStatus::Failed);
    assert_eq!(collateral.evidence.len(), 2);
    assert_eq!(collateral.warnings.len(), 1);
    assert!(collateral.warnings[0].contains("rehypothecation"));
    assert_eq!(
        collateral.extra,
        ProofExtra::Collateral {
            matched_protocols: vec!["Aave".into(), "Compound".into()]
        }
    );
}

#[tokio::test]
async fn test_partial_compliance_is_warning() {
    let record = ProofEngine::demo().evaluate(DEMO_CAUTION).await.unwrap();

    assert_eq!(record.overall_risk, OverallRisk::Warning);
    assert_eq!(record.overall_message, "Medium risk asset (Caution Advised)");
    let existence = &record.proofs.existence;
    assert_eq!(existence.status, ProofStatus::Verified);
    assert!(existence.warnings.is_empty());
    assert!(existence.evidence.is_empty());
    match &existence.extra {
        ProofExtra::Existence { notes, .. } => {
            assert!(notes[0].contains("independent confirmation"));
        },
        other => panic!("unexpected payload: {other:?}"),
    }
    assert_eq!(record.proofs.collateral.status, ProofStatus::Verified);

    let legality = &record.proofs.legality;
    assert_eq!(legality.status, ProofStatus::Warning);
    assert_eq!(legality.method, "Smart Contract Analysis");
    assert_eq!(legality.warnings.len(), 3);
    assert!(legality.warnings[0].contains("not registered"));
}

#[tokio::test]
async fn test_malformed_identifier_dispatches_nothing() {
    let sources = Sources::demo();
    let existence = Arc::new(CountingVerifier::wrap(Arc::new(ExistenceVerifier::new(
        sources.custody,
        SOURCE_TIMEOUT,
    ))));
    let legality = Arc::new(CountingVerifier::wrap(Arc::new(LegalityVerifier::new(
        sources.regulatory,
        SOURCE_TIMEOUT,
    ))));
    let collateral = Arc::new(CountingVerifier::wrap(Arc::new(CollateralVerifier::new(
        sources.lending,
        SOURCE_TIMEOUT,
    ))));
    let counters = [
        Arc::clone(&existence.calls),
        Arc::clone(&legality.calls),
        Arc::clone(&collateral.calls),
    ];
    let engine = ProofEngine::new(
        sources.metadata,
        existence,
        legality,
        collateral,
        VERIFIER_TIMEOUT,
    )
    .unwrap();

    let err = engine.evaluate("not-a-valid-id").await.unwrap_err();
    match &err {
        ProofError::MalformedIdentifier { raw, segment } => {
            assert_eq!(raw, "not-a-valid-id");
            assert_eq!(*segment, Some(IdentifierSegment::Scheme));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(IDENTIFIER_GRAMMAR));
    assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 0));

    // A well-formed identifier does dispatch all three
    engine.evaluate(DEMO_SAFE).await.unwrap();
    assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 1));
}

#[tokio::test]
async fn test_unknown_asset_is_not_found() {
    let err = ProofEngine::demo()
        .evaluate("asset:99/0xDEADBEEF/999")
        .await
        .unwrap_err();
    match err {
        ProofError::AssetNotFound { token } => assert_eq!(token, "asset:99/0xdeadbeef/999"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_concurrent_evaluations_agree() {
    let engine = ProofEngine::demo();
    let (a, b) = tokio::join!(engine.evaluate(DEMO_DANGER), engine.evaluate(DEMO_DANGER));
    let (mut a, mut b) = (a.unwrap(), b.unwrap());

    for proofs in [&mut a.proofs, &mut b.proofs] {
        proofs.existence.verified_at = None;
        proofs.legality.verified_at = None;
        proofs.collateral.verified_at = None;
    }
    assert_eq!(a.proofs, b.proofs);
    assert_eq!(a.overall_risk, b.overall_risk);
}

#[tokio::test]
async fn test_record_json_shape() {
    let record = ProofEngine::demo().evaluate(DEMO_SAFE).await.unwrap();
    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["tokenId"], "asset:1/0xabcd1234/001");
    assert_eq!(json["overallRisk"], "safe");
    assert_eq!(json["metadata"]["type"], "real_estate");
    assert_eq!(json["metadata"]["issuedDate"], "2025-01-15");
    assert_eq!(json["proofs"]["existence"]["status"], "verified");
    assert!(json["proofs"]["legality"]["verifiedAt"].is_string());
    assert!(json["generatedAt"].is_string());

    let back: rwa_proof_core::VerificationRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}
