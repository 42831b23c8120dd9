//! Outages, timeouts and cancellation.

use std::sync::Arc;
use std::time::Duration;

use rwa_proof_core::fixtures::{DemoRegistry, OfflineSource, DEMO_DANGER, DEMO_SAFE};
use rwa_proof_core::{
    CollateralVerifier, CustodyRegistry, ExistenceVerifier, LegalityVerifier,
    LendingProtocolScanner, MetadataSource, OverallRisk, ProofEngine, ProofError, ProofStatus,
    RegulatoryRegistry,
};
use tokio::sync::watch;

use crate::common::{SlowSource, Sources, SOURCE_TIMEOUT, VERIFIER_TIMEOUT};

#[tokio::test]
async fn test_every_source_offline_is_pending_never_verified() {
    let sources = Sources {
        custody: vec![Arc::new(OfflineSource::new("land-registry")) as Arc<dyn CustodyRegistry>],
        regulatory: vec![Arc::new(OfflineSource::new("fsc")) as Arc<dyn RegulatoryRegistry>],
        lending: vec![
            Arc::new(OfflineSource::new("aave")) as Arc<dyn LendingProtocolScanner>,
            Arc::new(OfflineSource::new("compound")) as Arc<dyn LendingProtocolScanner>,
        ],
        ..Sources::demo()
    };
    // The danger asset would otherwise fail collateral and warn on existence
    let record = sources.engine().evaluate(DEMO_DANGER).await.unwrap();

    for proof in [
        &record.proofs.existence,
        &record.proofs.legality,
        &record.proofs.collateral,
    ] {
        assert_eq!(proof.status, ProofStatus::Pending);
        assert!(proof.verified_at.is_none());
        assert!(proof.warnings[0].contains("unreachable"));
    }
    assert_eq!(record.overall_risk, OverallRisk::Warning);
}

#[tokio::test]
async fn test_no_configured_sources_is_pending() {
    let sources = Sources {
        custody: Vec::new(),
        regulatory: Vec::new(),
        lending: Vec::new(),
        ..Sources::demo()
    };
    let record = sources.engine().evaluate(DEMO_SAFE).await.unwrap();
    assert_eq!(record.proofs.statuses(), [ProofStatus::Pending; 3]);
    assert_eq!(
        record.proofs.existence.warnings,
        vec!["no existence data sources configured"]
    );
}

#[tokio::test]
async fn test_partial_outage_names_unreachable_source() {
    let registry = Arc::new(DemoRegistry::demo());
    let sources = Sources {
        custody: vec![
            registry as Arc<dyn CustodyRegistry>,
            Arc::new(OfflineSource::new("backup-registry")),
        ],
        ..Sources::demo()
    };
    let record = sources.engine().evaluate(DEMO_SAFE).await.unwrap();

    let existence = &record.proofs.existence;
    assert_eq!(existence.status, ProofStatus::Warning);
    assert_eq!(existence.source, "Land Bank of Taiwan");
    assert_eq!(
        existence.warnings,
        vec!["data sources unreachable: backup-registry"]
    );
    assert_eq!(record.overall_risk, OverallRisk::Warning);
}

#[tokio::test]
async fn test_metadata_outage_is_not_found() {
    let sources = Sources {
        metadata: vec![
            Arc::new(OfflineSource::new("assets-a")) as Arc<dyn MetadataSource>,
            Arc::new(OfflineSource::new("assets-b")) as Arc<dyn MetadataSource>,
        ],
        ..Sources::demo()
    };
    let err = sources.engine().evaluate(DEMO_SAFE).await.unwrap_err();
    assert!(matches!(err, ProofError::AssetNotFound { .. }));
}

#[tokio::test]
async fn test_metadata_falls_through_to_next_source() {
    let sources = Sources {
        metadata: vec![
            Arc::new(OfflineSource::new("assets-a")) as Arc<dyn MetadataSource>,
            Arc::new(DemoRegistry::new("empty")) as Arc<dyn MetadataSource>,
            Arc::new(DemoRegistry::demo()) as Arc<dyn MetadataSource>,
        ],
        ..Sources::demo()
    };
    let record = sources.engine().evaluate(DEMO_SAFE).await.unwrap();
    assert_eq!(record.metadata.custodian.as_deref(), Some("Land Bank of Taiwan"));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_metadata_source_falls_through() {
    let sources = Sources {
        metadata: vec![
            Arc::new(SlowSource::new(Duration::from_secs(3600))) as Arc<dyn MetadataSource>,
            Arc::new(DemoRegistry::demo()) as Arc<dyn MetadataSource>,
        ],
        ..Sources::demo()
    };
    let engine = sources.engine();

    let started = tokio::time::Instant::now();
    let record = tokio::time::timeout(Duration::from_secs(60), engine.evaluate(DEMO_SAFE))
        .await
        .expect("evaluation bounded by the source timeout")
        .unwrap();
    assert_eq!(record.metadata.custodian.as_deref(), Some("Land Bank of Taiwan"));
    assert_eq!(record.overall_risk, OverallRisk::Safe);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_only_metadata_source_hanging_is_not_found() {
    let sources = Sources {
        metadata: vec![
            Arc::new(SlowSource::new(Duration::from_secs(3600))) as Arc<dyn MetadataSource>,
        ],
        ..Sources::demo()
    };
    let err = tokio::time::timeout(Duration::from_secs(60), sources.engine().evaluate(DEMO_SAFE))
        .await
        .expect("evaluation bounded by the source timeout")
        .unwrap_err();
    assert!(matches!(err, ProofError::AssetNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_is_cut_off() {
    let sources = Sources {
        custody: vec![
            Arc::new(SlowSource::new(Duration::from_secs(30))) as Arc<dyn CustodyRegistry>,
        ],
        ..Sources::demo()
    };
    let record = sources.engine().evaluate(DEMO_SAFE).await.unwrap();

    let existence = &record.proofs.existence;
    assert_eq!(existence.status, ProofStatus::Pending);
    assert!(existence.warnings[0].contains("slow-registry"));
    assert_eq!(record.proofs.legality.status, ProofStatus::Verified);
}

#[tokio::test(start_paused = true)]
async fn test_slow_verifier_is_cut_off() {
    let demo = Sources::demo();
    let slow = Arc::new(SlowSource::new(Duration::from_secs(60)));
    // Source timeout beyond the verifier timeout, so the verifier bound applies
    let engine = ProofEngine::new(
        demo.metadata,
        Arc::new(ExistenceVerifier::new(demo.custody, SOURCE_TIMEOUT)),
        Arc::new(LegalityVerifier::new(
            vec![slow as Arc<dyn RegulatoryRegistry>],
            Duration::from_secs(120),
        )),
        Arc::new(CollateralVerifier::new(demo.lending, SOURCE_TIMEOUT)),
        VERIFIER_TIMEOUT,
    )
    .unwrap();

    let record = engine.evaluate(DEMO_SAFE).await.unwrap();
    let legality = &record.proofs.legality;
    assert_eq!(legality.status, ProofStatus::Pending);
    assert!(legality.warnings[0].contains("timed out"));
    assert_eq!(record.overall_risk, OverallRisk::Warning);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let err = ProofEngine::demo()
        .evaluate_with_cancel(DEMO_SAFE, rx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProofError::Cancelled));
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_slow_sources() {
    let sources = Sources {
        custody: vec![
            Arc::new(SlowSource::new(Duration::from_secs(30))) as Arc<dyn CustodyRegistry>,
        ],
        ..Sources::demo()
    };
    let engine = sources.engine();
    let (tx, rx) = watch::channel(false);

    let cancel = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
    };
    let (result, ()) = tokio::join!(engine.evaluate_with_cancel(DEMO_SAFE, rx), cancel);
    assert!(matches!(result, Err(ProofError::Cancelled)));
}
