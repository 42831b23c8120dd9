//! Property-based tests for identifier parsing and risk derivation.

use proptest::prelude::*;

use rwa_proof_core::{OverallRisk, ProofError, ProofStatus, TokenIdentifier};

/// Strategy for well-formed identifiers, with mixed-case addresses.
fn well_formed() -> impl Strategy<Value = String> {
    (any::<u64>(), "[0-9a-fA-F]{1,40}", "[0-9]{1,12}")
        .prop_map(|(chain, address, local)| format!("asset:{chain}/0x{address}/{local}"))
}

fn status() -> impl Strategy<Value = ProofStatus> {
    prop_oneof![
        Just(ProofStatus::Verified),
        Just(ProofStatus::Warning),
        Just(ProofStatus::Failed),
        Just(ProofStatus::Pending),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    // ========================================================================
    // Identifier Properties
    // ========================================================================

    /// Every well-formed identifier parses, and its canonical form parses
    /// back to the same identifier.
    #[test]
    fn parse_is_total_and_round_trips(raw in well_formed()) {
        let token = TokenIdentifier::parse(&raw).unwrap();
        let canonical = token.canonical();
        prop_assert_eq!(canonical.to_lowercase(), raw.to_lowercase());
        prop_assert_eq!(TokenIdentifier::parse(&canonical).unwrap(), token);
    }

    /// Arbitrary strings never fail with anything but MalformedIdentifier.
    #[test]
    fn arbitrary_input_only_fails_as_malformed(raw in ".{0,64}") {
        if let Err(e) = TokenIdentifier::parse(&raw) {
            let is_malformed = matches!(e, ProofError::MalformedIdentifier { .. });
            prop_assert!(is_malformed);
        }
    }

    /// Breaking one segment of a well-formed identifier is rejected.
    #[test]
    fn corrupted_identifiers_are_malformed(
        raw in well_formed(),
        junk in "[g-zG-Z /:]{1,3}",
    ) {
        let corrupted = format!("{raw}{junk}");
        let is_malformed = matches!(
            TokenIdentifier::parse(&corrupted),
            Err(ProofError::MalformedIdentifier { .. })
        );
        prop_assert!(is_malformed);

        let rescheme = raw.replacen("asset:", "token:", 1);
        let is_malformed = matches!(
            TokenIdentifier::parse(&rescheme),
            Err(ProofError::MalformedIdentifier { .. })
        );
        prop_assert!(is_malformed);
    }

    // ========================================================================
    // Risk Derivation Properties
    // ========================================================================

    /// The derived risk does not depend on which category holds which status.
    #[test]
    fn risk_is_invariant_under_permutation(a in status(), b in status(), c in status()) {
        let risk = OverallRisk::derive([a, b, c]);
        for permutation in [[a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]] {
            prop_assert_eq!(OverallRisk::derive(permutation), risk);
        }
    }

    /// Worst-of-three: any failure is danger, all verified is safe,
    /// everything else is a warning.
    #[test]
    fn risk_is_worst_of_three(statuses in prop::array::uniform3(status())) {
        let expected = if statuses.contains(&ProofStatus::Failed) {
            OverallRisk::Danger
        } else if statuses.iter().all(|s| *s == ProofStatus::Verified) {
            OverallRisk::Safe
        } else {
            OverallRisk::Warning
        };
        prop_assert_eq!(OverallRisk::derive(statuses), expected);
    }
}
