//! Property-based tests over whole simulated runs.
//!
//! Same seed, same script, same bytes on the wire.

use std::time::Duration;

use lockshadow_harness::Scenario;
use proptest::prelude::*;

fn scripted(seed: u64, version: u64) -> Scenario {
    Scenario::new()
        .with_seed(seed)
        .delta(Duration::from_secs(1), version, 1)
        .run_for(Duration::from_secs(20))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_same_seed_same_wire_traffic(seed in any::<u64>(), version in 1u64..1_000_000) {
        let first = scripted(seed, version).run().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let second = scripted(seed, version).run().map_err(|e| TestCaseError::fail(e.to_string()))?;

        let payloads = |records: &[lockshadow_harness::BrokerRecord]| -> Vec<(String, String)> {
            records.iter().map(|r| (r.topic.clone(), r.payload.clone())).collect()
        };
        prop_assert_eq!(payloads(&first.records), payloads(&second.records));
        prop_assert_eq!(first.lines, second.lines);
        prop_assert_eq!(first.snapshot, second.snapshot);
    }

    #[test]
    fn prop_any_seed_completes_one_pass(seed in any::<u64>()) {
        let outcome = scripted(seed, 1).run().map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(outcome.reports.len(), 2);
        prop_assert_eq!(outcome.lines.openings, 1);
        prop_assert!(!outcome.snapshot.pending_change);
    }
}
