//! Shared test utilities for `kromo-core`.

use kromo_test_support::property::case_count;
use proptest::test_runner::Config as ProptestConfig;

/// Builds a proptest configuration honouring `KROMO_PBT_CASES`.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    ProptestConfig {
        cases: case_count(default_cases),
        ..ProptestConfig::default()
    }
}
