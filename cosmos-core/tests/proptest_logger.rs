//! Property-based tests for metric log numbering using proptest.

use proptest::prelude::*;

use cosmos_core::{CosmosConfig, EpochMetrics, MetricLog, MetricLogger};
use tempfile::TempDir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn epochs_are_one_to_n_regardless_of_argument(
        calls in proptest::collection::vec((0usize..1000, -10.0f64..10.0), 0..12),
    ) {
        let dir = TempDir::new().unwrap();
        let config = CosmosConfig::new(dir.path().join("out"));
        let mut logger = MetricLogger::open(&config).unwrap();
        for (epoch, loss) in &calls {
            logger.on_epoch_end(*epoch, &EpochMetrics::new().with("loss", *loss)).unwrap();
        }

        let expected: Vec<u64> = (1..=calls.len() as u64).collect();
        let logged: Vec<u64> = logger.log().rows().iter().map(|r| r.epoch).collect();
        prop_assert_eq!(&logged, &expected);

        // Reopening resumes from the persisted file.
        let reopened = MetricLogger::open(&config).unwrap();
        prop_assert_eq!(reopened.len(), calls.len());
        prop_assert_eq!(reopened.log().next_epoch(), calls.len() as u64 + 1);
    }

    #[test]
    fn written_values_read_back_exactly(
        values in proptest::collection::vec(-1.0e6f64..1.0e6, 1..6),
    ) {
        let mut log = MetricLog::new();
        let metrics: EpochMetrics = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("m{i}"), *v))
            .collect();
        log.push(1_700_000_000, &metrics);

        let parsed = MetricLog::from_reader(log.to_csv().unwrap().as_slice()).unwrap();
        prop_assert_eq!(parsed, log);
    }
}
