//! End-to-end integration tests
//!
//! These tests validate the complete redemption pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Seeds the store from tests/fixtures/catalog/
//! 2. Processes requests.csv from a fixture directory
//! 3. Compares the balances output with expected.csv
//!
//! Fixtures cover:
//! - Happy path and multi-item requests
//! - Insufficient points
//! - Validity windows (not yet valid, expired, inclusive bounds)
//! - Unknown and inactive customers and vouchers
//! - Malformed rows and requests
//! - Idempotency keys
//! - Many interleaved customers
//!
//! Every fixture runs with both the sequential and the concurrent strategy,
//! and every run evaluates validity windows at the same fixed instant.

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;
    use std::collections::HashMap;
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::NamedTempFile;
    use voucher_redemption_engine::cli::StrategyType;
    use voucher_redemption_engine::strategy::{create_strategy, BatchConfig, RunConfig};

    const CATALOG_DIR: &str = "tests/fixtures/catalog";

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    fn run_config(ledger: Option<PathBuf>) -> RunConfig {
        RunConfig {
            catalog_dir: PathBuf::from(CATALOG_DIR),
            as_of: as_of(),
            ledger,
        }
    }

    fn batch_config(strategy_type: &StrategyType) -> Option<BatchConfig> {
        // Small batches so requests straddle batch boundaries
        matches!(strategy_type, StrategyType::Async).then(|| BatchConfig::new(3, 4))
    }

    /// Process a fixture's requests.csv and return the balances output
    fn process_fixture(
        fixture_name: &str,
        strategy_type: StrategyType,
        ledger: Option<PathBuf>,
    ) -> String {
        let requests_path = format!("tests/fixtures/{}/requests.csv", fixture_name);
        assert!(
            Path::new(&requests_path).exists(),
            "Requests file not found: {}",
            requests_path
        );

        let config = batch_config(&strategy_type);
        let strategy = create_strategy(strategy_type, run_config(ledger), config);

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        strategy
            .process(Path::new(&requests_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to process requests: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e))
    }

    fn parse_balances(csv: &str) -> HashMap<String, i64> {
        csv.lines()
            .skip(1)
            .map(|line| {
                let (customer, points) = line.split_once(',').unwrap();
                (customer.to_string(), points.parse().unwrap())
            })
            .collect()
    }

    fn opening_balances() -> HashMap<String, i64> {
        fs::read_to_string(format!("{}/customers.csv", CATALOG_DIR))
            .unwrap()
            .lines()
            .skip(1)
            .map(|line| {
                let fields: Vec<&str> = line.split(',').collect();
                (fields[0].to_string(), fields[4].parse().unwrap())
            })
            .collect()
    }

    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_points")]
    #[case("validity_window")]
    #[case("multi_item_requests")]
    #[case("invalid_references")]
    #[case("malformed_data")]
    #[case("idempotency_keys")]
    #[case("multiple_customers")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let expected_path = format!("tests/fixtures/{}/expected.csv", fixture);
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        let actual_output = process_fixture(fixture, strategy.clone(), None);

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture, strategy, actual_output, expected_output
        );
    }

    /// The ledger accounts for every point spent
    ///
    /// For each customer, the committed totals in the ledger add up to the
    /// difference between the opening and the final balance, and each
    /// transaction's total equals the sum of its item totals.
    #[rstest]
    #[case("happy_path")]
    #[case("multi_item_requests")]
    #[case("idempotency_keys")]
    #[case("multiple_customers")]
    fn test_ledger_matches_balances(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let ledger = NamedTempFile::new().expect("Failed to create ledger file");
        let output = process_fixture(fixture, strategy, Some(ledger.path().to_path_buf()));

        let opening = opening_balances();
        let closing = parse_balances(&output);

        let mut spent: HashMap<String, i64> = HashMap::new();
        for line in fs::read_to_string(ledger.path()).unwrap().lines() {
            let view: serde_json::Value = serde_json::from_str(line).unwrap();
            let total = view["total_points"].as_i64().unwrap();
            let items_total: i64 = view["items"]
                .as_array()
                .unwrap()
                .iter()
                .map(|item| {
                    assert_eq!(
                        item["total_points"].as_i64().unwrap(),
                        item["quantity"].as_i64().unwrap()
                            * item["points_per_unit"].as_i64().unwrap()
                    );
                    item["total_points"].as_i64().unwrap()
                })
                .sum();
            assert_eq!(items_total, total);
            assert_eq!(view["status"], "completed");

            let customer = view["customer_id"].as_str().unwrap().to_string();
            *spent.entry(customer).or_default() += total;
        }

        for (customer, closing_points) in &closing {
            let spent = spent.get(customer).copied().unwrap_or(0);
            assert_eq!(
                opening[customer] - spent,
                *closing_points,
                "customer {} in fixture {}",
                customer,
                fixture
            );
        }
    }

    #[rstest]
    fn test_missing_catalog_is_fatal(
        #[values(StrategyType::Sync, StrategyType::Async)] strategy_type: StrategyType,
    ) {
        let config = batch_config(&strategy_type);
        let run = RunConfig {
            catalog_dir: PathBuf::from("tests/fixtures/does_not_exist"),
            ..run_config(None)
        };
        let strategy = create_strategy(strategy_type, run, config);

        let mut output = Vec::new();
        let result = strategy.process(
            Path::new("tests/fixtures/happy_path/requests.csv"),
            &mut output,
        );

        assert!(result.unwrap_err().contains("brands.csv"));
        assert!(output.is_empty());
    }
}
