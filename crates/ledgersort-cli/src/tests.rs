//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::{Path, PathBuf};

use ledgersort_core::{
    ai::BackendEnv, export::ExportFormat, test_utils::MockModelServer, AIClient, MockBackend,
    MockRule, ResolutionStage,
};
use tempfile::TempDir;

use crate::commands::{self, Overrides};

const GENERAL: &str = "short_description,category
comcast cable,Operating Expenses: Utilities
square inc,Revenue: Sales
adp payroll,Operating Expenses: Payroll
";

const RESTAURANT: &str = "short_description,category
sysco foods,Cost of Goods Sold: Food
";

const RANGES: &str = "parent_category,min_amount,max_amount
Revenue,100,5000
Operating Expenses,-5000,-50
";

const TRANSACTIONS_CSV: &str = "id,date,description,amount
1,03/01/2024,SYSCO FOODS 03/01,-250.00
2,03/02/2024,SQUARE INC 123456,\"1,200.00\"
3,03/03/2024,ZELLE TO MARIA,-40.00
4,03/17/2024,ZELLE TO MARIA,-60.00
";

/// Temp workspace with dictionaries, a config file and a transaction file
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let dicts = dir.path().join("dictionaries");
        std::fs::create_dir_all(dicts.join("ranges")).unwrap();
        std::fs::write(dicts.join("general_categories.csv"), GENERAL).unwrap();
        std::fs::write(dicts.join("restaurant_categories.csv"), RESTAURANT).unwrap();
        std::fs::write(dicts.join("ranges/parent_category_ranges.csv"), RANGES).unwrap();
        std::fs::write(dir.path().join("transactions.csv"), TRANSACTIONS_CSV).unwrap();

        let config = format!(
            "[dictionaries]\ndir = \"{}\"\nindustry = \"restaurant\"\n\n[model]\nretry_backoff_ms = 1\n",
            dicts.display()
        );
        std::fs::write(dir.path().join("ledgersort.toml"), config).unwrap();

        Self { dir }
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("ledgersort.toml")
    }

    fn input(&self) -> PathBuf {
        self.dir.path().join("transactions.csv")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn zelle_rule() -> Vec<MockRule> {
    vec![MockRule::new("zelle", "Operating Expenses: Payroll", 0.75)]
}

// ========== Config Tests ==========

#[test]
fn test_load_config_applies_overrides() {
    let fixture = Fixture::new();
    let overrides = Overrides {
        industry: Some("dental".into()),
        threshold: Some(0.9),
        batch_size: Some(2),
        ..Default::default()
    };

    let config = commands::load_config(Some(&fixture.config_path()), &overrides).unwrap();
    assert_eq!(config.dictionaries.industry, "dental");
    assert_eq!(config.confidence_threshold, 0.9);
    assert_eq!(config.batch_size, 2);
    assert_eq!(config.dictionaries.dir, fixture.path("dictionaries"));
}

#[test]
fn test_load_config_rejects_invalid_override() {
    let fixture = Fixture::new();
    let overrides = Overrides {
        threshold: Some(1.5),
        ..Default::default()
    };
    assert!(commands::load_config(Some(&fixture.config_path()), &overrides).is_err());

    let overrides = Overrides {
        batch_size: Some(0),
        ..Default::default()
    };
    assert!(commands::load_config(Some(&fixture.config_path()), &overrides).is_err());
}

#[test]
fn test_load_config_missing_file() {
    let result = commands::load_config(
        Some(Path::new("/nonexistent/ledgersort.toml")),
        &Overrides::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_resolve_format() {
    assert_eq!(
        commands::resolve_format(Some("json"), None).unwrap(),
        ExportFormat::Json
    );
    assert_eq!(
        commands::resolve_format(None, Some(Path::new("out.json"))).unwrap(),
        ExportFormat::Json
    );
    assert_eq!(
        commands::resolve_format(Some("csv"), Some(Path::new("out.json"))).unwrap(),
        ExportFormat::Csv
    );
    assert_eq!(commands::resolve_format(None, None).unwrap(), ExportFormat::Csv);
    assert!(commands::resolve_format(Some("xlsx"), None).is_err());
}

// ========== Categorize Command Tests ==========

#[tokio::test]
async fn test_run_categorize_dictionaries_only() {
    let fixture = Fixture::new();
    let config =
        commands::load_config(Some(&fixture.config_path()), &Overrides::default()).unwrap();

    let output = commands::run_categorize(&config, &fixture.input(), None)
        .await
        .unwrap();

    assert_eq!(output.stats.total, 4);
    assert_eq!(output.stats.industry_resolved, 1);
    assert_eq!(output.stats.general_resolved, 1);
    assert_eq!(output.stats.sent_to_model, 2);
    assert_eq!(output.stats.unresolved, 2);
}

#[tokio::test]
async fn test_run_categorize_groups_model_calls() {
    let fixture = Fixture::new();
    let config =
        commands::load_config(Some(&fixture.config_path()), &Overrides::default()).unwrap();
    let mock = MockBackend::with_rules(zelle_rule());

    let output = commands::run_categorize(
        &config,
        &fixture.input(),
        Some(AIClient::Mock(mock.clone())),
    )
    .await
    .unwrap();

    // Both ZELLE rows collapse into one group and one call
    assert_eq!(mock.calls(), 1);
    assert!(mock.prompts()[0].contains("2 times in 15 days"));
    assert_eq!(output.stats.groups, 1);
    assert_eq!(output.stats.model_resolved, 2);
    assert_eq!(output.transactions[3].resolved_by, ResolutionStage::Model);
}

#[tokio::test]
async fn test_run_categorize_against_mock_server() {
    let fixture = Fixture::new();
    let config =
        commands::load_config(Some(&fixture.config_path()), &Overrides::default()).unwrap();
    let server = MockModelServer::start(zelle_rule()).await;
    let env = BackendEnv {
        backend: Some("ollama".into()),
        ollama_host: Some(server.url()),
        ..Default::default()
    };
    let client = AIClient::from_parts(&config.model, &env).unwrap();

    let output = commands::run_categorize(&config, &fixture.input(), client)
        .await
        .unwrap();

    assert_eq!(server.requests(), 1);
    assert_eq!(output.stats.model_resolved, 2);
}

#[tokio::test]
async fn test_run_categorize_missing_input() {
    let fixture = Fixture::new();
    let config =
        commands::load_config(Some(&fixture.config_path()), &Overrides::default()).unwrap();

    let result = commands::run_categorize(&config, &fixture.path("missing.csv"), None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cmd_categorize_writes_json_output() {
    let fixture = Fixture::new();
    let output = fixture.path("out.json");

    commands::cmd_categorize(
        Some(&fixture.config_path()),
        &Overrides::default(),
        &fixture.input(),
        Some(&output),
        None,
        true,
    )
    .await
    .unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written.as_array().unwrap().len(), 4);
    assert_eq!(written[0]["resolved_by"], "industry_dictionary");
    assert_eq!(written[1]["general_category"], "Revenue: Sales");
}

#[test]
fn test_print_stats() {
    let stats = ledgersort_core::PipelineStats {
        total: 4,
        failed_batches: 1,
        batches: 2,
        ..Default::default()
    };
    let mut out = Vec::new();
    commands::print_stats(&mut out, &stats).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("Transactions:         4"));
    assert!(text.contains("Failed batches: 1 of 2"));
    assert!(!text.contains("Processing errors"));
}

// ========== Matching Command Tests ==========

#[test]
fn test_cmd_normalize() {
    let descriptions = vec!["SYSCO FOODS 01/02".to_string(), "NETFLIX.COM 123".to_string()];
    assert!(commands::cmd_normalize(&descriptions).is_ok());
}

#[test]
fn test_cmd_match() {
    let fixture = Fixture::new();
    let result = commands::cmd_match(
        Some(&fixture.config_path()),
        &Overrides::default(),
        "SYSCO FOODS 01/02",
    );
    assert!(result.is_ok());
}

#[test]
fn test_cmd_match_missing_dictionaries() {
    let fixture = Fixture::new();
    let overrides = Overrides {
        dictionaries: Some(fixture.path("nowhere")),
        ..Default::default()
    };
    assert!(commands::cmd_match(Some(&fixture.config_path()), &overrides, "SYSCO").is_err());
}

// ========== Prompts / Health Command Tests ==========

#[test]
fn test_cmd_prompts() {
    assert!(commands::cmd_prompts_list().is_ok());
    assert!(commands::cmd_prompts_show("categorize_transactions").is_ok());
    assert!(commands::cmd_prompts_show("no_such_prompt").is_ok());
    assert!(commands::cmd_prompts_path().is_ok());
}

#[tokio::test]
async fn test_check_backend() {
    assert!(commands::check_backend(&AIClient::mock()).await);
    assert!(!commands::check_backend(&AIClient::Mock(MockBackend::unhealthy())).await);
}
