//! Integration tests for orchestrator configuration and registry lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use forgery_core::prelude::*;
use forgery_test::RecordingAdapter;
use forgery_test::fixtures::orchestrator;
use rstest::rstest;
use serde_json::json;

#[rstest]
fn test_toml_then_environment() {
	// Arrange
	let source = r#"
		use_parent_strategy = false
		default_strategy = "build"
	"#;
	let env: HashMap<&str, &str> = HashMap::from([
		("FORGERY_DEFAULT_STRATEGY", "create"),
		("FORGERY_LIST_SIZE_LIMIT", "10"),
	]);

	// Act
	let config = ForgeryConfig::from_toml_str(source)
		.unwrap()
		.with_overrides_from(|key| env.get(key).map(|v| v.to_string()))
		.unwrap();

	// Assert
	assert!(!config.use_parent_strategy);
	assert_eq!(config.default_strategy, "create");
	assert_eq!(config.list_size_limit, Some(10));
}

#[rstest]
#[tokio::test]
async fn test_list_size_limit_is_enforced() {
	// Arrange
	let orchestrator = Orchestrator::with_config(ForgeryConfig::new().with_list_size_limit(2));
	orchestrator
		.fixture("user", "User", FixtureOptions::new(), |_| Ok(()))
		.unwrap();

	// Act
	let within = orchestrator.build_list("user", 2, ()).await;
	let beyond = orchestrator.build_list("user", 3, ()).await;

	// Assert
	assert_eq!(within.unwrap().len(), 2);
	assert!(matches!(beyond, Err(FixtureError::Configuration(_))));
}

#[rstest]
#[tokio::test]
async fn test_default_strategy_for_relations(orchestrator: Orchestrator) {
	// Arrange
	let adapter = RecordingAdapter::new();
	orchestrator.set_adapter(Arc::new(adapter.clone()));
	orchestrator.set_config(
		ForgeryConfig::new()
			.with_use_parent_strategy(false)
			.with_default_strategy("build"),
	);
	orchestrator
		.fixture("company", "Company", FixtureOptions::new(), |f| {
			f.value("name", "Acme");
			Ok(())
		})
		.unwrap();
	orchestrator
		.fixture("user", "User", FixtureOptions::new(), |f| {
			f.association("company", ());
			Ok(())
		})
		.unwrap();

	// Act
	let user = orchestrator.create("user", ()).await.unwrap();

	// Assert
	assert_eq!(user["company"], json!({"name": "Acme"}));
	assert_eq!(adapter.saved_models().await, vec!["User"]);
}

#[rstest]
#[tokio::test]
async fn test_reset_keeps_configuration(orchestrator: Orchestrator) {
	// Arrange
	orchestrator.set_config(ForgeryConfig::new().with_list_size_limit(5));
	orchestrator
		.fixture("user", "User", FixtureOptions::new(), |_| Ok(()))
		.unwrap();
	orchestrator
		.define_sequence("serial", SequenceOptions::new())
		.unwrap();

	// Act
	orchestrator.reset();

	// Assert
	assert!(!orchestrator.has_fixture("user"));
	assert!(orchestrator.sequence("serial").is_none());
	assert_eq!(orchestrator.config().list_size_limit, Some(5));
	orchestrator
		.fixture("user", "User", FixtureOptions::new(), |_| Ok(()))
		.unwrap();
}

#[rstest]
fn test_orchestrators_are_independent() {
	let first = Orchestrator::new();
	let second = Orchestrator::new();

	first
		.fixture("user", "User", FixtureOptions::new(), |_| Ok(()))
		.unwrap();

	assert!(first.has_fixture("user"));
	assert!(!second.has_fixture("user"));
	assert!(first.clone().has_fixture("user"));
}
