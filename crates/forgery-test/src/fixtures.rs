//! rstest fixtures.

use std::sync::Arc;

use forgery_core::{ForgeryConfig, Orchestrator};
use rstest::fixture;

use crate::logging::init_test_logging;
use crate::mock::RecordingAdapter;

/// Fresh orchestrator with default configuration and the in-memory adapter.
#[fixture]
pub fn orchestrator() -> Orchestrator {
	init_test_logging();
	Orchestrator::new()
}

/// Orchestrator whose relations always use the create strategy.
#[fixture]
pub fn create_associations_orchestrator() -> Orchestrator {
	init_test_logging();
	Orchestrator::with_config(ForgeryConfig::new().with_use_parent_strategy(false))
}

/// Empty recording adapter.
#[fixture]
pub fn recording_adapter() -> RecordingAdapter {
	RecordingAdapter::new()
}

/// Fresh orchestrator using a recording adapter, returned alongside it.
#[fixture]
pub fn recorded_orchestrator(recording_adapter: RecordingAdapter) -> (Orchestrator, RecordingAdapter) {
	init_test_logging();
	let orchestrator = Orchestrator::new();
	orchestrator.set_adapter(Arc::new(recording_adapter.clone()));
	(orchestrator, recording_adapter)
}
