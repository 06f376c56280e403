//! Build strategies.
//!
//! A strategy decides how far a prepared build is materialized and how nested
//! relations are resolved. Three are registered on every orchestrator:
//!
//! | Strategy | Result | Nested relations |
//! |----------|--------|------------------|
//! | `attributes_for` | plain object | not instantiated |
//! | `build` | adapter instance | built |
//! | `create` | saved adapter instance | created |
//!
//! Further strategies can be added with
//! [`Orchestrator::register_strategy`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::assembler::Assembler;
use crate::callback::{AFTER_BUILD, AFTER_CREATE, BEFORE_BUILD, BEFORE_CREATE};
use crate::error::FixtureResult;
use crate::orchestrator::Orchestrator;
use crate::value::BuildArgs;

/// Name of the attributes-only strategy.
pub const ATTRIBUTES_FOR: &str = "attributes_for";
/// Name of the build strategy.
pub const BUILD: &str = "build";
/// Name of the create strategy.
pub const CREATE: &str = "create";

/// Execution mode of a build.
///
/// # Example
///
/// ```ignore
/// struct StubStrategy;
///
/// #[async_trait]
/// impl Strategy for StubStrategy {
///     fn name(&self) -> &str {
///         "stub"
///     }
///
///     async fn run(&self, assembler: &Assembler) -> FixtureResult<Value> {
///         let mut object = assembler.to_object().await?;
///         object["id"] = json!(1001);
///         Ok(object)
///     }
/// }
///
/// orchestrator.register_strategy(Arc::new(StubStrategy))?;
/// let stub = orchestrator.strategy("stub")?.run("user", ()).await?;
/// ```
#[async_trait]
pub trait Strategy: Send + Sync {
	/// Registered name.
	fn name(&self) -> &str;

	/// Turns a prepared build into its result.
	async fn run(&self, assembler: &Assembler) -> FixtureResult<Value>;

	/// Resolves a nested relation target.
	///
	/// The default runs `fixture` with this same strategy.
	async fn association(
		&self,
		orchestrator: &Orchestrator,
		fixture: &str,
		args: BuildArgs,
	) -> FixtureResult<Value> {
		orchestrator.run(fixture, self.name(), args).await
	}
}

/// Collects a plain attribute object and never instantiates anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributesForStrategy;

#[async_trait]
impl Strategy for AttributesForStrategy {
	fn name(&self) -> &str {
		ATTRIBUTES_FOR
	}

	async fn run(&self, assembler: &Assembler) -> FixtureResult<Value> {
		assembler.to_object().await
	}

	async fn association(
		&self,
		orchestrator: &Orchestrator,
		fixture: &str,
		args: BuildArgs,
	) -> FixtureResult<Value> {
		orchestrator
			.run_with(fixture, Arc::new(NullStrategy), args)
			.await
	}
}

/// Prepares the nested fixture and yields `null` without evaluating it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStrategy;

#[async_trait]
impl Strategy for NullStrategy {
	fn name(&self) -> &str {
		"null"
	}

	async fn run(&self, _assembler: &Assembler) -> FixtureResult<Value> {
		Ok(Value::Null)
	}

	async fn association(
		&self,
		_orchestrator: &Orchestrator,
		_fixture: &str,
		_args: BuildArgs,
	) -> FixtureResult<Value> {
		Ok(Value::Null)
	}
}

/// Instantiates through the adapter without persisting.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStrategy;

impl BuildStrategy {
	async fn build(assembler: &Assembler) -> FixtureResult<Value> {
		let instance = assembler.bare_instance().await?;
		let instance = assembler.run_callbacks(BEFORE_BUILD, instance).await?;
		let instance = assembler.assign(instance).await?;
		assembler.run_callbacks(AFTER_BUILD, instance).await
	}
}

#[async_trait]
impl Strategy for BuildStrategy {
	fn name(&self) -> &str {
		BUILD
	}

	async fn run(&self, assembler: &Assembler) -> FixtureResult<Value> {
		Self::build(assembler).await
	}
}

/// Builds, then saves through the adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateStrategy;

#[async_trait]
impl Strategy for CreateStrategy {
	fn name(&self) -> &str {
		CREATE
	}

	async fn run(&self, assembler: &Assembler) -> FixtureResult<Value> {
		let instance = BuildStrategy::build(assembler).await?;
		let instance = assembler.run_callbacks(BEFORE_CREATE, instance).await?;
		let instance = assembler.save(instance).await?;
		assembler.track_created(&instance);
		assembler.run_callbacks(AFTER_CREATE, instance).await
	}
}

/// Strategies every orchestrator starts with.
pub(crate) fn builtin() -> Vec<Arc<dyn Strategy>> {
	vec![
		Arc::new(AttributesForStrategy),
		Arc::new(BuildStrategy),
		Arc::new(CreateStrategy),
	]
}
