//! Registry and entry point.
//!
//! An [`Orchestrator`] owns every fixture, trait, sequence, callback, adapter,
//! and strategy it knows about. Orchestrators are independent of each other;
//! cloning one yields a handle to the same registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::adapter::{Adapter, AdapterRegistry};
use crate::callback::{self, Callback};
use crate::config::ForgeryConfig;
use crate::definition::{
	DefinitionBlock, DefinitionBody, DefinitionDsl, Fixture, FixtureDef, FixtureOptions, Trait,
};
use crate::error::{FixtureError, FixtureResult};
use crate::evaluator::Evaluator;
use crate::sequence::{Sequence, SequenceOptions, SequenceRegistry};
use crate::strategy::{self, ATTRIBUTES_FOR, BUILD, CREATE, Strategy};
use crate::value::{BuildArgs, FixtureName, Model};

/// Instance persisted by a create-like strategy.
pub(crate) struct CreatedInstance {
	pub(crate) instance: Value,
	pub(crate) model: Model,
	pub(crate) adapter: Arc<dyn Adapter>,
}

#[derive(Default)]
struct FixtureTable {
	by_name: HashMap<String, Arc<FixtureDef>>,
	order: Vec<String>,
}

/// Shared state behind an [`Orchestrator`].
pub(crate) struct Registry {
	config: RwLock<ForgeryConfig>,
	fixtures: RwLock<FixtureTable>,
	traits: RwLock<HashMap<String, Arc<Trait>>>,
	sequences: SequenceRegistry,
	callbacks: RwLock<Vec<Callback>>,
	adapters: AdapterRegistry,
	strategies: RwLock<HashMap<String, Arc<dyn Strategy>>>,
	created: Mutex<Vec<CreatedInstance>>,
}

impl Registry {
	fn new(config: ForgeryConfig) -> Self {
		Self {
			config: RwLock::new(config),
			fixtures: RwLock::new(FixtureTable::default()),
			traits: RwLock::new(HashMap::new()),
			sequences: SequenceRegistry::new(),
			callbacks: RwLock::new(Vec::new()),
			adapters: AdapterRegistry::new(),
			strategies: RwLock::new(builtin_strategies()),
			created: Mutex::new(Vec::new()),
		}
	}

	/// Fixture registered under `name` or one of its aliases.
	pub(crate) fn fixture(&self, name: &str) -> Option<Arc<FixtureDef>> {
		self.fixtures.read().by_name.get(name).cloned()
	}

	pub(crate) fn global_trait(&self, name: &str) -> Option<Arc<Trait>> {
		self.traits.read().get(name).cloned()
	}

	pub(crate) fn global_callbacks(&self) -> Vec<Callback> {
		self.callbacks.read().clone()
	}

	pub(crate) fn sequences(&self) -> &SequenceRegistry {
		&self.sequences
	}

	pub(crate) fn adapters(&self) -> &AdapterRegistry {
		&self.adapters
	}

	pub(crate) fn record_created(&self, created: CreatedInstance) {
		self.created.lock().push(created);
	}

	fn ensure_available<'a>(
		table: &FixtureTable,
		mut names: impl Iterator<Item = &'a str>,
	) -> FixtureResult<()> {
		match names.find(|name| table.by_name.contains_key(*name)) {
			Some(taken) => Err(FixtureError::DuplicateDefinition(format!(
				"fixture '{}'",
				taken
			))),
			None => Ok(()),
		}
	}

	fn insert_fixture(&self, def: Arc<FixtureDef>) -> FixtureResult<()> {
		let mut table = self.fixtures.write();
		Self::ensure_available(&table, def.names())?;
		for name in def.names() {
			table.by_name.insert(name.to_string(), Arc::clone(&def));
		}
		table.order.push(def.name().to_string());
		Ok(())
	}
}

fn builtin_strategies() -> HashMap<String, Arc<dyn Strategy>> {
	strategy::builtin()
		.into_iter()
		.map(|s| (s.name().to_string(), s))
		.collect()
}

/// Fixture registry and build entry point.
///
/// ```ignore
/// let orchestrator = Orchestrator::new();
/// orchestrator.fixture("user", "User", FixtureOptions::new(), |f| {
///     f.value("name", "Ann").value("age", 32);
///     f.define_trait("old", |t| {
///         t.value("age", 100);
///         Ok(())
///     })?;
///     Ok(())
/// })?;
///
/// let user = orchestrator.build("user", ["old"]).await?;
/// let users = orchestrator.create_list("user", 3, json!({"age": 50})).await?;
/// ```
#[derive(Clone)]
pub struct Orchestrator {
	registry: Arc<Registry>,
}

impl Orchestrator {
	/// Creates an orchestrator with default configuration.
	pub fn new() -> Self {
		Self::with_config(ForgeryConfig::default())
	}

	/// Creates an orchestrator with `config`.
	pub fn with_config(config: ForgeryConfig) -> Self {
		Self {
			registry: Arc::new(Registry::new(config)),
		}
	}

	pub(crate) fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Current configuration.
	pub fn config(&self) -> ForgeryConfig {
		self.registry.config.read().clone()
	}

	/// Replaces the configuration.
	pub fn set_config(&self, config: ForgeryConfig) {
		*self.registry.config.write() = config;
	}

	/// Registers a fixture under `name` and its aliases.
	///
	/// The block runs immediately. Child fixtures it declares are registered
	/// right after, with this fixture as their default parent.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::DuplicateDefinition`] when the name or an alias
	/// is taken, [`FixtureError::SelfReference`] when the fixture names itself
	/// as parent, and any error the block returns.
	pub fn fixture<F>(
		&self,
		name: impl Into<FixtureName>,
		model: impl Into<Model>,
		options: FixtureOptions,
		block: F,
	) -> FixtureResult<()>
	where
		F: FnOnce(&mut DefinitionDsl<'_>) -> FixtureResult<()> + 'static,
	{
		self.define(name.into().into_string(), model.into(), options, Box::new(block))
	}

	fn define(
		&self,
		name: String,
		model: Model,
		options: FixtureOptions,
		block: DefinitionBlock,
	) -> FixtureResult<()> {
		if options.parent.as_deref() == Some(name.as_str()) {
			return Err(FixtureError::SelfReference(name));
		}
		Registry::ensure_available(
			&self.registry.fixtures.read(),
			std::iter::once(name.as_str()).chain(options.aliases.iter().map(String::as_str)),
		)?;

		let mut children = Vec::new();
		let body = DefinitionBody::record(&name, Some(&mut children), block)?;
		self.registry.insert_fixture(Arc::new(FixtureDef::new(
			name.clone(),
			model,
			options,
			body,
		)))?;
		tracing::debug!(fixture = %name, children = children.len(), "registered fixture");

		for child in children {
			let mut options = child.options;
			if options.parent.is_none() {
				options.parent = Some(name.clone());
			}
			self.define(child.name, child.model, options, child.block)?;
		}
		Ok(())
	}

	/// Registers a trait visible to every fixture.
	pub fn define_trait<F>(&self, name: impl Into<String>, block: F) -> FixtureResult<()>
	where
		F: FnOnce(&mut DefinitionDsl<'_>) -> FixtureResult<()>,
	{
		let defined = Trait::new(name, block)?;
		let mut traits = self.registry.traits.write();
		if traits.contains_key(defined.name()) {
			return Err(FixtureError::DuplicateDefinition(format!(
				"trait '{}'",
				defined.name()
			)));
		}
		tracing::debug!(name = %defined.name(), "registered trait");
		traits.insert(defined.name().to_string(), Arc::new(defined));
		Ok(())
	}

	/// Registers a global sequence.
	pub fn define_sequence(
		&self,
		name: impl Into<String>,
		options: impl Into<SequenceOptions>,
	) -> FixtureResult<Arc<Sequence>> {
		self.registry
			.sequences
			.register(Sequence::new(name, options)?)
	}

	/// Global sequence registered under `name` or an alias.
	pub fn sequence(&self, name: &str) -> Option<Arc<Sequence>> {
		self.registry.sequences.get(name)
	}

	/// Resets global sequences and every sequence scoped to a fixture or trait.
	///
	/// Call only while no build is running.
	pub fn reset_sequences(&self) {
		self.registry.sequences.reset_all();
		let fixtures: Vec<Arc<FixtureDef>> = {
			let table = self.registry.fixtures.read();
			table
				.order
				.iter()
				.filter_map(|name| table.by_name.get(name).cloned())
				.collect()
		};
		for def in fixtures {
			def.reset_sequences();
		}
		for global in self.registry.traits.read().values() {
			global.reset_sequences();
		}
	}

	/// Binds a global callback to the `before_*` hooks named in `hooks`.
	pub fn before<F, Fut>(&self, hooks: &[&str], block: F) -> FixtureResult<()>
	where
		F: Fn(Value, Evaluator) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = FixtureResult<Value>> + Send + 'static,
	{
		let bound = callback::bind("before", hooks, block)?;
		self.registry.callbacks.write().extend(bound);
		Ok(())
	}

	/// Binds a global callback to the `after_*` hooks named in `hooks`.
	pub fn after<F, Fut>(&self, hooks: &[&str], block: F) -> FixtureResult<()>
	where
		F: Fn(Value, Evaluator) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = FixtureResult<Value>> + Send + 'static,
	{
		let bound = callback::bind("after", hooks, block)?;
		self.registry.callbacks.write().extend(bound);
		Ok(())
	}

	/// Replaces the adapter used by fixtures without their own.
	pub fn set_adapter(&self, adapter: Arc<dyn Adapter>) {
		self.registry.adapters.set_current(adapter);
	}

	/// Sets the adapter for one fixture name or alias.
	pub fn set_adapter_for(&self, fixture: impl Into<FixtureName>, adapter: Arc<dyn Adapter>) {
		self.registry
			.adapters
			.set_for(fixture.into().as_str(), adapter);
	}

	/// Registers a custom strategy under its name.
	pub fn register_strategy(&self, strategy: Arc<dyn Strategy>) -> FixtureResult<()> {
		let mut strategies = self.registry.strategies.write();
		if strategies.contains_key(strategy.name()) {
			return Err(FixtureError::DuplicateDefinition(format!(
				"strategy '{}'",
				strategy.name()
			)));
		}
		tracing::debug!(strategy = %strategy.name(), "registered strategy");
		strategies.insert(strategy.name().to_string(), strategy);
		Ok(())
	}

	/// Strategy registered under `name`.
	pub fn strategy_for(&self, name: &str) -> FixtureResult<Arc<dyn Strategy>> {
		self.registry
			.strategies
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| FixtureError::UnknownStrategy(name.to_string()))
	}

	/// Handle exposing the single, list, and pair calls of a strategy.
	pub fn strategy(&self, name: &str) -> FixtureResult<StrategyHandle> {
		self.strategy_for(name)?;
		Ok(StrategyHandle {
			orchestrator: self.clone(),
			strategy: name.to_string(),
		})
	}

	/// Returns true when `name` is a registered fixture name or alias.
	pub fn has_fixture(&self, name: impl Into<FixtureName>) -> bool {
		self.registry.fixture(name.into().as_str()).is_some()
	}

	/// Canonical fixture names in registration order.
	pub fn fixture_names(&self) -> Vec<String> {
		self.registry.fixtures.read().order.clone()
	}

	/// Runs fixture `name` with the strategy registered as `strategy`.
	pub fn run(
		&self,
		name: impl Into<FixtureName>,
		strategy: &str,
		args: impl Into<BuildArgs>,
	) -> BoxFuture<'static, FixtureResult<Value>> {
		let orchestrator = self.clone();
		let name = name.into().into_string();
		let strategy = self.strategy_for(strategy);
		let args = args.into();
		async move { orchestrator.run_with(&name, strategy?, args).await }.boxed()
	}

	/// Runs fixture `name` with an explicit strategy instance.
	pub async fn run_with(
		&self,
		name: &str,
		strategy: Arc<dyn Strategy>,
		args: BuildArgs,
	) -> FixtureResult<Value> {
		let def = self
			.registry
			.fixture(name)
			.ok_or_else(|| FixtureError::UnknownFixture(name.to_string()))?;
		let fixture = Fixture::new(def).with_traits(args.traits);
		tracing::debug!(fixture = %fixture.name(), strategy = %strategy.name(), "running fixture");

		let assembler = fixture.prepare(self, strategy.name(), args.overrides)?;
		strategy.run(&assembler).await
	}

	/// Runs fixture `name` `count` times, one after another.
	///
	/// A list modifier on `args` receives each result with its index.
	pub async fn run_list(
		&self,
		name: impl Into<FixtureName>,
		strategy: &str,
		count: usize,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Vec<Value>> {
		self.config().check_list_size(count)?;
		let name = name.into().into_string();
		let strategy = self.strategy_for(strategy)?;
		let mut args = args.into();
		let modifier = args.take_modifier();

		let mut items = Vec::with_capacity(count);
		for index in 0..count {
			let item = self
				.run_with(&name, Arc::clone(&strategy), args.clone())
				.await?;
			items.push(match &modifier {
				Some(modify) => modify(item, index),
				None => item,
			});
		}
		Ok(items)
	}

	/// Runs fixture `name` twice.
	pub async fn run_pair(
		&self,
		name: impl Into<FixtureName>,
		strategy: &str,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<(Value, Value)> {
		let items = self.run_list(name, strategy, 2, args).await?;
		let [first, second]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
			FixtureError::Configuration(format!("pair produced {} items", items.len()))
		})?;
		Ok((first, second))
	}

	/// Plain attribute object of fixture `name`.
	pub async fn attributes_for(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Value> {
		self.run(name, ATTRIBUTES_FOR, args).await
	}

	/// `count` attribute objects.
	pub async fn attributes_for_list(
		&self,
		name: impl Into<FixtureName>,
		count: usize,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Vec<Value>> {
		self.run_list(name, ATTRIBUTES_FOR, count, args).await
	}

	/// Two attribute objects.
	pub async fn attributes_for_pair(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<(Value, Value)> {
		self.run_pair(name, ATTRIBUTES_FOR, args).await
	}

	/// Unsaved instance of fixture `name`.
	pub async fn build(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Value> {
		self.run(name, BUILD, args).await
	}

	/// `count` unsaved instances.
	pub async fn build_list(
		&self,
		name: impl Into<FixtureName>,
		count: usize,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Vec<Value>> {
		self.run_list(name, BUILD, count, args).await
	}

	/// Two unsaved instances.
	pub async fn build_pair(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<(Value, Value)> {
		self.run_pair(name, BUILD, args).await
	}

	/// Saved instance of fixture `name`.
	pub async fn create(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Value> {
		self.run(name, CREATE, args).await
	}

	/// `count` saved instances.
	pub async fn create_list(
		&self,
		name: impl Into<FixtureName>,
		count: usize,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Vec<Value>> {
		self.run_list(name, CREATE, count, args).await
	}

	/// Two saved instances.
	pub async fn create_pair(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<(Value, Value)> {
		self.run_pair(name, CREATE, args).await
	}

	/// [`attributes_for`](Self::attributes_for) deserialized into `T`.
	pub async fn attributes_for_as<T: DeserializeOwned>(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<T> {
		Ok(serde_json::from_value(self.attributes_for(name, args).await?)?)
	}

	/// [`build`](Self::build) deserialized into `T`.
	pub async fn build_as<T: DeserializeOwned>(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<T> {
		Ok(serde_json::from_value(self.build(name, args).await?)?)
	}

	/// [`create`](Self::create) deserialized into `T`.
	pub async fn create_as<T: DeserializeOwned>(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<T> {
		Ok(serde_json::from_value(self.create(name, args).await?)?)
	}

	/// Destroys every instance persisted so far, newest first, and returns how
	/// many were destroyed.
	///
	/// Instances are forgotten even when an adapter fails; the first failure
	/// is returned after all destroys were attempted.
	pub async fn cleanup(&self) -> FixtureResult<usize> {
		let created = std::mem::take(&mut *self.registry.created.lock());
		let total = created.len();
		let mut first_error = None;
		for record in created.into_iter().rev() {
			if let Err(error) = record.adapter.destroy(record.instance, &record.model).await {
				tracing::warn!(model = %record.model, error = %error, "cleanup destroy failed");
				if first_error.is_none() {
					first_error = Some(error);
				}
			}
		}
		tracing::debug!(destroyed = total, "cleaned up created instances");
		match first_error {
			Some(error) => Err(error),
			None => Ok(total),
		}
	}

	/// Forgets every fixture, trait, sequence, callback, adapter, custom
	/// strategy, and tracked instance. Configuration is kept.
	pub fn reset(&self) {
		*self.registry.fixtures.write() = FixtureTable::default();
		self.registry.traits.write().clear();
		self.registry.sequences.clear();
		self.registry.callbacks.write().clear();
		self.registry.adapters.clear();
		*self.registry.strategies.write() = builtin_strategies();
		self.registry.created.lock().clear();
		tracing::debug!("reset orchestrator");
	}
}

impl Default for Orchestrator {
	fn default() -> Self {
		Self::new()
	}
}

/// Single, list, and pair calls bound to one strategy name.
#[derive(Clone)]
pub struct StrategyHandle {
	orchestrator: Orchestrator,
	strategy: String,
}

impl StrategyHandle {
	/// Strategy name.
	pub fn name(&self) -> &str {
		&self.strategy
	}

	/// Runs fixture `name` once.
	pub async fn run(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Value> {
		self.orchestrator.run(name, &self.strategy, args).await
	}

	/// Runs fixture `name` `count` times.
	pub async fn list(
		&self,
		name: impl Into<FixtureName>,
		count: usize,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<Vec<Value>> {
		self.orchestrator
			.run_list(name, &self.strategy, count, args)
			.await
	}

	/// Runs fixture `name` twice.
	pub async fn pair(
		&self,
		name: impl Into<FixtureName>,
		args: impl Into<BuildArgs>,
	) -> FixtureResult<(Value, Value)> {
		self.orchestrator.run_pair(name, &self.strategy, args).await
	}
}
