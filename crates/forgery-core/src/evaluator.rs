//! Per-build attribute resolution.
//!
//! An [`Evaluator`] is created for every build call. It resolves attribute
//! values on demand, memoizes them, and records which names were fetched.
//! Overrides seed the cache, so an overridden attribute's resolver never runs.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::attribute::{Attribute, RelationTarget};
use crate::error::{FixtureError, FixtureResult};
use crate::orchestrator::Orchestrator;
use crate::value::{FixtureName, Overrides, RelationArgs};

/// Lazy, memoizing attribute context of one build.
///
/// Cloning is cheap; clones share the same cache. Attribute blocks receive an
/// evaluator to express dependent attributes:
///
/// ```ignore
/// f.attr("email", |ev| async move {
///     let name = ev.attr("name").await?;
///     Ok::<_, FixtureError>(json!(format!("{}@example.com", name.as_str().unwrap_or_default())))
/// });
/// ```
#[derive(Clone)]
pub struct Evaluator {
	inner: Arc<EvaluatorInner>,
}

struct EvaluatorInner {
	fixture: String,
	strategy: String,
	attributes: HashMap<String, Attribute>,
	order: Vec<String>,
	override_names: Vec<String>,
	cache: Mutex<HashMap<String, Value>>,
	fetched: Mutex<Vec<String>>,
	resolving: Mutex<HashSet<String>>,
	orchestrator: Orchestrator,
}

impl Evaluator {
	/// Builds the resolver table from `attributes`; the last attribute with a
	/// given name wins.
	pub(crate) fn new(
		fixture: impl Into<String>,
		attributes: &[Attribute],
		overrides: Overrides,
		strategy: impl Into<String>,
		orchestrator: Orchestrator,
	) -> Self {
		let mut table = HashMap::new();
		for attribute in attributes.iter().rev() {
			table
				.entry(attribute.name().to_string())
				.or_insert_with(|| attribute.clone());
		}

		let mut seen = HashSet::new();
		let order = attributes
			.iter()
			.filter(|a| seen.insert(a.name()))
			.map(|a| a.name().to_string())
			.collect();
		let override_names = overrides.keys().cloned().collect();

		Self {
			inner: Arc::new(EvaluatorInner {
				fixture: fixture.into(),
				strategy: strategy.into(),
				attributes: table,
				order,
				override_names,
				cache: Mutex::new(overrides.into_iter().collect()),
				fetched: Mutex::new(Vec::new()),
				resolving: Mutex::new(HashSet::new()),
				orchestrator,
			}),
		}
	}

	/// Fixture being built.
	pub fn fixture_name(&self) -> &str {
		&self.inner.fixture
	}

	/// Strategy of the enclosing build.
	pub fn strategy_name(&self) -> &str {
		&self.inner.strategy
	}

	/// Orchestrator running this build.
	pub fn orchestrator(&self) -> &Orchestrator {
		&self.inner.orchestrator
	}

	/// Resolves `name`.
	///
	/// Cached and overridden values are returned without running a resolver.
	/// Names with neither a cached value nor a resolver read as `Value::Null`.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::CyclicAttribute`] when `name` is requested
	/// again while its own resolver is still running, and propagates resolver
	/// failures. The in-progress mark is shared by every clone, so awaiting the
	/// same unresolved name from two branches of one `join` also reports a
	/// cycle; resolve it once first and the second read is a cache hit.
	pub async fn attr(&self, name: &str) -> FixtureResult<Value> {
		self.mark_fetched(name);

		let cached = self.inner.cache.lock().get(name).cloned();
		if let Some(value) = cached {
			tracing::trace!(fixture = %self.inner.fixture, attribute = name, "attribute cache hit");
			return Ok(value);
		}
		let Some(attribute) = self.inner.attributes.get(name) else {
			return Ok(Value::Null);
		};

		if !self.inner.resolving.lock().insert(name.to_string()) {
			return Err(FixtureError::CyclicAttribute {
				fixture: self.inner.fixture.clone(),
				attribute: name.to_string(),
			});
		}
		let guard = ResolvingGuard {
			evaluator: self,
			name,
		};
		tracing::trace!(fixture = %self.inner.fixture, attribute = name, "resolving attribute");
		let result = attribute.evaluate(self.clone()).await;
		drop(guard);

		let value = result?;
		self.inner
			.cache
			.lock()
			.insert(name.to_string(), value.clone());
		Ok(value)
	}

	/// Builds another fixture for use inside an attribute block.
	///
	/// The strategy is the explicit `args.strategy`, else the configured
	/// default strategy when parent strategies are not inherited, else this
	/// evaluator's own strategy.
	pub async fn relation(
		&self,
		fixture: impl Into<FixtureName>,
		args: impl Into<RelationArgs>,
	) -> FixtureResult<Value> {
		let args = args.into();
		let target = RelationTarget {
			fixtures: args
				.fixture
				.clone()
				.unwrap_or_else(|| vec![fixture.into().into_string()]),
			strategy: args.strategy.clone(),
			args: args.build_args(),
		};
		self.resolve_target(&target).await
	}

	pub(crate) async fn resolve_target(&self, target: &RelationTarget) -> FixtureResult<Value> {
		let strategy_name = self.relation_strategy(target.strategy.as_deref());
		let strategy = self.inner.orchestrator.strategy_for(&strategy_name)?;
		tracing::debug!(
			fixture = %self.inner.fixture,
			targets = ?target.fixtures,
			strategy = %strategy_name,
			"resolving relation"
		);

		if let [single] = target.fixtures.as_slice() {
			return strategy
				.association(&self.inner.orchestrator, single, target.args.clone())
				.await;
		}
		let mut values = Vec::with_capacity(target.fixtures.len());
		for fixture in &target.fixtures {
			values.push(
				strategy
					.association(&self.inner.orchestrator, fixture, target.args.clone())
					.await?,
			);
		}
		Ok(Value::Array(values))
	}

	fn relation_strategy(&self, explicit: Option<&str>) -> String {
		if let Some(strategy) = explicit {
			return strategy.to_string();
		}
		let config = self.inner.orchestrator.config();
		if config.use_parent_strategy {
			self.inner.strategy.clone()
		} else {
			config.default_strategy
		}
	}

	/// Names fetched so far, in first-fetch order.
	pub fn fetched(&self) -> Vec<String> {
		self.inner.fetched.lock().clone()
	}

	/// Returns true when `name` was fetched.
	pub fn was_fetched(&self, name: &str) -> bool {
		self.inner.fetched.lock().iter().any(|n| n == name)
	}

	/// Returns true when `name` is declared transient.
	pub fn is_ignored(&self, name: &str) -> bool {
		self.inner
			.attributes
			.get(name)
			.is_some_and(Attribute::is_ignored)
	}

	/// Returns true when `name` is a relation attribute.
	pub fn is_relation(&self, name: &str) -> bool {
		self.inner
			.attributes
			.get(name)
			.is_some_and(Attribute::is_relation)
	}

	/// Declared names followed by override-only names, transient names removed.
	pub(crate) fn assignable_names(&self) -> Vec<String> {
		let declared = self.inner.order.iter();
		let extra = self
			.inner
			.override_names
			.iter()
			.filter(|n| !self.inner.attributes.contains_key(*n));
		declared
			.chain(extra)
			.filter(|n| !self.is_ignored(n))
			.cloned()
			.collect()
	}

	fn mark_fetched(&self, name: &str) {
		let mut fetched = self.inner.fetched.lock();
		if !fetched.iter().any(|n| n == name) {
			fetched.push(name.to_string());
		}
	}
}

impl fmt::Debug for Evaluator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Evaluator")
			.field("fixture", &self.inner.fixture)
			.field("strategy", &self.inner.strategy)
			.field("attributes", &self.inner.order)
			.finish()
	}
}

/// Clears an attribute's in-progress mark once its resolver finishes or its
/// future is dropped.
struct ResolvingGuard<'a> {
	evaluator: &'a Evaluator,
	name: &'a str,
}

impl Drop for ResolvingGuard<'_> {
	fn drop(&mut self) {
		self.evaluator.inner.resolving.lock().remove(self.name);
	}
}
