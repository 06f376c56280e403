//! Lifecycle callbacks bound to named hooks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{FixtureError, FixtureResult};
use crate::evaluator::Evaluator;

/// Fires on the bare instance before attributes are assigned.
pub const BEFORE_BUILD: &str = "before_build";
/// Fires on the populated instance.
pub const AFTER_BUILD: &str = "after_build";
/// Fires before a persisting strategy saves.
pub const BEFORE_CREATE: &str = "before_create";
/// Fires after a persisting strategy saved.
pub const AFTER_CREATE: &str = "after_create";

/// Most hooks one registration may bind.
const MAX_HOOKS_PER_CALLBACK: usize = 3;

/// Callback body: receives the instance and returns it, possibly modified.
pub type CallbackBlock =
	Arc<dyn Fn(Value, Evaluator) -> BoxFuture<'static, FixtureResult<Value>> + Send + Sync>;

/// Block bound to one hook name.
#[derive(Clone)]
pub struct Callback {
	name: String,
	block: CallbackBlock,
}

impl Callback {
	/// Creates a callback for the hook `name`.
	pub fn new<F, Fut>(name: impl Into<String>, block: F) -> Self
	where
		F: Fn(Value, Evaluator) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = FixtureResult<Value>> + Send + 'static,
	{
		Self {
			name: name.into(),
			block: Arc::new(move |instance: Value, evaluator: Evaluator| {
				block(instance, evaluator).boxed()
			}),
		}
	}

	/// Hook name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Runs the block.
	pub async fn call(&self, instance: Value, evaluator: Evaluator) -> FixtureResult<Value> {
		(self.block)(instance, evaluator).await
	}
}

impl fmt::Debug for Callback {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callback").field("name", &self.name).finish()
	}
}

/// Binds one block to up to three hooks, e.g. `("after", ["build", "create"])`
/// becomes `after_build` and `after_create`.
pub(crate) fn bind<F, Fut>(phase: &str, names: &[&str], block: F) -> FixtureResult<Vec<Callback>>
where
	F: Fn(Value, Evaluator) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = FixtureResult<Value>> + Send + 'static,
{
	if names.is_empty() {
		return Err(FixtureError::InvalidCallback(format!(
			"{} callback needs at least one hook name",
			phase
		)));
	}
	if names.len() > MAX_HOOKS_PER_CALLBACK {
		return Err(FixtureError::InvalidCallback(format!(
			"{} callback binds {} hooks, at most {} allowed",
			phase,
			names.len(),
			MAX_HOOKS_PER_CALLBACK
		)));
	}
	if let Some(blank) = names.iter().find(|n| n.trim().is_empty()) {
		return Err(FixtureError::InvalidCallback(format!(
			"{} callback has a blank hook name {:?}",
			phase, blank
		)));
	}

	let shared: CallbackBlock = Arc::new(move |instance: Value, evaluator: Evaluator| {
		block(instance, evaluator).boxed()
	});
	Ok(names
		.iter()
		.map(|name| Callback {
			name: format!("{}_{}", phase, name),
			block: Arc::clone(&shared),
		})
		.collect())
}

/// Runs every callback named `hook` in order, threading the instance through.
pub(crate) async fn run_hook(
	callbacks: &[Callback],
	hook: &str,
	mut instance: Value,
	evaluator: &Evaluator,
) -> FixtureResult<Value> {
	for callback in callbacks.iter().filter(|c| c.name == hook) {
		tracing::trace!(hook, fixture = %evaluator.fixture_name(), "running callback");
		instance = callback.call(instance, evaluator.clone()).await?;
	}
	Ok(instance)
}
