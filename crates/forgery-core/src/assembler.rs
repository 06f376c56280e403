//! Materialization of evaluated attributes.
//!
//! [`AttributeAssigner`] decides which names surface in a result and resolves
//! them; [`Assembler`] combines it with the adapter, model, and callbacks a
//! strategy needs.

use std::sync::Arc;

use serde_json::Value;

use crate::adapter::Adapter;
use crate::callback::{self, Callback};
use crate::error::FixtureResult;
use crate::evaluator::Evaluator;
use crate::orchestrator::CreatedInstance;
use crate::value::{Model, Overrides};

/// Resolves the attribute names of one build.
#[derive(Debug, Clone)]
pub struct AttributeAssigner {
	evaluator: Evaluator,
}

impl AttributeAssigner {
	/// Wraps an evaluator.
	pub fn new(evaluator: Evaluator) -> Self {
		Self { evaluator }
	}

	/// Names assigned to instances: declared and overridden names without
	/// transient ones.
	pub fn names(&self) -> Vec<String> {
		self.evaluator.assignable_names()
	}

	/// Resolves every non-relation name into a plain map.
	pub async fn plain_attributes(&self) -> FixtureResult<Overrides> {
		let mut object = Overrides::new();
		for name in self.names() {
			if self.evaluator.is_relation(&name) {
				continue;
			}
			let value = self.evaluator.attr(&name).await?;
			object.insert(name, value);
		}
		Ok(object)
	}

	/// Resolves every name onto `instance`, relations through
	/// [`Adapter::relate`] and everything else through [`Adapter::set`].
	pub async fn assign_to(
		&self,
		mut instance: Value,
		adapter: &dyn Adapter,
		model: &Model,
	) -> FixtureResult<Value> {
		for name in self.names() {
			let value = self.evaluator.attr(&name).await?;
			instance = if self.evaluator.is_relation(&name) {
				adapter.relate(instance, &name, value, model).await?
			} else {
				adapter.set(instance, &name, value).await?
			};
		}
		Ok(instance)
	}
}

/// Everything a strategy needs to turn one prepared build into a result.
pub struct Assembler {
	model: Model,
	evaluator: Evaluator,
	assigner: AttributeAssigner,
	callbacks: Vec<Callback>,
	adapter: Arc<dyn Adapter>,
}

impl Assembler {
	pub(crate) fn new(
		model: Model,
		evaluator: Evaluator,
		callbacks: Vec<Callback>,
		adapter: Arc<dyn Adapter>,
	) -> Self {
		Self {
			model,
			assigner: AttributeAssigner::new(evaluator.clone()),
			evaluator,
			callbacks,
			adapter,
		}
	}

	/// Fixture being built.
	pub fn fixture_name(&self) -> &str {
		self.evaluator.fixture_name()
	}

	/// Model the adapter instantiates.
	pub fn model(&self) -> &Model {
		&self.model
	}

	/// Evaluator of this build.
	pub fn evaluator(&self) -> &Evaluator {
		&self.evaluator
	}

	/// Adapter resolved for this fixture.
	pub fn adapter(&self) -> &Arc<dyn Adapter> {
		&self.adapter
	}

	/// Plain object of every non-relation attribute.
	pub async fn to_object(&self) -> FixtureResult<Value> {
		Ok(Value::Object(self.assigner.plain_attributes().await?))
	}

	/// Asks the adapter for a bare instance of the model.
	pub async fn bare_instance(&self) -> FixtureResult<Value> {
		self.adapter.build(&self.model, Overrides::new()).await
	}

	/// Assigns every attribute onto `instance`.
	pub async fn assign(&self, instance: Value) -> FixtureResult<Value> {
		self.assigner
			.assign_to(instance, self.adapter.as_ref(), &self.model)
			.await
	}

	/// Bare instance with every attribute assigned.
	pub async fn to_instance(&self) -> FixtureResult<Value> {
		let instance = self.bare_instance().await?;
		self.assign(instance).await
	}

	/// Runs the callbacks bound to `hook` one after another.
	pub async fn run_callbacks(&self, hook: &str, instance: Value) -> FixtureResult<Value> {
		callback::run_hook(&self.callbacks, hook, instance, &self.evaluator).await
	}

	/// Persists `instance` through the adapter.
	pub async fn save(&self, instance: Value) -> FixtureResult<Value> {
		self.adapter.save(instance, &self.model).await
	}

	/// Records a persisted instance for [`Orchestrator::cleanup`](crate::Orchestrator::cleanup).
	pub fn track_created(&self, instance: &Value) {
		self.evaluator
			.orchestrator()
			.registry()
			.record_created(CreatedInstance {
				instance: instance.clone(),
				model: self.model.clone(),
				adapter: Arc::clone(&self.adapter),
			});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::adapter::MemoryAdapter;
	use crate::attribute::{Attribute, AttributeKind, RelationTarget};
	use crate::error::FixtureError;
	use crate::orchestrator::Orchestrator;
	use crate::value::BuildArgs;
	use futures::FutureExt;
	use rstest::rstest;
	use serde_json::json;

	fn constant(name: &str, ignored: bool, value: Value) -> Attribute {
		Attribute::new(
			name,
			ignored,
			AttributeKind::Dynamic(Arc::new(move |_: Evaluator| {
				futures::future::ready(Ok::<_, FixtureError>(value.clone())).boxed()
			})),
		)
	}

	fn assembler(attributes: &[Attribute], overrides: Value) -> Assembler {
		let evaluator = Evaluator::new(
			"user",
			attributes,
			overrides.as_object().cloned().unwrap_or_default(),
			"build",
			Orchestrator::new(),
		);
		Assembler::new(
			Model::new("User"),
			evaluator,
			Vec::new(),
			Arc::new(MemoryAdapter),
		)
	}

	#[rstest]
	#[tokio::test]
	async fn test_to_object_skips_transient_and_relations() {
		// Arrange
		let relation = Attribute::new(
			"company",
			false,
			AttributeKind::Relation(RelationTarget {
				fixtures: vec!["company".to_string()],
				strategy: None,
				args: BuildArgs::new(),
			}),
		);
		let assembler = assembler(
			&[
				constant("name", false, json!("Ann")),
				constant("secret", true, json!("x")),
				relation,
			],
			json!({"age": 7}),
		);

		// Act
		let object = assembler.to_object().await.unwrap();

		// Assert
		assert_eq!(object, json!({"name": "Ann", "age": 7}));
	}

	#[rstest]
	#[tokio::test]
	async fn test_to_instance_keeps_null_override() {
		let assembler = assembler(&[constant("name", false, json!("Ann"))], json!({"name": null}));

		let instance = assembler.to_instance().await.unwrap();

		assert_eq!(instance, json!({"name": null}));
	}

	#[rstest]
	#[tokio::test]
	async fn test_callbacks_run_in_order() {
		// Arrange
		let evaluator = Evaluator::new("user", &[], Overrides::new(), "build", Orchestrator::new());
		let push = |tag: &'static str| {
			Callback::new("after_build", move |mut instance: Value, _: Evaluator| async move {
				if let Some(seen) = instance.get_mut("seen").and_then(Value::as_array_mut) {
					seen.push(json!(tag));
				}
				Ok::<_, FixtureError>(instance)
			})
		};
		let assembler = Assembler::new(
			Model::new("User"),
			evaluator,
			vec![push("global"), push("parent"), push("own")],
			Arc::new(MemoryAdapter),
		);

		// Act
		let instance = assembler
			.run_callbacks("after_build", json!({"seen": []}))
			.await
			.unwrap();

		// Assert
		assert_eq!(instance, json!({"seen": ["global", "parent", "own"]}));
	}
}
