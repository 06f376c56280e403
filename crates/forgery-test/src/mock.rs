//! Recording adapter for asserting on storage side effects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use forgery_core::{Adapter, FixtureError, FixtureResult, Model, Overrides};
use serde_json::{Value, json};
use tokio::sync::Mutex;

/// Adapter operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterOperation {
	/// `build`
	Build,
	/// `save`
	Save,
	/// `destroy`
	Destroy,
	/// `relate`
	Relate,
	/// `set`
	Set,
}

impl AdapterOperation {
	fn as_str(self) -> &'static str {
		match self {
			Self::Build => "build",
			Self::Save => "save",
			Self::Destroy => "destroy",
			Self::Relate => "relate",
			Self::Set => "set",
		}
	}
}

/// One recorded adapter call.
#[derive(Debug, Clone)]
pub struct AdapterCall {
	/// Operation performed.
	pub operation: AdapterOperation,
	/// Model name, when the operation receives one.
	pub model: Option<String>,
	/// Attribute name for `set` and `relate`.
	pub attribute: Option<String>,
	/// Instance after the operation.
	pub instance: Value,
}

/// Adapter that keeps instances as JSON objects and records every call.
///
/// Saved objects without an `id` receive one from a per-adapter counter
/// starting at 1. Clones share their records.
///
/// # Examples
///
/// ```
/// use forgery_core::{Adapter, Model, Overrides};
/// use forgery_test::RecordingAdapter;
///
/// # tokio_test::block_on(async {
/// let adapter = RecordingAdapter::new();
/// let model = Model::new("User");
/// let instance = adapter.build(&model, Overrides::new()).await.unwrap();
/// let saved = adapter.save(instance, &model).await.unwrap();
///
/// assert_eq!(saved["id"], 1);
/// assert_eq!(adapter.save_count().await, 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingAdapter {
	calls: Arc<Mutex<Vec<AdapterCall>>>,
	next_id: Arc<AtomicU64>,
	failing: Option<AdapterOperation>,
}

impl RecordingAdapter {
	/// Creates an adapter with no records.
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every call of `operation` fail with an adapter error.
	pub fn failing_on(mut self, operation: AdapterOperation) -> Self {
		self.failing = Some(operation);
		self
	}

	/// Every call so far, in order.
	pub async fn calls(&self) -> Vec<AdapterCall> {
		self.calls.lock().await.clone()
	}

	/// Number of calls of `operation`.
	pub async fn count(&self, operation: AdapterOperation) -> usize {
		self.calls
			.lock()
			.await
			.iter()
			.filter(|call| call.operation == operation)
			.count()
	}

	/// Number of `build` calls.
	pub async fn build_count(&self) -> usize {
		self.count(AdapterOperation::Build).await
	}

	/// Number of `save` calls.
	pub async fn save_count(&self) -> usize {
		self.count(AdapterOperation::Save).await
	}

	/// Number of `destroy` calls.
	pub async fn destroy_count(&self) -> usize {
		self.count(AdapterOperation::Destroy).await
	}

	/// Instances recorded for `operation`, in call order.
	pub async fn instances(&self, operation: AdapterOperation) -> Vec<Value> {
		self.calls
			.lock()
			.await
			.iter()
			.filter(|call| call.operation == operation)
			.map(|call| call.instance.clone())
			.collect()
	}

	/// Saved models, in save order.
	pub async fn saved_models(&self) -> Vec<String> {
		self.calls
			.lock()
			.await
			.iter()
			.filter(|call| call.operation == AdapterOperation::Save)
			.filter_map(|call| call.model.clone())
			.collect()
	}

	/// Forgets all records and restarts ids.
	pub async fn clear(&self) {
		self.calls.lock().await.clear();
		self.next_id.store(0, Ordering::SeqCst);
	}

	fn check(&self, operation: AdapterOperation, model: &Model) -> FixtureResult<()> {
		if self.failing == Some(operation) {
			return Err(FixtureError::adapter(
				operation.as_str(),
				model.to_string(),
				"configured to fail",
			));
		}
		Ok(())
	}

	fn check_attribute(&self, operation: AdapterOperation, attribute: &str) -> FixtureResult<()> {
		if self.failing == Some(operation) {
			return Err(FixtureError::adapter_attribute(
				operation.as_str(),
				attribute,
				"configured to fail",
			));
		}
		Ok(())
	}

	async fn record(
		&self,
		operation: AdapterOperation,
		model: Option<&Model>,
		attribute: Option<&str>,
		instance: &Value,
	) {
		self.calls.lock().await.push(AdapterCall {
			operation,
			model: model.and_then(Model::name).map(str::to_string),
			attribute: attribute.map(str::to_string),
			instance: instance.clone(),
		});
	}

	fn assign(
		operation: AdapterOperation,
		mut instance: Value,
		name: &str,
		value: Value,
	) -> FixtureResult<Value> {
		match instance.as_object_mut() {
			Some(object) => {
				object.insert(name.to_string(), value);
				Ok(instance)
			}
			None => Err(FixtureError::adapter_attribute(
				operation.as_str(),
				name,
				"instance is not an object",
			)),
		}
	}
}

#[async_trait]
impl Adapter for RecordingAdapter {
	async fn build(&self, model: &Model, props: Overrides) -> FixtureResult<Value> {
		self.check(AdapterOperation::Build, model)?;
		let instance = Value::Object(props);
		self.record(AdapterOperation::Build, Some(model), None, &instance)
			.await;
		Ok(instance)
	}

	async fn save(&self, mut instance: Value, model: &Model) -> FixtureResult<Value> {
		self.check(AdapterOperation::Save, model)?;
		if let Some(object) = instance.as_object_mut()
			&& !object.contains_key("id")
		{
			let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
			object.insert("id".to_string(), json!(id));
		}
		self.record(AdapterOperation::Save, Some(model), None, &instance)
			.await;
		Ok(instance)
	}

	async fn destroy(&self, instance: Value, model: &Model) -> FixtureResult<()> {
		self.check(AdapterOperation::Destroy, model)?;
		self.record(AdapterOperation::Destroy, Some(model), None, &instance)
			.await;
		Ok(())
	}

	async fn relate(
		&self,
		instance: Value,
		name: &str,
		other: Value,
		model: &Model,
	) -> FixtureResult<Value> {
		self.check_attribute(AdapterOperation::Relate, name)?;
		let instance = Self::assign(AdapterOperation::Relate, instance, name, other)?;
		self.record(AdapterOperation::Relate, Some(model), Some(name), &instance)
			.await;
		Ok(instance)
	}

	async fn set(&self, instance: Value, name: &str, value: Value) -> FixtureResult<Value> {
		self.check_attribute(AdapterOperation::Set, name)?;
		let instance = Self::assign(AdapterOperation::Set, instance, name, value)?;
		self.record(AdapterOperation::Set, None, Some(name), &instance)
			.await;
		Ok(instance)
	}
}
