//! Storage adapters.
//!
//! The engine never constructs or persists instances itself; it delegates to
//! an [`Adapter`]. [`MemoryAdapter`] keeps instances as plain JSON objects and
//! is installed by default.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{FixtureError, FixtureResult};
use crate::value::{Model, Overrides};

/// Capabilities the engine needs from a backing store.
///
/// # Example
///
/// ```ignore
/// struct SqlAdapter { pool: Pool }
///
/// #[async_trait]
/// impl Adapter for SqlAdapter {
///     async fn build(&self, model: &Model, props: Overrides) -> FixtureResult<Value> {
///         Ok(Value::Object(props))
///     }
///
///     async fn save(&self, instance: Value, model: &Model) -> FixtureResult<Value> {
///         let id = insert(&self.pool, model, &instance).await?;
///         Ok(with_id(instance, id))
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait Adapter: Send + Sync {
	/// Constructs a bare instance of `model`, seeded with `props`.
	async fn build(&self, model: &Model, props: Overrides) -> FixtureResult<Value>;

	/// Persists `instance`, returning the saved and possibly updated instance.
	async fn save(&self, instance: Value, model: &Model) -> FixtureResult<Value>;

	/// Removes a persisted instance.
	async fn destroy(&self, instance: Value, model: &Model) -> FixtureResult<()>;

	/// Wires a resolved relation onto `instance`.
	///
	/// The default implementation assigns it like a plain attribute.
	async fn relate(
		&self,
		instance: Value,
		name: &str,
		other: Value,
		_model: &Model,
	) -> FixtureResult<Value> {
		self.set(instance, name, other).await
	}

	/// Assigns a plain attribute.
	async fn set(&self, instance: Value, name: &str, value: Value) -> FixtureResult<Value>;
}

/// Adapter that keeps instances as JSON objects and persists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryAdapter;

impl MemoryAdapter {
	/// Creates the adapter.
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Adapter for MemoryAdapter {
	async fn build(&self, _model: &Model, props: Overrides) -> FixtureResult<Value> {
		Ok(Value::Object(props))
	}

	async fn save(&self, instance: Value, _model: &Model) -> FixtureResult<Value> {
		Ok(instance)
	}

	async fn destroy(&self, _instance: Value, _model: &Model) -> FixtureResult<()> {
		Ok(())
	}

	async fn set(&self, mut instance: Value, name: &str, value: Value) -> FixtureResult<Value> {
		match instance.as_object_mut() {
			Some(object) => {
				object.insert(name.to_string(), value);
				Ok(instance)
			}
			None => Err(FixtureError::adapter_attribute(
				"set",
				name,
				"instance is not an object",
			)),
		}
	}
}

/// Current adapter plus per-fixture overrides.
pub(crate) struct AdapterRegistry {
	current: RwLock<Arc<dyn Adapter>>,
	by_fixture: RwLock<HashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
	pub(crate) fn new() -> Self {
		Self {
			current: RwLock::new(Arc::new(MemoryAdapter)),
			by_fixture: RwLock::new(HashMap::new()),
		}
	}

	pub(crate) fn set_current(&self, adapter: Arc<dyn Adapter>) {
		*self.current.write() = adapter;
	}

	pub(crate) fn set_for(&self, fixture: &str, adapter: Arc<dyn Adapter>) {
		self.by_fixture.write().insert(fixture.to_string(), adapter);
	}

	/// Adapter registered for the first matching name, else the current one.
	pub(crate) fn resolve<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Arc<dyn Adapter> {
		let by_fixture = self.by_fixture.read();
		names
			.into_iter()
			.find_map(|name| by_fixture.get(name).cloned())
			.unwrap_or_else(|| Arc::clone(&self.current.read()))
	}

	pub(crate) fn clear(&self) {
		self.set_current(Arc::new(MemoryAdapter));
		self.by_fixture.write().clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[tokio::test]
	async fn test_memory_adapter_round_trip() {
		// Arrange
		let adapter = MemoryAdapter::new();
		let model = Model::new("User");

		// Act
		let instance = adapter.build(&model, Overrides::new()).await.unwrap();
		let instance = adapter.set(instance, "name", json!("Ann")).await.unwrap();
		let instance = adapter
			.relate(instance, "company", json!({"name": "Acme"}), &model)
			.await
			.unwrap();
		let saved = adapter.save(instance, &model).await.unwrap();

		// Assert
		assert_eq!(saved, json!({"name": "Ann", "company": {"name": "Acme"}}));
		assert!(adapter.destroy(saved, &model).await.is_ok());
	}

	#[rstest]
	#[tokio::test]
	async fn test_memory_adapter_set_on_scalar_fails() {
		let result = MemoryAdapter.set(json!(3), "name", json!("x")).await;
		assert!(matches!(
			result,
			Err(FixtureError::AdapterAttribute { ref operation, ref attribute, .. })
				if operation == "set" && attribute == "name"
		));
		assert_eq!(
			result.unwrap_err().to_string(),
			"Adapter error during set of attribute 'name': instance is not an object"
		);
	}

	#[rstest]
	fn test_registry_prefers_fixture_override() {
		struct Marker;

		#[async_trait]
		impl Adapter for Marker {
			async fn build(&self, _: &Model, _: Overrides) -> FixtureResult<Value> {
				Ok(json!("marker"))
			}
			async fn save(&self, instance: Value, _: &Model) -> FixtureResult<Value> {
				Ok(instance)
			}
			async fn destroy(&self, _: Value, _: &Model) -> FixtureResult<()> {
				Ok(())
			}
			async fn set(&self, instance: Value, _: &str, _: Value) -> FixtureResult<Value> {
				Ok(instance)
			}
		}

		let registry = AdapterRegistry::new();
		let marker: Arc<dyn Adapter> = Arc::new(Marker);
		registry.set_for("user", Arc::clone(&marker));

		assert!(Arc::ptr_eq(&registry.resolve(["admin", "user"]), &marker));
		assert!(!Arc::ptr_eq(&registry.resolve(["post"]), &marker));
	}
}
