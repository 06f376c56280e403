//! Names, models, and call arguments shared across the engine.
//!
//! Attribute values and model instances are [`serde_json::Value`]s. Plain
//! attribute sets are [`Overrides`] maps.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Plain keyed attribute values.
pub type Overrides = Map<String, Value>;

/// Post-build transform applied to each element of a list call.
pub type ListModifier = Arc<dyn Fn(Value, usize) -> Value + Send + Sync>;

/// Capability for types that stand in for a fixture or model name.
///
/// # Example
///
/// ```
/// use forgery_core::{FixtureName, NamedModel};
///
/// struct User;
///
/// impl NamedModel for User {
///     fn model_name() -> &'static str {
///         "user"
///     }
/// }
///
/// assert_eq!(FixtureName::of::<User>().as_str(), "user");
/// ```
pub trait NamedModel {
	/// Stable identifier of the model, e.g. its table name.
	fn model_name() -> &'static str;
}

/// Model a fixture instantiates, identified by name.
///
/// [`Model::nothing`] is the placeholder for fixtures that inherit their
/// model from a parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Model {
	name: Option<Arc<str>>,
}

impl Model {
	/// Creates a model descriptor.
	pub fn new(name: impl Into<Arc<str>>) -> Self {
		Self {
			name: Some(name.into()),
		}
	}

	/// Placeholder model.
	pub fn nothing() -> Self {
		Self { name: None }
	}

	/// Descriptor for a [`NamedModel`] type.
	pub fn of<M: NamedModel>() -> Self {
		Self::new(M::model_name())
	}

	/// Model name, `None` for the placeholder.
	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// Returns true for the placeholder.
	pub fn is_nothing(&self) -> bool {
		self.name.is_none()
	}
}

impl fmt::Display for Model {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name().unwrap_or("<nothing>"))
	}
}

impl From<&str> for Model {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for Model {
	fn from(name: String) -> Self {
		Self::new(name)
	}
}

/// Resolved name of a fixture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixtureName(String);

impl FixtureName {
	/// Fixture name for a [`NamedModel`] type.
	pub fn of<M: NamedModel>() -> Self {
		Self(M::model_name().to_string())
	}

	/// Borrowed name.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Owned name.
	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for FixtureName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for FixtureName {
	fn from(name: &str) -> Self {
		Self(name.to_string())
	}
}

impl From<String> for FixtureName {
	fn from(name: String) -> Self {
		Self(name)
	}
}

impl From<&String> for FixtureName {
	fn from(name: &String) -> Self {
		Self(name.clone())
	}
}

impl From<&Model> for FixtureName {
	fn from(model: &Model) -> Self {
		Self(model.name().unwrap_or_default().to_string())
	}
}

/// Trait names and overrides passed to a build call.
#[derive(Clone, Default)]
pub struct BuildArgs {
	/// Traits applied on top of the fixture, last listed wins.
	pub traits: Vec<String>,
	/// Values that replace attribute computation.
	pub overrides: Overrides,
	modifier: Option<ListModifier>,
}

impl BuildArgs {
	/// Empty arguments.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends one trait.
	pub fn with_trait(mut self, name: impl Into<String>) -> Self {
		self.traits.push(name.into());
		self
	}

	/// Appends several traits.
	pub fn with_traits<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.traits.extend(names.into_iter().map(Into::into));
		self
	}

	/// Sets one override.
	pub fn with_override(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.overrides.insert(name.into(), value.into());
		self
	}

	/// Merges an override map, later keys replacing earlier ones.
	pub fn with_overrides(mut self, overrides: Overrides) -> Self {
		self.overrides.extend(overrides);
		self
	}

	/// Sets the per-element transform used by list and pair calls.
	pub fn with_list_modifier<F>(mut self, modifier: F) -> Self
	where
		F: Fn(Value, usize) -> Value + Send + Sync + 'static,
	{
		self.modifier = Some(Arc::new(modifier));
		self
	}

	pub(crate) fn take_modifier(&mut self) -> Option<ListModifier> {
		self.modifier.take()
	}
}

impl fmt::Debug for BuildArgs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BuildArgs")
			.field("traits", &self.traits)
			.field("overrides", &self.overrides)
			.field("modifier", &self.modifier.is_some())
			.finish()
	}
}

impl From<()> for BuildArgs {
	fn from(_: ()) -> Self {
		Self::new()
	}
}

impl<const N: usize> From<[&str; N]> for BuildArgs {
	fn from(traits: [&str; N]) -> Self {
		Self::new().with_traits(traits)
	}
}

impl From<&[&str]> for BuildArgs {
	fn from(traits: &[&str]) -> Self {
		Self::new().with_traits(traits.iter().copied())
	}
}

impl From<Vec<String>> for BuildArgs {
	fn from(traits: Vec<String>) -> Self {
		Self::new().with_traits(traits)
	}
}

impl From<Overrides> for BuildArgs {
	fn from(overrides: Overrides) -> Self {
		Self::new().with_overrides(overrides)
	}
}

/// Objects become overrides and arrays of strings become traits; other
/// values yield empty arguments.
impl From<Value> for BuildArgs {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self::new().with_overrides(map),
			Value::Array(items) => Self::new().with_traits(
				items
					.into_iter()
					.filter_map(|item| item.as_str().map(str::to_string)),
			),
			_ => Self::new(),
		}
	}
}

impl<const N: usize> From<([&str; N], Value)> for BuildArgs {
	fn from((traits, overrides): ([&str; N], Value)) -> Self {
		let mut args = BuildArgs::from(overrides);
		args.traits = traits.iter().map(|t| t.to_string()).collect();
		args
	}
}

/// Declaration-time arguments of a relation or association.
#[derive(Debug, Clone, Default)]
pub struct RelationArgs {
	/// Target fixtures. Defaults to the attribute's own name.
	pub fixture: Option<Vec<String>>,
	/// Strategy for the nested build, overriding the inherited one.
	pub strategy: Option<String>,
	/// Traits applied to the nested build.
	pub traits: Vec<String>,
	/// Overrides for the nested build.
	pub overrides: Overrides,
}

impl RelationArgs {
	/// Empty arguments.
	pub fn new() -> Self {
		Self::default()
	}

	/// Targets a single fixture.
	pub fn fixture(mut self, name: impl Into<FixtureName>) -> Self {
		self.fixture = Some(vec![name.into().into_string()]);
		self
	}

	/// Targets several fixtures; the relation resolves to an array.
	pub fn fixtures<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<FixtureName>,
	{
		self.fixture = Some(
			names
				.into_iter()
				.map(|name| name.into().into_string())
				.collect(),
		);
		self
	}

	/// Forces the nested build strategy.
	pub fn strategy(mut self, name: impl Into<String>) -> Self {
		self.strategy = Some(name.into());
		self
	}

	/// Appends one trait.
	pub fn with_trait(mut self, name: impl Into<String>) -> Self {
		self.traits.push(name.into());
		self
	}

	/// Appends several traits.
	pub fn with_traits<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.traits.extend(names.into_iter().map(Into::into));
		self
	}

	/// Sets one override.
	pub fn with_override(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.overrides.insert(name.into(), value.into());
		self
	}

	/// Merges an override map.
	pub fn with_overrides(mut self, overrides: Overrides) -> Self {
		self.overrides.extend(overrides);
		self
	}

	pub(crate) fn build_args(&self) -> BuildArgs {
		BuildArgs::new()
			.with_traits(self.traits.iter().cloned())
			.with_overrides(self.overrides.clone())
	}
}

impl From<()> for RelationArgs {
	fn from(_: ()) -> Self {
		Self::new()
	}
}

impl<const N: usize> From<[&str; N]> for RelationArgs {
	fn from(traits: [&str; N]) -> Self {
		Self::new().with_traits(traits)
	}
}

impl From<Overrides> for RelationArgs {
	fn from(overrides: Overrides) -> Self {
		Self::new().with_overrides(overrides)
	}
}

impl From<Value> for RelationArgs {
	fn from(value: Value) -> Self {
		let args = BuildArgs::from(value);
		Self::new()
			.with_traits(args.traits)
			.with_overrides(args.overrides)
	}
}
