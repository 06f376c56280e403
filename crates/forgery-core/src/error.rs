//! Error types for fixture definition and building.
//!
//! Every variant except [`FixtureError::Adapter`],
//! [`FixtureError::AdapterAttribute`] and [`FixtureError::Other`] describes a programming mistake in fixture definitions or calls. None of
//! them are retried; they surface immediately to the caller.

use thiserror::Error;

/// Errors that can occur while defining or building fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
	/// No fixture is registered under the requested name or alias.
	#[error("Unknown fixture: {0}")]
	UnknownFixture(String),

	/// A fixture, trait, sequence, or strategy name is already taken.
	#[error("Duplicate definition: {0}")]
	DuplicateDefinition(String),

	/// Trait lookup missed the fixture, its parents, and the global registry.
	#[error("Unknown trait '{trait_name}' for '{definition}'")]
	UnknownTrait {
		/// Definition the trait was looked up from.
		definition: String,
		/// Name of the missing trait.
		trait_name: String,
	},

	/// A definition refers to itself by name.
	#[error("Self reference in definition: {0}")]
	SelfReference(String),

	/// Strategy name is not registered.
	#[error("Unknown strategy: {0}")]
	UnknownStrategy(String),

	/// Callback registration is malformed.
	#[error("Invalid callback: {0}")]
	InvalidCallback(String),

	/// Malformed sequence options or configuration values.
	#[error("Configuration error: {0}")]
	Configuration(String),

	/// An attribute was requested again while its own resolver was running.
	#[error("Cyclic attribute '{attribute}' in fixture '{fixture}'")]
	CyclicAttribute {
		/// Fixture being evaluated.
		fixture: String,
		/// Attribute that was re-entered.
		attribute: String,
	},

	/// An adapter operation failed.
	#[error("Adapter error during {operation} of '{model}': {message}")]
	Adapter {
		/// Adapter operation (`build`, `save`, `set`, ...).
		operation: String,
		/// Model the operation targeted.
		model: String,
		/// Failure description.
		message: String,
	},

	/// An adapter could not assign or relate one attribute of an instance.
	#[error("Adapter error during {operation} of attribute '{attribute}': {message}")]
	AdapterAttribute {
		/// Adapter operation (`set` or `relate`).
		operation: String,
		/// Attribute being assigned.
		attribute: String,
		/// Failure description.
		message: String,
	},

	/// JSON conversion error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// TOML configuration parse error.
	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error raised by user code inside attribute blocks or callbacks.
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl FixtureError {
	/// Creates an [`FixtureError::Adapter`] error.
	pub fn adapter(
		operation: impl Into<String>,
		model: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self::Adapter {
			operation: operation.into(),
			model: model.into(),
			message: message.into(),
		}
	}

	/// Creates an [`FixtureError::AdapterAttribute`] error.
	pub fn adapter_attribute(
		operation: impl Into<String>,
		attribute: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self::AdapterAttribute {
			operation: operation.into(),
			attribute: attribute.into(),
			message: message.into(),
		}
	}

	/// Creates an [`FixtureError::UnknownTrait`] error.
	pub fn unknown_trait(definition: impl Into<String>, trait_name: impl Into<String>) -> Self {
		Self::UnknownTrait {
			definition: definition.into(),
			trait_name: trait_name.into(),
		}
	}
}

/// Result type alias for fixture operations.
pub type FixtureResult<T> = Result<T, FixtureError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_unknown_fixture_error() {
		let error = FixtureError::UnknownFixture("user".to_string());
		assert_eq!(error.to_string(), "Unknown fixture: user");
	}

	#[rstest]
	fn test_unknown_trait_error() {
		let error = FixtureError::unknown_trait("user", "admin");
		assert_eq!(error.to_string(), "Unknown trait 'admin' for 'user'");
	}

	#[rstest]
	fn test_adapter_error() {
		let error = FixtureError::adapter("save", "User", "connection refused");
		assert_eq!(
			error.to_string(),
			"Adapter error during save of 'User': connection refused"
		);
	}

	#[rstest]
	fn test_adapter_attribute_error() {
		let error = FixtureError::adapter_attribute("set", "name", "instance is not an object");
		assert_eq!(
			error.to_string(),
			"Adapter error during set of attribute 'name': instance is not an object"
		);
	}

	#[rstest]
	fn test_json_error_from() {
		let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
		let error: FixtureError = json_error.into();
		assert!(matches!(error, FixtureError::Json(_)));
	}

	#[rstest]
	fn test_user_error_is_transparent() {
		let error: FixtureError = anyhow::anyhow!("boom").into();
		assert_eq!(error.to_string(), "boom");
	}
}
