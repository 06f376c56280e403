//! Orchestrator configuration.
//!
//! Configuration can be built in code, parsed from TOML, and then overridden
//! from `FORGERY_`-prefixed environment variables:
//!
//! ```toml
//! use_parent_strategy = false
//! default_strategy = "build"
//! list_size_limit = 500
//! ```

use std::env;

use serde::Deserialize;

use crate::error::{FixtureError, FixtureResult};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "FORGERY_";

/// Settings that control how an [`Orchestrator`](crate::Orchestrator) resolves builds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForgeryConfig {
	/// Nested relations use the strategy of the enclosing build.
	///
	/// When disabled, relations without an explicit strategy use
	/// [`default_strategy`](Self::default_strategy).
	pub use_parent_strategy: bool,

	/// Strategy for relations when `use_parent_strategy` is disabled.
	pub default_strategy: String,

	/// Upper bound on the element count of list calls.
	pub list_size_limit: Option<usize>,
}

impl Default for ForgeryConfig {
	fn default() -> Self {
		Self {
			use_parent_strategy: true,
			default_strategy: "create".to_string(),
			list_size_limit: None,
		}
	}
}

impl ForgeryConfig {
	/// Creates the default configuration.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses configuration from TOML text. Missing keys keep their defaults.
	pub fn from_toml_str(source: &str) -> FixtureResult<Self> {
		Ok(toml::from_str(source)?)
	}

	/// Applies overrides from the process environment.
	pub fn with_env_overrides(self) -> FixtureResult<Self> {
		self.with_overrides_from(|key| env::var(key).ok())
	}

	/// Applies overrides read through `lookup`, keyed by the full
	/// `FORGERY_`-prefixed variable name.
	pub fn with_overrides_from<F>(mut self, lookup: F) -> FixtureResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let key = |name: &str| format!("{}{}", ENV_PREFIX, name);

		if let Some(raw) = lookup(&key("USE_PARENT_STRATEGY")) {
			self.use_parent_strategy = parse_bool(&raw).ok_or_else(|| {
				FixtureError::Configuration(format!(
					"{}USE_PARENT_STRATEGY is not a boolean: {}",
					ENV_PREFIX, raw
				))
			})?;
		}
		if let Some(raw) = lookup(&key("DEFAULT_STRATEGY")) {
			let raw = raw.trim();
			if raw.is_empty() {
				return Err(FixtureError::Configuration(format!(
					"{}DEFAULT_STRATEGY must not be empty",
					ENV_PREFIX
				)));
			}
			self.default_strategy = raw.to_string();
		}
		if let Some(raw) = lookup(&key("LIST_SIZE_LIMIT")) {
			let limit = raw.trim().parse::<usize>().map_err(|_| {
				FixtureError::Configuration(format!(
					"{}LIST_SIZE_LIMIT is not a count: {}",
					ENV_PREFIX, raw
				))
			})?;
			self.list_size_limit = Some(limit);
		}
		Ok(self)
	}

	/// Sets whether relations inherit the enclosing strategy.
	pub fn with_use_parent_strategy(mut self, enabled: bool) -> Self {
		self.use_parent_strategy = enabled;
		self
	}

	/// Sets the relation strategy used when parent strategies are not inherited.
	pub fn with_default_strategy(mut self, strategy: impl Into<String>) -> Self {
		self.default_strategy = strategy.into();
		self
	}

	/// Sets the list size limit.
	pub fn with_list_size_limit(mut self, limit: usize) -> Self {
		self.list_size_limit = Some(limit);
		self
	}

	/// Fails when `count` exceeds the configured list size limit.
	pub(crate) fn check_list_size(&self, count: usize) -> FixtureResult<()> {
		match self.list_size_limit {
			Some(limit) if count > limit => Err(FixtureError::Configuration(format!(
				"list of {} exceeds list_size_limit {}",
				count, limit
			))),
			_ => Ok(()),
		}
	}
}

fn parse_bool(raw: &str) -> Option<bool> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}
