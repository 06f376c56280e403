//! # Forgery
//!
//! Fixture definitions and test-data generation for Rust.
//!
//! A fixture is a named template describing how to produce a data object.
//! Fixtures inherit from parents, mix in traits, draw values from sequences,
//! pull in related fixtures, and run callbacks around instantiation. Each
//! run picks a strategy:
//!
//! - `attributes_for` - plain attribute object
//! - `build` - instance constructed through the adapter
//! - `create` - instance constructed and saved through the adapter
//!
//! ## Feature Flags
//!
//! - `test` - re-exports `forgery-test` as [`test`]: a recording adapter,
//!   rstest fixtures, and test logging
//!
//! ## Example
//!
//! ```
//! use forgery::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> FixtureResult<()> {
//! let forgery = Orchestrator::new();
//! forgery.define_sequence("email", SequenceOptions::new().with_callback(|n| {
//!     json!(format!("person{n}@example.com"))
//! }))?;
//! forgery.fixture("company", "Company", FixtureOptions::new(), |f| {
//!     f.value("name", "Acme");
//!     Ok(())
//! })?;
//! forgery.fixture("user", "User", FixtureOptions::new(), |f| {
//!     f.value("name", "Ann").implicit("email").association("company", ());
//!     Ok(())
//! })?;
//!
//! let user = forgery.create("user", ()).await?;
//! assert_eq!(user["email"], json!("person1@example.com"));
//! assert_eq!(user["company"]["name"], json!("Acme"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub use forgery_core::*;

#[cfg(feature = "test")]
pub use forgery_test as test;

/// Convenience re-exports for common usage.
pub mod prelude {
	pub use forgery_core::prelude::*;

	#[cfg(feature = "test")]
	pub use forgery_test::{RecordingAdapter, init_test_logging};
}
