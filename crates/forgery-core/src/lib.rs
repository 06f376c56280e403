//! Fixture definition and test-data generation engine for Forgery.
//!
//! Fixtures are named templates describing how to produce a data object.
//! They are registered on an [`Orchestrator`], composed from parent fixtures
//! and traits, and run with a strategy that decides how far the result is
//! materialized:
//!
//! - `attributes_for` - plain attribute object, nothing instantiated
//! - `build` - instance constructed through the [`Adapter`]
//! - `create` - instance constructed and saved through the [`Adapter`]
//!
//! # Quick Start
//!
//! ```
//! use forgery_core::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> FixtureResult<()> {
//! let orchestrator = Orchestrator::new();
//! orchestrator.fixture("user", "User", FixtureOptions::new(), |f| {
//!     f.value("name", "Ann").value("age", 32);
//!     f.define_trait("old", |t| {
//!         t.value("age", 100);
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//!
//! let user = orchestrator.build("user", ["old"]).await?;
//! assert_eq!(user["age"], json!(100));
//!
//! let user = orchestrator.build("user", (["old"], json!({"age": 50}))).await?;
//! assert_eq!(user["age"], json!(50));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`Sequence`] - resettable value generators
//! - [`Declaration`](declaration::Declaration) - as-written attribute
//!   definitions, compiled into [`Attribute`]s on first use
//! - [`DefinitionDsl`] - builder handed to fixture and trait blocks
//! - [`Evaluator`] - lazy, memoizing attribute resolution for one build
//! - [`Assembler`] - turns evaluated attributes into objects or instances
//! - [`Strategy`] - execution modes, extensible through
//!   [`Orchestrator::register_strategy`]

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod adapter;
pub mod assembler;
pub mod attribute;
pub mod callback;
pub mod config;
pub mod declaration;
pub mod definition;
pub mod error;
pub mod evaluator;
pub mod orchestrator;
pub mod prelude;
pub mod sequence;
pub mod strategy;
pub mod value;

// Re-export commonly used types at crate root
pub use adapter::{Adapter, MemoryAdapter};
pub use assembler::{Assembler, AttributeAssigner};
pub use attribute::{Attribute, AttributeKind, RelationTarget};
pub use callback::Callback;
pub use config::ForgeryConfig;
pub use definition::{DefinitionDsl, FixtureOptions};
pub use error::{FixtureError, FixtureResult};
pub use evaluator::Evaluator;
pub use orchestrator::{Orchestrator, StrategyHandle};
pub use sequence::{Sequence, SequenceOptions, SequenceStart};
pub use strategy::{AttributesForStrategy, BuildStrategy, CreateStrategy, NullStrategy, Strategy};
pub use value::{BuildArgs, FixtureName, Model, NamedModel, Overrides, RelationArgs};
