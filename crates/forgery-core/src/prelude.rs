//! Convenience re-exports for common usage.
//!
//! ```ignore
//! use forgery_core::prelude::*;
//! ```

// Error types
pub use crate::error::{FixtureError, FixtureResult};

// Registry and configuration
pub use crate::config::ForgeryConfig;
pub use crate::orchestrator::{Orchestrator, StrategyHandle};

// Definitions
pub use crate::definition::{DefinitionDsl, FixtureOptions};
pub use crate::sequence::{Sequence, SequenceOptions, SequenceStart};
pub use crate::value::{BuildArgs, FixtureName, Model, NamedModel, Overrides, RelationArgs};

// Building
pub use crate::adapter::{Adapter, MemoryAdapter};
pub use crate::assembler::Assembler;
pub use crate::callback::{AFTER_BUILD, AFTER_CREATE, BEFORE_BUILD, BEFORE_CREATE};
pub use crate::evaluator::Evaluator;
pub use crate::strategy::{ATTRIBUTES_FOR, BUILD, CREATE, Strategy};
