//! Compiled attribute producers.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::FixtureResult;
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;
use crate::value::BuildArgs;

/// User block computing one attribute value.
pub type AttributeBlock =
	Arc<dyn Fn(Evaluator) -> BoxFuture<'static, FixtureResult<Value>> + Send + Sync>;

/// Resolved target of a relation or association attribute.
#[derive(Debug, Clone)]
pub struct RelationTarget {
	/// Fixtures to build; more than one yields an array.
	pub fixtures: Vec<String>,
	/// Explicit strategy for the nested build.
	pub strategy: Option<String>,
	/// Traits and overrides for the nested build.
	pub args: BuildArgs,
}

/// How an attribute produces its value.
#[derive(Clone)]
pub enum AttributeKind {
	/// Computed by a user block.
	Dynamic(AttributeBlock),
	/// Built from another fixture and wired through the adapter's `relate`.
	Relation(RelationTarget),
	/// Built from another fixture and assigned like a plain value.
	Association(RelationTarget),
	/// Next value of a sequence.
	Sequence(Arc<Sequence>),
}

impl fmt::Debug for AttributeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Dynamic(_) => f.write_str("Dynamic(..)"),
			Self::Relation(target) => f.debug_tuple("Relation").field(target).finish(),
			Self::Association(target) => f.debug_tuple("Association").field(target).finish(),
			Self::Sequence(seq) => f.debug_tuple("Sequence").field(&seq.name()).finish(),
		}
	}
}

/// One named value producer.
#[derive(Debug, Clone)]
pub struct Attribute {
	name: String,
	ignored: bool,
	kind: AttributeKind,
}

impl Attribute {
	/// Creates an attribute.
	pub fn new(name: impl Into<String>, ignored: bool, kind: AttributeKind) -> Self {
		Self {
			name: name.into(),
			ignored,
			kind,
		}
	}

	/// Attribute name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Transient attributes are resolvable but never materialized.
	pub fn is_ignored(&self) -> bool {
		self.ignored
	}

	/// Producer variant.
	pub fn kind(&self) -> &AttributeKind {
		&self.kind
	}

	/// Relations are excluded from plain objects and assigned with `relate`.
	pub fn is_relation(&self) -> bool {
		matches!(self.kind, AttributeKind::Relation(_))
	}

	pub(crate) fn evaluate(&self, evaluator: Evaluator) -> BoxFuture<'static, FixtureResult<Value>> {
		match &self.kind {
			AttributeKind::Dynamic(block) => block(evaluator),
			AttributeKind::Relation(target) | AttributeKind::Association(target) => {
				let target = target.clone();
				async move { evaluator.resolve_target(&target).await }.boxed()
			}
			AttributeKind::Sequence(seq) => {
				let value = seq.next();
				futures::future::ready(Ok(value)).boxed()
			}
		}
	}
}
