//! Declarations recorded by definition blocks and their compilation into
//! [`Attribute`]s.

use std::sync::Arc;

use crate::attribute::{Attribute, AttributeBlock, AttributeKind, RelationTarget};
use crate::definition::Trait;
use crate::error::{FixtureError, FixtureResult};
use crate::sequence::Sequence;
use crate::value::RelationArgs;

/// Lookups a declaration needs while compiling.
pub(crate) trait CompileScope {
	/// Name of the fixture or trait being compiled.
	fn definition_name(&self) -> &str;

	/// Whether `name` refers to another registered fixture.
	fn has_fixture(&self, name: &str) -> bool;

	/// Sequence visible from this definition, local scopes first.
	fn find_sequence(&self, name: &str) -> Option<Arc<Sequence>>;

	/// Compiled attributes of the trait `name` as seen from this definition.
	fn trait_attributes(&self, name: &str) -> FixtureResult<Vec<Attribute>>;

	/// Compiles `found`, reached as `name`, within `scope`.
	///
	/// Every nested scope forwards here to the outermost one, which rejects a
	/// trait already being expanded and collects the trait's callbacks.
	fn expand_trait(
		&self,
		name: &str,
		found: &Trait,
		scope: &dyn CompileScope,
	) -> FixtureResult<Vec<Attribute>>;
}

#[derive(Clone)]
pub(crate) enum DeclarationKind {
	Dynamic(AttributeBlock),
	Relation(RelationArgs),
	Association(RelationArgs),
	Sequence(Arc<Sequence>),
	Implicit,
}

/// As-written form of one attribute definition.
#[derive(Clone)]
pub struct Declaration {
	name: String,
	ignored: bool,
	kind: DeclarationKind,
}

impl Declaration {
	pub(crate) fn new(name: impl Into<String>, ignored: bool, kind: DeclarationKind) -> Self {
		Self {
			name: name.into(),
			ignored,
			kind,
		}
	}

	/// Declared name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Compiles into attributes.
	///
	/// Implicit declarations that name a trait produce no attribute; the trait
	/// name is pushed onto `folded_traits` instead.
	pub(crate) fn build(
		&self,
		scope: &dyn CompileScope,
		folded_traits: &mut Vec<String>,
	) -> FixtureResult<Vec<Attribute>> {
		let kind = match &self.kind {
			DeclarationKind::Dynamic(block) => AttributeKind::Dynamic(Arc::clone(block)),
			DeclarationKind::Relation(args) => AttributeKind::Relation(self.target(args)),
			DeclarationKind::Association(args) => AttributeKind::Association(self.target(args)),
			DeclarationKind::Sequence(seq) => AttributeKind::Sequence(Arc::clone(seq)),
			DeclarationKind::Implicit => {
				if scope.has_fixture(&self.name) {
					AttributeKind::Association(self.target(&RelationArgs::new()))
				} else if let Some(seq) = scope.find_sequence(&self.name) {
					AttributeKind::Sequence(seq)
				} else if self.name == scope.definition_name() {
					return Err(FixtureError::SelfReference(self.name.clone()));
				} else {
					folded_traits.push(self.name.clone());
					return Ok(Vec::new());
				}
			}
		};
		Ok(vec![Attribute::new(self.name.clone(), self.ignored, kind)])
	}

	fn target(&self, args: &RelationArgs) -> RelationTarget {
		RelationTarget {
			fixtures: args
				.fixture
				.clone()
				.unwrap_or_else(|| vec![self.name.clone()]),
			strategy: args.strategy.clone(),
			args: args.build_args(),
		}
	}
}
