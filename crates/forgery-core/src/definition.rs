//! Fixture and trait definitions.
//!
//! A definition block runs once, at registration, against a
//! [`DefinitionDsl`]. It only records declarations; compiling them into
//! attributes is deferred to the first build so that implicit names can refer
//! to fixtures and sequences registered later.
//!
//! The compiled attribute list of a fixture is
//! `parent ++ base traits ++ own ++ implicitly named traits`, cached on first
//! use. Traits applied for a single call are appended to a copy of that list;
//! the registered fixture is never modified.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::assembler::Assembler;
use crate::attribute::{Attribute, AttributeBlock};
use crate::callback::{self, Callback};
use crate::declaration::{CompileScope, Declaration, DeclarationKind};
use crate::error::{FixtureError, FixtureResult};
use crate::evaluator::Evaluator;
use crate::orchestrator::{Orchestrator, Registry};
use crate::sequence::{Sequence, SequenceOptions, SequenceRegistry};
use crate::value::{FixtureName, Model, Overrides, RelationArgs};

/// Boxed definition block of a nested child fixture.
pub(crate) type DefinitionBlock = Box<dyn FnOnce(&mut DefinitionDsl<'_>) -> FixtureResult<()>>;

/// Attributes and callbacks of a fully composed definition.
#[derive(Default)]
pub(crate) struct Compiled {
	pub(crate) attributes: Vec<Attribute>,
	pub(crate) callbacks: Vec<Callback>,
}

/// Behavior shared by real fixtures and the placeholder used for missing
/// parents.
pub(crate) trait Definition: Send + Sync {
	/// Composed attributes and callbacks.
	fn compiled(&self, registry: &Registry) -> FixtureResult<Arc<Compiled>>;

	/// Trait declared on this definition or one of its parents.
	fn find_trait(&self, name: &str, registry: &Registry) -> Option<Arc<Trait>>;

	/// Sequence declared on this definition or one of its parents.
	fn find_sequence(&self, name: &str, registry: &Registry) -> Option<Arc<Sequence>>;

	/// Model to instantiate.
	fn model(&self, registry: &Registry) -> Model;
}

/// Stand-in for a parent name that matches no fixture.
pub(crate) struct NullFixture;

impl Definition for NullFixture {
	fn compiled(&self, _registry: &Registry) -> FixtureResult<Arc<Compiled>> {
		Ok(Arc::new(Compiled::default()))
	}

	fn find_trait(&self, _name: &str, _registry: &Registry) -> Option<Arc<Trait>> {
		None
	}

	fn find_sequence(&self, _name: &str, _registry: &Registry) -> Option<Arc<Sequence>> {
		None
	}

	fn model(&self, _registry: &Registry) -> Model {
		Model::nothing()
	}
}

/// Request for a child fixture declared inside a fixture block.
pub(crate) struct ChildRequest {
	pub(crate) name: String,
	pub(crate) model: Model,
	pub(crate) options: FixtureOptions,
	pub(crate) block: DefinitionBlock,
}

/// Everything a definition block recorded.
#[derive(Default)]
pub(crate) struct DefinitionBody {
	declarations: Vec<Declaration>,
	traits: HashMap<String, Arc<Trait>>,
	sequences: SequenceRegistry,
	callbacks: Vec<Callback>,
}

impl DefinitionBody {
	/// Runs `block` and collects what it declares. Child fixture requests are
	/// pushed onto `children`; without it, declaring a child fails.
	pub(crate) fn record<F>(
		name: &str,
		children: Option<&mut Vec<ChildRequest>>,
		block: F,
	) -> FixtureResult<Self>
	where
		F: FnOnce(&mut DefinitionDsl<'_>) -> FixtureResult<()>,
	{
		let mut body = Self::default();
		let mut dsl = DefinitionDsl {
			name,
			body: &mut body,
			children,
			ignored: false,
		};
		block(&mut dsl)?;
		Ok(body)
	}

	/// Compiles own declarations, then the traits named implicitly by them.
	fn compile(&self, scope: &dyn CompileScope) -> FixtureResult<Vec<Attribute>> {
		let mut folded = Vec::new();
		let mut attributes = Vec::with_capacity(self.declarations.len());
		for declaration in &self.declarations {
			attributes.extend(declaration.build(scope, &mut folded)?);
		}
		for name in folded {
			attributes.extend(scope.trait_attributes(&name)?);
		}
		Ok(attributes)
	}

	fn reset_sequences(&self) {
		self.sequences.reset_all();
		for nested in self.traits.values() {
			nested.body.reset_sequences();
		}
	}
}

/// Builder handed to definition blocks.
///
/// ```ignore
/// orchestrator.fixture("user", "User", FixtureOptions::new(), |f| {
///     f.value("name", "Ann");
///     f.sequence("email", SequenceOptions::new().with_callback(|n| {
///         json!(format!("user{}@example.com", n))
///     }))?;
///     f.relation("company", ());
///     f.define_trait("admin", |t| {
///         t.value("role", "admin");
///         Ok(())
///     })?;
///     Ok(())
/// })?;
/// ```
pub struct DefinitionDsl<'a> {
	name: &'a str,
	body: &'a mut DefinitionBody,
	children: Option<&'a mut Vec<ChildRequest>>,
	ignored: bool,
}

impl DefinitionDsl<'_> {
	/// Name of the fixture or trait being defined.
	pub fn definition_name(&self) -> &str {
		self.name
	}

	/// Declares an attribute computed by an async block.
	///
	/// The block receives the build's [`Evaluator`] and may read other
	/// attributes through it.
	pub fn attr<F, Fut>(&mut self, name: impl Into<String>, block: F) -> &mut Self
	where
		F: Fn(Evaluator) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = FixtureResult<Value>> + Send + 'static,
	{
		let block: AttributeBlock = Arc::new(move |evaluator: Evaluator| block(evaluator).boxed());
		self.declare(name, DeclarationKind::Dynamic(block))
	}

	/// Declares an attribute with a constant value.
	pub fn value(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
		let value = value.into();
		self.attr(name, move |_| futures::future::ready(Ok(value.clone())))
	}

	/// Declares an attribute computed by a synchronous closure on every build.
	pub fn lazy<F>(&mut self, name: impl Into<String>, make: F) -> &mut Self
	where
		F: Fn() -> Value + Send + Sync + 'static,
	{
		self.attr(name, move |_| futures::future::ready(Ok(make())))
	}

	/// Declares a bare name, resolved on first build to an association, a
	/// sequence, or a trait to fold in.
	pub fn implicit(&mut self, name: impl Into<String>) -> &mut Self {
		self.declare(name, DeclarationKind::Implicit)
	}

	/// Declares a relation, wired through the adapter's `relate`.
	pub fn relation(&mut self, name: impl Into<String>, args: impl Into<RelationArgs>) -> &mut Self {
		self.declare(name, DeclarationKind::Relation(args.into()))
	}

	/// Declares an association, assigned like a plain attribute.
	pub fn association(
		&mut self,
		name: impl Into<String>,
		args: impl Into<RelationArgs>,
	) -> &mut Self {
		self.declare(name, DeclarationKind::Association(args.into()))
	}

	/// Declares a sequence scoped to this definition and an attribute that
	/// takes its next value.
	///
	/// # Errors
	///
	/// Fails on malformed options or when the name is already used by another
	/// sequence of this definition.
	pub fn sequence(
		&mut self,
		name: impl Into<String>,
		options: impl Into<SequenceOptions>,
	) -> FixtureResult<&mut Self> {
		let name = name.into();
		let sequence = self
			.body
			.sequences
			.register(Sequence::new(name.clone(), options)?)?;
		Ok(self.declare(name, DeclarationKind::Sequence(sequence)))
	}

	/// Declares a trait visible to this definition and its children.
	pub fn define_trait<F>(&mut self, name: impl Into<String>, block: F) -> FixtureResult<&mut Self>
	where
		F: FnOnce(&mut DefinitionDsl<'_>) -> FixtureResult<()>,
	{
		let defined = Trait::new(name, block)?;
		if self.body.traits.contains_key(defined.name()) {
			return Err(FixtureError::DuplicateDefinition(format!(
				"trait '{}' in '{}'",
				defined.name(),
				self.name
			)));
		}
		self.body
			.traits
			.insert(defined.name().to_string(), Arc::new(defined));
		Ok(self)
	}

	/// Declares attributes that are resolvable by other attributes but never
	/// materialized.
	pub fn transient<F>(&mut self, block: F) -> FixtureResult<&mut Self>
	where
		F: FnOnce(&mut DefinitionDsl<'_>) -> FixtureResult<()>,
	{
		let mut nested = DefinitionDsl {
			name: self.name,
			body: &mut *self.body,
			children: self.children.as_deref_mut(),
			ignored: true,
		};
		block(&mut nested)?;
		Ok(self)
	}

	/// Binds `block` to the `before_*` hooks named in `hooks`.
	pub fn before<F, Fut>(&mut self, hooks: &[&str], block: F) -> FixtureResult<&mut Self>
	where
		F: Fn(Value, Evaluator) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = FixtureResult<Value>> + Send + 'static,
	{
		self.body.callbacks.extend(callback::bind("before", hooks, block)?);
		Ok(self)
	}

	/// Binds `block` to the `after_*` hooks named in `hooks`.
	pub fn after<F, Fut>(&mut self, hooks: &[&str], block: F) -> FixtureResult<&mut Self>
	where
		F: Fn(Value, Evaluator) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = FixtureResult<Value>> + Send + 'static,
	{
		self.body.callbacks.extend(callback::bind("after", hooks, block)?);
		Ok(self)
	}

	/// Declares a child fixture, registered right after this one with this
	/// fixture as its default parent.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::Configuration`] inside trait blocks.
	pub fn fixture<F>(
		&mut self,
		name: impl Into<FixtureName>,
		model: impl Into<Model>,
		options: FixtureOptions,
		block: F,
	) -> FixtureResult<&mut Self>
	where
		F: FnOnce(&mut DefinitionDsl<'_>) -> FixtureResult<()> + 'static,
	{
		let Some(children) = self.children.as_deref_mut() else {
			return Err(FixtureError::Configuration(format!(
				"child fixtures cannot be declared inside trait '{}'",
				self.name
			)));
		};
		children.push(ChildRequest {
			name: name.into().into_string(),
			model: model.into(),
			options,
			block: Box::new(block),
		});
		Ok(self)
	}

	fn declare(&mut self, name: impl Into<String>, kind: DeclarationKind) -> &mut Self {
		self.body
			.declarations
			.push(Declaration::new(name, self.ignored, kind));
		self
	}
}

/// Named attribute overlay.
pub(crate) struct Trait {
	name: String,
	body: DefinitionBody,
}

impl Trait {
	/// Runs `block` immediately.
	pub(crate) fn new<F>(name: impl Into<String>, block: F) -> FixtureResult<Self>
	where
		F: FnOnce(&mut DefinitionDsl<'_>) -> FixtureResult<()>,
	{
		let name = name.into();
		let body = DefinitionBody::record(&name, None, block)?;
		Ok(Self { name, body })
	}

	pub(crate) fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn callbacks(&self) -> &[Callback] {
		&self.body.callbacks
	}

	pub(crate) fn reset_sequences(&self) {
		self.body.reset_sequences();
	}

	/// Compiles this trait for the definition behind `outer`.
	pub(crate) fn attributes(&self, outer: &dyn CompileScope) -> FixtureResult<Vec<Attribute>> {
		let scope = TraitScope { owner: self, outer };
		self.body.compile(&scope)
	}
}

/// Trait-local sequences and traits layered over the applying definition.
struct TraitScope<'a> {
	owner: &'a Trait,
	outer: &'a dyn CompileScope,
}

impl CompileScope for TraitScope<'_> {
	fn definition_name(&self) -> &str {
		self.outer.definition_name()
	}

	fn has_fixture(&self, name: &str) -> bool {
		self.outer.has_fixture(name)
	}

	fn find_sequence(&self, name: &str) -> Option<Arc<Sequence>> {
		self.owner
			.body
			.sequences
			.get(name)
			.or_else(|| self.outer.find_sequence(name))
	}

	fn trait_attributes(&self, name: &str) -> FixtureResult<Vec<Attribute>> {
		match self.owner.body.traits.get(name) {
			Some(nested) => self.outer.expand_trait(name, nested, self),
			None => self.outer.trait_attributes(name),
		}
	}

	fn expand_trait(
		&self,
		name: &str,
		found: &Trait,
		scope: &dyn CompileScope,
	) -> FixtureResult<Vec<Attribute>> {
		self.outer.expand_trait(name, found, scope)
	}
}

/// Options of a fixture registration.
#[derive(Debug, Clone, Default)]
pub struct FixtureOptions {
	/// Extra names the fixture is registered under.
	pub aliases: Vec<String>,
	/// Fixture to inherit attributes, callbacks, traits, and model from.
	pub parent: Option<String>,
	/// Traits applied before the fixture's own attributes.
	pub traits: Vec<String>,
}

impl FixtureOptions {
	/// Empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an alias.
	pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
		self.aliases.push(alias.into());
		self
	}

	/// Adds several aliases.
	pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.aliases.extend(aliases.into_iter().map(Into::into));
		self
	}

	/// Sets the parent fixture.
	pub fn with_parent(mut self, parent: impl Into<FixtureName>) -> Self {
		self.parent = Some(parent.into().into_string());
		self
	}

	/// Adds a base trait.
	pub fn with_trait(mut self, name: impl Into<String>) -> Self {
		self.traits.push(name.into());
		self
	}

	/// Adds several base traits.
	pub fn with_traits<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.traits.extend(names.into_iter().map(Into::into));
		self
	}
}

/// Registered fixture definition.
pub(crate) struct FixtureDef {
	name: String,
	aliases: Vec<String>,
	model: Model,
	parent: Option<String>,
	base_traits: Vec<String>,
	body: DefinitionBody,
	compiled: OnceCell<Arc<Compiled>>,
}

impl FixtureDef {
	pub(crate) fn new(
		name: String,
		model: Model,
		options: FixtureOptions,
		body: DefinitionBody,
	) -> Self {
		Self {
			name,
			aliases: options.aliases,
			model,
			parent: options.parent,
			base_traits: options.traits,
			body,
			compiled: OnceCell::new(),
		}
	}

	pub(crate) fn name(&self) -> &str {
		&self.name
	}

	/// Canonical name followed by aliases.
	pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
		std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
	}

	pub(crate) fn reset_sequences(&self) {
		self.body.reset_sequences();
	}

	fn parent(&self, registry: &Registry) -> Arc<dyn Definition> {
		let Some(parent) = &self.parent else {
			return Arc::new(NullFixture);
		};
		match registry.fixture(parent) {
			Some(found) => found as Arc<dyn Definition>,
			None => {
				tracing::warn!(fixture = %self.name, parent = %parent, "parent fixture not found");
				Arc::new(NullFixture)
			}
		}
	}

	/// Fails when following parents leads back to an already visited fixture.
	fn check_parent_chain(&self, registry: &Registry) -> FixtureResult<()> {
		let mut seen = vec![self.name.clone()];
		let mut next = self.parent.clone();
		while let Some(name) = next {
			let Some(found) = registry.fixture(&name) else {
				break;
			};
			if seen.iter().any(|n| n == &found.name) {
				return Err(FixtureError::SelfReference(found.name.clone()));
			}
			seen.push(found.name.clone());
			next = found.parent.clone();
		}
		Ok(())
	}

	fn compile(&self, registry: &Registry) -> FixtureResult<Compiled> {
		let parent = self.parent(registry).compiled(registry)?;
		let scope = FixtureScope::new(self, registry);

		let mut attributes = parent.attributes.clone();
		for name in &self.base_traits {
			attributes.extend(scope.trait_attributes(name)?);
		}
		attributes.extend(self.body.compile(&scope)?);

		let mut callbacks = parent.callbacks.clone();
		callbacks.extend(self.body.callbacks.iter().cloned());
		callbacks.extend(scope.into_callbacks());

		tracing::debug!(
			fixture = %self.name,
			attributes = attributes.len(),
			callbacks = callbacks.len(),
			"compiled fixture"
		);
		Ok(Compiled {
			attributes,
			callbacks,
		})
	}
}

impl Definition for FixtureDef {
	fn compiled(&self, registry: &Registry) -> FixtureResult<Arc<Compiled>> {
		if let Some(compiled) = self.compiled.get() {
			return Ok(Arc::clone(compiled));
		}
		self.check_parent_chain(registry)?;
		self.compiled
			.get_or_try_init(|| self.compile(registry).map(Arc::new))
			.map(Arc::clone)
	}

	fn find_trait(&self, name: &str, registry: &Registry) -> Option<Arc<Trait>> {
		self.body
			.traits
			.get(name)
			.cloned()
			.or_else(|| self.parent(registry).find_trait(name, registry))
	}

	fn find_sequence(&self, name: &str, registry: &Registry) -> Option<Arc<Sequence>> {
		self.body
			.sequences
			.get(name)
			.or_else(|| self.parent(registry).find_sequence(name, registry))
	}

	fn model(&self, registry: &Registry) -> Model {
		if self.model.is_nothing() {
			self.parent(registry).model(registry)
		} else {
			self.model.clone()
		}
	}
}

/// Lookups for compiling a fixture's declarations and traits.
struct FixtureScope<'a> {
	def: &'a FixtureDef,
	registry: &'a Registry,
	expanding: RefCell<Vec<String>>,
	callbacks: RefCell<Vec<Callback>>,
}

impl<'a> FixtureScope<'a> {
	fn new(def: &'a FixtureDef, registry: &'a Registry) -> Self {
		Self {
			def,
			registry,
			expanding: RefCell::new(Vec::new()),
			callbacks: RefCell::new(Vec::new()),
		}
	}

	/// Callbacks of every trait expanded through this scope, enclosing traits
	/// before the traits nested in them.
	fn into_callbacks(self) -> Vec<Callback> {
		self.callbacks.into_inner()
	}
}

impl CompileScope for FixtureScope<'_> {
	fn definition_name(&self) -> &str {
		&self.def.name
	}

	fn has_fixture(&self, name: &str) -> bool {
		!self.def.names().any(|n| n == name) && self.registry.fixture(name).is_some()
	}

	fn find_sequence(&self, name: &str) -> Option<Arc<Sequence>> {
		self.def
			.find_sequence(name, self.registry)
			.or_else(|| self.registry.sequences().get(name))
	}

	fn trait_attributes(&self, name: &str) -> FixtureResult<Vec<Attribute>> {
		let found = self
			.def
			.find_trait(name, self.registry)
			.or_else(|| self.registry.global_trait(name))
			.ok_or_else(|| FixtureError::unknown_trait(&self.def.name, name))?;
		self.expand_trait(name, &found, self)
	}

	fn expand_trait(
		&self,
		name: &str,
		found: &Trait,
		scope: &dyn CompileScope,
	) -> FixtureResult<Vec<Attribute>> {
		if self.expanding.borrow().iter().any(|n| n == name) {
			return Err(FixtureError::SelfReference(name.to_string()));
		}
		self.callbacks
			.borrow_mut()
			.extend(found.callbacks().iter().cloned());

		self.expanding.borrow_mut().push(name.to_string());
		let result = found.attributes(scope);
		self.expanding.borrow_mut().pop();
		result
	}
}

/// A registered fixture plus traits applied for one call.
#[derive(Clone)]
pub(crate) struct Fixture {
	def: Arc<FixtureDef>,
	applied: Vec<String>,
}

impl Fixture {
	pub(crate) fn new(def: Arc<FixtureDef>) -> Self {
		Self {
			def,
			applied: Vec::new(),
		}
	}

	/// Copy sharing the registered definition, with `traits` appended.
	pub(crate) fn with_traits(&self, traits: impl IntoIterator<Item = String>) -> Self {
		let mut applied = self.applied.clone();
		applied.extend(traits);
		Self {
			def: Arc::clone(&self.def),
			applied,
		}
	}

	pub(crate) fn name(&self) -> &str {
		self.def.name()
	}

	pub(crate) fn compiled(&self, registry: &Registry) -> FixtureResult<Arc<Compiled>> {
		let base = self.def.compiled(registry)?;
		if self.applied.is_empty() {
			return Ok(base);
		}

		let scope = FixtureScope::new(&self.def, registry);
		let mut attributes = base.attributes.clone();
		for name in &self.applied {
			attributes.extend(scope.trait_attributes(name)?);
		}
		let mut callbacks = base.callbacks.clone();
		callbacks.extend(scope.into_callbacks());
		Ok(Arc::new(Compiled {
			attributes,
			callbacks,
		}))
	}

	/// Creates the evaluator and assembler for one build.
	pub(crate) fn prepare(
		&self,
		orchestrator: &Orchestrator,
		strategy: &str,
		overrides: Overrides,
	) -> FixtureResult<Assembler> {
		let registry = orchestrator.registry();
		let compiled = self.compiled(registry)?;

		let evaluator = Evaluator::new(
			self.name(),
			&compiled.attributes,
			overrides,
			strategy,
			orchestrator.clone(),
		);
		let mut callbacks = registry.global_callbacks();
		callbacks.extend(compiled.callbacks.iter().cloned());

		Ok(Assembler::new(
			self.def.model(registry),
			evaluator,
			callbacks,
			registry.adapters().resolve(self.def.names()),
		))
	}
}
