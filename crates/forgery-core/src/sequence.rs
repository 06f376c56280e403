//! Stateful, resettable value sequences.
//!
//! A [`Sequence`] yields `callback(current)` and then advances. Integer
//! sequences count up by one, text sequences advance like spreadsheet column
//! names (`"z"` is followed by `"aa"`), one-of sequences pick a random choice
//! on every call, and generator sequences pull from a user iterator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde_json::Value;

use crate::error::{FixtureError, FixtureResult};

/// Transform applied to each raw sequence value.
pub type SequenceCallback = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Creates a fresh iterator; called on construction and on every reset.
pub type SequenceGenerator = Arc<dyn Fn() -> Box<dyn Iterator<Item = Value> + Send> + Send + Sync>;

/// Initial value of a sequence, which also selects its progression.
#[derive(Clone)]
pub enum SequenceStart {
	/// Counts up by one from the given value.
	Integer(i64),
	/// Spreadsheet-column style progression from the given text.
	Text(String),
	/// Uniform random pick from a fixed, non-empty choice set.
	OneOf(Vec<Value>),
	/// Values pulled from a user iterator.
	Generator(SequenceGenerator),
}

impl SequenceStart {
	/// One-of progression over `choices`.
	pub fn one_of<I, V>(choices: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		Self::OneOf(choices.into_iter().map(Into::into).collect())
	}

	/// Generator progression; `make` is called again on reset.
	pub fn generator<F, I>(make: F) -> Self
	where
		F: Fn() -> I + Send + Sync + 'static,
		I: Iterator<Item = Value> + Send + 'static,
	{
		Self::Generator(Arc::new(move || Box::new(make())))
	}
}

impl Default for SequenceStart {
	fn default() -> Self {
		Self::Integer(1)
	}
}

impl fmt::Debug for SequenceStart {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
			Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
			Self::OneOf(choices) => f.debug_tuple("OneOf").field(choices).finish(),
			Self::Generator(_) => f.write_str("Generator(..)"),
		}
	}
}

impl From<i64> for SequenceStart {
	fn from(n: i64) -> Self {
		Self::Integer(n)
	}
}

impl From<i32> for SequenceStart {
	fn from(n: i32) -> Self {
		Self::Integer(i64::from(n))
	}
}

impl From<&str> for SequenceStart {
	fn from(s: &str) -> Self {
		Self::Text(s.to_string())
	}
}

impl From<String> for SequenceStart {
	fn from(s: String) -> Self {
		Self::Text(s)
	}
}

/// Options accepted when declaring a sequence.
#[derive(Clone, Default)]
pub struct SequenceOptions {
	start: SequenceStart,
	aliases: Vec<String>,
	callback: Option<SequenceCallback>,
}

impl SequenceOptions {
	/// Integer sequence starting at 1, no aliases, no callback.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the initial value.
	pub fn with_start(mut self, start: impl Into<SequenceStart>) -> Self {
		self.start = start.into();
		self
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

	/// Sets the value transform.
	pub fn with_callback<F>(mut self, callback: F) -> Self
	where
		F: Fn(Value) -> Value + Send + Sync + 'static,
	{
		self.callback = Some(Arc::new(callback));
		self
	}
}

impl From<SequenceStart> for SequenceOptions {
	fn from(start: SequenceStart) -> Self {
		Self::new().with_start(start)
	}
}

impl From<i64> for SequenceOptions {
	fn from(start: i64) -> Self {
		Self::new().with_start(start)
	}
}

impl From<i32> for SequenceOptions {
	fn from(start: i32) -> Self {
		Self::new().with_start(start)
	}
}

impl From<&str> for SequenceOptions {
	fn from(start: &str) -> Self {
		Self::new().with_start(start)
	}
}

enum SequenceState {
	/// `None` once the counter has passed `i64::MAX`.
	Integer(Option<i64>),
	Text(String),
	OneOf,
	Generator(Box<dyn Iterator<Item = Value> + Send>),
}

/// Named, resettable value generator.
pub struct Sequence {
	name: String,
	aliases: Vec<String>,
	start: SequenceStart,
	callback: Option<SequenceCallback>,
	state: Mutex<SequenceState>,
}

impl Sequence {
	/// Creates a sequence, validating its options.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::Configuration`] for an empty one-of choice set,
	/// a text start without letters or digits, or an empty or self-named alias.
	///
	/// # Example
	///
	/// ```
	/// use forgery_core::{Sequence, SequenceOptions};
	/// use serde_json::json;
	///
	/// let seq = Sequence::new("column", SequenceOptions::new().with_start("z")).unwrap();
	/// assert_eq!(seq.next(), json!("z"));
	/// assert_eq!(seq.next(), json!("aa"));
	/// ```
	pub fn new(name: impl Into<String>, options: impl Into<SequenceOptions>) -> FixtureResult<Self> {
		let name = name.into();
		let options = options.into();

		match &options.start {
			SequenceStart::OneOf(choices) if choices.is_empty() => {
				return Err(FixtureError::Configuration(format!(
					"sequence '{}' has an empty choice set",
					name
				)));
			}
			SequenceStart::Text(text) if !text.chars().any(|c| c.is_ascii_alphanumeric()) => {
				return Err(FixtureError::Configuration(format!(
					"sequence '{}' text start {:?} has no letters or digits",
					name, text
				)));
			}
			_ => {}
		}
		for alias in &options.aliases {
			if alias.is_empty() || *alias == name {
				return Err(FixtureError::Configuration(format!(
					"sequence '{}' has invalid alias {:?}",
					name, alias
				)));
			}
		}

		let state = Mutex::new(initial_state(&options.start));
		Ok(Self {
			name,
			aliases: options.aliases,
			start: options.start,
			callback: options.callback,
			state,
		})
	}

	/// Sequence name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Alternative names.
	pub fn aliases(&self) -> &[String] {
		&self.aliases
	}

	/// Name followed by aliases.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
	}

	/// Returns the current value passed through the callback, then advances.
	///
	/// An exhausted generator, or an integer sequence past `i64::MAX`,
	/// yields `Value::Null` until reset.
	pub fn next(&self) -> Value {
		let raw = {
			let mut state = self.state.lock();
			match &mut *state {
				SequenceState::Integer(slot) => match *slot {
					Some(value) => {
						*slot = value.checked_add(1);
						Value::from(value)
					}
					None => Value::Null,
				},
				SequenceState::Text(current) => {
					let value = current.clone();
					*current = increment_text(&value);
					Value::String(value)
				}
				SequenceState::OneOf => match &self.start {
					SequenceStart::OneOf(choices) => choices
						.choose(&mut rand::thread_rng())
						.cloned()
						.unwrap_or(Value::Null),
					_ => Value::Null,
				},
				SequenceState::Generator(iter) => iter.next().unwrap_or(Value::Null),
			}
		};
		match &self.callback {
			Some(callback) => callback(raw),
			None => raw,
		}
	}

	/// Restores the initial value or a fresh generator.
	pub fn reset(&self) {
		*self.state.lock() = initial_state(&self.start);
	}
}

impl fmt::Debug for Sequence {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Sequence")
			.field("name", &self.name)
			.field("aliases", &self.aliases)
			.field("start", &self.start)
			.finish()
	}
}

fn initial_state(start: &SequenceStart) -> SequenceState {
	match start {
		SequenceStart::Integer(n) => SequenceState::Integer(Some(*n)),
		SequenceStart::Text(s) => SequenceState::Text(s.clone()),
		SequenceStart::OneOf(_) => SequenceState::OneOf,
		SequenceStart::Generator(make) => SequenceState::Generator(make()),
	}
}

/// Advances text like a spreadsheet column counter.
///
/// The rightmost letter or digit is incremented. `z`, `Z` and `9` wrap to
/// `a`, `A` and `0` and carry into the next letter or digit to the left,
/// skipping other characters. A carry past the leftmost position inserts a
/// new leading character of the same class (`"zz"` becomes `"aaa"`, `"9"`
/// becomes `"10"`).
pub fn increment_text(text: &str) -> String {
	let mut chars: Vec<char> = text.chars().collect();
	let Some(mut index) = chars.iter().rposition(|c| c.is_ascii_alphanumeric()) else {
		if let Some(last) = chars.last_mut() {
			*last = next_char(*last);
		}
		return chars.into_iter().collect();
	};

	loop {
		let (next, carry) = match chars[index] {
			'z' => ('a', true),
			'Z' => ('A', true),
			'9' => ('0', true),
			c => (next_char(c), false),
		};
		chars[index] = next;
		if !carry {
			break;
		}
		match chars[..index]
			.iter()
			.rposition(|c| c.is_ascii_alphanumeric())
		{
			Some(left) => index = left,
			None => {
				let lead = if next == '0' { '1' } else { next };
				chars.insert(index, lead);
				break;
			}
		}
	}
	chars.into_iter().collect()
}

/// Following scalar value, skipping the surrogate range; `char::MAX` stays put.
fn next_char(c: char) -> char {
	(u32::from(c) + 1..=u32::from(char::MAX))
		.find_map(char::from_u32)
		.unwrap_or(c)
}

/// Named sequences addressable by name or alias.
#[derive(Debug, Default)]
pub struct SequenceRegistry {
	sequences: RwLock<Vec<Arc<Sequence>>>,
	by_name: RwLock<HashMap<String, Arc<Sequence>>>,
}

impl SequenceRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a sequence under its name and aliases.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::DuplicateDefinition`] when any of its names is taken.
	pub fn register(&self, sequence: Sequence) -> FixtureResult<Arc<Sequence>> {
		let mut by_name = self.by_name.write();
		if let Some(taken) = sequence.names().find(|n| by_name.contains_key(*n)) {
			return Err(FixtureError::DuplicateDefinition(format!(
				"sequence '{}'",
				taken
			)));
		}
		let sequence = Arc::new(sequence);
		for name in sequence.names() {
			by_name.insert(name.to_string(), Arc::clone(&sequence));
		}
		self.sequences.write().push(Arc::clone(&sequence));
		tracing::debug!(sequence = %sequence.name(), "registered sequence");
		Ok(sequence)
	}

	/// Looks up a sequence by name or alias.
	pub fn get(&self, name: &str) -> Option<Arc<Sequence>> {
		self.by_name.read().get(name).cloned()
	}

	/// Returns true when `name` is registered.
	pub fn contains(&self, name: &str) -> bool {
		self.by_name.read().contains_key(name)
	}

	/// Resets every sequence.
	pub fn reset_all(&self) {
		for sequence in self.sequences.read().iter() {
			sequence.reset();
		}
	}

	/// Number of distinct sequences.
	pub fn len(&self) -> usize {
		self.sequences.read().len()
	}

	/// Returns true when no sequence is registered.
	pub fn is_empty(&self) -> bool {
		self.sequences.read().is_empty()
	}

	/// Forgets every sequence.
	pub fn clear(&self) {
		self.sequences.write().clear();
		self.by_name.write().clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_integer_default_start() {
		let seq = Sequence::new("n", SequenceOptions::new()).unwrap();
		assert_eq!(
			[seq.next(), seq.next(), seq.next()],
			[json!(1), json!(2), json!(3)]
		);
	}

	#[rstest]
	fn test_integer_past_max_yields_null() {
		// Arrange
		let seq = Sequence::new("n", i64::MAX - 1).unwrap();

		// Act
		let values = [seq.next(), seq.next(), seq.next(), seq.next()];
		seq.reset();

		// Assert
		assert_eq!(
			values,
			[json!(i64::MAX - 1), json!(i64::MAX), Value::Null, Value::Null]
		);
		assert_eq!(seq.next(), json!(i64::MAX - 1));
	}

	#[rstest]
	fn test_reset_restarts_identically() {
		// Arrange
		let seq = Sequence::new("n", 10i64).unwrap();
		seq.next();

		// Act
		seq.reset();
		let first = [seq.next(), seq.next()];
		seq.reset();
		let second = [seq.next(), seq.next()];

		// Assert
		assert_eq!(first, second);
		assert_eq!(first, [json!(10), json!(11)]);
	}

	#[rstest]
	fn test_callback_sees_value_before_increment() {
		let seq = Sequence::new(
			"email",
			SequenceOptions::new().with_callback(|n| json!(format!("user{}@example.com", n))),
		)
		.unwrap();
		assert_eq!(seq.next(), json!("user1@example.com"));
		assert_eq!(seq.next(), json!("user2@example.com"));
	}

	#[rstest]
	#[case("a", "b")]
	#[case("z", "aa")]
	#[case("az", "ba")]
	#[case("zz", "aaa")]
	#[case("Zz", "AAa")]
	#[case("a9", "b0")]
	#[case("9", "10")]
	#[case("zz99", "aaa00")]
	#[case("a-9", "b-0")]
	#[case("Az", "Ba")]
	#[case("-", ".")]
	#[case("\u{D7FF}", "\u{E000}")]
	#[case("\u{10FFFF}", "\u{10FFFF}")]
	fn test_increment_text(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(increment_text(input), expected);
	}

	#[rstest]
	fn test_text_sequence_wraps() {
		let seq = Sequence::new("col", "z").unwrap();
		assert_eq!(seq.next(), json!("z"));
		assert_eq!(seq.next(), json!("aa"));
		assert_eq!(seq.next(), json!("ab"));
	}

	#[rstest]
	fn test_one_of_picks_from_choices() {
		let choices = vec![json!("red"), json!("green"), json!("blue")];
		let seq = Sequence::new(
			"color",
			SequenceStart::one_of(["red", "green", "blue"]),
		)
		.unwrap();
		for _ in 0..20 {
			assert!(choices.contains(&seq.next()));
		}
		seq.reset();
		assert!(choices.contains(&seq.next()));
	}

	#[rstest]
	fn test_one_of_empty_fails() {
		let result = Sequence::new("color", SequenceStart::OneOf(Vec::new()));
		assert!(matches!(result, Err(FixtureError::Configuration(_))));
	}

	#[rstest]
	fn test_invalid_alias_fails() {
		let result = Sequence::new("n", SequenceOptions::new().with_alias("n"));
		assert!(matches!(result, Err(FixtureError::Configuration(_))));
	}

	#[rstest]
	fn test_generator_sequence_resets() {
		let seq = Sequence::new(
			"pow",
			SequenceStart::generator(|| (0..2u32).map(|i| json!(2u64.pow(i)))),
		)
		.unwrap();
		assert_eq!(seq.next(), json!(1));
		assert_eq!(seq.next(), json!(2));
		assert_eq!(seq.next(), Value::Null);
		seq.reset();
		assert_eq!(seq.next(), json!(1));
	}

	#[rstest]
	fn test_registry_aliases_and_duplicates() {
		// Arrange
		let registry = SequenceRegistry::new();
		registry
			.register(Sequence::new("email", SequenceOptions::new().with_alias("mail")).unwrap())
			.unwrap();

		// Act
		let duplicate = registry.register(Sequence::new("mail", 1i64).unwrap());

		// Assert
		assert!(matches!(duplicate, Err(FixtureError::DuplicateDefinition(_))));
		assert_eq!(registry.len(), 1);
		let by_alias = registry.get("mail").unwrap();
		assert_eq!(by_alias.name(), "email");
	}

	#[rstest]
	fn test_registry_reset_all() {
		let registry = SequenceRegistry::new();
		let seq = registry.register(Sequence::new("n", 1i64).unwrap()).unwrap();
		seq.next();
		seq.next();
		registry.reset_all();
		assert_eq!(seq.next(), json!(1));
	}
}
