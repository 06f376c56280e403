//! Integration tests for fixture definitions: overrides, traits, inheritance,
//! sequences, transient attributes, aliases, and callbacks.

use forgery_core::prelude::*;
use forgery_test::fixtures::{orchestrator, recorded_orchestrator};
use forgery_test::{AdapterOperation, RecordingAdapter};
use rstest::rstest;
use serde::Deserialize;
use serde_json::{Value, json};

fn define_user(orchestrator: &Orchestrator) {
	orchestrator
		.fixture(
			"user",
			"User",
			FixtureOptions::new().with_alias("person"),
			|f| {
				f.value("name", "Ann").value("age", 32);
				f.define_trait("old", |t| {
					t.value("age", 100);
					Ok(())
				})?;
				f.define_trait("young", |t| {
					t.value("age", 5);
					Ok(())
				})?;
				Ok(())
			},
		)
		.unwrap();
}

async fn push_tag(mut instance: Value, tag: &str) -> FixtureResult<Value> {
	let seen = format!(
		"{}{};",
		instance["seen"].as_str().unwrap_or_default(),
		tag
	);
	instance["seen"] = json!(seen);
	Ok(instance)
}

#[rstest]
#[case(BuildArgs::new(), 32)]
#[case(BuildArgs::new().with_trait("old"), 100)]
#[case(BuildArgs::from((["old"], json!({"age": 50}))), 50)]
#[case(BuildArgs::from(["old", "young"]), 5)]
#[case(BuildArgs::from(["young", "old"]), 100)]
#[case(BuildArgs::from((["young", "old"], json!({"age": 50}))), 50)]
#[tokio::test]
async fn test_override_precedence(
	orchestrator: Orchestrator,
	#[case] args: BuildArgs,
	#[case] expected: i64,
) {
	// Arrange
	define_user(&orchestrator);

	// Act
	let user = orchestrator.build("user", args).await.unwrap();

	// Assert
	assert_eq!(user["age"], json!(expected));
	assert_eq!(user["name"], json!("Ann"));
}

#[rstest]
#[tokio::test]
async fn test_applied_trait_leaves_registered_fixture_alone(orchestrator: Orchestrator) {
	define_user(&orchestrator);

	let old = orchestrator.build("user", ["old"]).await.unwrap();
	let plain = orchestrator.build("user", ()).await.unwrap();

	assert_eq!(old["age"], json!(100));
	assert_eq!(plain["age"], json!(32));
}

#[rstest]
#[tokio::test]
async fn test_null_override_is_kept(orchestrator: Orchestrator) {
	define_user(&orchestrator);

	let user = orchestrator
		.build("user", json!({"name": null}))
		.await
		.unwrap();

	assert_eq!(user["name"], Value::Null);
	assert_eq!(user["age"], json!(32));
}

#[rstest]
#[tokio::test]
async fn test_override_adds_undeclared_attribute(orchestrator: Orchestrator) {
	define_user(&orchestrator);

	let user = orchestrator
		.attributes_for("user", json!({"nickname": "annie"}))
		.await
		.unwrap();

	assert_eq!(user, json!({"name": "Ann", "age": 32, "nickname": "annie"}));
}

#[rstest]
#[tokio::test]
async fn test_inheritance_merges_parent_attributes(orchestrator: Orchestrator) {
	// Arrange
	orchestrator
		.fixture("base", "Thing", FixtureOptions::new(), |f| {
			f.value("a", 1).value("b", 1);
			Ok(())
		})
		.unwrap();
	orchestrator
		.fixture(
			"child",
			Model::nothing(),
			FixtureOptions::new().with_parent("base"),
			|f| {
				f.value("b", 2);
				Ok(())
			},
		)
		.unwrap();

	// Act
	let child = orchestrator.attributes_for("child", ()).await.unwrap();
	let overridden = orchestrator
		.attributes_for("child", json!({"a": 99}))
		.await
		.unwrap();

	// Assert
	assert_eq!(child, json!({"a": 1, "b": 2}));
	assert_eq!(overridden, json!({"a": 99, "b": 2}));
}

#[rstest]
#[tokio::test]
async fn test_nested_child_inherits_parent_traits(orchestrator: Orchestrator) {
	// Arrange
	orchestrator
		.fixture("user", "User", FixtureOptions::new(), |f| {
			f.value("name", "Ann").value("admin", false);
			f.define_trait("admin", |t| {
				t.value("admin", true);
				Ok(())
			})?;
			f.fixture("moderator", Model::nothing(), FixtureOptions::new(), |m| {
				m.implicit("admin").value("name", "Mod");
				Ok(())
			})?;
			Ok(())
		})
		.unwrap();

	// Act
	let moderator = orchestrator.attributes_for("moderator", ()).await.unwrap();

	// Assert
	assert!(orchestrator.has_fixture("moderator"));
	assert_eq!(moderator, json!({"name": "Mod", "admin": true}));
}

#[rstest]
#[tokio::test]
async fn test_dependent_and_transient_attributes(
	recorded_orchestrator: (Orchestrator, RecordingAdapter),
) {
	// Arrange
	let (orchestrator, adapter) = recorded_orchestrator;
	orchestrator
		.fixture("user", "User", FixtureOptions::new(), |f| {
			f.transient(|t| {
				t.value("upcased", false);
				Ok(())
			})?;
			f.value("first", "ann");
			f.attr("name", |ev: Evaluator| async move {
				let first = ev.attr("first").await?;
				let first = first.as_str().unwrap_or_default();
				let name = if ev.attr("upcased").await? == json!(true) {
					first.to_uppercase()
				} else {
					first.to_string()
				};
				Ok::<_, FixtureError>(json!(name))
			});
			Ok(())
		})
		.unwrap();

	// Act
	let plain = orchestrator.build("user", ()).await.unwrap();
	let upcased = orchestrator
		.build("user", json!({"upcased": true}))
		.await
		.unwrap();
	let attributes = orchestrator
		.attributes_for("user", json!({"upcased": true}))
		.await
		.unwrap();
	let created = orchestrator
		.create("user", json!({"upcased": true}))
		.await
		.unwrap();

	// Assert
	assert_eq!(plain, json!({"first": "ann", "name": "ann"}));
	assert_eq!(upcased, json!({"first": "ann", "name": "ANN"}));
	assert_eq!(attributes, json!({"first": "ann", "name": "ANN"}));
	assert_eq!(created, json!({"first": "ann", "name": "ANN", "id": 1}));
	let assigned: Vec<String> = adapter
		.calls()
		.await
		.into_iter()
		.filter(|call| call.operation == AdapterOperation::Set)
		.filter_map(|call| call.attribute)
		.collect();
	assert!(assigned.iter().any(|name| name == "name"));
	assert!(!assigned.iter().any(|name| name == "upcased"));
}

#[rstest]
#[tokio::test]
async fn test_cyclic_attributes_fail(orchestrator: Orchestrator) {
	orchestrator
		.fixture("loop", "Loop", FixtureOptions::new(), |f| {
			f.attr("a", |ev: Evaluator| async move { ev.attr("b").await });
			f.attr("b", |ev: Evaluator| async move { ev.attr("a").await });
			Ok(())
		})
		.unwrap();

	let result = orchestrator.attributes_for("loop", ()).await;

	assert!(matches!(result, Err(FixtureError::CyclicAttribute { .. })));
}

#[rstest]
#[tokio::test]
async fn test_sequences_advance_and_reset(orchestrator: Orchestrator) {
	// Arrange
	orchestrator
		.fixture("user", "User", FixtureOptions::new(), |f| {
			f.sequence(
				"email",
				SequenceOptions::new().with_callback(|n| json!(format!("user{n}@example.com"))),
			)?;
			f.sequence("code", "z")?;
			Ok(())
		})
		.unwrap();

	// Act
	let users = orchestrator.attributes_for_list("user", 3, ()).await.unwrap();
	orchestrator.reset_sequences();
	let after_reset = orchestrator.attributes_for("user", ()).await.unwrap();

	// Assert
	let emails: Vec<&Value> = users.iter().map(|u| &u["email"]).collect();
	let codes: Vec<&Value> = users.iter().map(|u| &u["code"]).collect();
	assert_eq!(
		emails,
		vec![
			&json!("user1@example.com"),
			&json!("user2@example.com"),
			&json!("user3@example.com"),
		]
	);
	assert_eq!(codes, vec![&json!("z"), &json!("aa"), &json!("ab")]);
	assert_eq!(after_reset["email"], json!("user1@example.com"));
	assert_eq!(after_reset["code"], json!("z"));
}

#[rstest]
#[tokio::test]
async fn test_implicit_name_uses_global_sequence(orchestrator: Orchestrator) {
	// Arrange
	orchestrator
		.define_sequence("serial", SequenceOptions::new().with_start(100))
		.unwrap();
	orchestrator
		.fixture("device", "Device", FixtureOptions::new(), |f| {
			f.implicit("serial");
			Ok(())
		})
		.unwrap();

	// Act
	let (first, second) = orchestrator.attributes_for_pair("device", ()).await.unwrap();

	// Assert
	assert_eq!(first["serial"], json!(100));
	assert_eq!(second["serial"], json!(101));
	assert_eq!(
		orchestrator.sequence("serial").map(|s| s.name().to_string()),
		Some("serial".to_string())
	);
}

#[rstest]
#[tokio::test]
async fn test_alias_builds_same_fixture(orchestrator: Orchestrator) {
	define_user(&orchestrator);

	let by_name = orchestrator.build("user", ()).await.unwrap();
	let by_alias = orchestrator.build("person", ()).await.unwrap();

	assert_eq!(by_name, by_alias);
	assert_eq!(orchestrator.fixture_names(), vec!["user"]);
}

#[rstest]
#[case("user")]
#[case("person")]
fn test_taken_name_or_alias_is_rejected(orchestrator: Orchestrator, #[case] taken: &str) {
	define_user(&orchestrator);

	let by_name = orchestrator.fixture(taken, "User", FixtureOptions::new(), |_| Ok(()));
	let by_alias = orchestrator.fixture(
		"admin",
		"User",
		FixtureOptions::new().with_alias(taken),
		|_| Ok(()),
	);

	assert!(matches!(by_name, Err(FixtureError::DuplicateDefinition(_))));
	assert!(matches!(by_alias, Err(FixtureError::DuplicateDefinition(_))));
	assert!(!orchestrator.has_fixture("admin"));
}

#[rstest]
#[tokio::test]
async fn test_unknown_applied_trait_fails(orchestrator: Orchestrator) {
	define_user(&orchestrator);

	let result = orchestrator.build("user", ["missing"]).await;

	assert!(matches!(result, Err(FixtureError::UnknownTrait { .. })));
}

#[rstest]
#[tokio::test]
async fn test_global_trait_applies_to_any_fixture(orchestrator: Orchestrator) {
	// Arrange
	orchestrator
		.define_trait("archived", |t| {
			t.value("archived", true);
			Ok(())
		})
		.unwrap();
	define_user(&orchestrator);

	// Act
	let user = orchestrator.attributes_for("user", ["archived"]).await.unwrap();

	// Assert
	assert_eq!(user["archived"], json!(true));
}

#[rstest]
#[tokio::test]
async fn test_callback_order(orchestrator: Orchestrator) {
	// Arrange
	orchestrator
		.after(&["build"], |instance: Value, _: Evaluator| {
			push_tag(instance, "global")
		})
		.unwrap();
	orchestrator
		.fixture("parent", "User", FixtureOptions::new(), |f| {
			f.after(&["build"], |instance: Value, _: Evaluator| {
				push_tag(instance, "parent")
			})?;
			Ok(())
		})
		.unwrap();
	orchestrator
		.fixture(
			"child",
			Model::nothing(),
			FixtureOptions::new().with_parent("parent"),
			|f| {
				f.after(&["build"], |instance: Value, _: Evaluator| {
					push_tag(instance, "own")
				})?;
				f.define_trait("audited", |t| {
					t.after(&["build"], |instance: Value, _: Evaluator| {
						push_tag(instance, "trait")
					})?;
					Ok(())
				})?;
				Ok(())
			},
		)
		.unwrap();

	// Act
	let plain = orchestrator.build("child", ()).await.unwrap();
	let audited = orchestrator.build("child", ["audited"]).await.unwrap();

	// Assert
	assert_eq!(plain["seen"], json!("global;parent;own;"));
	assert_eq!(audited["seen"], json!("global;parent;own;trait;"));
}

#[rstest]
#[tokio::test]
async fn test_typed_results(orchestrator: Orchestrator) {
	#[derive(Debug, Deserialize, PartialEq)]
	struct User {
		name: String,
		age: u32,
	}
	define_user(&orchestrator);

	let user: User = orchestrator.build_as("user", ["old"]).await.unwrap();
	let mismatch = orchestrator
		.build_as::<User>("user", json!({"age": "unknown"}))
		.await;

	assert_eq!(
		user,
		User {
			name: "Ann".to_string(),
			age: 100,
		}
	);
	assert!(matches!(mismatch, Err(FixtureError::Json(_))));
}
