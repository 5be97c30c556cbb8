//! Patch operations and the apply driver.
//!
//! [`apply`] is the engine's entry point: it clones the caller's resource,
//! applies each operation in order against the working copy, and returns
//! the copy only when every operation succeeded. Any violated precondition
//! aborts the whole call, so partial application is never observable.
//! Primary-uniqueness enforcement runs once, after the full list.

mod complex;
mod multi;
mod primary;
mod singular;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PatchError;
use crate::path::{self, ResolvedTarget};
use crate::schema::{AttributeShape, SchemaRegistry};
use crate::value::{Resource, Value};

/// Patch operation kind, in RFC 7644 wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOp::Add => write!(f, "add"),
            PatchOp::Replace => write!(f, "replace"),
            PatchOp::Remove => write!(f, "remove"),
        }
    }
}

/// One patch instruction: operation kind, optional target path, optional
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<Value>,
}

/// Applies an ordered operation list to a resource of the given type.
///
/// The caller's `resource` is never mutated; on success the mutated working
/// copy is returned.
///
/// # Errors
///
/// `InvalidSyntax` for an empty operation list; otherwise the first
/// operation to violate a precondition aborts the call with its
/// [`PatchError`].
pub fn apply(
    registry: &SchemaRegistry,
    resource_type: &str,
    resource: &Resource,
    operations: &[PatchOperation],
) -> Result<Resource, PatchError> {
    if operations.is_empty() {
        return Err(PatchError::InvalidSyntax);
    }

    let mut working = resource.clone();
    let mut tracker = primary::PrimaryTracker::default();
    for operation in operations {
        apply_one(registry, resource_type, &mut working, operation, &mut tracker)?;
    }
    primary::enforce(&mut working, &tracker);
    Ok(working)
}

fn apply_one(
    registry: &SchemaRegistry,
    resource_type: &str,
    working: &mut Resource,
    operation: &PatchOperation,
    tracker: &mut primary::PrimaryTracker,
) -> Result<(), PatchError> {
    debug!(
        op = %operation.op,
        path = operation.path.as_deref().unwrap_or(""),
        "applying patch operation"
    );

    match operation.path.as_deref().filter(|path| !path.is_empty()) {
        // Omitted target: the value is a map of top-level attributes to
        // merge into the resource itself.
        None => match operation.op {
            PatchOp::Remove => Err(PatchError::no_target(
                "path is required for a remove operation",
            )),
            PatchOp::Add | PatchOp::Replace => {
                let value = operation.value.as_ref().ok_or_else(|| {
                    PatchError::invalid_value("value is required when path is omitted")
                })?;
                let entries = value.as_complex().ok_or_else(|| {
                    PatchError::invalid_value(format!(
                        "omitted-path {} expects a map value, got {}",
                        operation.op,
                        value.shape_name()
                    ))
                })?;
                for (name, entry_value) in entries {
                    let scoped = PatchOperation {
                        op: operation.op,
                        path: Some(name.clone()),
                        value: Some(entry_value.clone()),
                    };
                    apply_one(registry, resource_type, working, &scoped, tracker)?;
                }
                Ok(())
            }
        },
        Some(raw_path) => {
            let target = path::resolve(registry, resource_type, raw_path)?;
            apply_resolved(working, &target, operation, tracker)
        }
    }
}

fn apply_resolved(
    working: &mut Resource,
    target: &ResolvedTarget<'_>,
    operation: &PatchOperation,
    tracker: &mut primary::PrimaryTracker,
) -> Result<(), PatchError> {
    // Extension attributes live in a nested map keyed by the extension URN.
    let container: &mut Resource = if target.extension {
        if !working.contains_key(&target.schema.urn) {
            if operation.op == PatchOp::Remove {
                return Ok(());
            }
            working.insert(target.schema.urn.clone(), Value::Complex(BTreeMap::new()));
        }
        match working.get_mut(&target.schema.urn) {
            Some(Value::Complex(map)) => map,
            _ => {
                return Err(PatchError::invalid_value(format!(
                    "extension {:?} holds a non-complex value",
                    target.schema.urn
                )))
            }
        }
    } else {
        working
    };

    match target.attribute.shape() {
        AttributeShape::Singular(_) => singular::apply(
            container,
            target.attribute,
            operation.op,
            operation.value.as_ref(),
        ),
        AttributeShape::Complex => complex::apply(
            container,
            target.attribute,
            target.sub_attribute,
            operation.op,
            operation.value.as_ref(),
        ),
        AttributeShape::MultiSingular(kind) => multi::apply_simple(
            container,
            target.attribute,
            kind,
            operation.op,
            operation.value.as_ref(),
        ),
        AttributeShape::MultiComplex => {
            let track = target.attribute.has_primary_flag();
            let before = track
                .then(|| primary::primary_flags(container.get(&target.attribute.name)))
                .unwrap_or_default();

            multi::apply(
                container,
                target.attribute,
                target.sub_attribute,
                target.filter.as_ref(),
                operation.op,
                operation.value.as_ref(),
            )?;

            if track {
                let after = primary::primary_flags(container.get(&target.attribute.name));
                if let Some(winner) = primary::new_primary_index(&before, &after) {
                    let extension_urn = target.extension.then(|| target.schema.urn.as_str());
                    tracker.record(extension_urn, &target.attribute.name, winner);
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::schema::fixtures;

    fn user() -> Resource {
        resource(json!({
            "id": "2819c223-7f76-453a-919d-413861904646",
            "userName": "alice",
            "title": "Engineer",
        }))
    }

    fn resource(json: serde_json::Value) -> Resource {
        match Value::from_json(json) {
            Value::Complex(map) => map,
            other => panic!("resource fixture must be an object, got {other:?}"),
        }
    }

    fn op(op: PatchOp, path: impl Into<Option<&'static str>>, value: Option<serde_json::Value>) -> PatchOperation {
        PatchOperation {
            op,
            path: path.into().map(str::to_string),
            value: value.map(Value::from_json),
        }
    }

    fn primaries(resource: &Resource, attribute: &str) -> Vec<bool> {
        resource[attribute]
            .as_multi()
            .unwrap()
            .iter()
            .map(|e| {
                e.as_complex()
                    .and_then(|m| m.get("primary"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .collect()
    }

    // ---- driver-level preconditions ----

    #[test]
    fn empty_operation_list_is_invalid_syntax() {
        let registry = fixtures::registry();
        let err = apply(&registry, "User", &user(), &[]).unwrap_err();
        assert_eq!(err, PatchError::InvalidSyntax);
    }

    #[test]
    fn failure_leaves_no_partial_application_observable() {
        let registry = fixtures::registry();
        let original = user();
        let operations = [
            op(PatchOp::Add, "displayName", Some(json!("Alice"))),
            // Second operation fails; the first must not leak out.
            op(PatchOp::Remove, "userName", None),
        ];
        let err = apply(&registry, "User", &original, &operations).unwrap_err();
        assert_eq!(err.scim_type(), "mutability");
        assert!(!original.contains_key("displayName"));
    }

    #[test]
    fn caller_resource_is_never_mutated() {
        let registry = fixtures::registry();
        let original = user();
        let snapshot = original.clone();
        let result = apply(
            &registry,
            "User",
            &original,
            &[op(PatchOp::Replace, "title", Some(json!("Manager")))],
        )
        .unwrap();
        assert_eq!(original, snapshot);
        assert_eq!(result["title"], Value::from("Manager"));
    }

    // ---- omitted target ----

    #[test]
    fn omitted_path_add_merges_top_level_attributes() {
        let registry = fixtures::registry();
        let result = apply(
            &registry,
            "User",
            &user(),
            &[op(PatchOp::Add, None, Some(json!({"displayName": "Alice Smith"})))],
        )
        .unwrap();
        assert_eq!(result["displayName"], Value::from("Alice Smith"));
        assert_eq!(result["userName"], Value::from("alice"));
    }

    #[test]
    fn omitted_path_replace_overwrites_existing() {
        let registry = fixtures::registry();
        let mut base = user();
        base.insert("displayName".to_string(), Value::from("old"));
        let result = apply(
            &registry,
            "User",
            &base,
            &[op(PatchOp::Replace, None, Some(json!({"displayName": "new"})))],
        )
        .unwrap();
        assert_eq!(result["displayName"], Value::from("new"));
    }

    #[test]
    fn omitted_path_remove_is_no_target() {
        let registry = fixtures::registry();
        let err = apply(&registry, "User", &user(), &[op(PatchOp::Remove, None, None)])
            .unwrap_err();
        assert_eq!(err.scim_type(), "noTarget");
    }

    #[test]
    fn omitted_path_with_scalar_value_is_invalid_value() {
        let registry = fixtures::registry();
        let err = apply(
            &registry,
            "User",
            &user(),
            &[op(PatchOp::Add, None, Some(json!("loose string")))],
        )
        .unwrap_err();
        assert_eq!(err.scim_type(), "invalidValue");
    }

    // ---- singular and complex targets, end to end ----

    #[test]
    fn add_display_name_sets_it() {
        let registry = fixtures::registry();
        let result = apply(
            &registry,
            "User",
            &user(),
            &[op(PatchOp::Add, "displayName", Some(json!("Alice")))],
        )
        .unwrap();
        assert_eq!(result["displayName"], Value::from("Alice"));
    }

    #[test]
    fn remove_user_name_is_mutability() {
        let registry = fixtures::registry();
        let err = apply(&registry, "User", &user(), &[op(PatchOp::Remove, "userName", None)])
            .unwrap_err();
        assert_eq!(err.scim_type(), "mutability");
    }

    #[test]
    fn unknown_attribute_path_is_invalid_path() {
        let registry = fixtures::registry();
        for kind in [PatchOp::Add, PatchOp::Replace, PatchOp::Remove] {
            let value = (kind != PatchOp::Remove).then(|| json!("dummy"));
            let err = apply(&registry, "User", &user(), &[op(kind, "garbage", value)])
                .unwrap_err();
            assert_eq!(err.scim_type(), "invalidPath");
        }
    }

    #[test]
    fn nested_name_sub_attribute_replace() {
        let registry = fixtures::registry();
        let base = resource(json!({
            "id": "x", "userName": "alice",
            "name": {"givenName": "Alice", "familyName": "Smith"},
        }));
        let result = apply(
            &registry,
            "User",
            &base,
            &[op(PatchOp::Replace, "name.givenName", Some(json!("Alicia")))],
        )
        .unwrap();
        let name = result["name"].as_complex().unwrap();
        assert_eq!(name["givenName"], Value::from("Alicia"));
        assert_eq!(name["familyName"], Value::from("Smith"));
    }

    // ---- multi-valued targets, end to end ----

    #[test]
    fn filtered_primary_replace_demotes_other_elements() {
        let registry = fixtures::registry();
        let base = resource(json!({
            "id": "x", "userName": "alice",
            "addresses": [
                {"type": "home", "primary": false},
                {"type": "work", "primary": true},
            ],
        }));
        let result = apply(
            &registry,
            "User",
            &base,
            &[op(
                PatchOp::Replace,
                r#"addresses[type EQ "home"].primary"#,
                Some(json!(true)),
            )],
        )
        .unwrap();
        assert_eq!(primaries(&result, "addresses"), vec![true, false]);
    }

    #[test]
    fn enforcer_runs_once_per_attribute_after_whole_list() {
        let registry = fixtures::registry();
        let base = resource(json!({
            "id": "x", "userName": "alice",
            "addresses": [
                {"type": "home", "primary": false},
                {"type": "work", "primary": true},
            ],
            "emails": [
                {"type": "home", "value": "h@example.com", "primary": true},
                {"type": "work", "value": "w@example.com", "primary": false},
            ],
        }));
        let operations = [
            op(PatchOp::Add, r#"addresses[type EQ "home"].primary"#, Some(json!(true))),
            op(PatchOp::Add, r#"emails[type EQ "work"].primary"#, Some(json!(true))),
        ];
        let result = apply(&registry, "User", &base, &operations).unwrap();
        assert_eq!(primaries(&result, "addresses"), vec![true, false]);
        assert_eq!(primaries(&result, "emails"), vec![false, true]);
    }

    #[test]
    fn two_grants_to_same_attribute_keep_only_the_last() {
        let registry = fixtures::registry();
        let base = resource(json!({
            "id": "x", "userName": "alice",
            "emails": [
                {"type": "home", "value": "h@example.com", "primary": false},
                {"type": "work", "value": "w@example.com", "primary": false},
            ],
        }));
        let operations = [
            op(PatchOp::Replace, r#"emails[type EQ "home"].primary"#, Some(json!(true))),
            op(PatchOp::Replace, r#"emails[type EQ "work"].primary"#, Some(json!(true))),
        ];
        let result = apply(&registry, "User", &base, &operations).unwrap();
        assert_eq!(primaries(&result, "emails"), vec![false, true]);
    }

    #[test]
    fn filtered_replace_with_no_match_is_no_target() {
        let registry = fixtures::registry();
        let err = apply(
            &registry,
            "User",
            &user(),
            &[op(
                PatchOp::Replace,
                r#"addresses[type EQ "work"].locality"#,
                Some(json!("Rochester")),
            )],
        )
        .unwrap_err();
        assert_eq!(err.scim_type(), "noTarget");
    }

    #[test]
    fn filtered_remove_matching_two_elements_is_too_many() {
        let registry = fixtures::registry();
        let base = resource(json!({
            "id": "x", "userName": "alice",
            "addresses": [
                {"type": "work", "streetAddress": "1 Main St"},
                {"type": "work", "streetAddress": "2 Oak Ave"},
            ],
        }));
        let err = apply(
            &registry,
            "User",
            &base,
            &[op(PatchOp::Remove, r#"addresses[type EQ "work"].streetAddress"#, None)],
        )
        .unwrap_err();
        assert_eq!(err.scim_type(), "tooMany");
    }

    #[test]
    fn group_membership_add_and_filtered_remove() {
        let registry = fixtures::registry();
        let base = resource(json!({
            "id": "g-1", "displayName": "Admins",
            "members": [{"value": "u-1", "display": "Alice"}],
        }));
        let added = apply(
            &registry,
            "Group",
            &base,
            &[op(PatchOp::Add, "members", Some(json!({"value": "u-2", "display": "Bob"})))],
        )
        .unwrap();
        assert_eq!(added["members"].as_multi().unwrap().len(), 2);

        let removed = apply(
            &registry,
            "Group",
            &added,
            &[op(PatchOp::Remove, r#"members[value EQ "u-1"]"#, None)],
        )
        .unwrap();
        let members = removed["members"].as_multi().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(
            members[0].as_complex().unwrap()["value"],
            Value::from("u-2")
        );
    }

    // ---- extension schemas ----

    #[test]
    fn extension_add_creates_nested_extension_map() {
        let registry = fixtures::registry();
        let result = apply(
            &registry,
            "User",
            &user(),
            &[op(
                PatchOp::Add,
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:costCenter",
                Some(json!("4130")),
            )],
        )
        .unwrap();
        let extension = result[fixtures::ENTERPRISE_URN].as_complex().unwrap();
        assert_eq!(extension["costCenter"], Value::from("4130"));
    }

    #[test]
    fn extension_sub_attribute_replace() {
        let registry = fixtures::registry();
        let base = resource(json!({
            "id": "x", "userName": "alice",
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                "manager": {"value": "u-9", "displayName": "Carol"},
            },
        }));
        let result = apply(
            &registry,
            "User",
            &base,
            &[op(
                PatchOp::Replace,
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.displayName",
                Some(json!("Dan")),
            )],
        )
        .unwrap();
        let manager = result[fixtures::ENTERPRISE_URN].as_complex().unwrap()["manager"]
            .as_complex()
            .unwrap();
        assert_eq!(manager["displayName"], Value::from("Dan"));
        assert_eq!(manager["value"], Value::from("u-9"));
    }

    #[test]
    fn extension_remove_below_absent_extension_is_no_op() {
        let registry = fixtures::registry();
        let result = apply(
            &registry,
            "User",
            &user(),
            &[op(
                PatchOp::Remove,
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:department",
                None,
            )],
        )
        .unwrap();
        assert!(!result.contains_key(fixtures::ENTERPRISE_URN));
    }

    // ---- wire shape ----

    #[test]
    fn patch_operation_deserializes_wire_shape() {
        let operation: PatchOperation = serde_json::from_value(json!({
            "op": "replace",
            "path": "displayName",
            "value": "Alice",
        }))
        .unwrap();
        assert_eq!(operation.op, PatchOp::Replace);
        assert_eq!(operation.path.as_deref(), Some("displayName"));
        assert_eq!(operation.value, Some(Value::from("Alice")));

        let operation: PatchOperation =
            serde_json::from_value(json!({"op": "remove", "path": "title"})).unwrap();
        assert_eq!(operation.op, PatchOp::Remove);
        assert_eq!(operation.value, None);
    }

    // ---- properties ----

    proptest! {
        /// ADD then REMOVE of an optional singular attribute returns the
        /// resource to its pre-ADD state.
        #[test]
        fn add_then_remove_round_trips(value in "[a-zA-Z0-9 ]{0,24}") {
            let registry = fixtures::registry();
            let base = user();
            let added = apply(
                &registry,
                "User",
                &base,
                &[op(PatchOp::Add, "nickName", Some(json!(value)))],
            )
            .unwrap();
            let removed = apply(
                &registry,
                "User",
                &added,
                &[op(PatchOp::Remove, "nickName", None)],
            )
            .unwrap();
            prop_assert_eq!(removed, base);
        }

        /// Re-adding the current value never changes the resource.
        #[test]
        fn equal_value_add_is_idempotent(value in "[a-zA-Z0-9 ]{1,24}") {
            let registry = fixtures::registry();
            let mut base = user();
            base.insert("title".to_string(), Value::from(value.clone()));
            let result = apply(
                &registry,
                "User",
                &base,
                &[op(PatchOp::Add, "title", Some(json!(value)))],
            )
            .unwrap();
            prop_assert_eq!(result, base);
        }
    }
}
