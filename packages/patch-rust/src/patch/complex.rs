//! Mutator for single-valued complex attributes.
//!
//! Wraps the singular mutator recursively: whole-attribute writes fan each
//! entry of the value map out to the nested map, and sub-attribute-scoped
//! operations delegate directly, creating the nested map when an ADD or
//! REPLACE needs it.

use std::collections::BTreeMap;

use crate::error::PatchError;
use crate::patch::{singular, PatchOp};
use crate::schema::AttributeDescriptor;
use crate::value::{Resource, Value};

/// Applies one operation to a complex attribute within `container`.
pub(crate) fn apply(
    container: &mut Resource,
    attribute: &AttributeDescriptor,
    sub_attribute: Option<&AttributeDescriptor>,
    op: PatchOp,
    value: Option<&Value>,
) -> Result<(), PatchError> {
    match (sub_attribute, op) {
        // Sub-attribute-scoped: delegate into the nested map.
        (Some(sub), _) => {
            if !container.contains_key(&attribute.name) {
                if op == PatchOp::Remove {
                    // Nothing to delete below an absent parent.
                    return Ok(());
                }
                container.insert(attribute.name.clone(), Value::Complex(BTreeMap::new()));
            }
            let nested = container
                .get_mut(&attribute.name)
                .and_then(Value::as_complex_mut)
                .ok_or_else(|| {
                    PatchError::invalid_value(format!(
                        "attribute {:?} holds a non-complex value",
                        attribute.name
                    ))
                })?;
            singular::apply(nested, sub, op, value)
        }
        // Whole-attribute removal.
        (None, PatchOp::Remove) => {
            singular::check_removable(attribute)?;
            container.remove(&attribute.name);
            Ok(())
        }
        // Whole-attribute merge: value is a map of sub-attribute writes;
        // entries not mentioned stay untouched.
        (None, PatchOp::Add | PatchOp::Replace) => {
            let value = value.ok_or_else(|| {
                PatchError::invalid_value(format!(
                    "value is required to {op} attribute {:?}",
                    attribute.name
                ))
            })?;
            let entries = value.as_complex().ok_or_else(|| {
                PatchError::invalid_value(format!(
                    "complex attribute {:?} expects a map value, got {}",
                    attribute.name,
                    value.shape_name()
                ))
            })?;

            let nested = container
                .entry(attribute.name.clone())
                .or_insert_with(|| Value::Complex(BTreeMap::new()))
                .as_complex_mut()
                .ok_or_else(|| {
                    PatchError::invalid_value(format!(
                        "attribute {:?} holds a non-complex value",
                        attribute.name
                    ))
                })?;

            for (name, sub_value) in entries {
                let sub = attribute.sub_attribute(name).ok_or_else(|| {
                    PatchError::invalid_path(format!(
                        "sub-attribute {name:?} not defined by {:?}",
                        attribute.name
                    ))
                })?;
                singular::apply(nested, sub, op, Some(sub_value))?;
            }
            Ok(())
        }
    }
}
