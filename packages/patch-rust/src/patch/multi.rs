//! Mutator for multi-valued attributes.
//!
//! Covers the whole-list operations (no filter), filtered element
//! selection, and the sub-attribute-scoped variants of each. One observed
//! quirk is preserved deliberately: a filtered REPLACE without a
//! sub-attribute falls back to whole-list replacement when the collection
//! already holds more than one element and the supplied value is itself a
//! sequence. Treat that as documented behavior, not the only defensible
//! reading of RFC 7644.

use std::collections::BTreeMap;

use crate::error::PatchError;
use crate::filter::matching_indices;
use crate::patch::{singular, PatchOp};
use crate::path::ValueFilter;
use crate::schema::{AttributeDescriptor, AttributeKind};
use crate::value::{Resource, Value};

/// Applies one operation to a multi-valued complex attribute.
pub(crate) fn apply(
    container: &mut Resource,
    attribute: &AttributeDescriptor,
    sub_attribute: Option<&AttributeDescriptor>,
    filter: Option<&ValueFilter>,
    op: PatchOp,
    value: Option<&Value>,
) -> Result<(), PatchError> {
    match filter {
        None => apply_unfiltered(container, attribute, sub_attribute, op, value),
        Some(filter) => apply_filtered(container, attribute, sub_attribute, filter, op, value),
    }
}

fn apply_unfiltered(
    container: &mut Resource,
    attribute: &AttributeDescriptor,
    sub_attribute: Option<&AttributeDescriptor>,
    op: PatchOp,
    value: Option<&Value>,
) -> Result<(), PatchError> {
    match (sub_attribute, op) {
        // Whole-attribute removal unassigns the attribute entirely.
        (None, PatchOp::Remove) => {
            singular::check_removable(attribute)?;
            container.remove(&attribute.name);
            Ok(())
        }
        (None, PatchOp::Add | PatchOp::Replace) => {
            let value = require_value(attribute, op, value)?;
            match value {
                // A sequence value replaces the whole list.
                Value::Multi(elements) => {
                    for element in elements {
                        check_element(attribute, element)?;
                    }
                    container.insert(attribute.name.clone(), value.clone());
                    Ok(())
                }
                // A single map is appended (ADD) or becomes the sole
                // element (REPLACE).
                Value::Complex(_) => {
                    check_element(attribute, value)?;
                    match op {
                        PatchOp::Add => {
                            elements_mut(container, attribute)?.push(value.clone());
                        }
                        _ => {
                            container
                                .insert(attribute.name.clone(), Value::Multi(vec![value.clone()]));
                        }
                    }
                    Ok(())
                }
                other => Err(PatchError::invalid_value(format!(
                    "multi-valued attribute {:?} expects a map or list value, got {}",
                    attribute.name,
                    other.shape_name()
                ))),
            }
        }
        // Sub-attribute scope without a filter targets every element.
        (Some(sub), _) => {
            let Some(elements) = existing_elements_mut(container, attribute)? else {
                return if op == PatchOp::Remove {
                    Ok(())
                } else {
                    Err(PatchError::no_target(format!(
                        "attribute {:?} has no elements to modify",
                        attribute.name
                    )))
                };
            };
            for element in elements.iter_mut() {
                let map = element_map_mut(attribute, element)?;
                singular::apply(map, sub, op, value)?;
            }
            Ok(())
        }
    }
}

fn apply_filtered(
    container: &mut Resource,
    attribute: &AttributeDescriptor,
    sub_attribute: Option<&AttributeDescriptor>,
    filter: &ValueFilter,
    op: PatchOp,
    value: Option<&Value>,
) -> Result<(), PatchError> {
    let current = container
        .get(&attribute.name)
        .and_then(Value::as_multi)
        .cloned()
        .unwrap_or_default();
    let indices = matching_indices(&current, filter, attribute);

    match (sub_attribute, op) {
        // Narrowed removal must single out exactly one element; zero
        // matches is "nothing to remove".
        (Some(_), PatchOp::Remove) if indices.len() > 1 => {
            Err(PatchError::too_many(format!(
                "filter on {:?} matched {} elements; narrow the filter",
                attribute.name,
                indices.len()
            )))
        }
        (Some(_), PatchOp::Remove) if indices.is_empty() => Ok(()),
        (Some(sub), PatchOp::Remove) => {
            let elements = existing_elements_mut(container, attribute)?
                .unwrap_or_else(|| unreachable!("matched index implies elements exist"));
            let map = element_map_mut(attribute, &mut elements[indices[0]])?;
            singular::apply(map, sub, PatchOp::Remove, None)
        }
        (Some(sub), PatchOp::Add | PatchOp::Replace) => {
            if indices.is_empty() {
                if op == PatchOp::Replace {
                    return Err(no_filter_match(attribute, filter));
                }
                // ADD with an unmatched filter creates the element the
                // filter describes, seeded from its equality clause.
                let mut seeded = BTreeMap::new();
                seeded.insert(filter.attribute.clone(), filter.literal.clone());
                singular::apply(&mut seeded, sub, PatchOp::Add, value)?;
                elements_mut(container, attribute)?.push(Value::Complex(seeded));
                return Ok(());
            }
            let elements = existing_elements_mut(container, attribute)?
                .unwrap_or_else(|| unreachable!("matched index implies elements exist"));
            for index in indices {
                let map = element_map_mut(attribute, &mut elements[index])?;
                singular::apply(map, sub, op, value)?;
            }
            Ok(())
        }
        // Matched elements are deleted; an emptied list unassigns the
        // attribute.
        (None, PatchOp::Remove) => {
            if indices.is_empty() {
                return Ok(());
            }
            let elements = existing_elements_mut(container, attribute)?
                .unwrap_or_else(|| unreachable!("matched index implies elements exist"));
            for index in indices.into_iter().rev() {
                elements.remove(index);
            }
            if elements.is_empty() {
                container.remove(&attribute.name);
            }
            Ok(())
        }
        (None, PatchOp::Add | PatchOp::Replace) => {
            let value = require_value(attribute, op, value)?;
            match value {
                Value::Multi(new_elements) => {
                    for element in new_elements {
                        check_element(attribute, element)?;
                    }
                    // Whole-list fallback: with several elements present (or
                    // a matched single element) a sequence value replaces
                    // the attribute wholesale.
                    if current.len() > 1 || !indices.is_empty() || op == PatchOp::Add {
                        container.insert(attribute.name.clone(), value.clone());
                        Ok(())
                    } else {
                        Err(no_filter_match(attribute, filter))
                    }
                }
                Value::Complex(_) => {
                    check_element(attribute, value)?;
                    if indices.is_empty() {
                        if op == PatchOp::Replace {
                            return Err(no_filter_match(attribute, filter));
                        }
                        let mut seeded = value
                            .as_complex()
                            .unwrap_or_else(|| unreachable!("checked complex above"))
                            .clone();
                        seeded
                            .entry(filter.attribute.clone())
                            .or_insert_with(|| filter.literal.clone());
                        elements_mut(container, attribute)?.push(Value::Complex(seeded));
                        return Ok(());
                    }
                    let elements = existing_elements_mut(container, attribute)?
                        .unwrap_or_else(|| unreachable!("matched index implies elements exist"));
                    for index in indices {
                        elements[index] = value.clone();
                    }
                    Ok(())
                }
                other => Err(PatchError::invalid_value(format!(
                    "multi-valued attribute {:?} expects a map or list value, got {}",
                    attribute.name,
                    other.shape_name()
                ))),
            }
        }
    }
}

/// Applies one operation to a multi-valued scalar attribute (no
/// sub-attributes, so filters are never resolved against these).
pub(crate) fn apply_simple(
    container: &mut Resource,
    attribute: &AttributeDescriptor,
    kind: AttributeKind,
    op: PatchOp,
    value: Option<&Value>,
) -> Result<(), PatchError> {
    match op {
        PatchOp::Remove => {
            singular::check_removable(attribute)?;
            container.remove(&attribute.name);
            Ok(())
        }
        PatchOp::Add | PatchOp::Replace => {
            let value = require_value(attribute, op, value)?;
            match value {
                Value::Multi(elements) => {
                    for element in elements {
                        if !element.conforms_to(kind) {
                            return Err(element_kind_error(attribute, kind, element));
                        }
                    }
                    container.insert(attribute.name.clone(), value.clone());
                    Ok(())
                }
                scalar if scalar.conforms_to(kind) => {
                    match op {
                        PatchOp::Add => {
                            elements_mut(container, attribute)?.push(scalar.clone());
                        }
                        _ => {
                            container.insert(
                                attribute.name.clone(),
                                Value::Multi(vec![scalar.clone()]),
                            );
                        }
                    }
                    Ok(())
                }
                other => Err(element_kind_error(attribute, kind, other)),
            }
        }
    }
}

fn require_value<'v>(
    attribute: &AttributeDescriptor,
    op: PatchOp,
    value: Option<&'v Value>,
) -> Result<&'v Value, PatchError> {
    value.ok_or_else(|| {
        PatchError::invalid_value(format!(
            "value is required to {op} attribute {:?}",
            attribute.name
        ))
    })
}

fn no_filter_match(attribute: &AttributeDescriptor, filter: &ValueFilter) -> PatchError {
    PatchError::no_target(format!(
        "filter [{} {} {:?}] matched no elements of {:?}",
        filter.attribute, filter.op, filter.literal, attribute.name
    ))
}

fn element_kind_error(
    attribute: &AttributeDescriptor,
    kind: AttributeKind,
    value: &Value,
) -> PatchError {
    PatchError::invalid_value(format!(
        "elements of {:?} expect {kind:?}, got {}",
        attribute.name,
        value.shape_name()
    ))
}

/// Validates that a list element is a complex map whose entries the schema
/// defines and whose values conform to their declared kinds.
fn check_element(attribute: &AttributeDescriptor, element: &Value) -> Result<(), PatchError> {
    let map = element.as_complex().ok_or_else(|| {
        PatchError::invalid_value(format!(
            "elements of {:?} must be complex, got {}",
            attribute.name,
            element.shape_name()
        ))
    })?;
    for (name, value) in map {
        let sub = attribute.sub_attribute(name).ok_or_else(|| {
            PatchError::invalid_path(format!(
                "sub-attribute {name:?} not defined by {:?}",
                attribute.name
            ))
        })?;
        if !value.conforms_to(sub.kind) {
            return Err(PatchError::invalid_value(format!(
                "sub-attribute {name:?} of {:?} expects {:?}, got {}",
                attribute.name,
                sub.kind,
                value.shape_name()
            )));
        }
    }
    Ok(())
}

/// The element list for an attribute, created empty when absent.
fn elements_mut<'c>(
    container: &'c mut Resource,
    attribute: &AttributeDescriptor,
) -> Result<&'c mut Vec<Value>, PatchError> {
    container
        .entry(attribute.name.clone())
        .or_insert_with(|| Value::Multi(Vec::new()))
        .as_multi_mut()
        .ok_or_else(|| non_list_error(attribute))
}

/// The element list for an attribute, or `None` when the attribute is
/// unassigned. Never creates the attribute.
fn existing_elements_mut<'c>(
    container: &'c mut Resource,
    attribute: &AttributeDescriptor,
) -> Result<Option<&'c mut Vec<Value>>, PatchError> {
    match container.get_mut(&attribute.name) {
        None => Ok(None),
        Some(existing) => existing
            .as_multi_mut()
            .map(Some)
            .ok_or_else(|| non_list_error(attribute)),
    }
}

fn element_map_mut<'e>(
    attribute: &AttributeDescriptor,
    element: &'e mut Value,
) -> Result<&'e mut BTreeMap<String, Value>, PatchError> {
    element.as_complex_mut().ok_or_else(|| {
        PatchError::invalid_value(format!(
            "elements of {:?} must be complex",
            attribute.name
        ))
    })
}

fn non_list_error(attribute: &AttributeDescriptor) -> PatchError {
    PatchError::invalid_value(format!(
        "attribute {:?} holds a non-list value",
        attribute.name
    ))
}
