//! Mutator for single-valued scalar attributes.
//!
//! Also the recursion base for the complex and multi-valued mutators, which
//! delegate sub-attribute writes here against the nested map.

use crate::error::PatchError;
use crate::patch::PatchOp;
use crate::schema::{AttributeDescriptor, Mutability};
use crate::value::{Resource, Value};

/// Rejects removal of attributes the schema forbids unassigning.
///
/// Required attributes must always hold a value; read-only and immutable
/// attributes may not be changed by the caller at all.
pub(crate) fn check_removable(attribute: &AttributeDescriptor) -> Result<(), PatchError> {
    if attribute.required || attribute.mutability != Mutability::ReadWrite {
        return Err(PatchError::mutability(format!(
            "attribute {:?} cannot be removed",
            attribute.name
        )));
    }
    Ok(())
}

/// Applies one operation to a scalar key within `container`.
///
/// ADD and REPLACE share semantics per RFC 7644: an absent key is set, a
/// structurally equal value is a success no-op, anything else overwrites.
/// REMOVE of an absent key is a no-op.
pub(crate) fn apply(
    container: &mut Resource,
    attribute: &AttributeDescriptor,
    op: PatchOp,
    value: Option<&Value>,
) -> Result<(), PatchError> {
    match op {
        PatchOp::Remove => {
            check_removable(attribute)?;
            container.remove(&attribute.name);
            Ok(())
        }
        PatchOp::Add | PatchOp::Replace => {
            let value = value.ok_or_else(|| {
                PatchError::invalid_value(format!(
                    "value is required to {op} attribute {:?}",
                    attribute.name
                ))
            })?;
            if !value.conforms_to(attribute.kind) {
                return Err(PatchError::invalid_value(format!(
                    "attribute {:?} expects {:?}, got {}",
                    attribute.name,
                    attribute.kind,
                    value.shape_name()
                )));
            }
            match container.get(&attribute.name) {
                // Repeating an already-present value is a success, not an error.
                Some(existing) if existing == value => Ok(()),
                Some(_) if attribute.mutability != Mutability::ReadWrite => {
                    Err(PatchError::mutability(format!(
                        "attribute {:?} is {:?}",
                        attribute.name, attribute.mutability
                    )))
                }
                _ => {
                    container.insert(attribute.name.clone(), value.clone());
                    Ok(())
                }
            }
        }
    }
}
