//! Value-filter matching over multi-valued attribute elements.
//!
//! Evaluates a single equality clause against each element of an ordered
//! list and returns the matching positions. An empty result is not an
//! error here; the mutators decide what zero matches means per operation.

use crate::path::{FilterOp, ValueFilter};
use crate::schema::AttributeDescriptor;
use crate::value::Value;

/// Returns the ordered indices of elements matching the filter clause.
///
/// Elements that are not complex maps, or that lack the filtered
/// sub-attribute, never match. String comparison is case-sensitive unless
/// the sub-attribute descriptor declares canonical values (e.g. `type`),
/// in which case it is case-insensitive. The distinction is driven entirely
/// by the descriptor, never by the sub-attribute's name.
#[must_use]
pub fn matching_indices(
    elements: &[Value],
    filter: &ValueFilter,
    attribute: &AttributeDescriptor,
) -> Vec<usize> {
    let case_insensitive = attribute
        .sub_attribute(&filter.attribute)
        .is_some_and(|sub| !sub.canonical_values.is_empty());

    elements
        .iter()
        .enumerate()
        .filter_map(|(index, element)| {
            let actual = element.as_complex()?.get(&filter.attribute)?;
            clause_matches(actual, filter, case_insensitive).then_some(index)
        })
        .collect()
}

fn clause_matches(actual: &Value, filter: &ValueFilter, case_insensitive: bool) -> bool {
    match filter.op {
        FilterOp::Eq => match (actual, &filter.literal) {
            (Value::String(a), Value::String(b)) if case_insensitive => {
                a.eq_ignore_ascii_case(b)
            }
            (a, b) => a == b,
        },
    }
}
