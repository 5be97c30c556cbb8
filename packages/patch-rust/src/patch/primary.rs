//! Primary-uniqueness enforcement for multi-valued complex attributes.
//!
//! RFC 7644 §3.5.2: setting one element's `primary` to `true` forces
//! `primary` to `false` on every other element of the same attribute. The
//! apply driver tracks which attribute gained a primary element during the
//! operation list and runs [`enforce`] exactly once after all operations
//! succeed, so intermediate states inside one request never trigger partial
//! resets.

use tracing::warn;

use crate::value::{Resource, Value};

/// Where an affected attribute's element list lives: at the resource top
/// level, or nested under an extension URN key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TrackedPrimary {
    pub extension_urn: Option<String>,
    pub attribute: String,
    /// Index of the element most recently granted `primary == true`.
    pub winner: usize,
}

/// Accumulates, per affected attribute, the element that should keep its
/// `primary` flag once the whole operation list has been applied.
#[derive(Debug, Default)]
pub(crate) struct PrimaryTracker {
    entries: Vec<TrackedPrimary>,
}

impl PrimaryTracker {
    /// Records (or updates) the winning element for an attribute.
    pub(crate) fn record(
        &mut self,
        extension_urn: Option<&str>,
        attribute: &str,
        winner: usize,
    ) {
        let existing = self.entries.iter_mut().find(|entry| {
            entry.attribute == attribute && entry.extension_urn.as_deref() == extension_urn
        });
        match existing {
            Some(entry) => entry.winner = winner,
            None => self.entries.push(TrackedPrimary {
                extension_urn: extension_urn.map(str::to_string),
                attribute: attribute.to_string(),
                winner,
            }),
        }
    }
}

/// The per-element `primary == true` flags of an attribute's current list.
pub(crate) fn primary_flags(list: Option<&Value>) -> Vec<bool> {
    list.and_then(Value::as_multi)
        .map(|elements| {
            elements
                .iter()
                .map(|element| {
                    element
                        .as_complex()
                        .and_then(|map| map.get("primary"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Determines which element an operation granted `primary` to, comparing
/// the flag vectors from before and after the mutation.
///
/// Prefers the last newly-true index; when a wholesale list replacement
/// leaves several elements true without any being "new" at its index, the
/// last true index wins. `None` means the operation granted nothing.
pub(crate) fn new_primary_index(before: &[bool], after: &[bool]) -> Option<usize> {
    let newly_true = after
        .iter()
        .enumerate()
        .filter(|&(index, &flag)| flag && !before.get(index).copied().unwrap_or(false))
        .map(|(index, _)| index)
        .next_back();
    if newly_true.is_some() {
        return newly_true;
    }
    if after.iter().filter(|&&flag| flag).count() > 1 {
        return after.iter().rposition(|&flag| flag);
    }
    None
}

/// Forces `primary` to `false` on every element except the tracked winner
/// of each affected attribute.
///
/// If later operations invalidated the tracked index (the winner was
/// removed or demoted), the last element still flagged true wins instead.
pub(crate) fn enforce(resource: &mut Resource, tracker: &PrimaryTracker) {
    for entry in &tracker.entries {
        let container = match &entry.extension_urn {
            None => &mut *resource,
            Some(urn) => match resource.get_mut(urn).and_then(Value::as_complex_mut) {
                Some(nested) => nested,
                None => continue,
            },
        };
        let Some(elements) = container
            .get_mut(&entry.attribute)
            .and_then(Value::as_multi_mut)
        else {
            continue;
        };

        let flags: Vec<bool> = elements
            .iter()
            .map(|element| {
                element
                    .as_complex()
                    .and_then(|map| map.get("primary"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .collect();
        let winner = if flags.get(entry.winner).copied().unwrap_or(false) {
            entry.winner
        } else {
            match flags.iter().rposition(|&flag| flag) {
                Some(index) => index,
                None => continue,
            }
        };

        for (index, element) in elements.iter_mut().enumerate() {
            if index == winner {
                continue;
            }
            if let Some(map) = element.as_complex_mut() {
                if map.get("primary").and_then(Value::as_bool) == Some(true) {
                    warn!(
                        attribute = %entry.attribute,
                        element = index,
                        "demoting duplicate primary element"
                    );
                    map.insert("primary".to_string(), Value::Bool(false));
                }
            }
        }
    }
}
