//! Path parsing and schema-backed resolution of patch targets.
//!
//! A patch path has the shape
//! `[urn ":"] attr [ "[" subAttr OP literal "]" ] [ "." subAttr ]`, e.g.
//!
//! - `displayName`
//! - `name.givenName`
//! - `addresses[type EQ "home"].primary`
//! - `urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.value`
//!
//! Parsing is purely syntactic; [`resolve`] then consults the
//! [`SchemaRegistry`] to confirm the attribute exists (in the base schema or
//! a registered extension) and to attach descriptors. Anything unparseable
//! or unknown is an `invalidPath` failure.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PatchError;
use crate::schema::{AttributeDescriptor, AttributeKind, Schema, SchemaRegistry};
use crate::value::Value;

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:(?P<urn>urn:[A-Za-z0-9.:\-]+):)?(?P<attr>[A-Za-z][A-Za-z0-9_-]*)(?:\[(?P<filter>[^\[\]]+)\])?(?:\.(?P<sub>[A-Za-z][A-Za-z0-9_-]*))?$"#,
    )
    .expect("path grammar regex is valid")
});

static FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*(?P<attr>[A-Za-z][A-Za-z0-9_-]*)\s+(?P<op>[A-Za-z]{2})\s+(?P<lit>"[^"]*"|true|false|-?[0-9]+)\s*$"#,
    )
    .expect("filter grammar regex is valid")
});

/// Comparison operator of a value filter. Equality is the only operator
/// the engine guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::Eq => write!(f, "eq"),
        }
    }
}

/// A single-clause value-selection filter: `subAttr OP literal`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFilter {
    pub attribute: String,
    pub op: FilterOp,
    pub literal: Value,
}

/// Syntactic parse of a patch path, before schema resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPath {
    pub urn: Option<String>,
    pub attribute: String,
    pub filter: Option<ValueFilter>,
    pub sub_attribute: Option<String>,
}

/// A path resolved against the registry: the owning schema, descriptors for
/// the attribute (and sub-attribute, when scoped), and the parsed filter.
#[derive(Debug, Clone)]
pub struct ResolvedTarget<'a> {
    pub schema: &'a Schema,
    pub attribute: &'a AttributeDescriptor,
    pub sub_attribute: Option<&'a AttributeDescriptor>,
    pub filter: Option<ValueFilter>,
    /// True when the attribute lives in an extension schema; its values are
    /// stored under the extension URN key in the resource.
    pub extension: bool,
}

/// Parses a raw path string into its syntactic parts.
///
/// # Errors
///
/// `InvalidPath` when the path or its bracketed filter does not match the
/// grammar, or the filter operator is not equality.
pub fn parse_path(raw: &str) -> Result<PatchPath, PatchError> {
    let captures = PATH_RE
        .captures(raw)
        .ok_or_else(|| PatchError::invalid_path(format!("unparseable path {raw:?}")))?;

    let filter = captures
        .name("filter")
        .map(|m| parse_filter(m.as_str()))
        .transpose()?;

    Ok(PatchPath {
        urn: captures.name("urn").map(|m| m.as_str().to_string()),
        attribute: captures["attr"].to_string(),
        filter,
        sub_attribute: captures.name("sub").map(|m| m.as_str().to_string()),
    })
}

fn parse_filter(raw: &str) -> Result<ValueFilter, PatchError> {
    let captures = FILTER_RE
        .captures(raw)
        .ok_or_else(|| PatchError::invalid_path(format!("unparseable filter {raw:?}")))?;

    let op_token = &captures["op"];
    if !op_token.eq_ignore_ascii_case("eq") {
        return Err(PatchError::invalid_path(format!(
            "unsupported filter operator {op_token:?}"
        )));
    }

    let literal = match &captures["lit"] {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        quoted if quoted.starts_with('"') => {
            Value::String(quoted[1..quoted.len() - 1].to_string())
        }
        number => Value::Int(number.parse::<i64>().map_err(|_| {
            PatchError::invalid_path(format!("unparseable filter literal {number:?}"))
        })?),
    };

    Ok(ValueFilter {
        attribute: captures["attr"].to_string(),
        op: FilterOp::Eq,
        literal,
    })
}

/// Resolves a path against a resource type's base and extension schemas.
///
/// With no explicit URN the attribute is looked up in the base schema first,
/// then in each registered extension. With an explicit URN the named schema
/// must be the base or a declared extension of the resource type.
///
/// # Errors
///
/// `InvalidPath` for syntax failures, unknown schemas or attributes, a
/// filter on a single-valued attribute, a filter clause or sub-attribute
/// the descriptor does not define, or a sub-attribute on a non-complex
/// attribute.
pub fn resolve<'a>(
    registry: &'a SchemaRegistry,
    resource_type: &str,
    raw_path: &str,
) -> Result<ResolvedTarget<'a>, PatchError> {
    let path = parse_path(raw_path)?;

    let resource_type = registry
        .resource_type(resource_type)
        .ok_or_else(|| PatchError::invalid_path(format!("unknown resource type {resource_type:?}")))?;

    let (schema, attribute) = match &path.urn {
        Some(urn) => {
            let known = resource_type.base_schema == *urn
                || resource_type.extensions.iter().any(|ext| ext == urn);
            let schema = if known { registry.schema_for_urn(urn) } else { None }
                .ok_or_else(|| {
                    PatchError::invalid_path(format!(
                        "schema {urn:?} is not registered for resource type {:?}",
                        resource_type.name
                    ))
                })?;
            let attribute = schema.attribute(&path.attribute).ok_or_else(|| {
                PatchError::invalid_path(format!(
                    "attribute {:?} not defined by schema {urn:?}",
                    path.attribute
                ))
            })?;
            (schema, attribute)
        }
        None => {
            let base = registry
                .schema_for_urn(&resource_type.base_schema)
                .ok_or_else(|| {
                    PatchError::invalid_path(format!(
                        "base schema {:?} is not registered",
                        resource_type.base_schema
                    ))
                })?;
            // Implicit lookup: base schema first, then extensions.
            std::iter::once(base)
                .chain(registry.extensions_for_resource_type(&resource_type.name))
                .find_map(|schema| schema.attribute(&path.attribute).map(|a| (schema, a)))
                .ok_or_else(|| {
                    PatchError::invalid_path(format!(
                        "attribute {:?} not found in schema or extensions",
                        path.attribute
                    ))
                })?
        }
    };

    if let Some(filter) = &path.filter {
        if !attribute.multi_valued {
            return Err(PatchError::invalid_path(format!(
                "filter on single-valued attribute {:?}",
                attribute.name
            )));
        }
        if attribute.sub_attribute(&filter.attribute).is_none() {
            return Err(PatchError::invalid_path(format!(
                "filter references unknown sub-attribute {:?} of {:?}",
                filter.attribute, attribute.name
            )));
        }
    }

    let sub_attribute = match &path.sub_attribute {
        Some(sub) => {
            if attribute.kind != AttributeKind::Complex {
                return Err(PatchError::invalid_path(format!(
                    "sub-attribute {sub:?} on non-complex attribute {:?}",
                    attribute.name
                )));
            }
            Some(attribute.sub_attribute(sub).ok_or_else(|| {
                PatchError::invalid_path(format!(
                    "sub-attribute {sub:?} not defined by {:?}",
                    attribute.name
                ))
            })?)
        }
        None => None,
    };

    Ok(ResolvedTarget {
        schema,
        attribute,
        sub_attribute,
        filter: path.filter,
        extension: schema.urn != resource_type.base_schema,
    })
}
