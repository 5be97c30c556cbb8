//! Attribute descriptors, schemas, and the read-only schema registry.
//!
//! Descriptors drive every decision the engine makes: which mutator handles
//! a target, whether a value's shape is acceptable, whether a removal is
//! legal, and whether a filter literal compares case-insensitively. The
//! registry is populated once at startup and passed by reference into every
//! resolve/apply call; it holds no interior mutability, so concurrent patch
//! calls can share it freely.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declared value kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeKind {
    Boolean,
    Complex,
    DateTime,
    Decimal,
    Integer,
    Reference,
    Binary,
    String,
}

/// Per-attribute write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    ReadWrite,
    ReadOnly,
    Immutable,
}

/// Kind x multiplicity of an attribute, as a closed sum.
///
/// Mutator dispatch matches on this exhaustively, so adding a new shape is a
/// compile-time-enforced change everywhere it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeShape {
    /// Single-valued scalar of the given kind.
    Singular(AttributeKind),
    /// Single-valued complex attribute.
    Complex,
    /// Multi-valued scalar of the given kind.
    MultiSingular(AttributeKind),
    /// Multi-valued complex attribute.
    MultiComplex,
}

/// Schema descriptor for one attribute.
///
/// Immutable once registered; the engine only reads descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    pub multi_valued: bool,
    pub mutability: Mutability,
    pub required: bool,
    /// Canonical enumerated values (e.g. `work`/`home` for `type`). A
    /// non-empty list makes filter comparison against this attribute
    /// case-insensitive.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub canonical_values: Vec<String>,
    /// Sub-attribute descriptors; only populated for complex kinds.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sub_attributes: Vec<AttributeDescriptor>,
}

impl AttributeDescriptor {
    /// A single-valued, optional, read-write attribute of the given kind.
    ///
    /// Struct-literal spread (`..AttributeDescriptor::simple(...)`) keeps
    /// schema construction terse without a builder.
    #[must_use]
    pub fn simple(name: &str, kind: AttributeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            multi_valued: false,
            mutability: Mutability::ReadWrite,
            required: false,
            canonical_values: Vec::new(),
            sub_attributes: Vec::new(),
        }
    }

    /// Projects this descriptor onto the closed [`AttributeShape`] sum.
    #[must_use]
    pub fn shape(&self) -> AttributeShape {
        match (self.kind, self.multi_valued) {
            (AttributeKind::Complex, false) => AttributeShape::Complex,
            (AttributeKind::Complex, true) => AttributeShape::MultiComplex,
            (kind, false) => AttributeShape::Singular(kind),
            (kind, true) => AttributeShape::MultiSingular(kind),
        }
    }

    /// Looks up a sub-attribute descriptor by case-insensitive name.
    #[must_use]
    pub fn sub_attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.sub_attributes
            .iter()
            .find(|sub| sub.name.eq_ignore_ascii_case(name))
    }

    /// Whether this attribute's sub-attribute set includes a boolean
    /// `primary` flag, making it subject to primary-uniqueness enforcement.
    #[must_use]
    pub fn has_primary_flag(&self) -> bool {
        self.sub_attribute("primary")
            .is_some_and(|sub| sub.kind == AttributeKind::Boolean)
    }
}

///// One SCIM schema: a URN plus its ordered attribute descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub urn: String,
    pub attributes: Vec<AttributeDescriptor>,
}

impl Schema {
    /// Looks up an attribute descriptor by case-insensitive name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }
}

/// Binding of a resource type name to its base schema and extension schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub name: String,
    pub base_schema: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extensions: Vec<String>,
}

/// Process-wide schema index, read-only after initialization.
///
/// Safe for unsynchronized concurrent reads; every resolver and mutator call
/// receives it as an explicit `&SchemaRegistry` argument.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
    resource_types: HashMap<String, ResourceType>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its URN, replacing any previous entry.
    pub fn register_schema(&mut self, schema: Schema) {
        self.schemas.insert(schema.urn.clone(), schema);
    }

    /// Registers a resource type binding, replacing any previous entry.
    pub fn register_resource_type(&mut self, resource_type: ResourceType) {
        self.resource_types
            .insert(resource_type.name.clone(), resource_type);
    }

    /// Returns the schema registered under a URN.
    #[must_use]
    pub fn schema_for_urn(&self, urn: &str) -> Option<&Schema> {
        self.schemas.get(urn)
    }

    /// Returns the resource type binding for a name.
    #[must_use]
    pub fn resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.resource_types.get(name)
    }

    /// Returns the base schema for a resource type.
    #[must_use]
    pub fn schema_for_resource_type(&self, name: &str) -> Option<&Schema> {
        self.resource_type(name)
            .and_then(|rt| self.schema_for_urn(&rt.base_schema))
    }

    /// Returns the registered extension schemas for a resource type,
    /// skipping URNs that were declared but never registered.
    pub fn extensions_for_resource_type(&self, name: &str) -> impl Iterator<Item = &Schema> {
        self.resource_type(name)
            .into_iter()
            .flat_map(|rt| rt.extensions.iter())
            .filter_map(|urn| self.schema_for_urn(urn))
    }
}
