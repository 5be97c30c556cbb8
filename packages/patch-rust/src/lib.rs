//! SCIM PATCH engine — RFC 7644 §3.5.2 operations over schema-described resources.

pub mod error;
pub mod filter;
pub mod patch;
pub mod path;
pub mod schema;
pub mod value;

pub use error::{ErrorBody, PatchError};
pub use patch::{apply, PatchOp, PatchOperation};
pub use path::{parse_path, resolve, FilterOp, PatchPath, ResolvedTarget, ValueFilter};
pub use schema::{
    AttributeDescriptor, AttributeKind, AttributeShape, Mutability, ResourceType, Schema,
    SchemaRegistry,
};
pub use value::{Resource, Value};
