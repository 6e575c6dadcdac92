//! Mutable builders over immutable schemas.
//!
//! Every builder keeps its base schema untouched and records the intent as
//! schema mutations. Redefining the same member replaces the pending
//! mutation, and a mutation that would change nothing is never recorded.

mod attribute;
mod catalog;
mod entity;
mod member;
mod reference;

pub use attribute::{
    AssociatedDataSchemaBuilder, AttributeSchemaBuilder, GlobalAttributeSchemaBuilder,
    SortableAttributeCompoundSchemaBuilder,
};
pub use catalog::CatalogSchemaBuilder;
pub use entity::EntitySchemaBuilder;
pub use reference::{ReferenceSchemaBuilder, ReflectedReferenceSchemaBuilder};
