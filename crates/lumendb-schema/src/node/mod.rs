mod associated_data;
mod attribute;
mod catalog;
mod compound;
mod entity;
mod reference;
mod reflected;

pub use associated_data::AssociatedDataSchema;
pub use attribute::{AttributeSchema, GlobalAttributeSchema};
pub use catalog::CatalogSchema;
pub use compound::SortableAttributeCompoundSchema;
pub use entity::{EntitySchema, PriceSchema};
pub use reference::{ReferenceSchema, StandardReferenceSchema};
pub use reflected::ReflectedReferenceSchema;

use lumendb_utils::NameVariants;

///
/// NamedSchema
///
/// Any schema member that takes part in naming convention checks.
///

pub trait NamedSchema {
    fn name(&self) -> &str;

    fn name_variants(&self) -> &NameVariants;
}

macro_rules! impl_named_schema {
    ( $( $type:ty ),* $(,)? ) => {
        $(
            impl NamedSchema for $type {
                fn name(&self) -> &str {
                    &self.name
                }

                fn name_variants(&self) -> &NameVariants {
                    &self.name_variants
                }
            }
        )*
    };
}

impl_named_schema!(
    AssociatedDataSchema,
    AttributeSchema,
    EntitySchema,
    SortableAttributeCompoundSchema,
    StandardReferenceSchema,
    ReflectedReferenceSchema,
);
