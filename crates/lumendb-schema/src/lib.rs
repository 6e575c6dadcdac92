pub mod build;
pub mod error;
pub mod mutation;
pub mod node;
pub mod types;
pub mod validate;

/// Decimal places kept for indexed prices unless configured otherwise.
pub const DEFAULT_PRICE_DECIMAL_PLACES: u32 = 2;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        build::{
            AssociatedDataSchemaBuilder, AttributeSchemaBuilder, CatalogSchemaBuilder,
            EntitySchemaBuilder, GlobalAttributeSchemaBuilder, ReferenceSchemaBuilder,
            ReflectedReferenceSchemaBuilder, SortableAttributeCompoundSchemaBuilder,
        },
        err,
        error::{ErrorTree, NameConflict, SchemaError},
        mutation::{
            CatalogSchemaMutation, EntitySchemaMutation, ModifyCatalogSchemaMutation,
            ModifyEntitySchemaMutation,
        },
        node::*,
        types::{
            AttributeElement, AttributeInheritance, Cardinality, EvolutionMode, OrderBehaviour,
            OrderDirection, Scope, attribute_element,
        },
    };
    pub use lumendb_primitives::prelude::*;
    pub use lumendb_utils::{NameVariants, NamingConvention};
    pub use serde::{Deserialize, Serialize};
}
