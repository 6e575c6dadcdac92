//! Derives for LumenDB model classes.
//!
//! Both derives emit a static descriptor and the read side of the class.
//! Generated code refers to the `lumendb` facade crate.

use proc_macro::TokenStream;

mod entity;
mod helper;
mod member;
mod reference;
mod shape;

/// Model class stored as an entity.
#[proc_macro_derive(
    EntityClass,
    attributes(
        entity,
        primary_key,
        attribute,
        associated_data,
        reference,
        reflected_reference,
        parent,
        prices,
        price_for_sale,
        locales,
        skip
    )
)]
pub fn derive_entity_class(input: TokenStream) -> TokenStream {
    entity::derive_entity_class(input.into()).into()
}

/// Content of one reference of a model class.
#[proc_macro_derive(
    ReferenceClass,
    attributes(
        referenced_primary_key,
        attribute,
        referenced_entity,
        referenced_group,
        skip
    )
)]
pub fn derive_reference_class(input: TokenStream) -> TokenStream {
    reference::derive_reference_class(input.into()).into()
}
