use crate::{
    entity::members,
    helper::{quote_slice, schema_name},
    member::{AttributeArgs, Member, Role},
    shape::Shape,
};
use darling::Error as DarlingError;
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

const REFERENCE_ROLES: &[&str] = &[
    "attribute",
    "referenced_entity",
    "referenced_group",
    "referenced_primary_key",
    "skip",
];

// derive_reference_class
pub fn derive_reference_class(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    expand(&input).unwrap_or_else(DarlingError::write_errors)
}

fn expand(input: &DeriveInput) -> Result<TokenStream, DarlingError> {
    if !input.generics.params.is_empty() {
        return Err(
            DarlingError::custom("reference classes cannot be generic").with_span(&input.generics)
        );
    }
    let members = members(input, REFERENCE_ROLES)?;

    let ident = &input.ident;
    let class_name = ident.to_string();

    let mut errors = DarlingError::accumulator();
    let descriptors: Vec<TokenStream> = members.iter().filter_map(member_descriptor).collect();
    let reads: Vec<TokenStream> = members
        .iter()
        .filter_map(|member| {
            let field = &member.ident;
            errors
                .handle(read(member))
                .map(|read| quote!(#field: #read))
        })
        .collect();
    errors.finish()?;

    let descriptors = quote_slice(&descriptors, |tokens| tokens.clone());

    Ok(quote! {
        impl ::lumendb::model::ReferenceClass for #ident {
            const DESCRIPTOR: &'static ::lumendb::model::ReferenceClassDescriptor =
                &::lumendb::model::ReferenceClassDescriptor::new(#class_name, #descriptors);
        }

        impl ::lumendb::model::ReferenceTarget for #ident {
            fn class(
            ) -> ::core::option::Option<&'static ::lumendb::model::ReferenceClassDescriptor> {
                ::core::option::Option::Some(<Self as ::lumendb::model::ReferenceClass>::DESCRIPTOR)
            }

            fn from_reference(
                proxy: &::lumendb::proxy::ReferenceProxy,
            ) -> ::core::result::Result<Self, ::lumendb::error::Error> {
                ::core::result::Result::Ok(Self {
                    #(#reads,)*
                })
            }
        }
    })
}

// fields without a role are reference attributes under their camelCase name
fn member_descriptor(member: &Member) -> Option<TokenStream> {
    let role = match &member.role {
        Some(Role::Skip) => return None,
        Some(Role::Attribute(args)) => {
            let descriptor = args.descriptor(&member.ident, &member.ty);
            quote!(::lumendb::model::MemberRole::Attribute(#descriptor))
        }
        None => {
            let descriptor = AttributeArgs::default().descriptor(&member.ident, &member.ty);
            quote!(::lumendb::model::MemberRole::Attribute(#descriptor))
        }
        Some(Role::ReferencedEntity) => quote!(::lumendb::model::MemberRole::ReferencedEntity),
        Some(Role::ReferencedGroup) => quote!(::lumendb::model::MemberRole::ReferencedEntityGroup),
        Some(Role::ReferencedPrimaryKey) => {
            quote!(::lumendb::model::MemberRole::ReferencedPrimaryKey)
        }
        Some(_) => return None,
    };
    let field = member.field_name();

    Some(quote! {
        ::lumendb::model::MemberDescriptor::new(#field, &[#role])
    })
}

// expression reading one field from `proxy`
fn read(member: &Member) -> Result<TokenStream, DarlingError> {
    let owner = quote!(proxy.name());
    let shape = Shape::of(&member.ty);
    let single = |what: &str| {
        DarlingError::custom(format!("{what} cannot be read into a collection"))
            .with_span(&member.ident)
    };

    let read = match &member.role {
        Some(Role::Skip) => quote!(::core::default::Default::default()),
        Some(Role::Attribute(args)) => {
            let name = schema_name(&member.ident, args.name.as_ref());
            member.read_value("attribute", &name, &owner)
        }
        None => {
            let name = schema_name(&member.ident, None);
            member.read_value("attribute", &name, &owner)
        }
        Some(Role::ReferencedPrimaryKey) => match shape {
            Shape::One(_) => quote!(proxy.referenced_primary_key()),
            Shape::Opt(_) => quote!(::core::option::Option::Some(proxy.referenced_primary_key())),
            Shape::Many(_) => return Err(single("the referenced primary key")),
        },
        Some(Role::ReferencedEntity) => match shape {
            Shape::One(ty) => member.shaped(
                &quote! {
                    proxy
                        .referenced_entity::<#ty>()?
                        .map(|body| body.materialize())
                        .transpose()?
                },
                &owner,
            ),
            Shape::Opt(ty) => quote! {
                proxy
                    .referenced_entity_if_present::<#ty>()?
                    .map(|body| body.materialize())
                    .transpose()?
            },
            Shape::Many(_) => return Err(single("the referenced entity")),
        },
        Some(Role::ReferencedGroup) => match shape {
            Shape::One(ty) => member.shaped(
                &quote! {
                    proxy
                        .group_entity::<#ty>()?
                        .map(|body| body.materialize())
                        .transpose()?
                },
                &owner,
            ),
            Shape::Opt(ty) => quote! {
                ::lumendb::proxy::if_present(proxy.group_entity::<#ty>())?
                    .map(|body| body.materialize())
                    .transpose()?
            },
            Shape::Many(_) => return Err(single("the group entity")),
        },
        Some(role) => {
            return Err(
                DarlingError::custom(format!("`{}` is not valid here", role.label()))
                    .with_span(&member.ident),
            );
        }
    };

    Ok(read)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_class_declares_attributes_and_bodies() {
        let input: DeriveInput = syn::parse_quote! {
            struct ProductRelation {
                #[referenced_primary_key]
                product: i32,
                #[attribute(name = "relationType")]
                kind: Option<String>,
                label: Option<String>,
                #[referenced_entity]
                body: Option<Product>,
            }
        };
        let tokens = expand(&input).expect("valid class").to_string();

        assert!(tokens.contains("\"relationType\""));
        assert!(tokens.contains("\"label\""));
        assert!(tokens.contains("ReferencedPrimaryKey"));
        assert!(tokens.contains("referenced_entity_if_present"));
        assert!(tokens.contains("impl :: lumendb :: model :: ReferenceTarget for ProductRelation"));
    }

    #[test]
    fn bodies_cannot_be_collections() {
        let input: DeriveInput = syn::parse_quote! {
            struct Relation {
                #[referenced_entity]
                bodies: Vec<Product>,
            }
        };

        assert!(expand(&input).is_err());
    }
}
