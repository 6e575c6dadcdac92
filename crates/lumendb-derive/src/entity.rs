use crate::{
    helper::quote_slice,
    member::{Member, Role},
    shape::Shape,
};
use darling::{Error as DarlingError, FromDeriveInput};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Ident};

const ENTITY_ROLES: &[&str] = &[
    "associated_data",
    "attribute",
    "locales",
    "parent",
    "price_for_sale",
    "prices",
    "primary_key",
    "reference",
    "reflected_reference",
    "skip",
];

///
/// EntityArgs
///
/// Container options from `#[entity(...)]`.
///

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(entity), supports(struct_named))]
struct EntityArgs {
    ident: Ident,

    #[darling(default)]
    name: Option<String>,
    #[darling(default)]
    description: Option<String>,
    #[darling(default)]
    deprecated: Option<String>,
    #[darling(multiple, rename = "locale")]
    locales: Vec<String>,
    #[darling(multiple, rename = "currency")]
    currencies: Vec<String>,
    #[darling(multiple)]
    evolution: Vec<Ident>,
    #[darling(default)]
    hierarchy: bool,
    #[darling(default)]
    price: bool,
    #[darling(default)]
    generated_primary_key: bool,
}

impl EntityArgs {
    fn settings(&self) -> TokenStream {
        let mut settings = Vec::new();

        if let Some(description) = &self.description {
            settings.push(quote!(.description(#description)));
        }
        if let Some(notice) = &self.deprecated {
            settings.push(quote!(.deprecated(#notice)));
        }
        if !self.locales.is_empty() {
            let locales = &self.locales;
            settings.push(quote!(.allowed_locales(&[#(#locales),*])));
        }
        if !self.currencies.is_empty() {
            let currencies = &self.currencies;
            settings.push(quote!(.allowed_currencies(&[#(#currencies),*])));
        }
        if !self.evolution.is_empty() {
            let modes = &self.evolution;
            settings.push(quote! {
                .evolution(&[#(::lumendb::schema::types::EvolutionMode::#modes),*])
            });
        }
        if self.hierarchy {
            settings.push(quote!(.hierarchy()));
        }
        if self.price {
            settings.push(quote!(.price()));
        }
        if self.generated_primary_key {
            settings.push(quote!(.generated_primary_key()));
        }

        quote!(#(#settings)*)
    }
}

// derive_entity_class
pub fn derive_entity_class(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    expand(&input).unwrap_or_else(DarlingError::write_errors)
}

fn expand(input: &DeriveInput) -> Result<TokenStream, DarlingError> {
    let args = EntityArgs::from_derive_input(input)?;
    if !input.generics.params.is_empty() {
        return Err(
            DarlingError::custom("model classes cannot be generic").with_span(&input.generics)
        );
    }
    let members = members(input, ENTITY_ROLES)?;

    let ident = &args.ident;
    let class_name = ident.to_string();
    let entity = args.name.clone().unwrap_or_else(|| class_name.clone());
    let settings = args.settings();

    let mut errors = DarlingError::accumulator();
    let descriptors: Vec<TokenStream> = members
        .iter()
        .filter_map(|member| errors.handle(member_descriptor(member)).flatten())
        .collect();
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
        impl ::lumendb::model::EntityClass for #ident {
            const DESCRIPTOR: &'static ::lumendb::model::ClassDescriptor =
                &::lumendb::model::ClassDescriptor::new(#class_name, #entity)
                    #settings
                    .members(#descriptors);
        }

        impl ::lumendb::model::FromProxy for #ident {
            fn from_proxy(
                proxy: &::lumendb::proxy::EntityProxy<Self>,
            ) -> ::core::result::Result<Self, ::lumendb::error::Error> {
                ::core::result::Result::Ok(Self {
                    #(#reads,)*
                })
            }
        }
    })
}

/// Named fields of a struct, each parsed into a member.
pub fn members(input: &DeriveInput, allowed: &[&str]) -> Result<Vec<Member>, DarlingError> {
    let fields: Vec<&Field> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect(),
            fields => {
                return Err(DarlingError::custom(
                    "model classes can only be derived for structs with named fields",
                )
                .with_span(fields));
            }
        },
        _ => {
            return Err(DarlingError::custom(
                "model classes can only be derived for structs with named fields",
            )
            .with_span(&input.ident));
        }
    };

    let mut errors = DarlingError::accumulator();
    let members = fields
        .into_iter()
        .filter_map(|field| errors.handle(Member::from_field(field, allowed)))
        .collect();

    errors.finish_with(members)
}

// MemberDescriptor of a member, None for members read by name only
fn member_descriptor(member: &Member) -> Result<Option<TokenStream>, DarlingError> {
    let (ident, ty) = (&member.ident, &member.ty);

    let role = match &member.role {
        None | Some(Role::Skip) => return Ok(None),
        Some(Role::AssociatedData(args)) => {
            let descriptor = args.descriptor(ident, ty);
            quote!(::lumendb::model::MemberRole::AssociatedData(#descriptor))
        }
        Some(Role::Attribute(args)) => {
            let descriptor = args.descriptor(ident, ty);
            quote!(::lumendb::model::MemberRole::Attribute(#descriptor))
        }
        Some(Role::Reference(args)) => {
            let descriptor = args.descriptor(ident, ty)?;
            quote!(::lumendb::model::MemberRole::Reference(#descriptor))
        }
        Some(Role::ReflectedReference(args)) => {
            let descriptor = args.descriptor(ident, ty)?;
            quote!(::lumendb::model::MemberRole::ReflectedReference(#descriptor))
        }
        Some(Role::Locales) => quote!(::lumendb::model::MemberRole::Locales),
        Some(Role::Parent) => quote!(::lumendb::model::MemberRole::Parent),
        Some(Role::PriceForSale) => quote!(::lumendb::model::MemberRole::PriceForSale),
        Some(Role::Prices) => quote!(::lumendb::model::MemberRole::Prices),
        Some(Role::PrimaryKey) => quote!(::lumendb::model::MemberRole::PrimaryKey),
        Some(role) => {
            return Err(
                DarlingError::custom(format!("`{}` is not valid here", role.label()))
                    .with_span(ident),
            );
        }
    };
    let field = member.field_name();

    Ok(Some(quote! {
        ::lumendb::model::MemberDescriptor::new(#field, &[#role])
    }))
}

// expression reading one field from `proxy`
fn read(member: &Member) -> Result<TokenStream, DarlingError> {
    let owner = quote!(proxy.entity_type());
    let field = member.field_name();
    let shape = Shape::of(&member.ty);

    let read = match &member.role {
        None | Some(Role::Attribute(_)) => member.read_value("attribute", &field, &owner),
        Some(Role::AssociatedData(_)) => member.read_value("associated_data", &field, &owner),
        Some(Role::Skip) => quote!(::core::default::Default::default()),
        Some(Role::PrimaryKey) => member.shaped(&quote!(proxy.primary_key()), &owner),
        Some(Role::Parent) => {
            member.shaped(&quote!(::lumendb::proxy::if_present(proxy.parent_id())?), &owner)
        }
        Some(Role::Locales) => quote!(proxy.locales().into_iter().collect()),
        Some(Role::Prices) => quote! {
            ::lumendb::proxy::if_present(proxy.prices().map(::core::option::Option::Some))?
                .unwrap_or_default()
                .into_iter()
                .collect()
        },
        Some(Role::PriceForSale) => match shape {
            Shape::One(_) => member.shaped(&quote!(proxy.price_for_sale()?), &owner),
            _ => member.shaped(&quote!(proxy.price_for_sale_if_present()?), &owner),
        },
        Some(Role::Reference(_) | Role::ReflectedReference(_)) => match shape {
            Shape::One(ty) => {
                let missing = member.missing(&owner);
                quote! {
                    proxy
                        .reference(#field)?
                        .map(|reference| reference.materialize::<#ty>())
                        .transpose()?
                        .ok_or_else(|| #missing)?
                }
            }
            Shape::Opt(ty) => quote! {
                ::lumendb::proxy::if_present(proxy.reference(#field))?
                    .map(|reference| reference.materialize::<#ty>())
                    .transpose()?
            },
            Shape::Many(ty) => quote! {
                ::lumendb::proxy::if_present(
                    proxy.references(#field).map(::core::option::Option::Some),
                )?
                .unwrap_or_default()
                .iter()
                .map(|reference| reference.materialize::<#ty>())
                .collect::<::core::result::Result<_, ::lumendb::error::Error>>()?
            },
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

    fn expand_str(input: DeriveInput) -> Result<String, DarlingError> {
        expand(&input).map(|tokens| tokens.to_string())
    }

    #[test]
    fn descriptor_declares_marked_members_only() {
        let tokens = expand_str(syn::parse_quote! {
            #[entity(name = "CATEGORY", locale = "en", locale = "cs", hierarchy)]
            struct Category {
                #[primary_key]
                id: Option<i32>,
                #[attribute(unique)]
                code: String,
                #[parent]
                parent: Option<i32>,
                #[skip]
                cache: Vec<String>,
                note: Option<String>,
            }
        })
        .expect("valid class");

        assert!(tokens.contains("\"CATEGORY\""));
        assert!(tokens.contains("allowed_locales"));
        assert!(tokens.contains("hierarchy"));
        assert!(tokens.contains("\"code\""));
        assert!(!tokens.contains("\"cache\""));
        assert!(tokens.contains("attribute_if_present"));
    }

    #[test]
    fn entity_name_defaults_to_type_name() {
        let tokens = expand_str(syn::parse_quote! {
            struct Brand {
                #[primary_key]
                id: i32,
            }
        })
        .expect("valid class");

        assert_eq!(tokens.matches("\"Brand\"").count(), 2);
    }

    #[test]
    fn malformed_classes_are_rejected() {
        let generic: DeriveInput = syn::parse_quote! {
            struct Wrapper<T> {
                value: T,
            }
        };
        let tuple: DeriveInput = syn::parse_quote! {
            struct Pair(i32, i32);
        };
        let reference_only: DeriveInput = syn::parse_quote! {
            struct Product {
                #[referenced_entity]
                brand: Option<i32>,
            }
        };
        let untargeted: DeriveInput = syn::parse_quote! {
            struct Product {
                #[reference]
                brand: i32,
            }
        };

        assert!(expand_str(generic).is_err());
        assert!(expand_str(tuple).is_err());
        assert!(expand_str(reference_only).is_err());
        assert!(expand_str(untargeted).is_err());
    }
}
