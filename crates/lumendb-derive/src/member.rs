use crate::{
    helper::{quote_flag, quote_setter, schema_name},
    shape::Shape,
};
use darling::{Error as DarlingError, FromMeta};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Expr, Field, Ident, Meta, Path, Type};

///
/// AttributeArgs
///

#[derive(Debug, Default, FromMeta)]
#[darling(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AttributeArgs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deprecated: Option<String>,
    pub default: Option<Expr>,
    pub indexed_decimal_places: Option<u32>,
    pub unique: bool,
    pub unique_globally: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub localized: bool,
    pub nullable: bool,
    pub representative: bool,
    pub global: bool,
}

impl AttributeArgs {
    /// `AttributeDescriptor` expression for a field of type `ty`.
    pub fn descriptor(&self, ident: &Ident, ty: &Type) -> TokenStream {
        let shape = Shape::of(ty);
        let name = schema_name(ident, self.name.as_ref());
        let value_type = shape.value(ty);
        let nullable = self.nullable || matches!(shape, Shape::Opt(_));

        let description = quote_setter("description", self.description.as_ref());
        let deprecated = quote_setter("deprecated", self.deprecated.as_ref());
        let places = quote_setter("indexed_decimal_places", self.indexed_decimal_places.as_ref());
        let default = self.default.as_ref().map_or_else(TokenStream::new, |expr| {
            quote! {
                .default_value({
                    fn default_value() -> ::lumendb::primitives::Value {
                        ::lumendb::primitives::Value::from(#expr)
                    }
                    default_value
                })
            }
        });
        let flags = [
            quote_flag("unique", self.unique),
            quote_flag("unique_globally", self.unique_globally),
            quote_flag("filterable", self.filterable),
            quote_flag("sortable", self.sortable),
            quote_flag("localized", self.localized),
            quote_flag("nullable", nullable),
            quote_flag("representative", self.representative),
            quote_flag("global", self.global),
        ];

        quote! {
            ::lumendb::model::AttributeDescriptor::new(
                #name,
                <#value_type as ::lumendb::primitives::FieldValue>::value_type,
            )
            #description #deprecated #places #default #(#flags)*
        }
    }
}

///
/// AssociatedDataArgs
///
/// Values are kept as JSON documents unless `scalar` asks for the field's
/// own value type.
///

#[derive(Debug, Default, FromMeta)]
#[darling(default)]
pub struct AssociatedDataArgs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deprecated: Option<String>,
    pub localized: bool,
    pub nullable: bool,
    pub scalar: bool,
}

impl AssociatedDataArgs {
    pub fn descriptor(&self, ident: &Ident, ty: &Type) -> TokenStream {
        let shape = Shape::of(ty);
        let name = schema_name(ident, self.name.as_ref());
        let value_type = if self.scalar {
            let value_type = shape.value(ty);
            quote!(<#value_type as ::lumendb::primitives::FieldValue>::value_type)
        } else {
            quote!(::lumendb::model::complex_type)
        };
        let nullable = self.nullable || !matches!(shape, Shape::One(_));

        let description = quote_setter("description", self.description.as_ref());
        let deprecated = quote_setter("deprecated", self.deprecated.as_ref());
        let localized = quote_flag("localized", self.localized);
        let nullable = quote_flag("nullable", nullable);

        quote! {
            ::lumendb::model::AssociatedDataDescriptor::new(#name, #value_type)
            #description #deprecated #localized #nullable
        }
    }
}

///
/// ReferenceArgs
///
/// The target is a model class (`class`) or a plain entity type name
/// (`entity`). Cardinality defaults to the shape of the field.
///

#[derive(Debug, Default, FromMeta)]
#[darling(default)]
pub struct ReferenceArgs {
    pub name: Option<String>,
    pub entity: Option<String>,
    pub class: Option<Path>,
    pub group_entity: Option<String>,
    pub group_class: Option<Path>,
    pub cardinality: Option<Ident>,
    pub description: Option<String>,
    pub deprecated: Option<String>,
    pub indexed: bool,
    pub faceted: bool,
}

impl ReferenceArgs {
    pub fn descriptor(&self, ident: &Ident, ty: &Type) -> Result<TokenStream, DarlingError> {
        let shape = Shape::of(ty);
        let name = schema_name(ident, self.name.as_ref());
        let target = target_type(ident, self.entity.as_ref(), self.class.as_ref())?;
        let group = match (&self.group_entity, &self.group_class) {
            (None, None) => TokenStream::new(),
            (entity, class) => {
                let group = target_type(ident, entity.as_ref(), class.as_ref())?;
                quote!(.group(#group))
            }
        };
        let cardinality = cardinality(self.cardinality.as_ref(), shape);
        let element = shape.element();

        let description = quote_setter("description", self.description.as_ref());
        let deprecated = quote_setter("deprecated", self.deprecated.as_ref());
        let indexed = quote_flag("indexed", self.indexed);
        let faceted = quote_flag("faceted", self.faceted);

        Ok(quote! {
            ::lumendb::model::ReferenceDescriptor::new(#name, #target)
            #group
            .cardinality(#cardinality)
            .class(<#element as ::lumendb::model::ReferenceTarget>::class)
            #description #deprecated #indexed #faceted
        })
    }
}

///
/// ReflectedReferenceArgs
///
/// Inherits every origin attribute unless `inherit_none`, `inherit` or
/// `exclude` narrow it down.
///

#[derive(Debug, Default, FromMeta)]
#[darling(default)]
pub struct ReflectedReferenceArgs {
    pub name: Option<String>,
    pub entity: Option<String>,
    pub class: Option<Path>,
    pub origin: Option<String>,
    pub cardinality: Option<Ident>,
    pub description: Option<String>,
    #[darling(multiple, rename = "inherit")]
    pub inherited: Vec<String>,
    #[darling(multiple, rename = "exclude")]
    pub excluded: Vec<String>,
    pub inherit_none: bool,
}

impl ReflectedReferenceArgs {
    pub fn descriptor(&self, ident: &Ident, ty: &Type) -> Result<TokenStream, DarlingError> {
        let shape = Shape::of(ty);
        let name = schema_name(ident, self.name.as_ref());
        let target = target_type(ident, self.entity.as_ref(), self.class.as_ref())?;
        let cardinality = cardinality(self.cardinality.as_ref(), shape);
        let element = shape.element();

        let inherited = &self.inherited;
        let excluded = &self.excluded;
        let inheritance = match (self.inherit_none, inherited.is_empty(), excluded.is_empty()) {
            (false, true, true) => TokenStream::new(),
            (true, true, true) => quote!(.inheritance(::lumendb::model::Inheritance::None)),
            (false, false, true) => {
                quote!(.inheritance(::lumendb::model::Inheritance::Only(&[#(#inherited),*])))
            }
            (false, true, false) => {
                quote!(.inheritance(::lumendb::model::Inheritance::Except(&[#(#excluded),*])))
            }
            _ => {
                return Err(DarlingError::custom(
                    "use only one of `inherit_none`, `inherit` and `exclude`",
                )
                .with_span(ident));
            }
        };

        let origin = quote_setter("origin", self.origin.as_ref());
        let description = quote_setter("description", self.description.as_ref());

        Ok(quote! {
            ::lumendb::model::ReflectedReferenceDescriptor::new(#name, #target)
            .cardinality(#cardinality)
            .class(<#element as ::lumendb::model::ReferenceTarget>::class)
            #origin #description #inheritance
        })
    }
}

fn target_type(
    ident: &Ident,
    entity: Option<&String>,
    class: Option<&Path>,
) -> Result<TokenStream, DarlingError> {
    match (entity, class) {
        (Some(entity), None) => Ok(quote!(::lumendb::model::TargetType::Named(#entity))),
        (None, Some(class)) => Ok(quote! {
            ::lumendb::model::TargetType::Class({
                fn target() -> &'static ::lumendb::model::ClassDescriptor {
                    <#class as ::lumendb::model::EntityClass>::DESCRIPTOR
                }
                target
            })
        }),
        (None, None) => {
            Err(
                DarlingError::custom("reference needs a target `entity` or `class`")
                    .with_span(ident),
            )
        }
        (Some(_), Some(_)) => Err(DarlingError::custom(
            "reference target is either `entity` or `class`, not both",
        )
        .with_span(ident)),
    }
}

fn cardinality(explicit: Option<&Ident>, shape: Shape<'_>) -> TokenStream {
    let variant = explicit.map_or_else(
        || match shape {
            Shape::One(_) => quote!(ExactlyOne),
            Shape::Opt(_) => quote!(ZeroOrOne),
            Shape::Many(_) => quote!(ZeroOrMore),
        },
        |ident| quote!(#ident),
    );

    quote!(::lumendb::schema::types::Cardinality::#variant)
}

///
/// Role
///
/// What one field of a model or reference class stands for.
///

#[derive(Debug)]
pub enum Role {
    AssociatedData(AssociatedDataArgs),
    Attribute(AttributeArgs),
    Locales,
    Parent,
    PriceForSale,
    Prices,
    PrimaryKey,
    Reference(ReferenceArgs),
    ReferencedEntity,
    ReferencedGroup,
    ReferencedPrimaryKey,
    ReflectedReference(ReflectedReferenceArgs),
    Skip,
}

impl Role {
    fn parse(attr: &Attribute) -> Result<Option<Self>, DarlingError> {
        let Some(ident) = attr.path().get_ident() else {
            return Ok(None);
        };

        let role = match ident.to_string().as_str() {
            "associated_data" => Self::AssociatedData(args(attr)?),
            "attribute" => Self::Attribute(args(attr)?),
            "locales" => word(attr, Self::Locales)?,
            "parent" => word(attr, Self::Parent)?,
            "price_for_sale" => word(attr, Self::PriceForSale)?,
            "prices" => word(attr, Self::Prices)?,
            "primary_key" => word(attr, Self::PrimaryKey)?,
            "reference" => Self::Reference(args(attr)?),
            "referenced_entity" => word(attr, Self::ReferencedEntity)?,
            "referenced_group" => word(attr, Self::ReferencedGroup)?,
            "referenced_primary_key" => word(attr, Self::ReferencedPrimaryKey)?,
            "reflected_reference" => Self::ReflectedReference(args(attr)?),
            "skip" => word(attr, Self::Skip)?,
            _ => return Ok(None),
        };

        Ok(Some(role))
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::AssociatedData(_) => "associated_data",
            Self::Attribute(_) => "attribute",
            Self::Locales => "locales",
            Self::Parent => "parent",
            Self::PriceForSale => "price_for_sale",
            Self::Prices => "prices",
            Self::PrimaryKey => "primary_key",
            Self::Reference(_) => "reference",
            Self::ReferencedEntity => "referenced_entity",
            Self::ReferencedGroup => "referenced_group",
            Self::ReferencedPrimaryKey => "referenced_primary_key",
            Self::ReflectedReference(_) => "reflected_reference",
            Self::Skip => "skip",
        }
    }
}

// arguments of a list attribute, defaults for a bare one
fn args<T: FromMeta + Default>(attr: &Attribute) -> Result<T, DarlingError> {
    match &attr.meta {
        Meta::Path(_) => Ok(T::default()),
        meta => T::from_meta(meta),
    }
}

fn word(attr: &Attribute, role: Role) -> Result<Role, DarlingError> {
    match &attr.meta {
        Meta::Path(_) => Ok(role),
        meta => Err(DarlingError::custom(format!("`{}` takes no arguments", role.label()))
            .with_span(meta)),
    }
}

///
/// Member
///
/// One named field with at most one role. Fields without a role read as
/// attributes matched by name.
///

#[derive(Debug)]
pub struct Member {
    pub ident: Ident,
    pub ty: Type,
    pub role: Option<Role>,
}

impl Member {
    /// Parse a field, accepting only the roles named in `allowed`.
    pub fn from_field(field: &Field, allowed: &[&str]) -> Result<Self, DarlingError> {
        let Some(ident) = field.ident.clone() else {
            return Err(DarlingError::custom("model classes need named fields").with_span(field));
        };

        let mut errors = DarlingError::accumulator();
        let mut role: Option<Role> = None;
        for attr in &field.attrs {
            let Some(parsed) = errors.handle(Role::parse(attr)).flatten() else {
                continue;
            };
            if !allowed.contains(&parsed.label()) {
                errors.push(
                    DarlingError::custom(format!("`{}` is not valid here", parsed.label()))
                        .with_span(attr),
                );
                continue;
            }
            if let Some(previous) = &role {
                errors.push(
                    DarlingError::custom(format!(
                        "conflicting roles `{}` and `{}`",
                        previous.label(),
                        parsed.label()
                    ))
                    .with_span(attr),
                );
                continue;
            }
            role = Some(parsed);
        }

        errors.finish_with(Self {
            ident,
            ty: field.ty.clone(),
            role,
        })
    }

    pub fn field_name(&self) -> String {
        self.ident.to_string()
    }

    /// `ProxyError::ValueMissing` for this field, raised at `owner`.
    pub fn missing(&self, owner: &TokenStream) -> TokenStream {
        let field = self.field_name();

        quote! {
            ::lumendb::error::ProxyError::value_missing(#owner, #field)
        }
    }

    /// Unwrap a read returning `Option` according to the field shape.
    pub fn shaped(&self, read: &TokenStream, owner: &TokenStream) -> TokenStream {
        match Shape::of(&self.ty) {
            Shape::One(_) => {
                let missing = self.missing(owner);
                quote!(#read.ok_or_else(|| #missing)?)
            }
            Shape::Opt(_) => quote!(#read),
            Shape::Many(_) => quote!(#read.unwrap_or_default()),
        }
    }

    /// Read of a plain value through `getter`, tolerant to missing context
    /// unless the field is required.
    pub fn read_value(&self, getter: &str, key: &str, owner: &TokenStream) -> TokenStream {
        let shape = Shape::of(&self.ty);
        let ty = shape.value(&self.ty);
        let getter = match shape {
            Shape::One(_) => quote::format_ident!("{getter}"),
            Shape::Opt(_) | Shape::Many(_) => quote::format_ident!("{getter}_if_present"),
        };

        self.shaped(&quote!(proxy.#getter::<#ty>(#key)?), owner)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn member(field: Field, allowed: &[&str]) -> Result<Member, DarlingError> {
        Member::from_field(&field, allowed)
    }

    #[test]
    fn role_arguments_are_parsed() {
        let field: Field = syn::parse_quote! {
            #[attribute(name = "title", localized, sortable)]
            pub name: Option<String>
        };
        let member = member(field, &["attribute"]).expect("valid");

        let Some(Role::Attribute(args)) = member.role else {
            panic!("attribute role expected");
        };
        assert_eq!(args.name.as_deref(), Some("title"));
        assert!(args.localized && args.sortable && !args.unique);
    }

    #[test]
    fn bare_role_uses_defaults() {
        let field: Field = syn::parse_quote! {
            #[associated_data]
            pub labels: Vec<String>
        };
        let member = member(field, &["associated_data"]).expect("valid");

        assert!(matches!(member.role, Some(Role::AssociatedData(ref args)) if !args.scalar));
    }

    #[test]
    fn conflicting_and_foreign_roles_are_errors() {
        let conflicting: Field = syn::parse_quote! {
            #[attribute]
            #[associated_data]
            pub code: String
        };
        let foreign: Field = syn::parse_quote! {
            #[referenced_entity]
            pub brand: Option<i32>
        };
        let wordy: Field = syn::parse_quote! {
            #[primary_key(generated)]
            pub id: i32
        };
        let allowed = ["attribute", "associated_data", "primary_key"];

        assert!(member(conflicting, &allowed).is_err());
        assert!(member(foreign, &allowed).is_err());
        assert!(member(wordy, &allowed).is_err());
    }

    #[test]
    fn reference_needs_exactly_one_target() {
        let ident: Ident = syn::parse_quote!(brand);
        let ty: Type = syn::parse_quote!(i32);

        assert!(ReferenceArgs::default().descriptor(&ident, &ty).is_err());

        let args = ReferenceArgs {
            entity: Some("BRAND".to_string()),
            ..ReferenceArgs::default()
        };
        let tokens = args.descriptor(&ident, &ty).expect("named target").to_string();
        assert!(tokens.contains("ExactlyOne"));
        assert!(tokens.contains("\"brand\""));
    }
}
