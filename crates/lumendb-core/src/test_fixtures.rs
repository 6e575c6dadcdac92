use crate::{
    db::{Catalog, CatalogConfig},
    error::{Error, ProxyError},
    model::{
        AssociatedDataDescriptor, AttributeDescriptor, ClassDescriptor, EntityClass, FromProxy,
        MemberDescriptor, MemberRole, ReferenceClassDescriptor, ReferenceDescriptor, TargetType,
    },
    proxy::EntityProxy,
};
use lumendb_primitives::{DateTimeRange, FieldValue, ValueType};
use lumendb_schema::types::Cardinality;

///
/// Category
///
/// Hierarchical test class with localized and associated content.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Category {
    pub id: Option<i32>,
    pub code: String,
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub parent: Option<i32>,
}

static CATEGORY: ClassDescriptor = ClassDescriptor::new("Category", "CATEGORY")
    .hierarchy()
    .allowed_locales(&["en", "cs"])
    .members(&[
        MemberDescriptor::new("id", &[MemberRole::PrimaryKey]),
        MemberDescriptor::new(
            "code",
            &[MemberRole::Attribute(AttributeDescriptor::new("code", text).unique())],
        ),
        MemberDescriptor::new(
            "name",
            &[MemberRole::Attribute(
                AttributeDescriptor::new("name", text).localized().nullable(),
            )],
        ),
        MemberDescriptor::new(
            "priority",
            &[MemberRole::Attribute(
                AttributeDescriptor::new("priority", int).nullable(),
            )],
        ),
        MemberDescriptor::new(
            "validity",
            &[MemberRole::Attribute(
                AttributeDescriptor::new("validity", range).nullable(),
            )],
        ),
        MemberDescriptor::new(
            "labels",
            &[MemberRole::AssociatedData(
                AssociatedDataDescriptor::new("labels", json).nullable(),
            )],
        ),
        MemberDescriptor::new(
            "referenced_files",
            &[MemberRole::AssociatedData(
                AssociatedDataDescriptor::new("referencedFiles", json).nullable(),
            )],
        ),
        MemberDescriptor::new("parent", &[MemberRole::Parent]),
    ]);

impl FromProxy for Category {
    fn from_proxy(proxy: &EntityProxy<Self>) -> Result<Self, Error> {
        Ok(Self {
            id: proxy.primary_key(),
            code: proxy
                .attribute("code")?
                .ok_or_else(|| ProxyError::value_missing(proxy.entity_type(), "code"))?,
            name: proxy.attribute_if_present("name")?,
            priority: proxy.attribute("priority")?,
            parent: proxy.parent_id()?,
        })
    }
}

impl EntityClass for Category {
    const DESCRIPTOR: &'static ClassDescriptor = &CATEGORY;
}

///
/// Brand
///

#[derive(Clone, Debug, PartialEq)]
pub struct Brand {
    pub id: Option<i32>,
    pub code: Option<String>,
}

static BRAND: ClassDescriptor = ClassDescriptor::new("Brand", "BRAND").members(&[
    MemberDescriptor::new("id", &[MemberRole::PrimaryKey]),
    MemberDescriptor::new(
        "code",
        &[MemberRole::Attribute(AttributeDescriptor::new("code", text).nullable())],
    ),
]);

impl FromProxy for Brand {
    fn from_proxy(proxy: &EntityProxy<Self>) -> Result<Self, Error> {
        Ok(Self {
            id: proxy.primary_key(),
            code: proxy.attribute("code")?,
        })
    }
}

impl EntityClass for Brand {
    const DESCRIPTOR: &'static ClassDescriptor = &BRAND;
}

///
/// Product
///
/// Priced test class with one mandatory brand and duplicate-friendly
/// relations told apart by `relationType`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Product {
    pub id: Option<i32>,
    pub code: Option<String>,
}

static PRODUCT_RELATION: ReferenceClassDescriptor = ReferenceClassDescriptor::new(
    "ProductRelation",
    &[
        MemberDescriptor::new(
            "relation_type",
            &[MemberRole::Attribute(
                AttributeDescriptor::new("relationType", text).nullable(),
            )],
        ),
        MemberDescriptor::new(
            "label",
            &[MemberRole::Attribute(
                AttributeDescriptor::new("label", text).nullable(),
            )],
        ),
    ],
);

static PRODUCT: ClassDescriptor = ClassDescriptor::new("Product", "PRODUCT")
    .price()
    .allowed_currencies(&["CZK", "EUR"])
    .members(&[
        MemberDescriptor::new("id", &[MemberRole::PrimaryKey]),
        MemberDescriptor::new(
            "code",
            &[MemberRole::Attribute(AttributeDescriptor::new("code", text).nullable())],
        ),
        MemberDescriptor::new(
            "brand",
            &[MemberRole::Reference(
                ReferenceDescriptor::new("brand", TargetType::Class(brand))
                    .cardinality(Cardinality::ExactlyOne),
            )],
        ),
        MemberDescriptor::new(
            "parameter",
            &[MemberRole::Reference(
                ReferenceDescriptor::new("parameter", TargetType::Named("PARAMETER"))
                    .cardinality(Cardinality::ZeroOrOne),
            )],
        ),
        MemberDescriptor::new(
            "categories",
            &[MemberRole::Reference(
                ReferenceDescriptor::new("categories", TargetType::Class(category))
                    .cardinality(Cardinality::ZeroOrMore),
            )],
        ),
        MemberDescriptor::new(
            "related_products",
            &[MemberRole::Reference(
                ReferenceDescriptor::new("relatedProducts", TargetType::Named("PRODUCT"))
                    .cardinality(Cardinality::ZeroOrMoreWithDuplicates)
                    .class(product_relation),
            )],
        ),
        MemberDescriptor::new("prices", &[MemberRole::Prices]),
        MemberDescriptor::new("price_for_sale", &[MemberRole::PriceForSale]),
    ]);

impl FromProxy for Product {
    fn from_proxy(proxy: &EntityProxy<Self>) -> Result<Self, Error> {
        Ok(Self {
            id: proxy.primary_key(),
            code: proxy.attribute("code")?,
        })
    }
}

impl EntityClass for Product {
    const DESCRIPTOR: &'static ClassDescriptor = &PRODUCT;
}

fn brand() -> &'static ClassDescriptor {
    &BRAND
}

fn category() -> &'static ClassDescriptor {
    &CATEGORY
}

fn product_relation() -> Option<&'static ReferenceClassDescriptor> {
    Some(&PRODUCT_RELATION)
}

fn text() -> ValueType {
    String::value_type()
}

fn int() -> ValueType {
    i64::value_type()
}

fn range() -> ValueType {
    DateTimeRange::value_type()
}

fn json() -> ValueType {
    serde_json::Value::value_type()
}

/// Catalog that registers model classes as they are first written.
pub fn catalog() -> Catalog {
    Catalog::new(CatalogConfig::new("test").auto_register_model_classes(true))
}
