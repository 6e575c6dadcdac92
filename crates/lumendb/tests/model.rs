use lumendb::{
    db::CatalogSession,
    fetch::ReferenceFetch,
    model::ReferenceTarget,
    prelude::*,
    primitives::FieldValue,
    schema::{node::ReferenceSchema, types::Cardinality},
};
use std::collections::BTreeSet;

///
/// Brand
///

#[derive(Clone, Debug, EntityClass, PartialEq)]
#[entity(name = "BRAND", description = "Manufacturer")]
struct Brand {
    #[primary_key]
    id: Option<i32>,
    #[attribute(unique)]
    code: String,
}

///
/// Category
///
/// `internal_note` is not declared and binds to a schema attribute by name.
///

#[derive(Clone, Debug, EntityClass, PartialEq)]
#[entity(name = "CATEGORY", locale = "en", locale = "cs", hierarchy)]
struct Category {
    #[primary_key]
    id: Option<i32>,
    #[attribute(unique)]
    code: String,
    #[attribute(localized)]
    name: Option<String>,
    #[parent]
    parent: Option<i32>,
    #[locales]
    locales: BTreeSet<Locale>,
    internal_note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, ReferenceClass)]
struct BrandLink {
    #[referenced_primary_key]
    id: i32,
    #[referenced_entity]
    body: Option<Brand>,
}

#[derive(Clone, Debug, PartialEq, ReferenceClass)]
struct Relation {
    #[referenced_primary_key]
    product: i32,
    #[attribute(name = "relationType")]
    kind: String,
    note: Option<String>,
}

///
/// Product
///

#[derive(Clone, Debug, EntityClass, PartialEq)]
#[entity(name = "PRODUCT", currency = "CZK", currency = "EUR", price)]
struct Product {
    #[primary_key]
    id: Option<i32>,
    #[attribute(sortable)]
    code: String,
    #[associated_data]
    gallery: Option<Vec<String>>,
    #[reference(class = Brand)]
    brand: BrandLink,
    #[reference(class = Category)]
    categories: Vec<i32>,
    #[reference(entity = "PRODUCT", cardinality = "ZeroOrMoreWithDuplicates")]
    related: Vec<Relation>,
    #[prices]
    prices: Vec<Price>,
    #[skip]
    dirty: bool,
}

#[derive(Clone, Debug, EntityClass, PartialEq)]
#[entity(name = "SHOP")]
struct Shop {
    #[primary_key]
    id: Option<i32>,
    #[reference(class = Owner)]
    owner: Option<i32>,
}

#[derive(Clone, Debug, EntityClass, PartialEq)]
#[entity(name = "OWNER")]
struct Owner {
    #[primary_key]
    id: Option<i32>,
    #[reflected_reference(class = Shop)]
    shops: Vec<i32>,
}

fn catalog() -> Catalog {
    Catalog::new(CatalogConfig::new("shop").auto_register_model_classes(true))
}

fn store_brand(session: &mut CatalogSession<'_>, primary_key: i32, code: &str) {
    let mut brand = session
        .create_new_entity::<Brand>(Some(primary_key))
        .expect("registered");
    brand.set_attribute("code", code).expect("declared");
    brand.upsert_via::<(), _>(session).expect("stored");
}

fn store_category(session: &mut CatalogSession<'_>) {
    session
        .define_entity_schema_from_model_class::<Category>()
        .expect("valid class");
    let mut builder = session.define_entity_schema("CATEGORY");
    builder
        .with_attribute("internalNote", String::value_type(), |attribute| {
            attribute.nullable();
        })
        .expect("new attribute");
    session
        .update_entity_schema(&builder.to_mutation().expect("changed"))
        .expect("applied");

    let mut category = session
        .create_new_entity::<Category>(Some(1))
        .expect("registered");
    category
        .set_attribute("code", "tools")
        .and_then(|c| c.set_localized_attribute("name", "en", "Tools"))
        .and_then(|c| c.set_localized_attribute("name", "cs", "Nářadí"))
        .and_then(|c| c.set_attribute("internal_note", "restock"))
        .expect("declared");
    category.upsert_via::<(), _>(session).expect("stored");
}

fn store_products(session: &mut CatalogSession<'_>) {
    let mut cable = session
        .create_new_entity::<Product>(Some(2))
        .expect("registered");
    cable
        .set_attribute("code", "cable")
        .and_then(|c| c.set_reference("brand", 10))
        .expect("declared");
    cable.upsert_via::<(), _>(session).expect("stored");

    let mut drill = session
        .create_new_entity::<Product>(Some(1))
        .expect("registered");
    drill
        .set_attribute("code", "drill")
        .and_then(|d| d.set_associated_data("gallery", &["front.png", "side.png"]))
        .and_then(|d| d.set_reference("brand", 10))
        .expect("declared");
    drill.add_reference("categories", 1).expect("declared");
    drill
        .add_or_update_reference_with("related", 2, ("relationType", "accessory"), |relation| {
            relation.set_attribute("note", "fits the chuck");
            Ok(())
        })
        .expect("declared");
    drill
        .set_basic_price(
            1,
            "CZK",
            Decimal::new(100, 0),
            Decimal::new(21, 0),
            Decimal::new(121, 0),
        )
        .expect("free price id");
    drill.upsert_via::<(), _>(session).expect("stored");
}

///
/// TESTS
///

#[test]
fn derived_classes_define_schema() {
    let mut catalog = Catalog::new(CatalogConfig::new("shop"));
    let mut session = catalog.session();

    for analysis in [
        session.define_entity_schema_from_model_class::<Brand>(),
        session.define_entity_schema_from_model_class::<Category>(),
        session.define_entity_schema_from_model_class::<Product>(),
    ] {
        assert!(!analysis.expect("valid class").is_empty());
    }

    let brand = session.entity_schema("BRAND").expect("brand");
    assert_eq!(brand.description.as_deref(), Some("Manufacturer"));
    assert!(brand.attribute("code").is_some_and(|a| a.unique && !a.nullable));

    let category = session.entity_schema("CATEGORY").expect("category");
    assert!(category.attribute("name").is_some_and(|a| a.localized && a.nullable));
    assert!(category.attribute("internalNote").is_none());

    let product = session.entity_schema("PRODUCT").expect("product");
    assert!(product.price.is_some());
    assert!(product.attribute("code").is_some_and(|a| a.sortable));
    assert!(product.attribute("dirty").is_none());
    assert!(product.associated_data("gallery").is_some());
    assert_eq!(
        product.reference("brand").map(ReferenceSchema::cardinality),
        Some(Cardinality::ExactlyOne)
    );
    assert_eq!(
        product.reference("categories").map(ReferenceSchema::cardinality),
        Some(Cardinality::ZeroOrMore)
    );

    let related = product.reference("related").expect("related");
    assert_eq!(related.cardinality(), Cardinality::ZeroOrMoreWithDuplicates);
    assert!(related.attribute("relationType").is_some_and(|a| !a.nullable));
    assert!(related.attribute("note").is_some_and(|a| a.nullable));

    assert!(
        session
            .define_entity_schema_from_model_class::<Product>()
            .expect("valid class")
            .is_empty()
    );
}

#[test]
fn reflected_reference_mirrors_origin_class() {
    let mut catalog = Catalog::new(CatalogConfig::new("shop"));
    let mut session = catalog.session();

    session
        .define_entity_schema_from_model_class::<Owner>()
        .expect("valid class");

    assert!(session.entity_schema("SHOP").is_some());
    let shops = session
        .entity_schema("OWNER")
        .and_then(|schema| schema.reference("shops").cloned())
        .expect("reflected");
    assert!(matches!(
        shops,
        ReferenceSchema::Reflected(ref r) if r.reflected_reference_name == "owner"
    ));
}

#[test]
fn reference_classes_expose_their_descriptor() {
    let relation = <Relation as ReferenceTarget>::class().expect("reference class");

    assert_eq!(relation.name, "Relation");
    assert!(<i32 as ReferenceTarget>::class().is_none());
}

#[test]
fn stored_entities_materialize_into_derived_classes() {
    let mut catalog = catalog();
    let mut session = catalog.session();
    store_brand(&mut session, 10, "acme");
    store_category(&mut session);
    store_products(&mut session);

    let fetch = entity_fetch_all()
        .with_reference("brand", ReferenceFetch::new().with_entity(entity_fetch_all()));
    let drill = session
        .get_entity_as::<Product>(1, &fetch)
        .expect("read")
        .expect("stored")
        .materialize()
        .expect("complete");

    assert_eq!(drill.id, Some(1));
    assert_eq!(drill.code, "drill");
    assert_eq!(
        drill.gallery,
        Some(vec!["front.png".to_string(), "side.png".to_string()])
    );
    assert_eq!(drill.brand.id, 10);
    assert_eq!(drill.brand.body.as_ref().map(|b| b.code.as_str()), Some("acme"));
    assert_eq!(drill.categories, vec![1]);
    assert_eq!(
        drill.related,
        vec![Relation {
            product: 2,
            kind: "accessory".to_string(),
            note: Some("fits the chuck".to_string()),
        }]
    );
    assert_eq!(drill.prices.len(), 1);
    assert!(!drill.dirty);

    let cable = session
        .get_entity_as::<Product>(2, &entity_fetch_all())
        .expect("read")
        .expect("stored")
        .materialize()
        .expect("complete");
    assert_eq!(cable.brand.body, None);
    assert!(cable.related.is_empty());
}

#[test]
fn localized_and_unmarked_members_read_by_name() {
    let mut catalog = catalog();
    let mut session = catalog.session();
    store_category(&mut session);

    let category = session
        .get_entity_as::<Category>(1, &entity_fetch_all().with_locales(["cs"]))
        .expect("read")
        .expect("stored")
        .materialize()
        .expect("complete");

    assert_eq!(category.name.as_deref(), Some("Nářadí"));
    assert_eq!(category.internal_note.as_deref(), Some("restock"));
    assert_eq!(category.parent, None);
    assert!(category.locales.contains(&Locale::new("cs")));

    let everywhere = session
        .get_entity_as::<Category>(1, &entity_fetch_all())
        .expect("read")
        .expect("stored")
        .materialize()
        .expect("complete");
    assert_eq!(everywhere.name, None);
}

#[test]
fn proxies_reopen_for_write() {
    let mut catalog = catalog();
    let mut session = catalog.session();
    store_brand(&mut session, 10, "acme");

    let mut editor = session
        .get_entity_as::<Brand>(10, &entity_fetch_all())
        .expect("read")
        .expect("stored")
        .open_for_write();
    editor.set_attribute("code", "acme-tools").expect("declared");
    assert_eq!(editor.to_instance().expect("complete").code, "acme-tools");

    let stored: SealedEntity = editor.upsert_via(&mut session).expect("stored");
    assert_eq!(stored.entity().version, 2);

    let missing_brand = session
        .create_new_entity::<Product>(Some(5))
        .and_then(|mut product| {
            product.set_attribute("code", "orphan")?;
            product.upsert_via::<(), _>(&mut session)
        });
    assert!(missing_brand.is_err());
}
