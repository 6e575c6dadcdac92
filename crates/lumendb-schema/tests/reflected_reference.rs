use lumendb_schema::prelude::*;
use std::sync::Arc;

const PRODUCT: &str = "PRODUCT";
const CATEGORY: &str = "CATEGORY";

const TEXT: ValueType = ValueType::Scalar(Scalar::Text);
const INT: ValueType = ValueType::Scalar(Scalar::Int);

// PRODUCT.categories -> CATEGORY, mirrored as CATEGORY.products
fn catalog_with_origin(cardinality: Cardinality) -> Arc<CatalogSchema> {
    let mut builder = CatalogSchemaBuilder::new(Arc::new(CatalogSchema::new("testCatalog")));
    builder
        .with_entity_schema(CATEGORY, |_| Ok(()))
        .expect("category")
        .with_entity_schema(PRODUCT, |product| {
            product.with_reference_to_entity("categories", CATEGORY, cardinality, |r| {
                r.with_description("Categories of the product.")
                    .indexed()
                    .with_attribute("orderInCategory", INT, |a| {
                        a.sortable();
                    })?
                    .with_attribute("label", TEXT, |a| {
                        a.representative();
                    })?
                    .with_attribute("note", TEXT, |a| {
                        a.nullable();
                    })?;
                Ok(())
            })?;
            Ok(())
        })
        .expect("product");

    builder.to_instance().expect("valid catalog")
}

fn reflect(
    catalog: &Arc<CatalogSchema>,
    configure: impl FnOnce(&mut ReflectedReferenceSchemaBuilder) -> Result<(), SchemaError>,
) -> Result<Arc<CatalogSchema>, SchemaError> {
    let mut builder = CatalogSchemaBuilder::new(Arc::clone(catalog));
    builder.with_entity_schema(CATEGORY, |category| {
        category.with_reflected_reference_to_entity("products", PRODUCT, "categories", configure)?;
        Ok(())
    })?;

    builder.to_instance()
}

fn products(catalog: &CatalogSchema) -> &ReflectedReferenceSchema {
    catalog
        .entity_schema(CATEGORY)
        .and_then(|schema| schema.reference("products"))
        .and_then(ReferenceSchema::as_reflected)
        .expect("reflected products reference")
}

#[test]
fn reflected_reference_inherits_everything_by_default() {
    let catalog = reflect(&catalog_with_origin(Cardinality::ZeroOrMore), |_| Ok(()))
        .expect("valid reflection");
    let products = products(&catalog);

    assert!(products.is_resolved());
    assert_eq!(products.description(), Some("Categories of the product."));
    assert_eq!(products.cardinality(), Cardinality::ZeroOrMore);
    assert!(products.is_indexed());
    assert!(products.is_description_inherited());
    assert_eq!(
        products.attributes().into_keys().collect::<Vec<_>>(),
        vec!["label", "note", "orderInCategory"]
    );
}

#[test]
fn attribute_inheritance_modes_filter_origin_attributes() {
    let origin = catalog_with_origin(Cardinality::ZeroOrMore);

    let only = reflect(&origin, |r| {
        r.with_attributes_inherited_only(["label"]);
        Ok(())
    })
    .expect("only label");
    assert_eq!(
        products(&only).attributes().into_keys().collect::<Vec<_>>(),
        vec!["label"]
    );

    let except = reflect(&origin, |r| {
        r.with_attributes_inherited_except(["note"]);
        Ok(())
    })
    .expect("all but note");
    assert_eq!(
        products(&except).attributes().into_keys().collect::<Vec<_>>(),
        vec!["label", "orderInCategory"]
    );

    let none = reflect(&origin, |r| {
        r.without_attributes_inherited().with_attribute("own", TEXT, |_| {})?;
        Ok(())
    })
    .expect("own attribute only");
    assert_eq!(
        products(&none).attributes().into_keys().collect::<Vec<_>>(),
        vec!["own"]
    );
}

#[test]
fn overridden_properties_stay_while_inherited_ones_follow_the_origin() {
    let catalog = reflect(&catalog_with_origin(Cardinality::ZeroOrMore), |r| {
        r.with_cardinality(Cardinality::ZeroOrOne).non_faceted();
        Ok(())
    })
    .expect("valid reflection");

    let mut builder = CatalogSchemaBuilder::new(Arc::clone(&catalog));
    builder
        .with_entity_schema(PRODUCT, |product| {
            product.with_reference_to_entity("categories", CATEGORY, Cardinality::OneOrMore, |r| {
                r.with_description("Where the product is listed.");
                Ok(())
            })?;
            Ok(())
        })
        .expect("origin update");
    let updated = builder.to_instance().expect("valid update");

    let products = products(&updated);
    assert_eq!(products.description(), Some("Where the product is listed."));
    assert_eq!(products.cardinality(), Cardinality::ZeroOrOne);
    assert!(!products.is_faceted());
}

#[test]
fn standard_reference_cannot_turn_reflected_without_removal() {
    let catalog = catalog_with_origin(Cardinality::ZeroOrMore);
    let base = catalog.entity_schema_arc(CATEGORY).expect("category");
    let mut builder = EntitySchemaBuilder::new(Arc::clone(&catalog), base);

    builder
        .with_reference_to_entity("products", PRODUCT, Cardinality::ZeroOrMore, |_| Ok(()))
        .expect("standard products");

    let err = builder
        .with_reflected_reference_to_entity("products", PRODUCT, "categories", |_| Ok(()))
        .map(|_| ())
        .expect_err("kind change in the same builder");
    assert!(matches!(err, SchemaError::InvalidSchemaMutation { .. }));

    // same rule for a builder derived from the built instance
    let mut derived = EntitySchemaBuilder::new(Arc::clone(&catalog), builder.to_instance());
    let err = derived
        .with_reflected_reference_to_entity("products", PRODUCT, "categories", |_| Ok(()))
        .map(|_| ())
        .expect_err("kind change in a derived builder");
    assert!(matches!(err, SchemaError::InvalidSchemaMutation { .. }));

    derived
        .without_reference_to("products")
        .expect("remove standard reference")
        .with_reflected_reference_to_entity("products", PRODUCT, "categories", |_| Ok(()))
        .expect("reflected after removal");
    assert!(
        derived
            .current()
            .reference("products")
            .is_some_and(ReferenceSchema::is_reflected)
    );
}

#[test]
fn reflected_reference_cannot_turn_standard_without_removal() {
    let catalog = reflect(&catalog_with_origin(Cardinality::ZeroOrMore), |_| Ok(()))
        .expect("valid reflection");
    let base = catalog.entity_schema_arc(CATEGORY).expect("category");
    let mut builder = EntitySchemaBuilder::new(Arc::clone(&catalog), base);

    let err = builder
        .with_reference_to_entity("products", PRODUCT, Cardinality::ZeroOrMore, |_| Ok(()))
        .map(|_| ())
        .expect_err("kind change");
    assert!(matches!(err, SchemaError::InvalidSchemaMutation { .. }));

    builder
        .without_reference_to("products")
        .expect("remove")
        .with_reference_to_entity("products", PRODUCT, Cardinality::ZeroOrMore, |_| Ok(()))
        .expect("standard after removal");
}

#[test]
fn reflection_of_unmanaged_origin_is_invalid() {
    let mut builder = CatalogSchemaBuilder::new(Arc::new(CatalogSchema::new("testCatalog")));
    builder
        .with_entity_schema(PRODUCT, |product| {
            product.with_reference_to("categories", CATEGORY, Cardinality::ZeroOrMore, |_| Ok(()))?;
            Ok(())
        })
        .expect("product")
        .with_entity_schema(CATEGORY, |category| {
            category.with_reflected_reference_to_entity("products", PRODUCT, "categories", |_| {
                Ok(())
            })?;
            Ok(())
        })
        .expect("builder accepts the reflection");

    let err = builder.to_instance().expect_err("origin is not managed");
    let SchemaError::InvalidSchemaMutation { message } = err else {
        panic!("unexpected error");
    };
    assert!(message.contains("but it's not managed entity type"));
}

#[test]
fn reflection_of_duplicate_origin_needs_representative_attributes() {
    let origin = catalog_with_origin(Cardinality::ZeroOrMoreWithDuplicates);

    let err = reflect(&origin, |r| {
        r.without_attributes_inherited();
        Ok(())
    })
    .expect_err("label is representative");
    let SchemaError::InvalidSchemaMutation { message } = err else {
        panic!("unexpected error");
    };
    assert!(message.contains("Missing representative attributes: label"));

    let err = reflect(&origin, |r| {
        r.with_cardinality(Cardinality::ZeroOrMore);
        Ok(())
    })
    .expect_err("duplicates must stay allowed");
    assert!(matches!(err, SchemaError::InvalidSchemaMutation { .. }));

    reflect(&origin, |_| Ok(())).expect("inherits everything");
}
