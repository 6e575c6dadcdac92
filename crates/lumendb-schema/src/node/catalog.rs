use crate::{
    error::{ErrorTree, SchemaError},
    mutation::{CatalogSchemaMutation, ModifyCatalogSchemaMutation},
    node::{EntitySchema, GlobalAttributeSchema, ReferenceSchema, ReflectedReferenceSchema},
};
use lumendb_utils::NameVariants;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tracing::{Level, event};

///
/// CatalogSchema
///
/// Root of the schema graph. Entity schemas are shared behind `Arc` so a
/// new catalog version only copies the schemas it actually touched.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CatalogSchema {
    pub name: String,
    pub name_variants: NameVariants,
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub attributes: BTreeMap<String, GlobalAttributeSchema>,
    pub entity_schemas: BTreeMap<String, Arc<EntitySchema>>,
}

impl CatalogSchema {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            name_variants: NameVariants::generate(&name),
            name,
            version: 1,
            description: None,
            attributes: BTreeMap::new(),
            entity_schemas: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&GlobalAttributeSchema> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn entity_schema(&self, name: &str) -> Option<&EntitySchema> {
        self.entity_schemas.get(name).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn entity_schema_arc(&self, name: &str) -> Option<Arc<EntitySchema>> {
        self.entity_schemas.get(name).cloned()
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entity_schemas.keys().map(String::as_str)
    }

    /// Attach the current origin to a reflected reference, or detach it
    /// when the origin cannot be found.
    #[must_use]
    pub fn resolve_reflected(
        &self,
        reflected: &ReflectedReferenceSchema,
    ) -> ReflectedReferenceSchema {
        let origin = self
            .entity_schema(&reflected.referenced_entity_type)
            .and_then(|schema| schema.reference(&reflected.reflected_reference_name))
            .and_then(ReferenceSchema::as_standard);

        match origin {
            Some(origin) => reflected.with_referenced_schema(Arc::new(origin.clone())),
            None => reflected.without_referenced_schema(),
        }
    }

    #[must_use]
    pub fn resolve_reference(&self, reference: &ReferenceSchema) -> ReferenceSchema {
        match reference {
            ReferenceSchema::Reflected(reflected) => {
                ReferenceSchema::Reflected(self.resolve_reflected(reflected))
            }
            ReferenceSchema::Standard(_) => reference.clone(),
        }
    }

    ///
    /// MUTATION
    ///

    /// Apply without cross-schema validation. Builders use this for their
    /// in-progress view, where a reflection may precede its origin.
    pub fn mutate(&self, mutations: &[CatalogSchemaMutation]) -> Result<Self, SchemaError> {
        let mut next = self.clone();
        for mutation in mutations {
            mutation.mutate(&mut next)?;
        }
        next.resolve_reflected_references();
        if !mutations.is_empty() {
            next.version = self.version + 1;
        }

        Ok(next)
    }

    /// Apply and validate every entity schema the mutation touched.
    pub fn apply(&self, mutation: &ModifyCatalogSchemaMutation) -> Result<Self, SchemaError> {
        let next = self.mutate(&mutation.mutations)?;
        next.validate(mutation.touched_entity_types())?;

        event!(
            Level::DEBUG,
            catalog = %next.name,
            version = next.version,
            mutations = mutation.mutations.len(),
            "catalog schema updated"
        );

        Ok(next)
    }

    /// Validate the reflected references held by `entity_types`, and any
    /// reflection pointing at them.
    pub fn validate<'a>(
        &self,
        entity_types: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), SchemaError> {
        let touched: BTreeSet<&str> = entity_types.into_iter().collect();
        let mut errs = ErrorTree::new();

        for schema in self.entity_schemas.values() {
            let mut schema_errs = ErrorTree::new();
            for reference in schema.references.values() {
                let ReferenceSchema::Reflected(reflected) = reference else {
                    continue;
                };
                if !touched.contains(schema.name.as_str())
                    && !touched.contains(reflected.referenced_entity_type.as_str())
                {
                    continue;
                }

                schema_errs.merge_for(
                    format!("Reference schema `{}`", reflected.name),
                    reflected.validate(self, &schema.name),
                );
            }
            errs.merge_for(format!("Schema `{}`", schema.name), schema_errs);
        }

        errs.result().map_err(SchemaError::from)
    }

    // replace each reflected reference whose origin changed
    fn resolve_reflected_references(&mut self) {
        let mut resolved = Vec::new();

        for (entity_type, schema) in &self.entity_schemas {
            let mut next: Option<EntitySchema> = None;
            for (name, reference) in &schema.references {
                if !reference.is_reflected() {
                    continue;
                }
                let candidate = self.resolve_reference(reference);
                let origin_changed = match (reference.as_reflected(), candidate.as_reflected()) {
                    (Some(before), Some(after)) => before.origin() != after.origin(),
                    _ => false,
                };
                if origin_changed {
                    next.get_or_insert_with(|| (**schema).clone())
                        .references
                        .insert(name.clone(), candidate);
                }
            }
            if let Some(next) = next {
                resolved.push((entity_type.clone(), next));
            }
        }

        for (entity_type, schema) in resolved {
            self.entity_schemas.insert(entity_type, Arc::new(schema));
        }
    }

    pub(crate) fn upsert_global_attribute(&mut self, attribute: &GlobalAttributeSchema) {
        let name = attribute.name.clone();
        self.attributes.insert(name.clone(), attribute.clone());

        // entity schemas hold a copy of the global definition
        for schema in self.entity_schemas.values_mut() {
            if schema.is_global_attribute(&name) {
                Arc::make_mut(schema)
                    .attributes
                    .insert(name.clone(), attribute.attribute.clone());
            }
        }
    }

    pub(crate) fn remove_global_attribute(&mut self, name: &str) -> Result<(), SchemaError> {
        if let Some(schema) = self
            .entity_schemas
            .values()
            .find(|schema| schema.is_global_attribute(name))
        {
            return Err(SchemaError::invalid_mutation(format!(
                "global attribute `{name}` is still used by entity schema `{}`",
                schema.name
            )));
        }
        self.attributes.remove(name);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mutation::{EntitySchemaMutation, ModifyEntitySchemaMutation},
        node::StandardReferenceSchema,
        types::Cardinality,
    };
    use lumendb_primitives::{Scalar, ValueType};

    fn modify(entity_type: &str, mutations: Vec<EntitySchemaMutation>) -> CatalogSchemaMutation {
        CatalogSchemaMutation::ModifyEntitySchema(ModifyEntitySchemaMutation {
            entity_type: entity_type.to_string(),
            mutations,
        })
    }

    fn catalog_mutation(mutations: Vec<CatalogSchemaMutation>) -> ModifyCatalogSchemaMutation {
        ModifyCatalogSchemaMutation {
            catalog: "test".to_string(),
            mutations,
        }
    }

    fn standard(name: &str, target: &str) -> ReferenceSchema {
        ReferenceSchema::Standard(StandardReferenceSchema::new(
            name,
            target,
            true,
            Cardinality::ZeroOrMore,
        ))
    }

    #[test]
    fn creating_entity_schema_bumps_catalog_version() {
        let catalog = CatalogSchema::new("test");
        let next = catalog
            .apply(&catalog_mutation(vec![CatalogSchemaMutation::CreateEntitySchema(
                "PRODUCT".to_string(),
            )]))
            .expect("create product");

        assert_eq!(next.version, 2);
        assert_eq!(next.entity_schema("PRODUCT").map(|s| s.version), Some(1));
        assert_eq!(catalog.version, 1, "source catalog stays untouched");
    }

    #[test]
    fn modifying_missing_entity_schema_fails() {
        let catalog = CatalogSchema::new("test");
        let err = catalog
            .apply(&catalog_mutation(vec![modify(
                "PRODUCT",
                vec![EntitySchemaMutation::SetWithGeneratedPrimaryKey(true)],
            )]))
            .expect_err("product is missing");

        assert_eq!(
            err,
            SchemaError::EntitySchemaNotFound {
                name: "PRODUCT".to_string()
            }
        );
    }

    #[test]
    fn global_attribute_changes_reach_entity_schemas() {
        let mut global = GlobalAttributeSchema::new("code", ValueType::Scalar(Scalar::Text));
        let catalog = CatalogSchema::new("test")
            .apply(&catalog_mutation(vec![
                CatalogSchemaMutation::UpsertGlobalAttribute(global.clone()),
                CatalogSchemaMutation::CreateEntitySchema("PRODUCT".to_string()),
                modify(
                    "PRODUCT",
                    vec![EntitySchemaMutation::UseGlobalAttribute("code".to_string())],
                ),
            ]))
            .expect("initial catalog");

        global.unique_globally = true;
        global.filterable = true;
        let next = catalog
            .apply(&catalog_mutation(vec![
                CatalogSchemaMutation::UpsertGlobalAttribute(global),
            ]))
            .expect("update global");

        let product = next.entity_schema("PRODUCT").expect("product");
        assert!(product.attribute("code").expect("code").filterable);

        let err = next
            .apply(&catalog_mutation(vec![
                CatalogSchemaMutation::RemoveGlobalAttribute("code".to_string()),
            ]))
            .expect_err("code is in use");
        assert!(matches!(err, SchemaError::InvalidSchemaMutation { .. }));
    }

    #[test]
    fn reflected_reference_resolves_origin_defined_later() {
        let reflected = ReferenceSchema::Reflected(ReflectedReferenceSchema::new(
            "products",
            "PRODUCT",
            "categories",
        ));

        let catalog = CatalogSchema::new("test")
            .apply(&catalog_mutation(vec![
                CatalogSchemaMutation::CreateEntitySchema("CATEGORY".to_string()),
                modify("CATEGORY", vec![EntitySchemaMutation::UpsertReference(reflected)]),
                CatalogSchemaMutation::CreateEntitySchema("PRODUCT".to_string()),
                modify(
                    "PRODUCT",
                    vec![EntitySchemaMutation::UpsertReference(standard(
                        "categories",
                        "CATEGORY",
                    ))],
                ),
            ]))
            .expect("valid reflection");

        let products = catalog
            .entity_schema("CATEGORY")
            .and_then(|schema| schema.reference("products"))
            .and_then(ReferenceSchema::as_reflected)
            .expect("reflected reference");
        assert!(products.is_resolved());
    }

    #[test]
    fn reflection_of_missing_reference_is_reported_with_routes() {
        let reflected = ReferenceSchema::Reflected(ReflectedReferenceSchema::new(
            "products",
            "PRODUCT",
            "categories",
        ));

        let err = CatalogSchema::new("test")
            .apply(&catalog_mutation(vec![
                CatalogSchemaMutation::CreateEntitySchema("PRODUCT".to_string()),
                CatalogSchemaMutation::CreateEntitySchema("CATEGORY".to_string()),
                modify("CATEGORY", vec![EntitySchemaMutation::UpsertReference(reflected)]),
            ]))
            .expect_err("origin is missing");

        let SchemaError::InvalidSchemaMutation { message } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(message.contains("Schema `CATEGORY` contains validation errors:"));
        assert!(message.contains("Reference schema `products` contains validation errors:"));
        assert!(message.contains(
            "Referenced entity type `PRODUCT` doesn't contain reference `categories`, which is reflected in reference `products`!"
        ));
    }
}
