use crate::{
    build::{EntitySchemaBuilder, GlobalAttributeSchemaBuilder},
    error::SchemaError,
    mutation::{CatalogSchemaMutation, ModifyCatalogSchemaMutation},
    node::CatalogSchema,
    validate::{attribute::check_attribute, naming::find_conflict},
};
use lumendb_primitives::ValueType;
use std::sync::Arc;
use tracing::{Level, event};

///
/// CatalogSchemaBuilder
///
/// Global attributes and entity schemas in one round. Cross-schema rules
/// (reflected references) are validated by `to_instance` once the whole
/// round is known, so definition order does not matter.
///

#[derive(Clone, Debug)]
pub struct CatalogSchemaBuilder {
    base: Arc<CatalogSchema>,
    mutations: Vec<CatalogSchemaMutation>,
    current: Arc<CatalogSchema>,
}

impl CatalogSchemaBuilder {
    #[must_use]
    pub fn new(base: Arc<CatalogSchema>) -> Self {
        Self {
            current: Arc::clone(&base),
            base,
            mutations: Vec::new(),
        }
    }

    #[must_use]
    pub fn current(&self) -> &CatalogSchema {
        &self.current
    }

    pub fn with_description(
        &mut self,
        description: impl Into<String>,
    ) -> Result<&mut Self, SchemaError> {
        let description = Some(description.into());
        if self.current.description == description {
            return Ok(self);
        }

        self.push(CatalogSchemaMutation::SetDescription(description))
    }

    pub fn with_attribute(
        &mut self,
        name: &str,
        value_type: ValueType,
        configure: impl FnOnce(&mut GlobalAttributeSchemaBuilder),
    ) -> Result<&mut Self, SchemaError> {
        let current = Arc::clone(&self.current);
        let existing = current.attribute(name);

        if let Some(existing) = existing
            && existing.value_type != value_type
        {
            return Err(SchemaError::invalid_change(
                name,
                format!(
                    "type `{}` of the global attribute cannot be changed to `{value_type}`",
                    existing.value_type
                ),
            ));
        }

        let mut builder = existing.cloned().map_or_else(
            || GlobalAttributeSchemaBuilder::new(name, value_type),
            GlobalAttributeSchemaBuilder::from,
        );
        configure(&mut builder);
        let attribute = builder.into_schema();

        check_attribute(&attribute)?;
        let others = current.attributes.values().map(|global| &global.attribute);
        if find_conflict(name, &attribute.name_variants, others).is_some() {
            return Err(SchemaError::AttributeAlreadyPresentInCatalogSchema {
                catalog: current.name.clone(),
                name: name.to_string(),
            });
        }

        if existing == Some(&attribute) {
            return Ok(self);
        }

        self.push(CatalogSchemaMutation::UpsertGlobalAttribute(attribute))
    }

    pub fn without_attribute(&mut self, name: &str) -> Result<&mut Self, SchemaError> {
        if self.current.attribute(name).is_none() {
            return Ok(self);
        }

        self.push(CatalogSchemaMutation::RemoveGlobalAttribute(name.to_string()))
    }

    /// Create or modify an entity schema through a nested builder.
    pub fn with_entity_schema(
        &mut self,
        entity_type: &str,
        configure: impl FnOnce(&mut EntitySchemaBuilder) -> Result<(), SchemaError>,
    ) -> Result<&mut Self, SchemaError> {
        let mut pending = Vec::new();
        let catalog = match self.current.entity_schema_arc(entity_type) {
            Some(_) => Arc::clone(&self.current),
            None => {
                let create = CatalogSchemaMutation::CreateEntitySchema(entity_type.to_string());
                let catalog = self.current.mutate(std::slice::from_ref(&create))?;
                pending.push(create);
                Arc::new(catalog)
            }
        };

        let base = catalog
            .entity_schema_arc(entity_type)
            .ok_or_else(|| SchemaError::EntitySchemaNotFound {
                name: entity_type.to_string(),
            })?;
        let mut builder = EntitySchemaBuilder::new(catalog, base);
        configure(&mut builder)?;

        if let Some(modify) = builder.to_mutation() {
            pending.push(CatalogSchemaMutation::ModifyEntitySchema(modify));
        }

        for mutation in pending {
            self.push(mutation)?;
        }

        Ok(self)
    }

    pub fn without_entity_schema(&mut self, entity_type: &str) -> Result<&mut Self, SchemaError> {
        if self.current.entity_schema(entity_type).is_none() {
            return Ok(self);
        }

        self.push(CatalogSchemaMutation::RemoveEntitySchema(
            entity_type.to_string(),
        ))
    }

    #[must_use]
    pub fn to_mutation(&self) -> Option<ModifyCatalogSchemaMutation> {
        (!self.mutations.is_empty()).then(|| ModifyCatalogSchemaMutation {
            catalog: self.base.name.clone(),
            mutations: self.mutations.clone(),
        })
    }

    /// Validated catalog with every pending mutation applied.
    pub fn to_instance(&self) -> Result<Arc<CatalogSchema>, SchemaError> {
        match self.to_mutation() {
            Some(mutation) => self.base.apply(&mutation).map(Arc::new),
            None => Ok(Arc::clone(&self.base)),
        }
    }

    fn push(&mut self, mutation: CatalogSchemaMutation) -> Result<&mut Self, SchemaError> {
        let current = self.current.mutate(std::slice::from_ref(&mutation))?;

        event!(
            Level::DEBUG,
            catalog = %self.base.name,
            entity_type = mutation.entity_type().unwrap_or_default(),
            "catalog schema mutation recorded"
        );

        self.mutations.push(mutation);
        self.current = Arc::new(current);

        Ok(self)
    }
}
