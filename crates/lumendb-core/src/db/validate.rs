use crate::{
    data::{AttributeKey, Entity, GroupReference, ReferenceKey},
    error::{Error, SessionError},
    mutation::{AttributeMutation, EntityMutation, LocalMutation},
};
use lumendb_primitives::{Value, ValueType};
use lumendb_schema::{
    build::{EntitySchemaBuilder, ReferenceSchemaBuilder},
    error::SchemaError,
    mutation::ModifyEntitySchemaMutation,
    node::{AttributeSchema, CatalogSchema, EntitySchema, ReferenceSchema},
    types::{Cardinality, EvolutionMode},
};
use std::{collections::BTreeSet, sync::Arc};

/// Entity-local or borrowed global attribute of a schema.
pub(crate) fn attribute_schema<'a>(
    catalog: &'a CatalogSchema,
    schema: &'a EntitySchema,
    name: &str,
) -> Option<&'a AttributeSchema> {
    schema.attribute(name).or_else(|| {
        schema
            .is_global_attribute(name)
            .then(|| catalog.attribute(name).map(|global| &global.attribute))
            .flatten()
    })
}

/// Every attribute of a schema, borrowed globals included.
pub(crate) fn attribute_schemas<'a>(
    catalog: &'a CatalogSchema,
    schema: &'a EntitySchema,
) -> impl Iterator<Item = &'a AttributeSchema> + 'a {
    schema.attributes.values().chain(
        schema
            .global_attributes
            .iter()
            .filter_map(|name| catalog.attribute(name).map(|global| &global.attribute)),
    )
}

///
/// Evolution
///
/// Grows an entity schema so it can hold the content of one entity
/// mutation. Each kind of growth needs its evolution mode.
///

pub(crate) struct Evolution<'a> {
    catalog: &'a Arc<CatalogSchema>,
    builder: EntitySchemaBuilder,
}

impl<'a> Evolution<'a> {
    pub(crate) fn new(catalog: &'a Arc<CatalogSchema>, schema: Arc<EntitySchema>) -> Self {
        Self {
            catalog,
            builder: EntitySchemaBuilder::new(Arc::clone(catalog), schema),
        }
    }

    /// Schema changes the mutation needs, `None` when it fits as is.
    pub(crate) fn evolve(
        mut self,
        mutation: &EntityMutation,
    ) -> Result<Option<ModifyEntitySchemaMutation>, Error> {
        if mutation.primary_key.is_none() && !self.current().with_generated_primary_key {
            self.permit(EvolutionMode::AdaptPrimaryKeyGeneration, || {
                "primary key generation".to_string()
            })?;
            self.builder.with_generated_primary_key()?;
        }

        for local in &mutation.local_mutations {
            match local {
                LocalMutation::UpsertAttribute(key, value) => self.attribute(key, value)?,
                LocalMutation::UpsertAssociatedData(key, value) => {
                    self.associated_data(key, value)?;
                }
                LocalMutation::SetParent(_) => {
                    if !self.current().is_with_hierarchy() {
                        self.permit(EvolutionMode::AddingHierarchy, || "hierarchy".to_string())?;
                        self.builder.with_hierarchy()?;
                    }
                }
                LocalMutation::UpsertPrice(price) => {
                    if !self.current().is_with_price() {
                        self.permit(EvolutionMode::AddingPrices, || "prices".to_string())?;
                        self.builder.with_price()?;
                    }
                    if !self.current().currencies.contains(&price.key.currency) {
                        self.permit(EvolutionMode::AddingCurrencies, || {
                            format!("currency `{}`", price.key.currency)
                        })?;
                        self.builder.with_currency(price.key.currency.clone())?;
                    }
                }
                LocalMutation::InsertReference {
                    key,
                    referenced_entity_type,
                    cardinality,
                } => self.reference(key, referenced_entity_type, *cardinality)?,
                LocalMutation::ReferenceAttribute {
                    key,
                    mutation: AttributeMutation::Upsert(attribute, value),
                } => self.reference_attribute(key, attribute, value)?,
                LocalMutation::SetReferenceGroup { key, group } => {
                    self.reference_group(key, group)?;
                }
                _ => {}
            }
        }

        Ok(self.builder.to_mutation())
    }

    fn current(&self) -> Arc<EntitySchema> {
        self.builder.to_instance()
    }

    fn entity_type(&self) -> String {
        self.builder.name().to_string()
    }

    fn permit(
        &self,
        mode: EvolutionMode,
        change: impl FnOnce() -> String,
    ) -> Result<(), SessionError> {
        if self.current().allows(mode) {
            Ok(())
        } else {
            Err(SessionError::EvolutionNotAllowed {
                entity_type: self.entity_type(),
                change: change(),
            })
        }
    }

    fn invalid(&self, message: String) -> SessionError {
        SessionError::invalid_mutation(self.entity_type(), message)
    }

    fn locale(&mut self, key: &AttributeKey) -> Result<(), Error> {
        if let Some(locale) = &key.locale
            && !self.current().supports_locale(locale)
        {
            self.permit(EvolutionMode::AddingLocales, || format!("locale `{locale}`"))?;
            self.builder.with_locale(locale.clone())?;
        }

        Ok(())
    }

    fn inferred_type(&self, member: &str, value: &Value) -> Result<ValueType, SessionError> {
        value.inferred_type().ok_or_else(|| {
            self.invalid(format!(
                "type of `{member}` cannot be inferred from `{value}`"
            ))
        })
    }

    fn attribute(&mut self, key: &AttributeKey, value: &Value) -> Result<(), Error> {
        self.locale(key)?;

        let current = self.current();
        if let Some(schema) = attribute_schema(self.catalog, &current, &key.name) {
            return check_attribute_value(schema, key, value)
                .map_err(|message| self.invalid(message).into());
        }

        self.permit(EvolutionMode::AddingAttributes, || {
            format!("attribute `{}`", key.name)
        })?;
        let value_type = self.inferred_type(&key.name, value)?;
        let localized = key.is_localized();
        self.builder.with_attribute(&key.name, value_type, |a| {
            a.nullable();
            if localized {
                a.localized();
            }
        })?;

        Ok(())
    }

    fn associated_data(&mut self, key: &AttributeKey, value: &Value) -> Result<(), Error> {
        self.locale(key)?;

        let current = self.current();
        if let Some(schema) = current.associated_data(&key.name) {
            if schema.localized != key.is_localized() || !value.conforms_to(schema.value_type) {
                return Err(self
                    .invalid(format!(
                        "value of associated data `{key}` does not conform to `{}`",
                        schema.value_type
                    ))
                    .into());
            }
            return Ok(());
        }

        self.permit(EvolutionMode::AddingAssociatedData, || {
            format!("associated data `{}`", key.name)
        })?;
        let value_type = self.inferred_type(&key.name, value)?;
        let localized = key.is_localized();
        self.builder.with_associated_data(&key.name, value_type, |d| {
            d.nullable();
            if localized {
                d.localized();
            }
        })?;

        Ok(())
    }

    fn reference(
        &mut self,
        key: &ReferenceKey,
        referenced_entity_type: &str,
        cardinality: Cardinality,
    ) -> Result<(), Error> {
        let current = self.current();
        if let Some(schema) = current.reference(&key.name) {
            if schema.referenced_entity_type() != referenced_entity_type {
                return Err(self
                    .invalid(format!(
                        "reference `{}` targets `{}`, not `{referenced_entity_type}`",
                        key.name,
                        schema.referenced_entity_type()
                    ))
                    .into());
            }
            return Ok(());
        }

        self.permit(EvolutionMode::AddingReferences, || {
            format!("reference `{}`", key.name)
        })?;
        if self.catalog.entity_schema(referenced_entity_type).is_some() {
            self.builder.with_reference_to_entity(
                &key.name,
                referenced_entity_type,
                cardinality,
                |_| Ok(()),
            )?;
        } else {
            self.builder
                .with_reference_to(&key.name, referenced_entity_type, cardinality, |_| Ok(()))?;
        }

        Ok(())
    }

    // redefine a standard reference keeping its target and cardinality
    fn reconfigure_reference(
        &mut self,
        name: &str,
        configure: impl FnOnce(&mut ReferenceSchemaBuilder) -> Result<(), SchemaError>,
    ) -> Result<(), Error> {
        let current = self.current();
        let Some(ReferenceSchema::Standard(schema)) = current.reference(name) else {
            return Err(self
                .invalid(format!("reference `{name}` cannot be extended on the fly"))
                .into());
        };

        if schema.referenced_entity_type_managed {
            self.builder.with_reference_to_entity(
                name,
                &schema.referenced_entity_type,
                schema.cardinality,
                configure,
            )?;
        } else {
            self.builder.with_reference_to(
                name,
                &schema.referenced_entity_type,
                schema.cardinality,
                configure,
            )?;
        }

        Ok(())
    }

    fn reference_attribute(
        &mut self,
        reference: &ReferenceKey,
        key: &AttributeKey,
        value: &Value,
    ) -> Result<(), Error> {
        self.locale(key)?;

        let current = self.current();
        let Some(schema) = current.reference(&reference.name) else {
            return Err(self
                .invalid(format!("reference `{}` is not defined", reference.name))
                .into());
        };

        if let Some(attribute) = schema.attribute(&key.name) {
            return check_attribute_value(attribute, key, value)
                .map_err(|message| self.invalid(message).into());
        }

        self.permit(EvolutionMode::AddingAttributes, || {
            format!("attribute `{}` of reference `{}`", key.name, reference.name)
        })?;
        let value_type = self.inferred_type(&key.name, value)?;
        let localized = key.is_localized();
        self.reconfigure_reference(&reference.name, |r| {
            r.with_attribute(&key.name, value_type, |a| {
                a.nullable();
                if localized {
                    a.localized();
                }
            })?;
            Ok(())
        })
    }

    fn reference_group(
        &mut self,
        reference: &ReferenceKey,
        group: &GroupReference,
    ) -> Result<(), Error> {
        let current = self.current();
        let group_type = current
            .reference(&reference.name)
            .and_then(ReferenceSchema::referenced_group_type)
            .map(ToString::to_string);

        match group_type {
            Some(group_type) if group_type == group.entity_type => Ok(()),
            Some(group_type) => Err(self
                .invalid(format!(
                    "groups of reference `{}` are `{group_type}`, not `{}`",
                    reference.name, group.entity_type
                ))
                .into()),
            None => {
                self.permit(EvolutionMode::AddingReferences, || {
                    format!("group of reference `{}`", reference.name)
                })?;
                let managed = self.catalog.entity_schema(&group.entity_type).is_some();
                self.reconfigure_reference(&reference.name, |r| {
                    if managed {
                        r.with_group_type_related_to_entity(group.entity_type.clone());
                    } else {
                        r.with_group_type(group.entity_type.clone());
                    }
                    Ok(())
                })
            }
        }
    }
}

fn check_attribute_value(
    schema: &AttributeSchema,
    key: &AttributeKey,
    value: &Value,
) -> Result<(), String> {
    if schema.localized != key.is_localized() {
        let expected = if schema.localized { "localized" } else { "not localized" };
        return Err(format!("attribute `{key}` is {expected}"));
    }
    if !value.conforms_to(schema.value_type) {
        return Err(format!(
            "value `{value}` of attribute `{key}` does not conform to `{}`",
            schema.value_type
        ));
    }

    Ok(())
}

///
/// ENTITY CHECKS
///

/// Fill declared default values the new entity does not carry.
pub(crate) fn fill_defaults(catalog: &CatalogSchema, schema: &EntitySchema, entity: &mut Entity) {
    for attribute in attribute_schemas(catalog, schema) {
        let Some(default) = &attribute.default_value else {
            continue;
        };

        let keys = if attribute.localized {
            entity
                .locales()
                .into_iter()
                .map(|locale| AttributeKey::localized(attribute.name.clone(), locale))
                .collect::<Vec<_>>()
        } else {
            vec![AttributeKey::new(attribute.name.clone())]
        };
        for key in keys {
            entity
                .attributes
                .entry(key)
                .or_insert_with(|| default.clone());
        }
    }
}

/// Mandatory attributes, localized ones in every locale of the entity and
/// reference attributes of every held reference.
pub(crate) fn check_mandatory(
    catalog: &CatalogSchema,
    schema: &EntitySchema,
    entity: &Entity,
) -> Result<(), SessionError> {
    let locales = entity.locales();
    let mut missing = Vec::new();

    let mut collect = |prefix: Option<&str>,
                       attribute: &AttributeSchema,
                       present: &dyn Fn(&AttributeKey) -> bool| {
        let label = |key: &AttributeKey| match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        };
        if attribute.localized {
            for locale in &locales {
                let key = AttributeKey::localized(attribute.name.clone(), locale.clone());
                if !present(&key) {
                    missing.push(label(&key));
                }
            }
        } else {
            let key = AttributeKey::new(attribute.name.clone());
            if !present(&key) {
                missing.push(label(&key));
            }
        }
    };

    for attribute in attribute_schemas(catalog, schema).filter(|a| a.is_mandatory()) {
        collect(None, attribute, &|key| entity.attributes.contains_key(key));
    }

    for reference in entity.references.values() {
        let Some(reference_schema) = schema.reference(reference.name()) else {
            continue;
        };
        for attribute in reference_schema
            .attributes()
            .into_values()
            .filter(|a| a.is_mandatory())
        {
            collect(Some(reference.name()), attribute, &|key| {
                reference.attributes.contains_key(key)
            });
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        missing.dedup();
        Err(SessionError::MandatoryAttributesNotProvided {
            entity_type: entity.entity_type.clone(),
            missing,
        })
    }
}

/// Reference counts against the declared cardinality.
pub(crate) fn check_cardinality(
    schema: &EntitySchema,
    entity: &Entity,
) -> Result<(), SessionError> {
    for (name, reference_schema) in schema.references.iter().filter(|(_, r)| !r.is_reflected()) {
        let cardinality = reference_schema.cardinality();

        let targets = entity
            .references_named(name)
            .map(|reference| reference.referenced_primary_key())
            .collect::<Vec<_>>();
        let distinct = targets.iter().collect::<BTreeSet<_>>().len();
        let duplicates = distinct < targets.len() && !cardinality.allows_duplicates();

        if duplicates || !cardinality.accepts(targets.len()) {
            return Err(SessionError::ReferenceCardinalityViolated {
                entity_type: entity.entity_type.clone(),
                reference: name.to_string(),
                cardinality,
                count: targets.len(),
                duplicates,
            });
        }
    }

    Ok(())
}
