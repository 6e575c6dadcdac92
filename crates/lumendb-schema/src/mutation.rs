use crate::{
    error::SchemaError,
    node::{
        AssociatedDataSchema, AttributeSchema, CatalogSchema, EntitySchema, GlobalAttributeSchema,
        NamedSchema, PriceSchema, ReferenceSchema, SortableAttributeCompoundSchema,
    },
    types::{EvolutionMode, Scope},
};
use lumendb_primitives::{Currency, Locale};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};

///
/// MutationTarget
///
/// The part of a schema a mutation overwrites. A later mutation on the
/// same target supersedes an earlier pending one.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MutationTarget {
    AssociatedData(String),
    Attribute(String),
    Compound(String),
    Currency(Currency),
    Deprecation,
    Description,
    EvolutionModes,
    GeneratedPrimaryKey,
    Hierarchy,
    Locale(Locale),
    Price,
    Reference(String),
}

///
/// EntitySchemaMutation
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum EntitySchemaMutation {
    SetDescription(Option<String>),
    SetDeprecationNotice(Option<String>),
    SetWithGeneratedPrimaryKey(bool),
    SetHierarchy(Option<BTreeSet<Scope>>),
    SetPrice(Option<PriceSchema>),
    AllowLocale(Locale),
    DisallowLocale(Locale),
    AllowCurrency(Currency),
    DisallowCurrency(Currency),
    SetEvolutionModes(BTreeSet<EvolutionMode>),
    UseGlobalAttribute(String),
    UpsertAttribute(AttributeSchema),
    RemoveAttribute(String),
    UpsertAssociatedData(AssociatedDataSchema),
    RemoveAssociatedData(String),
    UpsertReference(ReferenceSchema),
    RemoveReference(String),
    UpsertSortableAttributeCompound(SortableAttributeCompoundSchema),
    RemoveSortableAttributeCompound(String),
}

impl EntitySchemaMutation {
    #[must_use]
    pub fn target(&self) -> MutationTarget {
        match self {
            Self::SetDescription(_) => MutationTarget::Description,
            Self::SetDeprecationNotice(_) => MutationTarget::Deprecation,
            Self::SetWithGeneratedPrimaryKey(_) => MutationTarget::GeneratedPrimaryKey,
            Self::SetHierarchy(_) => MutationTarget::Hierarchy,
            Self::SetPrice(_) => MutationTarget::Price,
            Self::AllowLocale(l) | Self::DisallowLocale(l) => MutationTarget::Locale(l.clone()),
            Self::AllowCurrency(c) | Self::DisallowCurrency(c) => {
                MutationTarget::Currency(c.clone())
            }
            Self::SetEvolutionModes(_) => MutationTarget::EvolutionModes,
            Self::UseGlobalAttribute(name) | Self::RemoveAttribute(name) => {
                MutationTarget::Attribute(name.clone())
            }
            Self::UpsertAttribute(a) => MutationTarget::Attribute(a.name.clone()),
            Self::UpsertAssociatedData(d) => MutationTarget::AssociatedData(d.name.clone()),
            Self::RemoveAssociatedData(name) => MutationTarget::AssociatedData(name.clone()),
            Self::UpsertReference(r) => MutationTarget::Reference(r.name().to_string()),
            Self::RemoveReference(name) => MutationTarget::Reference(name.clone()),
            Self::UpsertSortableAttributeCompound(c) => MutationTarget::Compound(c.name.clone()),
            Self::RemoveSortableAttributeCompound(name) => MutationTarget::Compound(name.clone()),
        }
    }

    /// Whether applying this mutation to `schema` would change nothing.
    #[must_use]
    pub fn is_noop(&self, schema: &EntitySchema) -> bool {
        match self {
            Self::SetDescription(d) => schema.description == *d,
            Self::SetDeprecationNotice(d) => schema.deprecation_notice == *d,
            Self::SetWithGeneratedPrimaryKey(v) => schema.with_generated_primary_key == *v,
            Self::SetHierarchy(h) => schema.hierarchy == *h,
            Self::SetPrice(p) => schema.price == *p,
            Self::AllowLocale(l) => schema.locales.contains(l),
            Self::DisallowLocale(l) => !schema.locales.contains(l),
            Self::AllowCurrency(c) => schema.currencies.contains(c),
            Self::DisallowCurrency(c) => !schema.currencies.contains(c),
            Self::SetEvolutionModes(modes) => schema.evolution_modes == *modes,
            Self::UseGlobalAttribute(name) => schema.is_global_attribute(name),
            Self::UpsertAttribute(a) => {
                !schema.is_global_attribute(&a.name) && schema.attribute(&a.name) == Some(a)
            }
            Self::RemoveAttribute(name) => schema.attribute(name).is_none(),
            Self::UpsertAssociatedData(d) => schema.associated_data(&d.name) == Some(d),
            Self::RemoveAssociatedData(name) => schema.associated_data(name).is_none(),
            Self::UpsertReference(r) => schema.reference(r.name()) == Some(r),
            Self::RemoveReference(name) => schema.reference(name).is_none(),
            Self::UpsertSortableAttributeCompound(c) => {
                schema.sortable_attribute_compound(&c.name) == Some(c)
            }
            Self::RemoveSortableAttributeCompound(name) => {
                schema.sortable_attribute_compound(name).is_none()
            }
        }
    }

    /// Apply in place. Cross-member rules are checked by the builders,
    /// this only fails when the catalog cannot satisfy the mutation.
    pub fn mutate(
        &self,
        catalog: &CatalogSchema,
        schema: &mut EntitySchema,
    ) -> Result<(), SchemaError> {
        match self {
            Self::SetDescription(d) => schema.description.clone_from(d),
            Self::SetDeprecationNotice(d) => schema.deprecation_notice.clone_from(d),
            Self::SetWithGeneratedPrimaryKey(v) => schema.with_generated_primary_key = *v,
            Self::SetHierarchy(h) => schema.hierarchy.clone_from(h),
            Self::SetPrice(p) => schema.price.clone_from(p),
            Self::AllowLocale(l) => {
                schema.locales.insert(l.clone());
            }
            Self::DisallowLocale(l) => {
                schema.locales.remove(l);
            }
            Self::AllowCurrency(c) => {
                schema.currencies.insert(c.clone());
            }
            Self::DisallowCurrency(c) => {
                schema.currencies.remove(c);
            }
            Self::SetEvolutionModes(modes) => schema.evolution_modes.clone_from(modes),
            Self::UseGlobalAttribute(name) => {
                let global = catalog.attribute(name).ok_or_else(|| {
                    SchemaError::invalid_mutation(format!(
                        "global attribute `{name}` is not defined in catalog `{}`",
                        catalog.name
                    ))
                })?;
                schema
                    .attributes
                    .insert(name.clone(), global.attribute.clone());
                schema.global_attributes.insert(name.clone());
            }
            Self::UpsertAttribute(a) => {
                schema.global_attributes.remove(&a.name);
                schema.attributes.insert(a.name.clone(), a.clone());
            }
            Self::RemoveAttribute(name) => {
                schema.global_attributes.remove(name);
                schema.attributes.remove(name);
            }
            Self::UpsertAssociatedData(d) => {
                schema.associated_data.insert(d.name.clone(), d.clone());
            }
            Self::RemoveAssociatedData(name) => {
                schema.associated_data.remove(name);
            }
            Self::UpsertReference(r) => {
                let reference = catalog.resolve_reference(r);
                schema
                    .references
                    .insert(reference.name().to_string(), reference);
            }
            Self::RemoveReference(name) => {
                schema.references.remove(name);
            }
            Self::UpsertSortableAttributeCompound(c) => {
                schema
                    .sortable_attribute_compounds
                    .insert(c.name.clone(), c.clone());
            }
            Self::RemoveSortableAttributeCompound(name) => {
                schema.sortable_attribute_compounds.remove(name);
            }
        }

        Ok(())
    }
}

///
/// ModifyEntitySchemaMutation
///
/// All pending changes of one entity schema, applied as one new version.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ModifyEntitySchemaMutation {
    pub entity_type: String,
    pub mutations: Vec<EntitySchemaMutation>,
}

impl ModifyEntitySchemaMutation {
    pub fn apply(
        &self,
        catalog: &CatalogSchema,
        schema: &EntitySchema,
    ) -> Result<EntitySchema, SchemaError> {
        let mut next = schema.clone();
        for mutation in &self.mutations {
            mutation.mutate(catalog, &mut next)?;
        }
        if !self.mutations.is_empty() {
            next.version = schema.version + 1;
        }

        Ok(next)
    }
}

///
/// CatalogSchemaMutation
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum CatalogSchemaMutation {
    SetDescription(Option<String>),
    UpsertGlobalAttribute(GlobalAttributeSchema),
    RemoveGlobalAttribute(String),
    CreateEntitySchema(String),
    ModifyEntitySchema(ModifyEntitySchemaMutation),
    RemoveEntitySchema(String),
}

impl CatalogSchemaMutation {
    /// Entity schema this mutation touches, if any.
    #[must_use]
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Self::CreateEntitySchema(name) | Self::RemoveEntitySchema(name) => Some(name),
            Self::ModifyEntitySchema(m) => Some(&m.entity_type),
            _ => None,
        }
    }

    pub(crate) fn mutate(&self, catalog: &mut CatalogSchema) -> Result<(), SchemaError> {
        match self {
            Self::SetDescription(d) => catalog.description.clone_from(d),
            Self::UpsertGlobalAttribute(attribute) => catalog.upsert_global_attribute(attribute),
            Self::RemoveGlobalAttribute(name) => catalog.remove_global_attribute(name)?,
            Self::CreateEntitySchema(name) => {
                if catalog.entity_schema(name).is_some() {
                    return Err(SchemaError::invalid_mutation(format!(
                        "entity schema `{name}` already exists in catalog `{}`",
                        catalog.name
                    )));
                }
                catalog
                    .entity_schemas
                    .insert(name.clone(), Arc::new(EntitySchema::new(name.clone())));
            }
            Self::ModifyEntitySchema(m) => {
                let current = catalog.entity_schema(&m.entity_type).ok_or_else(|| {
                    SchemaError::EntitySchemaNotFound {
                        name: m.entity_type.clone(),
                    }
                })?;
                let next = m.apply(catalog, &current)?;
                catalog
                    .entity_schemas
                    .insert(m.entity_type.clone(), Arc::new(next));
            }
            Self::RemoveEntitySchema(name) => {
                catalog.entity_schemas.remove(name);
            }
        }

        Ok(())
    }
}

///
/// ModifyCatalogSchemaMutation
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ModifyCatalogSchemaMutation {
    pub catalog: String,
    pub mutations: Vec<CatalogSchemaMutation>,
}

impl ModifyCatalogSchemaMutation {
    #[must_use]
    pub fn touched_entity_types(&self) -> BTreeSet<&str> {
        self.mutations
            .iter()
            .filter_map(CatalogSchemaMutation::entity_type)
            .collect()
    }
}

impl From<ModifyEntitySchemaMutation> for ModifyCatalogSchemaMutation {
    fn from(mutation: ModifyEntitySchemaMutation) -> Self {
        Self {
            catalog: String::new(),
            mutations: vec![CatalogSchemaMutation::ModifyEntitySchema(mutation)],
        }
    }
}
