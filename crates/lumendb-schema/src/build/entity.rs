use crate::{
    build::{
        AssociatedDataSchemaBuilder, AttributeSchemaBuilder, ReferenceSchemaBuilder,
        ReflectedReferenceSchemaBuilder, SortableAttributeCompoundSchemaBuilder, member::Members,
    },
    error::SchemaError,
    mutation::{EntitySchemaMutation, ModifyEntitySchemaMutation},
    node::{
        AttributeSchema, CatalogSchema, EntitySchema, NamedSchema, PriceSchema, ReferenceSchema,
        ReflectedReferenceSchema, StandardReferenceSchema,
    },
    types::{AttributeElement, Cardinality, EvolutionMode, Scope},
    validate::naming::{find_any_conflict, find_conflict},
};
use lumendb_primitives::{Currency, Locale, ValueType};
use lumendb_utils::NameVariants;
use std::{collections::BTreeSet, sync::Arc};
use tracing::{Level, event};

///
/// EntitySchemaBuilder
///
/// Records schema mutations over a base `EntitySchema`. The in-progress
/// view is rebuilt from the base after every accepted call, so a rejected
/// call leaves both the view and the pending mutations as they were.
///

#[derive(Clone, Debug)]
pub struct EntitySchemaBuilder {
    catalog: Arc<CatalogSchema>,
    base: Arc<EntitySchema>,
    mutations: Vec<EntitySchemaMutation>,
    current: Arc<EntitySchema>,
}

impl EntitySchemaBuilder {
    #[must_use]
    pub fn new(catalog: Arc<CatalogSchema>, base: Arc<EntitySchema>) -> Self {
        Self {
            catalog,
            current: Arc::clone(&base),
            base,
            mutations: Vec::new(),
        }
    }

    /// Builder for a schema the catalog does not know yet.
    #[must_use]
    pub fn create(catalog: Arc<CatalogSchema>, entity_type: impl Into<String>) -> Self {
        Self::new(catalog, Arc::new(EntitySchema::new(entity_type)))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.base.name
    }

    /// The schema as it would look with every pending mutation applied.
    #[must_use]
    pub fn current(&self) -> &EntitySchema {
        &self.current
    }

    #[must_use]
    pub fn mutations(&self) -> &[EntitySchemaMutation] {
        &self.mutations
    }

    #[must_use]
    pub fn to_instance(&self) -> Arc<EntitySchema> {
        Arc::clone(&self.current)
    }

    /// Pending changes, `None` when the builder changed nothing.
    #[must_use]
    pub fn to_mutation(&self) -> Option<ModifyEntitySchemaMutation> {
        (!self.mutations.is_empty()).then(|| ModifyEntitySchemaMutation {
            entity_type: self.base.name.clone(),
            mutations: self.mutations.clone(),
        })
    }

    ///
    /// ENTITY SETTINGS
    ///

    pub fn with_description(
        &mut self,
        description: impl Into<String>,
    ) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetDescription(Some(description.into())))
    }

    pub fn without_description(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetDescription(None))
    }

    pub fn deprecated(&mut self, notice: impl Into<String>) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetDeprecationNotice(Some(notice.into())))
    }

    pub fn not_deprecated(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetDeprecationNotice(None))
    }

    pub fn with_generated_primary_key(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetWithGeneratedPrimaryKey(true))
    }

    pub fn without_generated_primary_key(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetWithGeneratedPrimaryKey(false))
    }

    pub fn with_hierarchy(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetHierarchy(Some(Scope::default_set())))
    }

    pub fn with_hierarchy_indexed_in(
        &mut self,
        scopes: &[Scope],
    ) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetHierarchy(Some(
            scopes.iter().copied().collect(),
        )))
    }

    pub fn without_hierarchy(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetHierarchy(None))
    }

    /// Enable prices, keeping an existing price configuration.
    pub fn with_price(&mut self) -> Result<&mut Self, SchemaError> {
        let price = self.current.price.clone().unwrap_or_default();
        self.push(EntitySchemaMutation::SetPrice(Some(price)))
    }

    pub fn with_price_indexed_in(&mut self, scopes: &[Scope]) -> Result<&mut Self, SchemaError> {
        let mut price = self.current.price.clone().unwrap_or_default();
        price.indexed_in = scopes.iter().copied().collect();
        self.push(EntitySchemaMutation::SetPrice(Some(price)))
    }

    pub fn with_price_decimal_places(&mut self, places: u32) -> Result<&mut Self, SchemaError> {
        let mut price: PriceSchema = self.current.price.clone().unwrap_or_default();
        price.indexed_decimal_places = places;
        self.push(EntitySchemaMutation::SetPrice(Some(price)))
    }

    pub fn without_price(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetPrice(None))
    }

    pub fn with_locale(&mut self, locale: impl Into<Locale>) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::AllowLocale(locale.into()))
    }

    pub fn without_locale(&mut self, locale: impl Into<Locale>) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::DisallowLocale(locale.into()))
    }

    pub fn with_currency(
        &mut self,
        currency: impl Into<Currency>,
    ) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::AllowCurrency(currency.into()))
    }

    pub fn without_currency(
        &mut self,
        currency: impl Into<Currency>,
    ) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::DisallowCurrency(currency.into()))
    }

    /// Writes must fit the schema exactly.
    pub fn verify_schema_strictly(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetEvolutionModes(BTreeSet::new()))
    }

    pub fn verify_schema_but_allow(
        &mut self,
        modes: &[EvolutionMode],
    ) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetEvolutionModes(
            modes.iter().copied().collect(),
        ))
    }

    pub fn verify_schema_but_create_on_the_fly(&mut self) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::SetEvolutionModes(EvolutionMode::all()))
    }

    ///
    /// ATTRIBUTES
    ///

    /// Opt into a catalog-level attribute.
    pub fn with_global_attribute(&mut self, name: &str) -> Result<&mut Self, SchemaError> {
        let current = Arc::clone(&self.current);
        if current.is_global_attribute(name) {
            return Ok(self);
        }

        let global = self.catalog.attribute(name).ok_or_else(|| {
            SchemaError::invalid_mutation(format!(
                "global attribute `{name}` is not defined in catalog `{}`",
                self.catalog.name
            ))
        })?;

        let members = Members::of(
            &current.name,
            &current.attributes,
            &current.sortable_attribute_compounds,
        );
        members.accept_attribute(global.attribute.clone())?;

        self.push(EntitySchemaMutation::UseGlobalAttribute(name.to_string()))
    }

    pub fn with_attribute(
        &mut self,
        name: &str,
        value_type: ValueType,
        configure: impl FnOnce(&mut AttributeSchemaBuilder),
    ) -> Result<&mut Self, SchemaError> {
        self.check_catalog_attribute(name)?;

        let current = Arc::clone(&self.current);
        let attribute = Members::of(
            &current.name,
            &current.attributes,
            &current.sortable_attribute_compounds,
        )
        .configure_attribute(name, value_type, configure)?;

        match attribute {
            Some(attribute) => self.push(EntitySchemaMutation::UpsertAttribute(attribute)),
            None => Ok(self),
        }
    }

    /// Define an attribute from a complete schema, replacing every trait
    /// of an existing definition.
    pub fn with_attribute_schema(
        &mut self,
        attribute: AttributeSchema,
    ) -> Result<&mut Self, SchemaError> {
        self.check_catalog_attribute(&attribute.name)?;

        let current = Arc::clone(&self.current);
        let attribute = Members::of(
            &current.name,
            &current.attributes,
            &current.sortable_attribute_compounds,
        )
        .accept_attribute(attribute)?;

        match attribute {
            Some(attribute) => self.push(EntitySchemaMutation::UpsertAttribute(attribute)),
            None => Ok(self),
        }
    }

    pub fn without_attribute(&mut self, name: &str) -> Result<&mut Self, SchemaError> {
        let current = Arc::clone(&self.current);
        Members::of(
            &current.name,
            &current.attributes,
            &current.sortable_attribute_compounds,
        )
        .check_removal(name)?;

        self.push(EntitySchemaMutation::RemoveAttribute(name.to_string()))
    }

    ///
    /// ASSOCIATED DATA
    ///

    pub fn with_associated_data(
        &mut self,
        name: &str,
        value_type: ValueType,
        configure: impl FnOnce(&mut AssociatedDataSchemaBuilder),
    ) -> Result<&mut Self, SchemaError> {
        let current = Arc::clone(&self.current);
        let existing = current.associated_data(name);

        if let Some(existing) = existing
            && existing.value_type != value_type
        {
            return Err(SchemaError::invalid_change(
                name,
                format!(
                    "type `{}` of the associated data in `{}` cannot be changed to `{value_type}`",
                    existing.value_type, current.name
                ),
            ));
        }

        let mut builder = existing.cloned().map_or_else(
            || AssociatedDataSchemaBuilder::new(name, value_type),
            AssociatedDataSchemaBuilder::from,
        );
        configure(&mut builder);
        let data = builder.into_schema();

        if let Some(conflict) =
            find_conflict(name, &data.name_variants, current.associated_data.values())
        {
            return Err(SchemaError::AssociatedDataAlreadyPresent {
                entity: current.name.clone(),
                name: name.to_string(),
                conflict: Some(conflict),
            });
        }

        if existing == Some(&data) {
            return Ok(self);
        }

        self.push(EntitySchemaMutation::UpsertAssociatedData(data))
    }

    pub fn without_associated_data(&mut self, name: &str) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::RemoveAssociatedData(name.to_string()))
    }

    ///
    /// REFERENCES
    ///

    /// Reference to a type living outside of the catalog.
    pub fn with_reference_to(
        &mut self,
        name: &str,
        entity_type: &str,
        cardinality: Cardinality,
        configure: impl FnOnce(&mut ReferenceSchemaBuilder) -> Result<(), SchemaError>,
    ) -> Result<&mut Self, SchemaError> {
        self.define_reference(name, entity_type, false, cardinality, configure)
    }

    /// Reference to an entity collection of the same catalog.
    pub fn with_reference_to_entity(
        &mut self,
        name: &str,
        entity_type: &str,
        cardinality: Cardinality,
        configure: impl FnOnce(&mut ReferenceSchemaBuilder) -> Result<(), SchemaError>,
    ) -> Result<&mut Self, SchemaError> {
        self.define_reference(name, entity_type, true, cardinality, configure)
    }

    /// Mirror reference `reflected_reference_name` that `entity_type`
    /// holds towards this entity type.
    pub fn with_reflected_reference_to_entity(
        &mut self,
        name: &str,
        entity_type: &str,
        reflected_reference_name: &str,
        configure: impl FnOnce(&mut ReflectedReferenceSchemaBuilder) -> Result<(), SchemaError>,
    ) -> Result<&mut Self, SchemaError> {
        let current = Arc::clone(&self.current);
        let schema = match current.reference(name) {
            Some(ReferenceSchema::Standard(_)) => {
                return Err(self.kind_change(name, "a standard", "a reflected"));
            }
            Some(ReferenceSchema::Reflected(existing)) => {
                let mut schema = existing.clone();
                entity_type.clone_into(&mut schema.referenced_entity_type);
                reflected_reference_name.clone_into(&mut schema.reflected_reference_name);
                schema
            }
            None => ReflectedReferenceSchema::new(name, entity_type, reflected_reference_name),
        };

        let mut builder = ReflectedReferenceSchemaBuilder::new(
            &current.name,
            self.catalog.resolve_reflected(&schema),
        );
        configure(&mut builder)?;

        self.redefine_reference(ReferenceSchema::Reflected(builder.into_schema()))
    }

    pub fn without_reference_to(&mut self, name: &str) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::RemoveReference(name.to_string()))
    }

    ///
    /// COMPOUNDS
    ///

    pub fn with_sortable_attribute_compound(
        &mut self,
        name: &str,
        elements: impl IntoIterator<Item = AttributeElement>,
        configure: impl FnOnce(&mut SortableAttributeCompoundSchemaBuilder),
    ) -> Result<&mut Self, SchemaError> {
        let current = Arc::clone(&self.current);
        let compound = Members::of(
            &current.name,
            &current.attributes,
            &current.sortable_attribute_compounds,
        )
        .configure_compound(name, elements.into_iter().collect(), configure)?;

        match compound {
            Some(compound) => {
                self.push(EntitySchemaMutation::UpsertSortableAttributeCompound(compound))
            }
            None => Ok(self),
        }
    }

    pub fn without_sortable_attribute_compound(
        &mut self,
        name: &str,
    ) -> Result<&mut Self, SchemaError> {
        self.push(EntitySchemaMutation::RemoveSortableAttributeCompound(
            name.to_string(),
        ))
    }

    ///
    /// INTERNALS
    ///

    fn check_catalog_attribute(&self, name: &str) -> Result<(), SchemaError> {
        let variants = NameVariants::generate(name);
        let globals = self.catalog.attributes.values().map(|global| &global.attribute);

        match find_any_conflict(&variants, globals) {
            Some(conflict) => Err(SchemaError::AttributeAlreadyPresentInCatalogSchema {
                catalog: self.catalog.name.clone(),
                name: conflict.existing,
            }),
            None => Ok(()),
        }
    }

    fn define_reference(
        &mut self,
        name: &str,
        entity_type: &str,
        managed: bool,
        cardinality: Cardinality,
        configure: impl FnOnce(&mut ReferenceSchemaBuilder) -> Result<(), SchemaError>,
    ) -> Result<&mut Self, SchemaError> {
        let current = Arc::clone(&self.current);
        let schema = match current.reference(name) {
            Some(ReferenceSchema::Reflected(_)) => {
                return Err(self.kind_change(name, "a reflected", "a standard"));
            }
            Some(ReferenceSchema::Standard(existing)) => existing.clone(),
            None => StandardReferenceSchema::new(name, entity_type, managed, cardinality),
        };

        let mut builder = ReferenceSchemaBuilder::new(&current.name, schema);
        builder.retarget(entity_type, managed, cardinality);
        configure(&mut builder)?;

        self.redefine_reference(ReferenceSchema::Standard(builder.into_schema()))
    }

    fn redefine_reference(&mut self, reference: ReferenceSchema) -> Result<&mut Self, SchemaError> {
        let current = Arc::clone(&self.current);
        let name = reference.name();

        if current.reference(name) == Some(&reference) {
            return Ok(self);
        }

        if let Some(conflict) =
            find_conflict(name, reference.name_variants(), current.references.values())
        {
            return Err(SchemaError::ReferenceAlreadyPresent {
                entity: current.name.clone(),
                name: name.to_string(),
                conflict: Some(conflict),
            });
        }

        self.push(EntitySchemaMutation::UpsertReference(reference))
    }

    fn kind_change(&self, name: &str, existing: &str, requested: &str) -> SchemaError {
        SchemaError::invalid_mutation(format!(
            "reference `{name}` of entity `{}` is already defined as {existing} reference and cannot be redefined as {requested} one, remove it with `without_reference_to` first",
            self.name()
        ))
    }

    // replace the pending mutation of the same target and rebuild the view
    fn push(&mut self, mutation: EntitySchemaMutation) -> Result<&mut Self, SchemaError> {
        let target = mutation.target();
        let mut mutations: Vec<_> = self
            .mutations
            .iter()
            .filter(|pending| pending.target() != target)
            .cloned()
            .collect();
        if !mutation.is_noop(&self.base) {
            mutations.push(mutation);
        }

        let modify = ModifyEntitySchemaMutation {
            entity_type: self.base.name.clone(),
            mutations,
        };
        let current = modify.apply(&self.catalog, &self.base)?;

        event!(
            Level::DEBUG,
            entity_type = %self.base.name,
            target = ?target,
            pending = modify.mutations.len(),
            "entity schema mutation recorded"
        );

        self.mutations = modify.mutations;
        self.current = Arc::new(current);

        Ok(self)
    }
}
