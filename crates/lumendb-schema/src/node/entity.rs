use crate::{
    DEFAULT_PRICE_DECIMAL_PLACES,
    node::{
        AssociatedDataSchema, AttributeSchema, NamedSchema, ReferenceSchema,
        SortableAttributeCompoundSchema,
    },
    types::{EvolutionMode, Scope},
};
use lumendb_primitives::{Currency, Locale};
use lumendb_utils::{NameVariants, NamingConvention};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

///
/// PriceSchema
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PriceSchema {
    pub indexed_decimal_places: u32,
    pub indexed_in: BTreeSet<Scope>,
}

impl Default for PriceSchema {
    fn default() -> Self {
        Self {
            indexed_decimal_places: DEFAULT_PRICE_DECIMAL_PLACES,
            indexed_in: Scope::default_set(),
        }
    }
}

///
/// EntitySchema
///
/// Immutable description of one entity collection. Builders never modify
/// an instance, they produce the next version.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EntitySchema {
    pub name: String,
    pub name_variants: NameVariants,
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_notice: Option<String>,

    pub with_generated_primary_key: bool,

    /// `Some` when entities form a tree, holding the indexed scopes.
    pub hierarchy: Option<BTreeSet<Scope>>,
    pub price: Option<PriceSchema>,

    pub locales: BTreeSet<Locale>,
    pub currencies: BTreeSet<Currency>,
    pub evolution_modes: BTreeSet<EvolutionMode>,

    pub attributes: BTreeMap<String, AttributeSchema>,

    /// Attribute names borrowed from the catalog.
    pub global_attributes: BTreeSet<String>,

    pub associated_data: BTreeMap<String, AssociatedDataSchema>,
    pub references: BTreeMap<String, ReferenceSchema>,
    pub sortable_attribute_compounds: BTreeMap<String, SortableAttributeCompoundSchema>,
}

impl EntitySchema {
    /// Fresh schema, open to every kind of evolution.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            name_variants: NameVariants::generate(&name),
            name,
            version: 1,
            description: None,
            deprecation_notice: None,
            with_generated_primary_key: false,
            hierarchy: None,
            price: None,
            locales: BTreeSet::new(),
            currencies: BTreeSet::new(),
            evolution_modes: EvolutionMode::all(),
            attributes: BTreeMap::new(),
            global_attributes: BTreeSet::new(),
            associated_data: BTreeMap::new(),
            references: BTreeMap::new(),
            sortable_attribute_compounds: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn is_with_hierarchy(&self) -> bool {
        self.hierarchy.is_some()
    }

    #[must_use]
    pub const fn is_with_price(&self) -> bool {
        self.price.is_some()
    }

    #[must_use]
    pub fn allows(&self, mode: EvolutionMode) -> bool {
        self.evolution_modes.contains(&mode)
    }

    #[must_use]
    pub fn supports_locale(&self, locale: &Locale) -> bool {
        self.locales.contains(locale)
    }

    #[must_use]
    pub fn is_global_attribute(&self, name: &str) -> bool {
        self.global_attributes.contains(name)
    }

    ///
    /// LOOKUPS
    ///

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn attribute_by_name(
        &self,
        name: &str,
        convention: NamingConvention,
    ) -> Option<&AttributeSchema> {
        by_name(self.attributes.values(), name, convention)
    }

    #[must_use]
    pub fn associated_data(&self, name: &str) -> Option<&AssociatedDataSchema> {
        self.associated_data.get(name)
    }

    #[must_use]
    pub fn associated_data_by_name(
        &self,
        name: &str,
        convention: NamingConvention,
    ) -> Option<&AssociatedDataSchema> {
        by_name(self.associated_data.values(), name, convention)
    }

    #[must_use]
    pub fn reference(&self, name: &str) -> Option<&ReferenceSchema> {
        self.references.get(name)
    }

    #[must_use]
    pub fn reference_by_name(
        &self,
        name: &str,
        convention: NamingConvention,
    ) -> Option<&ReferenceSchema> {
        by_name(self.references.values(), name, convention)
    }

    #[must_use]
    pub fn sortable_attribute_compound(
        &self,
        name: &str,
    ) -> Option<&SortableAttributeCompoundSchema> {
        self.sortable_attribute_compounds.get(name)
    }

    #[must_use]
    pub fn sortable_attribute_compound_by_name(
        &self,
        name: &str,
        convention: NamingConvention,
    ) -> Option<&SortableAttributeCompoundSchema> {
        by_name(self.sortable_attribute_compounds.values(), name, convention)
    }

    /// Attributes every new entity has to carry.
    pub fn mandatory_attributes(&self) -> impl Iterator<Item = &AttributeSchema> {
        self.attributes.values().filter(|a| a.is_mandatory())
    }

    /// References that point at `entity_type`, reflected ones included.
    pub fn references_to<'a>(
        &'a self,
        entity_type: &'a str,
    ) -> impl Iterator<Item = &'a ReferenceSchema> + 'a {
        self.references
            .values()
            .filter(move |reference| reference.referenced_entity_type() == entity_type)
    }
}

fn by_name<'a, T: NamedSchema + 'a>(
    mut items: impl Iterator<Item = &'a T>,
    name: &str,
    convention: NamingConvention,
) -> Option<&'a T> {
    items.find(|item| item.name_variants().get(convention) == Some(name))
}
