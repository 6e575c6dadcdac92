use crate::data::PriceContext;
use lumendb_primitives::Locale;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

///
/// Selection
///
/// Which named members of one kind a fetch request covers.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Selection<T: Ord = String> {
    All,
    None,
    Only(BTreeSet<T>),
}

impl<T: Ord> Selection<T> {
    pub fn only<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<T>,
    {
        Self::Only(items.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Only(items) => items.contains(item),
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl<T: Ord> Default for Selection<T> {
    fn default() -> Self {
        Self::None
    }
}

///
/// PriceFetch
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PriceFetch {
    /// Every price of the entity.
    All,
    #[default]
    None,
    /// Only prices in the price lists and currency of the price context.
    RespectingContext,
}

///
/// ReferenceFetch
///
/// Fetch of one reference name, optionally loading the bodies of the
/// referenced and group entities.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReferenceFetch {
    pub attributes: Selection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Box<EntityFetch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_entity: Option<Box<EntityFetch>>,
}

impl ReferenceFetch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: Selection::All,
            entity: None,
            group_entity: None,
        }
    }

    #[must_use]
    pub fn with_entity(mut self, fetch: EntityFetch) -> Self {
        self.entity = Some(Box::new(fetch));
        self
    }

    #[must_use]
    pub fn with_group_entity(mut self, fetch: EntityFetch) -> Self {
        self.group_entity = Some(Box::new(fetch));
        self
    }

    #[must_use]
    pub fn without_attributes(mut self) -> Self {
        self.attributes = Selection::None;
        self
    }
}

impl Default for ReferenceFetch {
    fn default() -> Self {
        Self::new()
    }
}

///
/// HierarchyFetch
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct HierarchyFetch {
    /// Load the parent body with this content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<EntityFetch>>,
}

///
/// EntityFetch
///
/// What content of an entity a read returns. Proxies consult it to tell
/// "not fetched" apart from "not present".
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntityFetch {
    pub attributes: Selection,
    pub associated_data: Selection,
    pub locales: Selection<Locale>,
    pub prices: PriceFetch,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_context: Option<PriceContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<HierarchyFetch>,

    /// Fetch for every reference not listed in `references`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_references: Option<ReferenceFetch>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, ReferenceFetch>,
}

/// Everything an entity holds, with plain reference bodies.
#[must_use]
pub fn entity_fetch_all() -> EntityFetch {
    EntityFetch::new()
        .with_attributes()
        .with_associated_data()
        .with_all_locales()
        .with_all_prices()
        .with_hierarchy()
        .with_references()
}

impl EntityFetch {
    /// Primary key only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// BUILDING
    ///

    #[must_use]
    pub fn with_attributes(mut self) -> Self {
        self.attributes = Selection::All;
        self
    }

    #[must_use]
    pub fn with_attribute_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Selection::only(names);
        self
    }

    #[must_use]
    pub fn with_associated_data(mut self) -> Self {
        self.associated_data = Selection::All;
        self
    }

    #[must_use]
    pub fn with_associated_data_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associated_data = Selection::only(names);
        self
    }

    #[must_use]
    pub fn with_all_locales(mut self) -> Self {
        self.locales = Selection::All;
        self
    }

    #[must_use]
    pub fn with_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Locale>,
    {
        self.locales = Selection::only(locales);
        self
    }

    #[must_use]
    pub fn with_prices(mut self) -> Self {
        self.prices = PriceFetch::RespectingContext;
        self
    }

    #[must_use]
    pub fn with_all_prices(mut self) -> Self {
        self.prices = PriceFetch::All;
        self
    }

    #[must_use]
    pub fn with_price_context(mut self, context: PriceContext) -> Self {
        self.price_context = Some(context);
        self
    }

    #[must_use]
    pub fn with_hierarchy(mut self) -> Self {
        self.hierarchy.get_or_insert_with(HierarchyFetch::default);
        self
    }

    #[must_use]
    pub fn with_parent_body(mut self, fetch: Self) -> Self {
        self.hierarchy = Some(HierarchyFetch {
            parent: Some(Box::new(fetch)),
        });
        self
    }

    #[must_use]
    pub fn with_references(mut self) -> Self {
        self.all_references = Some(ReferenceFetch::new());
        self
    }

    #[must_use]
    pub fn with_all_references(mut self, fetch: ReferenceFetch) -> Self {
        self.all_references = Some(fetch);
        self
    }

    #[must_use]
    pub fn with_reference(mut self, name: impl Into<String>, fetch: ReferenceFetch) -> Self {
        self.references.insert(name.into(), fetch);
        self
    }

    ///
    /// QUERYING
    ///

    #[must_use]
    pub fn wants_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    #[must_use]
    pub fn wants_associated_data(&self, name: &str) -> bool {
        self.associated_data.contains(name)
    }

    #[must_use]
    pub fn wants_locale(&self, locale: &Locale) -> bool {
        self.locales.contains(locale)
    }

    /// The locale localized values are read in when none is given.
    #[must_use]
    pub fn implicit_locale(&self) -> Option<&Locale> {
        match &self.locales {
            Selection::Only(locales) if locales.len() == 1 => locales.iter().next(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn wants_prices(&self) -> bool {
        !matches!(self.prices, PriceFetch::None)
    }

    #[must_use]
    pub const fn wants_hierarchy(&self) -> bool {
        self.hierarchy.is_some()
    }

    #[must_use]
    pub fn parent_fetch(&self) -> Option<&Self> {
        self.hierarchy.as_ref()?.parent.as_deref()
    }

    #[must_use]
    pub fn reference_fetch(&self, name: &str) -> Option<&ReferenceFetch> {
        self.references
            .get(name)
            .or(self.all_references.as_ref())
    }

    #[must_use]
    pub fn wants_reference(&self, name: &str) -> bool {
        self.reference_fetch(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fetch_covers_nothing() {
        let fetch = EntityFetch::new();

        assert!(!fetch.wants_attribute("code"));
        assert!(!fetch.wants_associated_data("labels"));
        assert!(!fetch.wants_prices());
        assert!(!fetch.wants_hierarchy());
        assert!(!fetch.wants_reference("brand"));
    }

    #[test]
    fn named_selection_is_exact() {
        let fetch = EntityFetch::new()
            .with_attribute_names(["code"])
            .with_locales(["cs"])
            .with_reference("brand", ReferenceFetch::new().with_entity(EntityFetch::new()));

        assert!(fetch.wants_attribute("code"));
        assert!(!fetch.wants_attribute("name"));
        assert_eq!(fetch.implicit_locale(), Some(&Locale::new("cs")));
        assert!(fetch.reference_fetch("brand").is_some_and(|r| r.entity.is_some()));
        assert!(!fetch.wants_reference("categories"));
    }

    #[test]
    fn specific_reference_fetch_wins_over_all() {
        let fetch = entity_fetch_all().with_reference(
            "brand",
            ReferenceFetch::new().with_entity(entity_fetch_all()),
        );

        assert!(fetch.reference_fetch("brand").is_some_and(|r| r.entity.is_some()));
        assert!(fetch.reference_fetch("stock").is_some_and(|r| r.entity.is_none()));
        assert!(fetch.wants_locale(&Locale::new("en")));
        assert_eq!(fetch.implicit_locale(), None);
    }
}
