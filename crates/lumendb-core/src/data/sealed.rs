use crate::{
    data::{
        AttributeKey, Entity, EntityReference, Price, PriceKey, Reference, ReferenceKey,
        price_for_sale,
    },
    error::ProxyError,
    fetch::{EntityFetch, PriceFetch, ReferenceFetch},
};
use lumendb_primitives::{Locale, Value};
use lumendb_schema::node::{EntitySchema, ReferenceSchema};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

///
/// SealedEntity
///
/// Read-only entity scoped to the fetch request that produced it. Every
/// accessor fails with `ContextMissing` for content outside that scope.
///

#[derive(Clone, Debug)]
pub struct SealedEntity {
    entity: Arc<Entity>,
    schema: Arc<EntitySchema>,
    fetch: Arc<EntityFetch>,
    parent: Option<Arc<Self>>,
    referenced_entities: BTreeMap<ReferenceKey, Arc<Self>>,
    group_entities: BTreeMap<ReferenceKey, Arc<Self>>,
}

impl SealedEntity {
    #[must_use]
    pub const fn new(
        entity: Arc<Entity>,
        schema: Arc<EntitySchema>,
        fetch: Arc<EntityFetch>,
    ) -> Self {
        Self {
            entity,
            schema,
            fetch,
            parent: None,
            referenced_entities: BTreeMap::new(),
            group_entities: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: Arc<Self>) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_referenced_entity(mut self, key: ReferenceKey, body: Arc<Self>) -> Self {
        self.referenced_entities.insert(key, body);
        self
    }

    #[must_use]
    pub fn with_group_entity(mut self, key: ReferenceKey, body: Arc<Self>) -> Self {
        self.group_entities.insert(key, body);
        self
    }

    ///
    /// RAW ACCESS
    ///

    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    #[must_use]
    pub fn entity_arc(&self) -> Arc<Entity> {
        Arc::clone(&self.entity)
    }

    #[must_use]
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    #[must_use]
    pub fn schema_arc(&self) -> Arc<EntitySchema> {
        Arc::clone(&self.schema)
    }

    #[must_use]
    pub fn fetch(&self) -> &EntityFetch {
        &self.fetch
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity.entity_type
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<i32> {
        self.entity.primary_key
    }

    #[must_use]
    pub fn reference_to(&self) -> Option<EntityReference> {
        self.entity.reference_to()
    }

    fn missing(&self, content: impl std::fmt::Display) -> ProxyError {
        ProxyError::context_missing(self.entity_type(), content)
    }

    ///
    /// ATTRIBUTES
    ///

    /// Attribute value, localized ones read in the implicit fetch locale.
    pub fn attribute(&self, name: &str) -> Result<Option<&Value>, ProxyError> {
        if !self.fetch.wants_attribute(name) {
            return Err(self.missing(format_args!("attribute `{name}`")));
        }

        let localized = self.schema.attribute(name).is_some_and(|a| a.localized);
        if !localized {
            return Ok(self.entity.attribute(name));
        }

        match self.fetch.implicit_locale() {
            Some(locale) => Ok(self.entity.localized_attribute(name, locale)),
            None => Err(self.missing(format_args!(
                "locale of localized attribute `{name}`"
            ))),
        }
    }

    pub fn localized_attribute(
        &self,
        name: &str,
        locale: &Locale,
    ) -> Result<Option<&Value>, ProxyError> {
        if !self.fetch.wants_attribute(name) || !self.fetch.wants_locale(locale) {
            return Err(self.missing(format_args!("attribute `{name}` in locale `{locale}`")));
        }

        Ok(self.entity.localized_attribute(name, locale))
    }

    /// Every fetched value of an attribute, by locale.
    pub fn attribute_values(
        &self,
        name: &str,
    ) -> Result<BTreeMap<Option<&Locale>, &Value>, ProxyError> {
        if !self.fetch.wants_attribute(name) {
            return Err(self.missing(format_args!("attribute `{name}`")));
        }

        Ok(self
            .entity
            .attributes
            .iter()
            .filter(|(key, _)| key.name == name)
            .filter(|(key, _)| key.locale.as_ref().is_none_or(|l| self.fetch.wants_locale(l)))
            .map(|(key, value)| (key.locale.as_ref(), value))
            .collect())
    }

    ///
    /// ASSOCIATED DATA
    ///

    pub fn associated_data(&self, name: &str) -> Result<Option<&Value>, ProxyError> {
        if !self.fetch.wants_associated_data(name) {
            return Err(self.missing(format_args!("associated data `{name}`")));
        }

        let localized = self
            .schema
            .associated_data(name)
            .is_some_and(|a| a.localized);
        if !localized {
            return Ok(self.entity.associated_data(name));
        }

        match self.fetch.implicit_locale() {
            Some(locale) => Ok(self
                .entity
                .associated_data
                .get(&AttributeKey::localized(name, locale.clone()))),
            None => Err(self.missing(format_args!(
                "locale of localized associated data `{name}`"
            ))),
        }
    }

    pub fn localized_associated_data(
        &self,
        name: &str,
        locale: &Locale,
    ) -> Result<Option<&Value>, ProxyError> {
        if !self.fetch.wants_associated_data(name) || !self.fetch.wants_locale(locale) {
            return Err(self.missing(format_args!(
                "associated data `{name}` in locale `{locale}`"
            )));
        }

        Ok(self
            .entity
            .associated_data
            .get(&AttributeKey::localized(name, locale.clone())))
    }

    /// Locales of the fetched localized content.
    #[must_use]
    pub fn locales(&self) -> BTreeSet<Locale> {
        self.entity
            .locales()
            .into_iter()
            .filter(|locale| self.fetch.wants_locale(locale))
            .collect()
    }

    ///
    /// HIERARCHY
    ///

    pub fn parent_id(&self) -> Result<Option<i32>, ProxyError> {
        if !self.fetch.wants_hierarchy() {
            return Err(self.missing("parent"));
        }

        Ok(self.entity.parent)
    }

    /// Parent body, available when the hierarchy fetch asked for it.
    pub fn parent(&self) -> Result<Option<&Arc<Self>>, ProxyError> {
        if self.fetch.parent_fetch().is_none() {
            return Err(self.missing("parent body"));
        }

        Ok(self.parent.as_ref())
    }

    ///
    /// REFERENCES
    ///

    #[must_use]
    pub fn reference_schema(&self, name: &str) -> Option<&ReferenceSchema> {
        self.schema.reference(name)
    }

    fn reference_fetch(&self, name: &str) -> Result<&ReferenceFetch, ProxyError> {
        self.fetch
            .reference_fetch(name)
            .ok_or_else(|| self.missing(format_args!("reference `{name}`")))
    }

    pub fn references(&self, name: &str) -> Result<Vec<&Reference>, ProxyError> {
        self.reference_fetch(name)?;

        Ok(self.entity.references_named(name).collect())
    }

    pub fn references_to(
        &self,
        name: &str,
        primary_key: i32,
    ) -> Result<Vec<&Reference>, ProxyError> {
        self.reference_fetch(name)?;

        Ok(self.entity.references_to(name, primary_key).collect())
    }

    /// Body of the referenced entity, when the reference fetch asked for it.
    pub fn referenced_entity(&self, key: &ReferenceKey) -> Result<Option<&Arc<Self>>, ProxyError> {
        let fetch = self.reference_fetch(&key.name)?;
        if fetch.entity.is_none() {
            return Err(self.missing(format_args!("body of entity referenced by `{}`", key.name)));
        }

        Ok(self.referenced_entities.get(key))
    }

    pub fn group_entity(&self, key: &ReferenceKey) -> Result<Option<&Arc<Self>>, ProxyError> {
        let fetch = self.reference_fetch(&key.name)?;
        if fetch.group_entity.is_none() {
            return Err(self.missing(format_args!("body of group of reference `{}`", key.name)));
        }

        Ok(self.group_entities.get(key))
    }

    #[must_use]
    pub fn reference_fetch_of(&self, name: &str) -> Option<&ReferenceFetch> {
        self.fetch.reference_fetch(name)
    }

    ///
    /// PRICES
    ///

    /// Fetched prices: all of them, or only those of the price context.
    pub fn prices(&self) -> Result<Vec<&Price>, ProxyError> {
        match self.fetch.prices {
            PriceFetch::None => Err(self.missing("prices")),
            PriceFetch::All => Ok(self.entity.prices.values().collect()),
            PriceFetch::RespectingContext => {
                let context = self
                    .fetch
                    .price_context
                    .as_ref()
                    .ok_or_else(|| self.missing("price context"))?;

                Ok(self
                    .entity
                    .prices
                    .values()
                    .filter(|price| {
                        price.key.currency == context.currency
                            && context.price_lists.iter().any(|l| l == price.price_list())
                    })
                    .collect())
            }
        }
    }

    pub fn price(&self, key: &PriceKey) -> Result<Option<&Price>, ProxyError> {
        Ok(self.prices()?.into_iter().find(|price| &price.key == key))
    }

    pub fn price_for_sale(&self) -> Result<Option<Price>, ProxyError> {
        let prices = self.prices()?;
        let context = self
            .fetch
            .price_context
            .as_ref()
            .ok_or_else(|| self.missing("price context"))?;

        Ok(price_for_sale(
            prices,
            self.entity.price_inner_record_handling,
            context,
        ))
    }
}
