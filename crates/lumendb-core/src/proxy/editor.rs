use crate::{
    data::{
        AttributeKey, Entity, EntityReference, Price, PriceInnerRecordHandling, PriceKey,
        Reference, ReferenceKey, SealedEntity, attribute_equals,
    },
    db::EntitySession,
    error::{Error, ProxyError, SessionError},
    fetch::{EntityFetch, entity_fetch_all},
    model::EntityClass,
    mutation::{EntityBuilder, EntityMutation},
    proxy::{
        EntityProxy, ModelBinding, ProxyFactory, ReferenceEditor, UpsertResult,
        binding::ReferenceBinding, convert, reference_editor::IsolatedEditors,
        session::register_model,
    },
};
use lumendb_primitives::{Currency, Decimal, FieldValue, Locale, Value};
use lumendb_schema::node::EntitySchema;
use serde::Serialize;
use std::{fmt, marker::PhantomData, sync::Arc};
use tracing::{Level, event};

/// Price list written by `set_basic_price`.
pub const BASIC_PRICE_LIST: &str = "basic";

///
/// NestedEditor
///
/// Editor of an entity created alongside another one, stored by the deep
/// upsert before the entity that refers to it.
///

trait NestedEditor {
    fn upsert_deeply(
        &mut self,
        session: &mut dyn EntitySession,
        stored: &mut Vec<EntityReference>,
    ) -> Result<(), Error>;
}

///
/// EntityEditor
///
/// Writable counterpart of `EntityProxy`. Every setter records local
/// mutations into a copy-on-write builder; nothing reaches the store until
/// `upsert_via` or `upsert_deeply_via`.
///

pub struct EntityEditor<M> {
    builder: EntityBuilder,
    binding: Arc<ModelBinding>,
    factory: Arc<ProxyFactory>,
    nested: Vec<Box<dyn NestedEditor>>,
    isolated: IsolatedEditors,
    _model: PhantomData<fn() -> M>,
}

impl<M: EntityClass> EntityEditor<M> {
    /// Editor of a new entity. Without a schema the class declaration alone
    /// resolves members.
    #[must_use]
    pub fn new(
        primary_key: Option<i32>,
        schema: Option<Arc<EntitySchema>>,
        factory: Arc<ProxyFactory>,
    ) -> Self {
        let binding = match schema {
            Some(schema) => factory.binding::<M>(schema),
            None => Arc::new(ModelBinding::declared(M::DESCRIPTOR)),
        };

        Self::with_builder(
            EntityBuilder::new(M::entity_type(), primary_key),
            binding,
            factory,
            IsolatedEditors::default(),
        )
    }

    pub(crate) fn from_sealed(
        sealed: &SealedEntity,
        binding: Arc<ModelBinding>,
        factory: Arc<ProxyFactory>,
        isolated: IsolatedEditors,
    ) -> Self {
        Self::with_builder(
            EntityBuilder::from_entity(sealed.entity_arc()),
            binding,
            factory,
            isolated,
        )
    }

    fn with_builder(
        builder: EntityBuilder,
        binding: Arc<ModelBinding>,
        factory: Arc<ProxyFactory>,
        isolated: IsolatedEditors,
    ) -> Self {
        Self {
            builder,
            binding,
            factory,
            nested: Vec::new(),
            isolated,
            _model: PhantomData,
        }
    }

    #[must_use]
    pub const fn primary_key(&self) -> Option<i32> {
        self.builder.primary_key()
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.builder.entity_type()
    }

    /// The entity with every pending change applied.
    #[must_use]
    pub fn view(&self) -> &Entity {
        self.builder.view()
    }

    pub fn attribute<T: FieldValue>(&self, member: &str) -> Result<Option<T>, Error> {
        let name = self.binding.attribute(member)?;

        self.view()
            .attribute(&name)
            .map(|value| convert(self.entity_type(), member, value))
            .transpose()
    }

    pub fn localized_attribute<T: FieldValue>(
        &self,
        member: &str,
        locale: &Locale,
    ) -> Result<Option<T>, Error> {
        let name = self.binding.attribute(member)?;

        self.view()
            .localized_attribute(&name, locale)
            .map(|value| convert(self.entity_type(), member, value))
            .transpose()
    }

    pub fn references(&self, member: &str) -> Result<Vec<&Reference>, Error> {
        let reference = self.binding.reference(member)?;

        Ok(self.view().references_named(&reference.name).collect())
    }

    ///
    /// ATTRIBUTES
    ///

    pub fn set_attribute(
        &mut self,
        member: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, Error> {
        let name = self.binding.attribute(member)?;
        if self.binding.attribute_localized(&name) {
            return Err(ProxyError::invalid_usage(format!(
                "attribute `{name}` is localized, set it with a locale"
            ))
            .into());
        }

        self.builder.set_attribute(&name, value);
        Ok(self)
    }

    pub fn set_localized_attribute(
        &mut self,
        member: &str,
        locale: impl Into<Locale>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, Error> {
        let name = self.binding.attribute(member)?;

        self.builder.set_localized_attribute(&name, locale, value);
        Ok(self)
    }

    pub fn remove_attribute(&mut self, member: &str) -> Result<&mut Self, Error> {
        let name = self.binding.attribute(member)?;

        self.builder.remove_attribute(AttributeKey::new(name));
        Ok(self)
    }

    pub fn remove_localized_attribute(
        &mut self,
        member: &str,
        locale: impl Into<Locale>,
    ) -> Result<&mut Self, Error> {
        let name = self.binding.attribute(member)?;

        self.builder
            .remove_attribute(AttributeKey::localized(name, locale));
        Ok(self)
    }

    ///
    /// ASSOCIATED DATA
    ///

    fn associated_value<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<Value, Error> {
        let invalid = |err: &dyn fmt::Display| {
            ProxyError::invalid_usage(format!("associated data `{name}` cannot be stored: {err}"))
        };
        let json = serde_json::to_value(value).map_err(|err| invalid(&err))?;

        Value::from_json(json, self.binding.associated_data_type(name))
            .map_err(|err| invalid(&err).into())
    }

    pub fn set_associated_data<T: Serialize + ?Sized>(
        &mut self,
        member: &str,
        value: &T,
    ) -> Result<&mut Self, Error> {
        let name = self.binding.associated_data(member)?;
        if self.binding.associated_data_localized(&name) {
            return Err(ProxyError::invalid_usage(format!(
                "associated data `{name}` is localized, set it with a locale"
            ))
            .into());
        }

        let value = self.associated_value(&name, value)?;
        self.builder
            .set_associated_data(AttributeKey::new(name), value);
        Ok(self)
    }

    pub fn set_localized_associated_data<T: Serialize + ?Sized>(
        &mut self,
        member: &str,
        locale: impl Into<Locale>,
        value: &T,
    ) -> Result<&mut Self, Error> {
        let name = self.binding.associated_data(member)?;
        let value = self.associated_value(&name, value)?;

        self.builder
            .set_associated_data(AttributeKey::localized(name, locale), value);
        Ok(self)
    }

    pub fn remove_associated_data(&mut self, member: &str) -> Result<&mut Self, Error> {
        let name = self.binding.associated_data(member)?;

        self.builder
            .remove_associated_data(AttributeKey::new(name));
        Ok(self)
    }

    ///
    /// HIERARCHY
    ///

    pub fn set_parent(&mut self, primary_key: i32) -> &mut Self {
        self.builder.set_parent(primary_key);
        self
    }

    pub fn set_parent_entity(&mut self, parent: &EntityReference) -> Result<&mut Self, Error> {
        if parent.entity_type != self.entity_type() {
            return Err(ProxyError::invalid_usage(format!(
                "entity `{}` cannot be the parent of `{}`",
                parent.entity_type,
                self.entity_type()
            ))
            .into());
        }

        Ok(self.set_parent(parent.primary_key))
    }

    /// Create the parent together with this entity. The deep upsert stores
    /// it first.
    pub fn with_parent(
        &mut self,
        primary_key: i32,
        configure: impl FnOnce(&mut Self) -> Result<(), Error>,
    ) -> Result<&mut Self, Error> {
        let mut parent = Self::with_builder(
            EntityBuilder::new(M::entity_type(), Some(primary_key)),
            Arc::clone(&self.binding),
            Arc::clone(&self.factory),
            IsolatedEditors::default(),
        );
        configure(&mut parent)?;

        self.nested.push(Box::new(parent));
        Ok(self.set_parent(primary_key))
    }

    /// Returns false when there was no parent.
    pub fn remove_parent(&mut self) -> bool {
        self.remove_parent_and_return_id().is_some()
    }

    pub fn remove_parent_and_return_id(&mut self) -> Option<i32> {
        let parent = self.view().parent;
        self.builder.remove_parent();

        parent
    }

    /// Remove the parent and read its stored body, if any.
    pub fn remove_parent_and_return_body<S: EntitySession + ?Sized>(
        &mut self,
        session: &S,
        fetch: &EntityFetch,
    ) -> Result<Option<EntityProxy<M>>, Error> {
        let Some(primary_key) = self.remove_parent_and_return_id() else {
            return Ok(None);
        };

        Ok(session
            .get_entity(M::entity_type(), primary_key, fetch)?
            .map(|sealed| EntityProxy::new(sealed, Arc::clone(&self.factory))))
    }

    ///
    /// PRICES
    ///

    pub fn set_price(&mut self, price: Price) -> &mut Self {
        self.builder.set_price(price);
        self
    }

    /// Set a price in the basic price list. The price id must not already
    /// be used by another list in the same currency.
    pub fn set_basic_price(
        &mut self,
        price_id: i32,
        currency: impl Into<Currency>,
        price_without_tax: Decimal,
        tax_rate: Decimal,
        price_with_tax: Decimal,
    ) -> Result<&mut Self, Error> {
        let key = PriceKey::new(price_id, BASIC_PRICE_LIST, currency);
        if let Some(other) = self.view().prices.values().find(|price| {
            price.key.price_id == price_id
                && price.key.currency == key.currency
                && price.price_list() != BASIC_PRICE_LIST
        }) {
            return Err(ProxyError::invalid_usage(format!(
                "price `{price_id}` in `{}` already belongs to price list `{}`",
                other.key.currency,
                other.price_list()
            ))
            .into());
        }

        Ok(self.set_price(Price::new(key, price_without_tax, tax_rate, price_with_tax)))
    }

    /// Returns false when no such price existed.
    pub fn remove_price(
        &mut self,
        price_id: i32,
        price_list: &str,
        currency: impl Into<Currency>,
    ) -> bool {
        let key = PriceKey::new(price_id, price_list, currency);
        let existed = self.view().prices.contains_key(&key);
        self.builder.remove_price(key);

        existed
    }

    pub fn remove_prices_in_list(&mut self, price_list: &str) -> Vec<Price> {
        self.remove_prices_where(|price| price.price_list() == price_list)
    }

    pub fn remove_all_prices(&mut self) -> Vec<Price> {
        self.remove_prices_where(|_| true)
    }

    fn remove_prices_where(&mut self, predicate: impl Fn(&Price) -> bool) -> Vec<Price> {
        let removed: Vec<Price> = self
            .view()
            .prices
            .values()
            .filter(|price| predicate(price))
            .cloned()
            .collect();
        for price in &removed {
            self.builder.remove_price(price.key.clone());
        }

        removed
    }

    pub fn set_price_inner_record_handling(
        &mut self,
        handling: PriceInnerRecordHandling,
    ) -> &mut Self {
        self.builder.set_price_inner_record_handling(handling);
        self
    }

    ///
    /// REFERENCES
    ///

    /// Reference to `primary_key`, replacing other targets of a reference
    /// that holds at most one.
    fn place_reference(
        &mut self,
        reference: &ReferenceBinding,
        primary_key: i32,
    ) -> ReferenceKey {
        let existing: Vec<ReferenceKey> = self
            .view()
            .references_named(&reference.name)
            .map(|r| r.key.clone())
            .collect();

        if !reference.cardinality.is_multiple() {
            for key in existing.iter().filter(|key| key.primary_key != primary_key) {
                self.builder.remove_reference(key);
            }
        }

        match existing.into_iter().find(|key| key.primary_key == primary_key) {
            Some(key) => key,
            None => self.builder.insert_reference(
                &reference.name,
                primary_key,
                &reference.referenced_entity_type,
                reference.cardinality,
            ),
        }
    }

    pub fn set_reference(&mut self, member: &str, primary_key: i32) -> Result<&mut Self, Error> {
        let reference = self.binding.reference(member)?;
        self.place_reference(&reference, primary_key);

        Ok(self)
    }

    /// Add a reference without touching the others. A second reference to
    /// the same target is only created where duplicates are allowed.
    pub fn add_reference(&mut self, member: &str, primary_key: i32) -> Result<ReferenceKey, Error> {
        let reference = self.binding.reference(member)?;
        if !reference.cardinality.allows_duplicates()
            && let Some(existing) = self
                .view()
                .references_to(&reference.name, primary_key)
                .next()
        {
            return Ok(existing.key.clone());
        }

        Ok(self.builder.insert_reference(
            &reference.name,
            primary_key,
            &reference.referenced_entity_type,
            reference.cardinality,
        ))
    }

    /// Editor of the reference to `primary_key`, created when missing.
    /// Changes land in this editor's mutation set.
    pub fn get_or_create_reference(
        &mut self,
        member: &str,
        primary_key: i32,
    ) -> Result<ReferenceEditor<'_>, Error> {
        let reference = self.binding.reference(member)?;
        let key = self.place_reference(&reference, primary_key);

        Ok(ReferenceEditor::shared(&mut self.builder, key, reference.group_type))
    }

    /// Update the first reference to `primary_key` whose `attribute` equals
    /// `value`, or create one carrying that value.
    pub fn add_or_update_reference_with(
        &mut self,
        member: &str,
        primary_key: i32,
        discriminator: (&str, impl Into<Value>),
        configure: impl FnOnce(&mut ReferenceEditor<'_>) -> Result<(), Error>,
    ) -> Result<ReferenceKey, Error> {
        let (attribute, value) = (discriminator.0, discriminator.1.into());
        let predicate = attribute_equals(attribute, value.clone());

        self.add_or_update_reference_where(member, primary_key, predicate, |editor| {
            editor.set_attribute(attribute, value);
            configure(editor)
        })
    }

    /// Update the first reference to `primary_key` matching `predicate`, or
    /// create a new one.
    pub fn add_or_update_reference_where(
        &mut self,
        member: &str,
        primary_key: i32,
        predicate: impl Fn(&Reference) -> bool,
        configure: impl FnOnce(&mut ReferenceEditor<'_>) -> Result<(), Error>,
    ) -> Result<ReferenceKey, Error> {
        let reference = self.binding.reference(member)?;
        let snapshot = self.builder.clone();

        let found = self
            .view()
            .references_to(&reference.name, primary_key)
            .find(|r| predicate(r))
            .map(|r| r.key.clone());
        let key = match found {
            Some(key) => key,
            None => self.builder.insert_reference(
                &reference.name,
                primary_key,
                &reference.referenced_entity_type,
                reference.cardinality,
            ),
        };

        let mut editor =
            ReferenceEditor::shared(&mut self.builder, key.clone(), reference.group_type);
        if let Err(err) = configure(&mut editor) {
            self.builder = snapshot;
            return Err(err);
        }

        Ok(key)
    }

    /// Update every reference of the member matching `predicate` and return
    /// how many were touched.
    pub fn update_references_where(
        &mut self,
        member: &str,
        predicate: impl Fn(&Reference) -> bool,
        mut configure: impl FnMut(&mut ReferenceEditor<'_>) -> Result<(), Error>,
    ) -> Result<usize, Error> {
        let reference = self.binding.reference(member)?;
        let keys = self.matching(&reference.name, predicate);
        let snapshot = self.builder.clone();

        for key in &keys {
            let mut editor = ReferenceEditor::shared(
                &mut self.builder,
                key.clone(),
                reference.group_type.clone(),
            );
            if let Err(err) = configure(&mut editor) {
                self.builder = snapshot;
                return Err(err);
            }
        }

        Ok(keys.len())
    }

    /// Update every reference of the member pointing at `primary_key`.
    /// Fails with `ReferenceNotFound`, without calling `configure`, when
    /// there is none.
    pub fn update_reference(
        &mut self,
        member: &str,
        primary_key: i32,
        configure: impl FnMut(&mut ReferenceEditor<'_>) -> Result<(), Error>,
    ) -> Result<&mut Self, Error> {
        let reference = self.binding.reference(member)?;
        if self
            .view()
            .references_to(&reference.name, primary_key)
            .next()
            .is_none()
        {
            return Err(self.reference_not_found(&reference.name, primary_key));
        }

        self.update_references_where(
            member,
            |r| r.referenced_primary_key() == primary_key,
            configure,
        )?;
        Ok(self)
    }

    /// Editor of the reference to `primary_key` with its own mutation set.
    /// Only `upsert_deeply_via` of this editor or the reference editor's
    /// own `upsert_via` store what it records.
    pub fn open_reference_for_write(
        &self,
        member: &str,
        primary_key: i32,
    ) -> Result<ReferenceEditor<'static>, Error> {
        let reference = self.binding.reference(member)?;
        let key = self
            .view()
            .references_to(&reference.name, primary_key)
            .next()
            .map(|r| r.key.clone())
            .ok_or_else(|| self.reference_not_found(&reference.name, primary_key))?;

        Ok(self.isolated.open(
            EntityBuilder::from_entity(Arc::new(self.view().clone())),
            key,
            reference.group_type,
        ))
    }

    fn reference_not_found(&self, name: &str, primary_key: i32) -> Error {
        ProxyError::ReferenceNotFound {
            entity: self.entity_type().to_string(),
            reference: name.to_string(),
            primary_key,
        }
        .into()
    }

    /// Returns false when no reference to `primary_key` existed.
    pub fn remove_reference(&mut self, member: &str, primary_key: i32) -> Result<bool, Error> {
        let removed = self.remove_references_where(member, |r| {
            r.referenced_primary_key() == primary_key
        })?;

        Ok(!removed.is_empty())
    }

    /// Remove every reference of the member matching `predicate`, returning
    /// their last bodies.
    pub fn remove_references_where(
        &mut self,
        member: &str,
        predicate: impl Fn(&Reference) -> bool,
    ) -> Result<Vec<Reference>, Error> {
        let reference = self.binding.reference(member)?;
        let removed: Vec<Reference> = self
            .view()
            .references_named(&reference.name)
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        for r in &removed {
            self.builder.remove_reference(&r.key);
        }

        Ok(removed)
    }

    pub fn remove_all_references(&mut self, member: &str) -> Result<Vec<Reference>, Error> {
        self.remove_references_where(member, |_| true)
    }

    fn matching(&self, name: &str, predicate: impl Fn(&Reference) -> bool) -> Vec<ReferenceKey> {
        self.view()
            .references_named(name)
            .filter(|r| predicate(r))
            .map(|r| r.key.clone())
            .collect()
    }

    /// Reference `primary_key` and create or update the referenced entity
    /// with it. The deep upsert stores the referenced entity first.
    pub fn with_referenced_entity<T: EntityClass>(
        &mut self,
        member: &str,
        primary_key: i32,
        configure: impl FnOnce(&mut EntityEditor<T>) -> Result<(), Error>,
    ) -> Result<&mut Self, Error> {
        let reference = self.binding.reference(member)?;
        if reference.referenced_entity_type != T::entity_type() {
            return Err(ProxyError::invalid_usage(format!(
                "reference `{}` points to `{}`, not `{}`",
                reference.name,
                reference.referenced_entity_type,
                T::entity_type()
            ))
            .into());
        }

        let mut referenced =
            EntityEditor::<T>::new(Some(primary_key), None, Arc::clone(&self.factory));
        configure(&mut referenced)?;

        self.place_reference(&reference, primary_key);
        self.nested.push(Box::new(referenced));
        Ok(self)
    }

    ///
    /// OUTPUT
    ///

    #[must_use]
    pub fn to_mutation(&self) -> Option<EntityMutation> {
        self.builder.to_mutation()
    }

    /// Read the pending state into a model value. Localized content reads
    /// in the locale of the entity when it has exactly one.
    pub fn to_instance(&self) -> Result<M, Error> {
        let entity = self.builder.to_instance();
        let locales = entity.locales();
        let mut fetch = entity_fetch_all();
        if locales.len() == 1 {
            fetch = fetch.with_locales(locales);
        }

        let sealed = SealedEntity::new(
            Arc::new(entity),
            self.binding.schema_arc(),
            Arc::new(fetch),
        );

        let proxy = EntityProxy::<M>::with_binding(
            sealed,
            Arc::clone(&self.binding),
            Arc::clone(&self.factory),
        );

        proxy.materialize()
    }

    /// Store the pending changes and read the result as `R`. Entities
    /// created through `with_parent` or `with_referenced_entity` and the
    /// changes of isolated reference editors stay pending.
    pub fn upsert_via<R, S>(&mut self, session: &mut S) -> Result<R, Error>
    where
        R: UpsertResult,
        S: EntitySession + ?Sized,
    {
        let (stored, _) = self.store(session)?;

        R::from_upserted(stored)
    }

    /// Store nested entities first, then this one together with the changes
    /// of isolated reference editors opened over it. Returns every stored
    /// entity in the order it was written.
    pub fn upsert_deeply_via<S: EntitySession>(
        &mut self,
        session: &mut S,
    ) -> Result<Vec<EntityReference>, Error> {
        let mut stored = Vec::new();
        NestedEditor::upsert_deeply(self, session, &mut stored)?;

        event!(
            Level::DEBUG,
            entity_type = M::entity_type(),
            stored = stored.len(),
            "deep upsert finished"
        );

        Ok(stored)
    }

    fn store<S: EntitySession + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<(SealedEntity, bool), Error> {
        register_model::<M, S>(session)?;

        let fetch = entity_fetch_all();
        let (stored, changed) = match self.builder.to_mutation() {
            Some(mutation) => (session.upsert_and_fetch_entity(&mutation, &fetch)?, true),
            None => {
                let primary_key = self.primary_key().ok_or_else(|| {
                    ProxyError::invalid_usage("unchanged editor of an entity without primary key")
                })?;
                let stored = session
                    .get_entity(M::entity_type(), primary_key, &fetch)?
                    .ok_or_else(|| SessionError::EntityNotFound {
                        entity_type: M::entity_type().to_string(),
                        primary_key,
                    })?;

                (stored, false)
            }
        };

        self.builder.rebase(stored.entity_arc());
        self.binding = self.factory.binding::<M>(stored.schema_arc());

        Ok((stored, changed))
    }
}

impl<M: EntityClass> NestedEditor for EntityEditor<M> {
    fn upsert_deeply(
        &mut self,
        session: &mut dyn EntitySession,
        stored: &mut Vec<EntityReference>,
    ) -> Result<(), Error> {
        while let Some(nested) = self.nested.first_mut() {
            nested.upsert_deeply(session, stored)?;
            self.nested.remove(0);
        }

        let snapshot = self.builder.clone();
        for mutation in self.isolated.pending() {
            self.builder.push(mutation);
        }
        let (entity, changed) = match self.store(session) {
            Ok(result) => result,
            Err(err) => {
                self.builder = snapshot;
                return Err(err);
            }
        };
        self.isolated.rebase(&entity.entity_arc());

        if changed {
            stored.push(EntityReference::from_upserted(entity)?);
        }

        Ok(())
    }
}

impl<M> fmt::Debug for EntityEditor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityEditor")
            .field("class", &self.binding.class().name)
            .field("builder", &self.builder)
            .field("nested", &self.nested.len())
            .field("isolated", &self.isolated.len())
            .finish_non_exhaustive()
    }
}

///
/// TESTS
///
