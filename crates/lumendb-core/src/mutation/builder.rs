use crate::{
    data::{
        AttributeKey, Entity, GroupReference, Price, PriceInnerRecordHandling, PriceKey,
        ReferenceKey,
    },
    mutation::{AttributeMutation, EntityExistence, EntityMutation, LocalMutation},
};
use lumendb_primitives::Value;
use lumendb_schema::types::Cardinality;
use std::{cell::OnceCell, sync::Arc};

///
/// EntityBuilder
///
/// Copy-on-write editor of one entity.
///
/// - The base entity is never touched, changes are kept as local mutations.
/// - At most one pending mutation per member; a later change replaces the
///   earlier one in place.
/// - A change that restores the base value drops the pending mutation.
/// - The view with every pending mutation applied is built lazily.
///

#[derive(Clone, Debug)]
pub struct EntityBuilder {
    entity_type: String,
    primary_key: Option<i32>,
    base: Option<Arc<Entity>>,
    mutations: Vec<LocalMutation>,
    next_internal_id: i32,
    view: OnceCell<Entity>,
}

impl EntityBuilder {
    /// Builder of an entity that is not stored yet.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, primary_key: Option<i32>) -> Self {
        Self {
            entity_type: entity_type.into(),
            primary_key,
            base: None,
            mutations: Vec::new(),
            next_internal_id: -1,
            view: OnceCell::new(),
        }
    }

    /// Builder over a stored entity.
    #[must_use]
    pub fn from_entity(base: Arc<Entity>) -> Self {
        Self {
            entity_type: base.entity_type.clone(),
            primary_key: base.primary_key,
            base: Some(base),
            mutations: Vec::new(),
            next_internal_id: -1,
            view: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    #[must_use]
    pub const fn primary_key(&self) -> Option<i32> {
        self.primary_key
    }

    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.base.is_none()
    }

    #[must_use]
    pub fn base(&self) -> Option<&Arc<Entity>> {
        self.base.as_ref()
    }

    #[must_use]
    pub fn mutations(&self) -> &[LocalMutation] {
        &self.mutations
    }

    /// The entity with every pending mutation applied.
    #[must_use]
    pub fn view(&self) -> &Entity {
        self.view.get_or_init(|| {
            let mut entity = self.base.as_deref().cloned().unwrap_or_else(|| {
                Entity::new(self.entity_type.clone(), self.primary_key)
            });
            for mutation in &self.mutations {
                mutation.apply(&mut entity);
            }

            entity
        })
    }

    #[must_use]
    pub fn to_instance(&self) -> Entity {
        self.view().clone()
    }

    /// Pending changes. A new entity always produces a mutation, a stored
    /// one only when something changed.
    #[must_use]
    pub fn to_mutation(&self) -> Option<EntityMutation> {
        let existence = match (&self.base, self.primary_key) {
            (Some(_), _) if self.mutations.is_empty() => return None,
            (Some(_), _) => EntityExistence::MustExist,
            (None, Some(_)) => EntityExistence::MayExist,
            (None, None) => EntityExistence::MustNotExist,
        };

        Some(EntityMutation {
            entity_type: self.entity_type.clone(),
            primary_key: self.primary_key,
            existence,
            local_mutations: self.mutations.clone(),
        })
    }

    /// Start over from the stored state, dropping pending changes.
    pub fn rebase(&mut self, base: Arc<Entity>) {
        self.primary_key = base.primary_key;
        self.base = Some(base);
        self.mutations.clear();
        self.next_internal_id = -1;
        self.view = OnceCell::new();
    }

    ///
    /// RECORDING
    ///

    /// Record one local mutation.
    pub fn push(&mut self, mutation: LocalMutation) {
        if let LocalMutation::RemoveReference(key) = &mutation {
            let key = key.clone();
            self.mutations
                .retain(|pending| pending.key().reference() != Some(&key));
            if self.base.as_ref().is_some_and(|base| base.references.contains_key(&key)) {
                self.mutations.push(mutation);
            }
            self.view = OnceCell::new();
            return;
        }

        let key = mutation.key();
        let position = self.mutations.iter().position(|pending| pending.key() == key);
        let noop = self.base.as_ref().is_some_and(|base| mutation.is_noop(base));

        match (position, noop) {
            (Some(index), true) => {
                self.mutations.remove(index);
            }
            (Some(index), false) => self.mutations[index] = mutation,
            (None, true) => return,
            (None, false) => self.mutations.push(mutation),
        }
        self.view = OnceCell::new();
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.push(LocalMutation::UpsertAttribute(
            AttributeKey::new(name),
            value.into(),
        ));
        self
    }

    pub fn set_localized_attribute(
        &mut self,
        name: &str,
        locale: impl Into<lumendb_primitives::Locale>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push(LocalMutation::UpsertAttribute(
            AttributeKey::localized(name, locale),
            value.into(),
        ));
        self
    }

    pub fn remove_attribute(&mut self, key: AttributeKey) -> &mut Self {
        self.push(LocalMutation::RemoveAttribute(key));
        self
    }

    pub fn set_associated_data(&mut self, key: AttributeKey, value: Value) -> &mut Self {
        self.push(LocalMutation::UpsertAssociatedData(key, value));
        self
    }

    pub fn remove_associated_data(&mut self, key: AttributeKey) -> &mut Self {
        self.push(LocalMutation::RemoveAssociatedData(key));
        self
    }

    pub fn set_parent(&mut self, parent: i32) -> &mut Self {
        self.push(LocalMutation::SetParent(parent));
        self
    }

    pub fn remove_parent(&mut self) -> &mut Self {
        self.push(LocalMutation::RemoveParent);
        self
    }

    pub fn set_price(&mut self, price: Price) -> &mut Self {
        self.push(LocalMutation::UpsertPrice(price));
        self
    }

    pub fn remove_price(&mut self, key: PriceKey) -> &mut Self {
        self.push(LocalMutation::RemovePrice(key));
        self
    }

    pub fn set_price_inner_record_handling(
        &mut self,
        handling: PriceInnerRecordHandling,
    ) -> &mut Self {
        self.push(LocalMutation::SetPriceInnerRecordHandling(handling));
        self
    }

    /// Add a reference and return its key. New references get negative
    /// internal ids until the store assigns the real ones.
    pub fn insert_reference(
        &mut self,
        name: &str,
        primary_key: i32,
        referenced_entity_type: &str,
        cardinality: Cardinality,
    ) -> ReferenceKey {
        let key = ReferenceKey::new(name, primary_key, self.next_internal_id);
        self.next_internal_id -= 1;

        self.push(LocalMutation::InsertReference {
            key: key.clone(),
            referenced_entity_type: referenced_entity_type.to_string(),
            cardinality,
        });

        key
    }

    pub fn remove_reference(&mut self, key: &ReferenceKey) -> &mut Self {
        self.push(LocalMutation::RemoveReference(key.clone()));
        self
    }

    pub fn set_reference_attribute(
        &mut self,
        reference: &ReferenceKey,
        attribute: AttributeKey,
        value: Value,
    ) -> &mut Self {
        self.push(LocalMutation::ReferenceAttribute {
            key: reference.clone(),
            mutation: AttributeMutation::Upsert(attribute, value),
        });
        self
    }

    pub fn remove_reference_attribute(
        &mut self,
        reference: &ReferenceKey,
        attribute: AttributeKey,
    ) -> &mut Self {
        self.push(LocalMutation::ReferenceAttribute {
            key: reference.clone(),
            mutation: AttributeMutation::Remove(attribute),
        });
        self
    }

    pub fn set_reference_group(
        &mut self,
        reference: &ReferenceKey,
        group: GroupReference,
    ) -> &mut Self {
        self.push(LocalMutation::SetReferenceGroup {
            key: reference.clone(),
            group,
        });
        self
    }

    pub fn remove_reference_group(&mut self, reference: &ReferenceKey) -> &mut Self {
        self.push(LocalMutation::RemoveReferenceGroup(reference.clone()));
        self
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn stored() -> Arc<Entity> {
        let mut entity = Entity::new("PRODUCT", Some(1));
        entity
            .attributes
            .insert(AttributeKey::new("code"), Value::from("phone"));
        let key = ReferenceKey::new("brand", 7, 1);
        entity.references.insert(
            key.clone(),
            crate::data::Reference::new(key, "BRAND".to_string()),
        );

        Arc::new(entity)
    }

    #[test]
    fn unchanged_stored_entity_has_no_mutation() {
        let builder = EntityBuilder::from_entity(stored());

        assert!(builder.to_mutation().is_none());
    }

    #[test]
    fn new_entity_always_has_mutation() {
        let generated = EntityBuilder::new("PRODUCT", None);
        let explicit = EntityBuilder::new("PRODUCT", Some(5));

        assert_eq!(
            generated.to_mutation().map(|m| m.existence),
            Some(EntityExistence::MustNotExist)
        );
        assert_eq!(
            explicit.to_mutation().map(|m| m.existence),
            Some(EntityExistence::MayExist)
        );
    }

    #[test]
    fn repeated_change_replaces_pending_mutation() {
        let mut builder = EntityBuilder::from_entity(stored());
        builder.set_attribute("name", "first");
        builder.set_attribute("priority", 1i64);
        builder.set_attribute("name", "second");

        let mutation = builder.to_mutation().expect("changed");
        assert_eq!(mutation.existence, EntityExistence::MustExist);
        assert_eq!(
            mutation.local_mutations,
            vec![
                LocalMutation::UpsertAttribute(AttributeKey::new("name"), Value::from("second")),
                LocalMutation::UpsertAttribute(AttributeKey::new("priority"), Value::Int(1)),
            ]
        );
        assert_eq!(builder.view().attribute("name"), Some(&Value::from("second")));
    }

    #[test]
    fn restoring_base_value_drops_mutation() {
        let mut builder = EntityBuilder::from_entity(stored());
        builder.set_attribute("code", "tablet");
        builder.set_attribute("code", "phone");
        builder.remove_attribute(AttributeKey::new("missing"));

        assert!(builder.to_mutation().is_none());
    }

    #[test]
    fn removing_new_reference_forgets_it() {
        let mut builder = EntityBuilder::from_entity(stored());
        let key = builder.insert_reference("tags", 3, "TAG", Cardinality::ZeroOrMore);
        builder.set_reference_attribute(&key, AttributeKey::new("order"), Value::Int(1));
        assert!(key.is_new());
        assert_eq!(builder.mutations().len(), 2);

        builder.remove_reference(&key);
        assert!(builder.to_mutation().is_none());
    }

    #[test]
    fn removing_stored_reference_records_one_mutation() {
        let mut builder = EntityBuilder::from_entity(stored());
        let key = ReferenceKey::new("brand", 7, 1);
        builder.set_reference_attribute(&key, AttributeKey::new("order"), Value::Int(1));
        builder.remove_reference(&key);

        assert_eq!(builder.mutations(), &[LocalMutation::RemoveReference(key)]);
        assert!(builder.view().references.is_empty());
    }

    #[test]
    fn new_references_count_down() {
        let mut builder = EntityBuilder::new("PRODUCT", None);
        let first = builder.insert_reference("tags", 3, "TAG", Cardinality::ZeroOrMore);
        let second = builder.insert_reference("tags", 3, "TAG", Cardinality::ZeroOrMore);

        assert_eq!(first.internal_id, -1);
        assert_eq!(second.internal_id, -2);
        assert_eq!(builder.view().references_to("tags", 3).count(), 2);
    }

    proptest! {
        #[test]
        fn pending_changes_stay_one_per_attribute(
            changes in proptest::collection::vec((0usize..3, 0i64..4), 0..24),
        ) {
            let names = ["code", "name", "priority"];
            let mut builder = EntityBuilder::new("PRODUCT", Some(1));
            let mut last = BTreeMap::new();
            for (name, value) in changes {
                builder.set_attribute(names[name], value);
                last.insert(names[name], value);
            }

            prop_assert_eq!(builder.mutations().len(), last.len());
            for (name, value) in last {
                prop_assert_eq!(builder.view().attribute(name), Some(&Value::Int(value)));
            }
        }
    }
}
