mod builder;

pub use builder::EntityBuilder;

use crate::{
    data::{
        AttributeKey, Entity, GroupReference, Price, PriceInnerRecordHandling, PriceKey,
        Reference, ReferenceKey,
    },
    error::SessionError,
};
use lumendb_primitives::Value;
use lumendb_schema::types::Cardinality;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// AttributeMutation
///
/// Change of one attribute value, shared by entity and reference attributes.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum AttributeMutation {
    Remove(AttributeKey),
    Upsert(AttributeKey, Value),
}

impl AttributeMutation {
    #[must_use]
    pub const fn key(&self) -> &AttributeKey {
        match self {
            Self::Remove(key) | Self::Upsert(key, _) => key,
        }
    }

    fn apply(&self, attributes: &mut std::collections::BTreeMap<AttributeKey, Value>) {
        match self {
            Self::Remove(key) => {
                attributes.remove(key);
            }
            Self::Upsert(key, value) => {
                attributes.insert(key.clone(), value.clone());
            }
        }
    }
}

///
/// MutationKey
///
/// The member a local mutation changes. A builder keeps at most one
/// pending mutation per key.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MutationKey {
    AssociatedData(AttributeKey),
    Attribute(AttributeKey),
    Parent,
    Price(PriceKey),
    PriceInnerRecordHandling,
    Reference(ReferenceKey),
    ReferenceAttribute(ReferenceKey, AttributeKey),
    ReferenceGroup(ReferenceKey),
}

impl MutationKey {
    /// Reference the key belongs to, if any.
    #[must_use]
    pub const fn reference(&self) -> Option<&ReferenceKey> {
        match self {
            Self::Reference(key) | Self::ReferenceAttribute(key, _) | Self::ReferenceGroup(key) => {
                Some(key)
            }
            _ => None,
        }
    }
}

///
/// LocalMutation
///
/// One atomic change of one entity.
///

#[remain::sorted]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum LocalMutation {
    InsertReference {
        key: ReferenceKey,
        referenced_entity_type: String,
        cardinality: Cardinality,
    },
    ReferenceAttribute {
        key: ReferenceKey,
        mutation: AttributeMutation,
    },
    RemoveAssociatedData(AttributeKey),
    RemoveAttribute(AttributeKey),
    RemoveParent,
    RemovePrice(PriceKey),
    RemoveReference(ReferenceKey),
    RemoveReferenceGroup(ReferenceKey),
    SetParent(i32),
    SetPriceInnerRecordHandling(PriceInnerRecordHandling),
    SetReferenceGroup {
        key: ReferenceKey,
        group: GroupReference,
    },
    UpsertAssociatedData(AttributeKey, Value),
    UpsertAttribute(AttributeKey, Value),
    UpsertPrice(Price),
}

impl LocalMutation {
    #[must_use]
    pub fn key(&self) -> MutationKey {
        match self {
            Self::InsertReference { key, .. } | Self::RemoveReference(key) => {
                MutationKey::Reference(key.clone())
            }
            Self::ReferenceAttribute { key, mutation } => {
                MutationKey::ReferenceAttribute(key.clone(), mutation.key().clone())
            }
            Self::RemoveAssociatedData(key) | Self::UpsertAssociatedData(key, _) => {
                MutationKey::AssociatedData(key.clone())
            }
            Self::RemoveAttribute(key) | Self::UpsertAttribute(key, _) => {
                MutationKey::Attribute(key.clone())
            }
            Self::RemoveParent | Self::SetParent(_) => MutationKey::Parent,
            Self::RemovePrice(key) => MutationKey::Price(key.clone()),
            Self::UpsertPrice(price) => MutationKey::Price(price.key.clone()),
            Self::RemoveReferenceGroup(key) | Self::SetReferenceGroup { key, .. } => {
                MutationKey::ReferenceGroup(key.clone())
            }
            Self::SetPriceInnerRecordHandling(_) => MutationKey::PriceInnerRecordHandling,
        }
    }

    /// Whether applying this to `entity` would change nothing.
    #[must_use]
    pub fn is_noop(&self, entity: &Entity) -> bool {
        match self {
            Self::InsertReference { key, .. } => entity.references.contains_key(key),
            Self::ReferenceAttribute { key, mutation } => {
                entity.references.get(key).is_some_and(|reference| match mutation {
                    AttributeMutation::Remove(attr) => !reference.attributes.contains_key(attr),
                    AttributeMutation::Upsert(attr, value) => {
                        reference.attributes.get(attr) == Some(value)
                    }
                })
            }
            Self::RemoveAssociatedData(key) => !entity.associated_data.contains_key(key),
            Self::RemoveAttribute(key) => !entity.attributes.contains_key(key),
            Self::RemoveParent => entity.parent.is_none(),
            Self::RemovePrice(key) => !entity.prices.contains_key(key),
            Self::RemoveReference(key) => !entity.references.contains_key(key),
            Self::RemoveReferenceGroup(key) => entity
                .references
                .get(key)
                .is_none_or(|reference| reference.group.is_none()),
            Self::SetParent(parent) => entity.parent == Some(*parent),
            Self::SetPriceInnerRecordHandling(handling) => {
                entity.price_inner_record_handling == *handling
            }
            Self::SetReferenceGroup { key, group } => entity
                .references
                .get(key)
                .is_some_and(|reference| reference.group.as_ref() == Some(group)),
            Self::UpsertAssociatedData(key, value) => {
                entity.associated_data.get(key) == Some(value)
            }
            Self::UpsertAttribute(key, value) => entity.attributes.get(key) == Some(value),
            Self::UpsertPrice(price) => entity.prices.get(&price.key) == Some(price),
        }
    }

    /// Apply to `entity`. Mutations of references the entity does not hold
    /// are skipped, `EntityMutation::verify` rejects them beforehand.
    pub fn apply(&self, entity: &mut Entity) {
        match self {
            Self::InsertReference {
                key,
                referenced_entity_type,
                ..
            } => {
                entity
                    .references
                    .entry(key.clone())
                    .or_insert_with(|| Reference::new(key.clone(), referenced_entity_type.clone()));
            }
            Self::ReferenceAttribute { key, mutation } => {
                if let Some(reference) = entity.references.get_mut(key) {
                    mutation.apply(&mut reference.attributes);
                }
            }
            Self::RemoveAssociatedData(key) => {
                entity.associated_data.remove(key);
            }
            Self::RemoveAttribute(key) => {
                entity.attributes.remove(key);
            }
            Self::RemoveParent => entity.parent = None,
            Self::RemovePrice(key) => {
                entity.prices.remove(key);
            }
            Self::RemoveReference(key) => {
                entity.references.remove(key);
            }
            Self::RemoveReferenceGroup(key) => {
                if let Some(reference) = entity.references.get_mut(key) {
                    reference.group = None;
                }
            }
            Self::SetParent(parent) => entity.parent = Some(*parent),
            Self::SetPriceInnerRecordHandling(handling) => {
                entity.price_inner_record_handling = *handling;
            }
            Self::SetReferenceGroup { key, group } => {
                if let Some(reference) = entity.references.get_mut(key) {
                    reference.group = Some(group.clone());
                }
            }
            Self::UpsertAssociatedData(key, value) => {
                entity.associated_data.insert(key.clone(), value.clone());
            }
            Self::UpsertAttribute(key, value) => {
                entity.attributes.insert(key.clone(), value.clone());
            }
            Self::UpsertPrice(price) => {
                entity.prices.insert(price.key.clone(), price.clone());
            }
        }
    }

    /// Same mutation with its reference key rewritten.
    #[must_use]
    pub fn rekeyed(&self, from: &ReferenceKey, to: &ReferenceKey) -> Self {
        let swap = |key: &ReferenceKey| if key == from { to.clone() } else { key.clone() };

        match self {
            Self::InsertReference {
                key,
                referenced_entity_type,
                cardinality,
            } => Self::InsertReference {
                key: swap(key),
                referenced_entity_type: referenced_entity_type.clone(),
                cardinality: *cardinality,
            },
            Self::ReferenceAttribute { key, mutation } => Self::ReferenceAttribute {
                key: swap(key),
                mutation: mutation.clone(),
            },
            Self::RemoveReference(key) => Self::RemoveReference(swap(key)),
            Self::RemoveReferenceGroup(key) => Self::RemoveReferenceGroup(swap(key)),
            Self::SetReferenceGroup { key, group } => Self::SetReferenceGroup {
                key: swap(key),
                group: group.clone(),
            },
            other => other.clone(),
        }
    }
}

///
/// EntityExistence
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum EntityExistence {
    #[default]
    MayExist,
    MustExist,
    MustNotExist,
}

///
/// EntityMutation
///
/// Every pending local mutation of one entity instance.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EntityMutation {
    pub entity_type: String,
    pub primary_key: Option<i32>,
    pub existence: EntityExistence,
    pub local_mutations: Vec<LocalMutation>,
}

impl EntityMutation {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, primary_key: Option<i32>) -> Self {
        Self {
            entity_type: entity_type.into(),
            primary_key,
            existence: EntityExistence::MayExist,
            local_mutations: Vec::new(),
        }
    }

    /// Check that reference-level mutations only touch references that
    /// exist at that point of the sequence.
    pub fn verify(&self, base: Option<&Entity>) -> Result<(), SessionError> {
        let mut present: BTreeSet<&ReferenceKey> = base
            .map(|entity| entity.references.keys().collect())
            .unwrap_or_default();

        for mutation in &self.local_mutations {
            match mutation {
                LocalMutation::InsertReference { key, .. } => {
                    present.insert(key);
                }
                LocalMutation::RemoveReference(key) => {
                    present.remove(key);
                }
                LocalMutation::ReferenceAttribute { key, .. }
                | LocalMutation::SetReferenceGroup { key, .. }
                | LocalMutation::RemoveReferenceGroup(key) => {
                    if !present.contains(key) {
                        return Err(SessionError::invalid_mutation(
                            &self.entity_type,
                            format!("reference `{key}` is not present"),
                        ));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Apply every local mutation over `base`, or over a fresh entity.
    #[must_use]
    pub fn apply(&self, base: Option<&Entity>) -> Entity {
        let mut entity = base.cloned().unwrap_or_else(|| {
            Entity::new(self.entity_type.clone(), self.primary_key)
        });
        for mutation in &self.local_mutations {
            mutation.apply(&mut entity);
        }

        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_key() -> ReferenceKey {
        ReferenceKey::new("brand", 3, -1)
    }

    #[test]
    fn attribute_mutations_share_a_key_per_locale() {
        let set = LocalMutation::UpsertAttribute(AttributeKey::new("code"), Value::from("a"));
        let remove = LocalMutation::RemoveAttribute(AttributeKey::new("code"));
        let localized =
            LocalMutation::UpsertAttribute(AttributeKey::localized("code", "cs"), Value::from("a"));

        assert_eq!(set.key(), remove.key());
        assert_ne!(set.key(), localized.key());
    }

    #[test]
    fn verify_rejects_attribute_of_missing_reference() {
        let mut mutation = EntityMutation::new("PRODUCT", Some(1));
        mutation.local_mutations.push(LocalMutation::ReferenceAttribute {
            key: reference_key(),
            mutation: AttributeMutation::Upsert(AttributeKey::new("order"), Value::Int(1)),
        });
        assert!(mutation.verify(None).is_err());

        mutation.local_mutations.insert(
            0,
            LocalMutation::InsertReference {
                key: reference_key(),
                referenced_entity_type: "BRAND".to_string(),
                cardinality: Cardinality::ZeroOrOne,
            },
        );
        mutation.verify(None).expect("reference inserted first");

        let entity = mutation.apply(None);
        let reference = entity.references.get(&reference_key()).expect("reference");
        assert_eq!(reference.attribute("order"), Some(&Value::Int(1)));
    }

    #[test]
    fn noop_detection_compares_with_entity() {
        let mut entity = Entity::new("PRODUCT", Some(1));
        entity.parent = Some(5);
        entity
            .attributes
            .insert(AttributeKey::new("code"), Value::from("a"));

        assert!(LocalMutation::SetParent(5).is_noop(&entity));
        assert!(!LocalMutation::SetParent(6).is_noop(&entity));
        assert!(
            LocalMutation::UpsertAttribute(AttributeKey::new("code"), Value::from("a"))
                .is_noop(&entity)
        );
        assert!(LocalMutation::RemoveAttribute(AttributeKey::new("name")).is_noop(&entity));
        assert!(LocalMutation::RemovePrice(PriceKey::new(1, "basic", "CZK")).is_noop(&entity));
    }

    #[test]
    fn rekeying_touches_only_matching_references() {
        let stored = ReferenceKey::new("brand", 3, 4);
        let mutation = LocalMutation::RemoveReferenceGroup(reference_key());

        assert_eq!(
            mutation.rekeyed(&reference_key(), &stored),
            LocalMutation::RemoveReferenceGroup(stored.clone())
        );
        assert_eq!(
            LocalMutation::RemoveParent.rekeyed(&reference_key(), &stored),
            LocalMutation::RemoveParent
        );
    }
}
