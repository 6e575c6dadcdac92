use crate::data::AttributeKey;
use lumendb_primitives::{Locale, Value};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};

///
/// ReferenceKey
///
/// Identifies one reference of an entity. `internal_id` tells apart
/// references to the same primary key under cardinalities that allow
/// duplicates. Negative ids belong to references not yet stored.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ReferenceKey {
    pub name: String,
    pub primary_key: i32,
    pub internal_id: i32,
}

impl ReferenceKey {
    #[must_use]
    pub fn new(name: impl Into<String>, primary_key: i32, internal_id: i32) -> Self {
        Self {
            name: name.into(),
            primary_key,
            internal_id,
        }
    }

    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.internal_id < 0
    }

    /// Same name and referenced primary key, whatever the internal id.
    #[must_use]
    pub fn points_to(&self, name: &str, primary_key: i32) -> bool {
        self.name == name && self.primary_key == primary_key
    }
}

impl Ord for ReferenceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then(self.primary_key.cmp(&other.primary_key))
            .then(self.internal_id.cmp(&other.internal_id))
    }
}

impl PartialOrd for ReferenceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.primary_key)
    }
}

///
/// GroupReference
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct GroupReference {
    pub entity_type: String,
    pub primary_key: i32,
}

///
/// Reference
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Reference {
    pub key: ReferenceKey,
    pub referenced_entity_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupReference>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<AttributeKey, Value>,
}

impl Reference {
    #[must_use]
    pub const fn new(key: ReferenceKey, referenced_entity_type: String) -> Self {
        Self {
            key,
            referenced_entity_type,
            group: None,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.key.name
    }

    #[must_use]
    pub const fn referenced_primary_key(&self) -> i32 {
        self.key.primary_key
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(&AttributeKey::new(name))
    }

    #[must_use]
    pub fn localized_attribute(&self, name: &str, locale: &Locale) -> Option<&Value> {
        self.attributes
            .get(&AttributeKey::localized(name, locale.clone()))
    }
}

/// Predicate matching references whose attribute equals `value`, the usual
/// way to tell apart duplicate references by a discriminator.
pub fn attribute_equals(
    name: impl Into<String>,
    value: impl Into<Value>,
) -> impl Fn(&Reference) -> bool {
    let name = name.into();
    let value = value.into();

    move |reference| reference.attribute(&name) == Some(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_by_name_then_target_then_internal_id() {
        let mut keys = vec![
            ReferenceKey::new("tags", 1, 0),
            ReferenceKey::new("brand", 9, 0),
            ReferenceKey::new("tags", 1, -1),
            ReferenceKey::new("tags", 0, 3),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                ReferenceKey::new("brand", 9, 0),
                ReferenceKey::new("tags", 0, 3),
                ReferenceKey::new("tags", 1, -1),
                ReferenceKey::new("tags", 1, 0),
            ]
        );
        assert!(keys[2].is_new());
    }

    #[test]
    fn discriminator_predicate_matches_attribute() {
        let mut reference = Reference::new(ReferenceKey::new("related", 4, 1), "PRODUCT".into());
        reference
            .attributes
            .insert(AttributeKey::new("relationType"), Value::from("similar"));

        assert!(attribute_equals("relationType", "similar")(&reference));
        assert!(!attribute_equals("relationType", "upsell_1")(&reference));
        assert!(!attribute_equals("label", "similar")(&reference));
    }
}
