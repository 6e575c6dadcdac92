mod price;
mod reference;
mod sealed;

pub use price::{Price, PriceContext, PriceInnerRecordHandling, PriceKey, price_for_sale};
pub use reference::{GroupReference, Reference, ReferenceKey, attribute_equals};
pub use sealed::SealedEntity;

use derive_more::Display;
use lumendb_primitives::{Locale, Value};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

///
/// AttributeKey
///
/// Attribute or associated data name plus the locale of a localized value.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AttributeKey {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<Locale>,
}

impl AttributeKey {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: None,
        }
    }

    #[must_use]
    pub fn localized(name: impl Into<String>, locale: impl Into<Locale>) -> Self {
        Self {
            name: name.into(),
            locale: Some(locale.into()),
        }
    }

    #[must_use]
    pub const fn is_localized(&self) -> bool {
        self.locale.is_some()
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locale {
            Some(locale) => write!(f, "{}:{locale}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Associated data values are keyed the same way as attributes.
pub type AssociatedDataKey = AttributeKey;

///
/// EntityReference
///

#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("{entity_type}:{primary_key}")]
pub struct EntityReference {
    pub entity_type: String,
    pub primary_key: i32,
}

impl EntityReference {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, primary_key: i32) -> Self {
        Self {
            entity_type: entity_type.into(),
            primary_key,
        }
    }
}

///
/// Entity
///
/// Complete stored state of one entity. Readers see it through
/// `SealedEntity`, which scopes it to what was fetched.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Entity {
    pub entity_type: String,

    /// `None` until the store assigns a generated key.
    pub primary_key: Option<i32>,
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<i32>,

    pub attributes: BTreeMap<AttributeKey, Value>,
    pub associated_data: BTreeMap<AssociatedDataKey, Value>,
    pub references: BTreeMap<ReferenceKey, Reference>,
    pub prices: BTreeMap<PriceKey, Price>,
    pub price_inner_record_handling: PriceInnerRecordHandling,
}

impl Entity {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, primary_key: Option<i32>) -> Self {
        Self {
            entity_type: entity_type.into(),
            primary_key,
            version: 0,
            parent: None,
            attributes: BTreeMap::new(),
            associated_data: BTreeMap::new(),
            references: BTreeMap::new(),
            prices: BTreeMap::new(),
            price_inner_record_handling: PriceInnerRecordHandling::None,
        }
    }

    #[must_use]
    pub fn reference_to(&self) -> Option<EntityReference> {
        self.primary_key
            .map(|pk| EntityReference::new(self.entity_type.clone(), pk))
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

    #[must_use]
    pub fn associated_data(&self, name: &str) -> Option<&Value> {
        self.associated_data.get(&AttributeKey::new(name))
    }

    /// Locales any localized attribute or associated data is stored in.
    #[must_use]
    pub fn locales(&self) -> BTreeSet<Locale> {
        self.attributes
            .keys()
            .chain(self.associated_data.keys())
            .filter_map(|key| key.locale.clone())
            .collect()
    }

    /// References of one name, in key order.
    pub fn references_named<'a>(
        &'a self,
        name: &str,
    ) -> impl Iterator<Item = &'a Reference> + use<'a> {
        let name = name.to_string();

        self.references
            .values()
            .filter(move |reference| reference.name() == name)
    }

    /// References of one name pointing at `primary_key`.
    pub fn references_to<'a>(
        &'a self,
        name: &str,
        primary_key: i32,
    ) -> impl Iterator<Item = &'a Reference> + use<'a> {
        let name = name.to_string();

        self.references
            .values()
            .filter(move |reference| reference.key.points_to(&name, primary_key))
    }

    /// Largest stored internal id, new references count from here.
    #[must_use]
    pub fn max_internal_id(&self) -> i32 {
        self.references
            .keys()
            .map(|key| key.internal_id)
            .max()
            .unwrap_or(0)
            .max(0)
    }

    #[must_use]
    pub fn price(&self, key: &PriceKey) -> Option<&Price> {
        self.prices.get(key)
    }
}
