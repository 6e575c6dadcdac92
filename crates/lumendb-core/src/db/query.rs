use crate::{data::Entity, fetch::EntityFetch};
use lumendb_primitives::Value;
use serde::{Deserialize, Serialize};

///
/// Filter
///
/// Entity-level constraints of a query. Attribute constraints match a
/// value stored under any locale.
///

#[remain::sorted]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Filter {
    And(Vec<Self>),
    AttributeEquals { name: String, value: Value },
    AttributeStartsWith { name: String, prefix: String },
    PrimaryKeyIn(Vec<i32>),

    /// Entity holds a reference of the name, optionally to one key.
    ReferenceHaving {
        name: String,
        primary_key: Option<i32>,
    },
}

impl Filter {
    #[must_use]
    pub fn primary_key_in(keys: impl IntoIterator<Item = i32>) -> Self {
        Self::PrimaryKeyIn(keys.into_iter().collect())
    }

    #[must_use]
    pub fn attribute_equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::AttributeEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn attribute_starts_with(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::AttributeStartsWith {
            name: name.into(),
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn reference_having(name: impl Into<String>, primary_key: Option<i32>) -> Self {
        Self::ReferenceHaving {
            name: name.into(),
            primary_key,
        }
    }

    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|filter| filter.matches(entity)),
            Self::AttributeEquals { name, value } => entity
                .attributes
                .iter()
                .any(|(key, stored)| &key.name == name && stored == value),
            Self::AttributeStartsWith { name, prefix } => {
                entity.attributes.iter().any(|(key, stored)| {
                    &key.name == name && stored.as_text().is_some_and(|t| t.starts_with(prefix))
                })
            }
            Self::PrimaryKeyIn(keys) => entity.primary_key.is_some_and(|pk| keys.contains(&pk)),
            Self::ReferenceHaving { name, primary_key } => {
                entity.references_named(name).any(|reference| {
                    primary_key.is_none_or(|pk| reference.referenced_primary_key() == pk)
                })
            }
        }
    }
}

///
/// Page
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Page {
    /// One-based page number.
    pub number: usize,
    pub size: usize,
}

impl Page {
    #[must_use]
    pub const fn new(number: usize, size: usize) -> Self {
        Self { number, size }
    }

    #[must_use]
    pub const fn offset(self) -> usize {
        self.number.saturating_sub(1) * self.size
    }
}

///
/// Query
///
/// Entities of one collection matching a filter, in primary key order.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Query {
    pub entity_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    pub fetch: EntityFetch,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
}

impl Query {
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            filter: None,
            fetch: EntityFetch::new(),
            page: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn fetch(mut self, fetch: EntityFetch) -> Self {
        self.fetch = fetch;
        self
    }

    #[must_use]
    pub const fn page(mut self, number: usize, size: usize) -> Self {
        self.page = Some(Page::new(number, size));
        self
    }

    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter.matches(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AttributeKey, Reference, ReferenceKey};

    fn product(pk: i32, code: &str) -> Entity {
        let mut entity = Entity::new("PRODUCT", Some(pk));
        entity
            .attributes
            .insert(AttributeKey::new("code"), Value::from(code));
        let key = ReferenceKey::new("brand", 10 + pk, 1);
        entity
            .references
            .insert(key.clone(), Reference::new(key, "BRAND".to_string()));

        entity
    }

    #[test]
    fn filters_combine() {
        let filter = Filter::and([
            Filter::attribute_starts_with("code", "pho"),
            Filter::reference_having("brand", Some(11)),
        ]);

        assert!(filter.matches(&product(1, "phone")));
        assert!(!filter.matches(&product(2, "phone")));
        assert!(!filter.matches(&product(1, "tablet")));
    }

    #[test]
    fn primary_key_and_equality_filters() {
        let entity = product(3, "tablet");

        assert!(Filter::primary_key_in([1, 3]).matches(&entity));
        assert!(Filter::attribute_equals("code", "tablet").matches(&entity));
        assert!(!Filter::attribute_equals("code", "phone").matches(&entity));
        assert!(Filter::reference_having("brand", None).matches(&entity));
    }

    #[test]
    fn pages_are_one_based() {
        assert_eq!(Page::new(1, 20).offset(), 0);
        assert_eq!(Page::new(3, 20).offset(), 40);
        assert_eq!(Page::new(0, 20).offset(), 0);
    }
}
