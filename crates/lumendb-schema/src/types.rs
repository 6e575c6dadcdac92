use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

///
/// Cardinality
///
/// How many references of one name an entity may hold, and whether the
/// same referenced primary key may appear more than once.
///

#[remain::sorted]
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Cardinality {
    ExactlyOne,
    OneOrMore,
    OneOrMoreWithDuplicates,
    #[default]
    ZeroOrMore,
    ZeroOrMoreWithDuplicates,
    ZeroOrOne,
}

impl Cardinality {
    #[must_use]
    pub const fn min(self) -> usize {
        match self {
            Self::ExactlyOne | Self::OneOrMore | Self::OneOrMoreWithDuplicates => 1,
            Self::ZeroOrMore | Self::ZeroOrMoreWithDuplicates | Self::ZeroOrOne => 0,
        }
    }

    /// Upper bound, `None` when unbounded.
    #[must_use]
    pub const fn max(self) -> Option<usize> {
        match self {
            Self::ExactlyOne | Self::ZeroOrOne => Some(1),
            _ => None,
        }
    }

    #[must_use]
    pub const fn allows_duplicates(self) -> bool {
        matches!(
            self,
            Self::OneOrMoreWithDuplicates | Self::ZeroOrMoreWithDuplicates
        )
    }

    #[must_use]
    pub const fn is_multiple(self) -> bool {
        self.max().is_none()
    }

    /// Whether `count` references satisfy this cardinality.
    #[must_use]
    pub const fn accepts(self, count: usize) -> bool {
        count >= self.min()
            && match self.max() {
                Some(max) => count <= max,
                None => true,
            }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ExactlyOne => "EXACTLY_ONE",
            Self::OneOrMore => "ONE_OR_MORE",
            Self::OneOrMoreWithDuplicates => "ONE_OR_MORE_WITH_DUPLICATES",
            Self::ZeroOrMore => "ZERO_OR_MORE",
            Self::ZeroOrMoreWithDuplicates => "ZERO_OR_MORE_WITH_DUPLICATES",
            Self::ZeroOrOne => "ZERO_OR_ONE",
        };

        f.write_str(label)
    }
}

///
/// EvolutionMode
///
/// Permissions for growing a schema implicitly while writing data.
///

#[remain::sorted]
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum EvolutionMode {
    AdaptPrimaryKeyGeneration,
    AddingAssociatedData,
    AddingAttributes,
    AddingCurrencies,
    AddingHierarchy,
    AddingLocales,
    AddingPrices,
    AddingReferences,
}

impl EvolutionMode {
    pub const ALL: [Self; 8] = [
        Self::AdaptPrimaryKeyGeneration,
        Self::AddingAssociatedData,
        Self::AddingAttributes,
        Self::AddingCurrencies,
        Self::AddingHierarchy,
        Self::AddingLocales,
        Self::AddingPrices,
        Self::AddingReferences,
    ];

    #[must_use]
    pub fn all() -> BTreeSet<Self> {
        Self::ALL.into_iter().collect()
    }
}

///
/// Scope
///

#[remain::sorted]
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Scope {
    Archived,
    #[default]
    Live,
}

impl Scope {
    #[must_use]
    pub fn default_set() -> BTreeSet<Self> {
        BTreeSet::from([Self::Live])
    }
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

///
/// OrderBehaviour
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum OrderBehaviour {
    NullsFirst,
    #[default]
    NullsLast,
}

///
/// AttributeElement
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct AttributeElement {
    pub attribute_name: String,
    pub direction: OrderDirection,
    pub behaviour: OrderBehaviour,
}

impl AttributeElement {
    #[must_use]
    pub const fn desc(mut self) -> Self {
        self.direction = OrderDirection::Desc;
        self
    }

    #[must_use]
    pub const fn nulls_first(mut self) -> Self {
        self.behaviour = OrderBehaviour::NullsFirst;
        self
    }
}

/// Ascending, nulls-last element for the named attribute.
pub fn attribute_element(name: impl Into<String>) -> AttributeElement {
    AttributeElement {
        attribute_name: name.into(),
        direction: OrderDirection::Asc,
        behaviour: OrderBehaviour::NullsLast,
    }
}

///
/// AttributeInheritance
///
/// Which attributes of the origin reference a reflected reference takes over.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AttributeInheritance {
    AllExcept(BTreeSet<String>),
    OnlySpecified(BTreeSet<String>),
}

impl AttributeInheritance {
    #[must_use]
    pub fn all() -> Self {
        Self::AllExcept(BTreeSet::new())
    }

    #[must_use]
    pub fn none() -> Self {
        Self::OnlySpecified(BTreeSet::new())
    }

    #[must_use]
    pub fn inherits(&self, attribute: &str) -> bool {
        match self {
            Self::AllExcept(excluded) => !excluded.contains(attribute),
            Self::OnlySpecified(included) => included.contains(attribute),
        }
    }
}

impl Default for AttributeInheritance {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinality_bounds() {
        assert!(Cardinality::ExactlyOne.accepts(1));
        assert!(!Cardinality::ExactlyOne.accepts(0));
        assert!(!Cardinality::ZeroOrOne.accepts(2));
        assert!(Cardinality::ZeroOrMore.accepts(0));
        assert!(!Cardinality::OneOrMore.accepts(0));
        assert!(Cardinality::OneOrMoreWithDuplicates.accepts(5));
    }

    #[test]
    fn only_duplicate_kinds_allow_duplicates() {
        let allowing = [
            Cardinality::ZeroOrMoreWithDuplicates,
            Cardinality::OneOrMoreWithDuplicates,
        ];
        for cardinality in [
            Cardinality::ExactlyOne,
            Cardinality::OneOrMore,
            Cardinality::OneOrMoreWithDuplicates,
            Cardinality::ZeroOrMore,
            Cardinality::ZeroOrMoreWithDuplicates,
            Cardinality::ZeroOrOne,
        ] {
            assert_eq!(
                cardinality.allows_duplicates(),
                allowing.contains(&cardinality),
                "{cardinality}"
            );
        }
    }

    #[test]
    fn inheritance_filters() {
        let except = AttributeInheritance::AllExcept(BTreeSet::from(["note".to_string()]));
        assert!(except.inherits("order"));
        assert!(!except.inherits("note"));

        let only = AttributeInheritance::OnlySpecified(BTreeSet::from(["order".to_string()]));
        assert!(only.inherits("order"));
        assert!(!only.inherits("note"));

        assert!(!AttributeInheritance::none().inherits("order"));
    }
}
