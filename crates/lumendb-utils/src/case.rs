use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

///
/// NamingConvention
///
/// The fixed set of conventions every schema member name is projected into.
/// Two names collide when any of their projections are equal.
///

#[remain::sorted]
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum NamingConvention {
    CamelCase,
    KebabCase,
    PascalCase,
    SnakeCase,
    UpperSnakeCase,
}

impl NamingConvention {
    pub const ALL: [Self; 5] = [
        Self::CamelCase,
        Self::PascalCase,
        Self::SnakeCase,
        Self::UpperSnakeCase,
        Self::KebabCase,
    ];

    /// Project a name into this convention.
    #[must_use]
    pub fn convert(self, name: &str) -> String {
        match self {
            Self::CamelCase => name.to_case(Case::Camel),
            Self::KebabCase => name.to_case(Case::Kebab),
            Self::PascalCase => name.to_case(Case::Pascal),
            Self::SnakeCase => name.to_case(Case::Snake),
            Self::UpperSnakeCase => name.to_case(Case::Snake).to_uppercase(),
        }
    }

    /// Whether the name is already written in this convention.
    #[must_use]
    pub fn is_case(self, name: &str) -> bool {
        self.convert(name) == name
    }
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CamelCase => "camelCase",
            Self::KebabCase => "kebab-case",
            Self::PascalCase => "PascalCase",
            Self::SnakeCase => "snake_case",
            Self::UpperSnakeCase => "UPPER_SNAKE_CASE",
        };

        f.write_str(label)
    }
}

///
/// NameVariants
///
/// Precomputed projections of a single canonical name.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NameVariants(BTreeMap<NamingConvention, String>);

impl NameVariants {
    #[must_use]
    pub fn generate(name: &str) -> Self {
        Self(
            NamingConvention::ALL
                .iter()
                .map(|convention| (*convention, convention.convert(name)))
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, convention: NamingConvention) -> Option<&str> {
        self.0.get(&convention).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NamingConvention, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// First convention under which both names project to the same string.
    #[must_use]
    pub fn conflict_with(&self, other: &Self) -> Option<(NamingConvention, &str)> {
        self.iter()
            .find(|(convention, variant)| other.get(*convention) == Some(*variant))
    }

    /// Whether `name` matches any projection, used by by-name lookups.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.0.values().any(|variant| variant == name)
    }
}
