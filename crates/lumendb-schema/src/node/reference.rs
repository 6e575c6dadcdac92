use crate::{
    node::{AttributeSchema, NamedSchema, ReflectedReferenceSchema, SortableAttributeCompoundSchema},
    types::Cardinality,
};
use lumendb_utils::{NameVariants, NamingConvention};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// StandardReferenceSchema
///
/// A reference owned by its entity. The referenced type is managed when
/// it is an entity collection of the same catalog.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StandardReferenceSchema {
    pub name: String,
    pub name_variants: NameVariants,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_notice: Option<String>,

    pub cardinality: Cardinality,
    pub referenced_entity_type: String,
    pub referenced_entity_type_managed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_group_type: Option<String>,
    pub referenced_group_type_managed: bool,

    pub indexed: bool,
    pub faceted: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeSchema>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sortable_attribute_compounds: BTreeMap<String, SortableAttributeCompoundSchema>,
}

impl StandardReferenceSchema {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        referenced_entity_type: impl Into<String>,
        referenced_entity_type_managed: bool,
        cardinality: Cardinality,
    ) -> Self {
        let name = name.into();

        Self {
            name_variants: NameVariants::generate(&name),
            name,
            description: None,
            deprecation_notice: None,
            cardinality,
            referenced_entity_type: referenced_entity_type.into(),
            referenced_entity_type_managed,
            referenced_group_type: None,
            referenced_group_type_managed: false,
            indexed: false,
            faceted: false,
            attributes: BTreeMap::new(),
            sortable_attribute_compounds: BTreeMap::new(),
        }
    }
}

///
/// ReferenceSchema
///
/// Either an ordinary reference or a reflection of a reference that
/// another entity type holds towards this one.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum ReferenceSchema {
    Reflected(ReflectedReferenceSchema),
    Standard(StandardReferenceSchema),
}

impl ReferenceSchema {
    #[must_use]
    pub const fn is_reflected(&self) -> bool {
        matches!(self, Self::Reflected(_))
    }

    #[must_use]
    pub const fn as_standard(&self) -> Option<&StandardReferenceSchema> {
        match self {
            Self::Standard(schema) => Some(schema),
            Self::Reflected(_) => None,
        }
    }

    #[must_use]
    pub const fn as_reflected(&self) -> Option<&ReflectedReferenceSchema> {
        match self {
            Self::Reflected(schema) => Some(schema),
            Self::Standard(_) => None,
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Standard(s) => s.description.as_deref(),
            Self::Reflected(r) => r.description(),
        }
    }

    #[must_use]
    pub fn deprecation_notice(&self) -> Option<&str> {
        match self {
            Self::Standard(s) => s.deprecation_notice.as_deref(),
            Self::Reflected(r) => r.deprecation_notice(),
        }
    }

    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::Standard(s) => s.cardinality,
            Self::Reflected(r) => r.cardinality(),
        }
    }

    #[must_use]
    pub fn referenced_entity_type(&self) -> &str {
        match self {
            Self::Standard(s) => &s.referenced_entity_type,
            Self::Reflected(r) => &r.referenced_entity_type,
        }
    }

    #[must_use]
    pub const fn is_referenced_entity_type_managed(&self) -> bool {
        match self {
            Self::Standard(s) => s.referenced_entity_type_managed,
            Self::Reflected(_) => true,
        }
    }

    #[must_use]
    pub fn referenced_group_type(&self) -> Option<&str> {
        match self {
            Self::Standard(s) => s.referenced_group_type.as_deref(),
            Self::Reflected(_) => None,
        }
    }

    #[must_use]
    pub const fn is_referenced_group_type_managed(&self) -> bool {
        match self {
            Self::Standard(s) => s.referenced_group_type_managed,
            Self::Reflected(_) => false,
        }
    }

    #[must_use]
    pub fn is_indexed(&self) -> bool {
        match self {
            Self::Standard(s) => s.indexed,
            Self::Reflected(r) => r.is_indexed(),
        }
    }

    #[must_use]
    pub fn is_faceted(&self) -> bool {
        match self {
            Self::Standard(s) => s.faceted,
            Self::Reflected(r) => r.is_faceted(),
        }
    }

    /// Effective attributes, including inherited ones for reflections.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<&str, &AttributeSchema> {
        match self {
            Self::Standard(s) => s
                .attributes
                .iter()
                .map(|(name, attribute)| (name.as_str(), attribute))
                .collect(),
            Self::Reflected(r) => r.attributes(),
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        match self {
            Self::Standard(s) => s.attributes.get(name),
            Self::Reflected(r) => r.attribute(name),
        }
    }

    #[must_use]
    pub fn attribute_by_name(
        &self,
        name: &str,
        convention: NamingConvention,
    ) -> Option<&AttributeSchema> {
        self.attributes()
            .into_values()
            .find(|attribute| attribute.name_variants.get(convention) == Some(name))
    }

    #[must_use]
    pub fn sortable_attribute_compounds(&self) -> BTreeMap<&str, &SortableAttributeCompoundSchema> {
        match self {
            Self::Standard(s) => s
                .sortable_attribute_compounds
                .iter()
                .map(|(name, compound)| (name.as_str(), compound))
                .collect(),
            Self::Reflected(r) => r.sortable_attribute_compounds(),
        }
    }
}

impl NamedSchema for ReferenceSchema {
    fn name(&self) -> &str {
        match self {
            Self::Standard(s) => &s.name,
            Self::Reflected(r) => &r.name,
        }
    }

    fn name_variants(&self) -> &NameVariants {
        match self {
            Self::Standard(s) => &s.name_variants,
            Self::Reflected(r) => &r.name_variants,
        }
    }
}
