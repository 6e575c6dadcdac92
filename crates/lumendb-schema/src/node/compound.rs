use crate::types::{AttributeElement, Scope};
use lumendb_utils::NameVariants;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// SortableAttributeCompoundSchema
///
/// Ordered tuple of attributes sorted together. Elements must name
/// existing non-array attributes of the same owner.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SortableAttributeCompoundSchema {
    pub name: String,
    pub name_variants: NameVariants,
    pub attribute_elements: Vec<AttributeElement>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_notice: Option<String>,

    pub indexed_in: BTreeSet<Scope>,
}

impl SortableAttributeCompoundSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, attribute_elements: Vec<AttributeElement>) -> Self {
        let name = name.into();

        Self {
            name_variants: NameVariants::generate(&name),
            name,
            attribute_elements,
            description: None,
            deprecation_notice: None,
            indexed_in: Scope::default_set(),
        }
    }

    #[must_use]
    pub fn references_attribute(&self, attribute: &str) -> bool {
        self.attribute_elements
            .iter()
            .any(|element| element.attribute_name == attribute)
    }
}
