use crate::{
    err,
    error::ErrorTree,
    node::{
        AttributeSchema, CatalogSchema, ReferenceSchema, SortableAttributeCompoundSchema,
        StandardReferenceSchema,
    },
    types::{AttributeInheritance, Cardinality},
};
use lumendb_utils::NameVariants;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

///
/// ReflectedReferenceSchema
///
/// Mirrors reference `reflected_reference_name` that entity type
/// `referenced_entity_type` holds towards the owner of this schema.
/// Every `None` property is read from the origin reference at access time.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReflectedReferenceSchema {
    pub name: String,
    pub name_variants: NameVariants,
    pub referenced_entity_type: String,
    pub reflected_reference_name: String,

    // overrides
    pub description: Option<String>,
    pub deprecation_notice: Option<String>,
    pub cardinality: Option<Cardinality>,
    pub indexed: Option<bool>,
    pub faceted: Option<bool>,

    pub attribute_inheritance: AttributeInheritance,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeSchema>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sortable_attribute_compounds: BTreeMap<String, SortableAttributeCompoundSchema>,

    #[serde(skip)]
    origin: Option<Arc<StandardReferenceSchema>>,
}

impl ReflectedReferenceSchema {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        referenced_entity_type: impl Into<String>,
        reflected_reference_name: impl Into<String>,
    ) -> Self {
        let name = name.into();

        Self {
            name_variants: NameVariants::generate(&name),
            name,
            referenced_entity_type: referenced_entity_type.into(),
            reflected_reference_name: reflected_reference_name.into(),
            description: None,
            deprecation_notice: None,
            cardinality: None,
            indexed: None,
            faceted: None,
            attribute_inheritance: AttributeInheritance::all(),
            attributes: BTreeMap::new(),
            sortable_attribute_compounds: BTreeMap::new(),
            origin: None,
        }
    }

    /// Same definition resolved against a (new) origin reference.
    #[must_use]
    pub fn with_referenced_schema(&self, origin: Arc<StandardReferenceSchema>) -> Self {
        Self {
            origin: Some(origin),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn without_referenced_schema(&self) -> Self {
        Self {
            origin: None,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn origin(&self) -> Option<&StandardReferenceSchema> {
        self.origin.as_deref()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.origin.is_some()
    }

    ///
    /// INHERITANCE
    ///

    #[must_use]
    pub const fn is_description_inherited(&self) -> bool {
        self.description.is_none()
    }

    #[must_use]
    pub const fn is_deprecation_inherited(&self) -> bool {
        self.deprecation_notice.is_none()
    }

    #[must_use]
    pub const fn is_cardinality_inherited(&self) -> bool {
        self.cardinality.is_none()
    }

    #[must_use]
    pub const fn is_faceted_inherited(&self) -> bool {
        self.faceted.is_none()
    }

    #[must_use]
    pub const fn is_indexed_inherited(&self) -> bool {
        self.indexed.is_none()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or_else(|| self.origin()?.description.as_deref())
    }

    #[must_use]
    pub fn deprecation_notice(&self) -> Option<&str> {
        self.deprecation_notice
            .as_deref()
            .or_else(|| self.origin()?.deprecation_notice.as_deref())
    }

    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
            .or_else(|| self.origin().map(|origin| origin.cardinality))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.indexed
            .or_else(|| self.origin().map(|origin| origin.indexed))
            .unwrap_or(true)
    }

    #[must_use]
    pub fn is_faceted(&self) -> bool {
        self.faceted
            .or_else(|| self.origin().map(|origin| origin.faceted))
            .unwrap_or(false)
    }

    /// Origin attributes selected by the inheritance filter.
    #[must_use]
    pub fn inherited_attributes(&self) -> BTreeMap<&str, &AttributeSchema> {
        self.origin()
            .map(|origin| {
                origin
                    .attributes
                    .iter()
                    .filter(|(name, _)| self.attribute_inheritance.inherits(name))
                    .map(|(name, attribute)| (name.as_str(), attribute))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Inherited attributes overlaid by the declared ones.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<&str, &AttributeSchema> {
        let mut attributes = self.inherited_attributes();
        for (name, attribute) in &self.attributes {
            attributes.insert(name.as_str(), attribute);
        }

        attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name).or_else(|| {
            self.attribute_inheritance
                .inherits(name)
                .then(|| self.origin()?.attributes.get(name))
                .flatten()
        })
    }

    /// Origin compounds whose attributes are all still visible here, plus
    /// the declared ones.
    #[must_use]
    pub fn sortable_attribute_compounds(&self) -> BTreeMap<&str, &SortableAttributeCompoundSchema> {
        let attributes = self.attributes();
        let mut compounds: BTreeMap<&str, &SortableAttributeCompoundSchema> = self
            .origin()
            .map(|origin| {
                origin
                    .sortable_attribute_compounds
                    .iter()
                    .filter(|(_, compound)| {
                        compound
                            .attribute_elements
                            .iter()
                            .all(|element| attributes.contains_key(element.attribute_name.as_str()))
                    })
                    .map(|(name, compound)| (name.as_str(), compound))
                    .collect()
            })
            .unwrap_or_default();

        for (name, compound) in &self.sortable_attribute_compounds {
            compounds.insert(name.as_str(), compound);
        }

        compounds
    }

    ///
    /// VALIDATION
    ///

    /// Check the reflection against the catalog it lives in. `owner` is the
    /// entity type holding this reflected reference.
    #[must_use]
    pub fn validate(&self, catalog: &CatalogSchema, owner: &str) -> ErrorTree {
        let mut errs = ErrorTree::new();
        let target = &self.referenced_entity_type;
        let reflected = &self.reflected_reference_name;

        let Some(target_schema) = catalog.entity_schema(target) else {
            err!(
                errs,
                "Referenced entity type `{target}` is not present in catalog `{}` schema!",
                catalog.name
            );
            return errs;
        };

        match target_schema.reference(reflected) {
            None => err!(
                errs,
                "Referenced entity type `{target}` doesn't contain reference `{reflected}`, which is reflected in reference `{}`!",
                self.name
            ),
            Some(origin) if origin.is_reflected() => err!(
                errs,
                "Reference `{reflected}` in entity type `{target}` is itself a reflected reference and cannot be reflected again!"
            ),
            Some(origin) if origin.referenced_entity_type() != owner => err!(
                errs,
                "Referenced entity type `{target}` contains reference `{reflected}`, but it targets different entity type `{}` (expected `{owner}`)!",
                origin.referenced_entity_type()
            ),
            Some(origin) if !origin.is_referenced_entity_type_managed() => err!(
                errs,
                "Referenced entity type `{target}` contains reference `{reflected}`, but it's not managed entity type!"
            ),
            Some(origin) => self.validate_duplicates(origin, &mut errs),
        }

        errs
    }

    fn validate_duplicates(&self, origin: &ReferenceSchema, errs: &mut ErrorTree) {
        if !origin.cardinality().allows_duplicates() {
            return;
        }

        if !self.cardinality().allows_duplicates() {
            err!(
                errs,
                "Reflected reference `{}` cannot disallow duplicates, because the original reflected reference `{}` in entity `{}` allows them!",
                self.name,
                self.reflected_reference_name,
                self.referenced_entity_type
            );
        }

        let attributes = self.attributes();
        let missing: Vec<&str> = origin
            .attributes()
            .into_values()
            .filter(|attribute| attribute.representative)
            .map(|attribute| attribute.name.as_str())
            .filter(|name| !attributes.contains_key(name))
            .collect();

        if !missing.is_empty() {
            err!(
                errs,
                "Reflected reference `{}` must contain all representative attributes of the original reflected reference `{}` in entity `{}`! Missing representative attributes: {}",
                self.name,
                self.reflected_reference_name,
                self.referenced_entity_type,
                missing.join(", ")
            );
        }
    }
}

impl PartialEq for ReflectedReferenceSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.referenced_entity_type == other.referenced_entity_type
            && self.reflected_reference_name == other.reflected_reference_name
            && self.description == other.description
            && self.deprecation_notice == other.deprecation_notice
            && self.cardinality == other.cardinality
            && self.indexed == other.indexed
            && self.faceted == other.faceted
            && self.attribute_inheritance == other.attribute_inheritance
            && self.attributes == other.attributes
            && self.sortable_attribute_compounds == other.sortable_attribute_compounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::attribute_element;
    use lumendb_primitives::{Scalar, ValueType};
    use std::collections::BTreeSet;

    fn origin() -> Arc<StandardReferenceSchema> {
        let mut origin =
            StandardReferenceSchema::new("categories", "CATEGORY", true, Cardinality::ZeroOrMore);
        origin.description = Some("Product categories".to_string());
        origin.faceted = true;
        for name in ["order", "note", "label"] {
            origin.attributes.insert(
                name.to_string(),
                AttributeSchema::new(name, ValueType::Scalar(Scalar::Int)),
            );
        }
        origin.sortable_attribute_compounds.insert(
            "orderNote".to_string(),
            SortableAttributeCompoundSchema::new(
                "orderNote",
                vec![attribute_element("order"), attribute_element("note")],
            ),
        );

        Arc::new(origin)
    }

    #[test]
    fn inherited_properties_follow_the_origin() {
        let reflected = ReflectedReferenceSchema::new("products", "PRODUCT", "categories")
            .with_referenced_schema(origin());

        assert_eq!(reflected.description(), Some("Product categories"));
        assert!(reflected.is_faceted());
        assert_eq!(reflected.cardinality(), Cardinality::ZeroOrMore);

        let mut changed = (*origin()).clone();
        changed.description = Some("Changed".to_string());
        changed.cardinality = Cardinality::OneOrMore;
        let reflected = reflected.with_referenced_schema(Arc::new(changed));

        assert_eq!(reflected.description(), Some("Changed"));
        assert_eq!(reflected.cardinality(), Cardinality::OneOrMore);
    }

    #[test]
    fn overrides_win_over_origin() {
        let mut reflected = ReflectedReferenceSchema::new("products", "PRODUCT", "categories");
        reflected.description = Some("Own".to_string());
        reflected.faceted = Some(false);
        let reflected = reflected.with_referenced_schema(origin());

        assert_eq!(reflected.description(), Some("Own"));
        assert!(!reflected.is_faceted());
        assert!(!reflected.is_description_inherited());
        assert!(reflected.is_cardinality_inherited());
    }

    #[test]
    fn attribute_inheritance_modes() {
        let mut reflected = ReflectedReferenceSchema::new("products", "PRODUCT", "categories");

        reflected.attribute_inheritance = AttributeInheritance::all();
        let all = reflected.with_referenced_schema(origin());
        assert_eq!(all.attributes().len(), 3);
        assert_eq!(all.sortable_attribute_compounds().len(), 1);

        reflected.attribute_inheritance =
            AttributeInheritance::AllExcept(BTreeSet::from(["note".to_string()]));
        let except = reflected.with_referenced_schema(origin());
        assert!(except.attribute("note").is_none());
        assert!(except.attribute("order").is_some());
        assert!(except.sortable_attribute_compounds().is_empty());

        reflected.attribute_inheritance =
            AttributeInheritance::OnlySpecified(BTreeSet::from(["label".to_string()]));
        let only = reflected.with_referenced_schema(origin());
        assert_eq!(only.attributes().keys().copied().collect::<Vec<_>>(), vec!["label"]);

        reflected.attribute_inheritance = AttributeInheritance::none();
        reflected.attributes.insert(
            "own".to_string(),
            AttributeSchema::new("own", ValueType::Scalar(Scalar::Text)),
        );
        let none = reflected.with_referenced_schema(origin());
        assert_eq!(none.attributes().keys().copied().collect::<Vec<_>>(), vec!["own"]);
    }

    #[test]
    fn equality_ignores_resolved_origin() {
        let plain = ReflectedReferenceSchema::new("products", "PRODUCT", "categories");
        let resolved = plain.with_referenced_schema(origin());

        assert_eq!(plain, resolved);
    }
}
