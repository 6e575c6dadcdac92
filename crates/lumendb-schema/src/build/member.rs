use crate::{
    build::{AttributeSchemaBuilder, SortableAttributeCompoundSchemaBuilder},
    error::SchemaError,
    node::{AttributeSchema, SortableAttributeCompoundSchema},
    types::AttributeElement,
    validate::{
        attribute::check_attribute,
        compound::{check_attribute_removal, check_compound},
        naming::{find_any_conflict, find_conflict},
    },
};
use lumendb_primitives::ValueType;
use std::collections::BTreeMap;

///
/// Members
///
/// Attributes and compounds visible on one owner (entity or reference),
/// which share a single naming namespace.
///

pub(super) struct Members<'a> {
    owner: &'a str,
    attributes: BTreeMap<&'a str, &'a AttributeSchema>,
    compounds: BTreeMap<&'a str, &'a SortableAttributeCompoundSchema>,
}

impl<'a> Members<'a> {
    pub fn new(
        owner: &'a str,
        attributes: BTreeMap<&'a str, &'a AttributeSchema>,
        compounds: BTreeMap<&'a str, &'a SortableAttributeCompoundSchema>,
    ) -> Self {
        Self {
            owner,
            attributes,
            compounds,
        }
    }

    pub fn of(
        owner: &'a str,
        attributes: &'a BTreeMap<String, AttributeSchema>,
        compounds: &'a BTreeMap<String, SortableAttributeCompoundSchema>,
    ) -> Self {
        Self::new(
            owner,
            attributes.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            compounds.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        )
    }

    pub fn attribute(&self, name: &str) -> Option<&'a AttributeSchema> {
        self.attributes.get(name).copied()
    }

    /// Configure a new or existing attribute. `None` means unchanged.
    pub fn configure_attribute(
        &self,
        name: &str,
        value_type: ValueType,
        configure: impl FnOnce(&mut AttributeSchemaBuilder),
    ) -> Result<Option<AttributeSchema>, SchemaError> {
        let mut builder = self
            .attribute(name)
            .filter(|existing| existing.value_type == value_type)
            .map_or_else(
                || AttributeSchemaBuilder::new(name, value_type),
                |existing| AttributeSchemaBuilder::from(existing.clone()),
            );
        configure(&mut builder);

        self.accept_attribute(builder.into_schema())
    }

    /// Validate a complete attribute definition. `None` means unchanged.
    pub fn accept_attribute(
        &self,
        attribute: AttributeSchema,
    ) -> Result<Option<AttributeSchema>, SchemaError> {
        let name = attribute.name.as_str();
        let existing = self.attribute(name);

        if let Some(existing) = existing
            && existing.value_type != attribute.value_type
        {
            return Err(SchemaError::invalid_change(
                name,
                format!(
                    "type `{}` of the attribute in `{}` cannot be changed to `{}`",
                    existing.value_type, self.owner, attribute.value_type
                ),
            ));
        }
        check_attribute(&attribute)?;

        let variants = &attribute.name_variants;
        let conflict = find_conflict(name, variants, self.attributes.values().copied())
            .or_else(|| find_any_conflict(variants, self.compounds.values().copied()));
        if let Some(conflict) = conflict {
            return Err(SchemaError::AttributeAlreadyPresentInEntitySchema {
                owner: self.owner.to_string(),
                name: name.to_string(),
                conflict: Some(conflict),
            });
        }

        Ok((existing != Some(&attribute)).then_some(attribute))
    }

    pub fn check_removal(&self, attribute: &str) -> Result<(), SchemaError> {
        check_attribute_removal(attribute, self.compounds.values().copied())
    }

    /// Configure a new or existing compound. `None` means unchanged.
    pub fn configure_compound(
        &self,
        name: &str,
        elements: Vec<AttributeElement>,
        configure: impl FnOnce(&mut SortableAttributeCompoundSchemaBuilder),
    ) -> Result<Option<SortableAttributeCompoundSchema>, SchemaError> {
        let existing = self.compounds.get(name).copied();
        if let Some(existing) = existing
            && existing.attribute_elements != elements
        {
            return Err(SchemaError::AttributeAlreadyPresentInEntitySchema {
                owner: self.owner.to_string(),
                name: name.to_string(),
                conflict: None,
            });
        }

        let schema = existing
            .cloned()
            .unwrap_or_else(|| SortableAttributeCompoundSchema::new(name, elements));
        let mut builder = SortableAttributeCompoundSchemaBuilder::from(schema);
        configure(&mut builder);
        let compound = builder.into_schema();

        check_compound(&compound, |attribute| self.attribute(attribute))?;

        let variants = &compound.name_variants;
        let conflict = find_conflict(name, variants, self.compounds.values().copied())
            .or_else(|| find_any_conflict(variants, self.attributes.values().copied()));
        if let Some(conflict) = conflict {
            return Err(SchemaError::AttributeAlreadyPresentInEntitySchema {
                owner: self.owner.to_string(),
                name: name.to_string(),
                conflict: Some(conflict),
            });
        }

        Ok((existing != Some(&compound)).then_some(compound))
    }
}
