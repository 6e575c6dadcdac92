use crate::{
    build::{
        AttributeSchemaBuilder, SortableAttributeCompoundSchemaBuilder, member::Members,
    },
    error::SchemaError,
    node::{ReflectedReferenceSchema, StandardReferenceSchema},
    types::{AttributeElement, AttributeInheritance, Cardinality},
};
use lumendb_primitives::ValueType;
use std::collections::BTreeSet;

///
/// ReferenceSchemaBuilder
///

#[derive(Clone, Debug)]
pub struct ReferenceSchemaBuilder {
    owner: String,
    schema: StandardReferenceSchema,
}

impl ReferenceSchemaBuilder {
    pub(crate) fn new(entity: &str, schema: StandardReferenceSchema) -> Self {
        Self {
            owner: format!("{entity}.{}", schema.name),
            schema,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.schema.description = Some(description.into());
        self
    }

    pub fn deprecated(&mut self, notice: impl Into<String>) -> &mut Self {
        self.schema.deprecation_notice = Some(notice.into());
        self
    }

    pub fn not_deprecated(&mut self) -> &mut Self {
        self.schema.deprecation_notice = None;
        self
    }

    /// Group type living outside of the catalog.
    pub fn with_group_type(&mut self, group_type: impl Into<String>) -> &mut Self {
        self.schema.referenced_group_type = Some(group_type.into());
        self.schema.referenced_group_type_managed = false;
        self
    }

    /// Group type that is an entity collection of the same catalog.
    pub fn with_group_type_related_to_entity(
        &mut self,
        group_type: impl Into<String>,
    ) -> &mut Self {
        self.schema.referenced_group_type = Some(group_type.into());
        self.schema.referenced_group_type_managed = true;
        self
    }

    pub fn without_group_type(&mut self) -> &mut Self {
        self.schema.referenced_group_type = None;
        self.schema.referenced_group_type_managed = false;
        self
    }

    pub const fn indexed(&mut self) -> &mut Self {
        self.schema.indexed = true;
        self
    }

    /// Also drops faceting, which needs the index.
    pub const fn non_indexed(&mut self) -> &mut Self {
        self.schema.indexed = false;
        self.schema.faceted = false;
        self
    }

    pub const fn faceted(&mut self) -> &mut Self {
        self.schema.indexed = true;
        self.schema.faceted = true;
        self
    }

    pub const fn non_faceted(&mut self) -> &mut Self {
        self.schema.faceted = false;
        self
    }

    pub fn with_attribute(
        &mut self,
        name: &str,
        value_type: ValueType,
        configure: impl FnOnce(&mut AttributeSchemaBuilder),
    ) -> Result<&mut Self, SchemaError> {
        let attribute = Members::of(
            &self.owner,
            &self.schema.attributes,
            &self.schema.sortable_attribute_compounds,
        )
        .configure_attribute(name, value_type, configure)?;

        if let Some(attribute) = attribute {
            self.schema
                .attributes
                .insert(attribute.name.clone(), attribute);
        }

        Ok(self)
    }

    pub fn without_attribute(&mut self, name: &str) -> Result<&mut Self, SchemaError> {
        Members::of(
            &self.owner,
            &self.schema.attributes,
            &self.schema.sortable_attribute_compounds,
        )
        .check_removal(name)?;
        self.schema.attributes.remove(name);

        Ok(self)
    }

    pub fn with_sortable_attribute_compound(
        &mut self,
        name: &str,
        elements: impl IntoIterator<Item = AttributeElement>,
        configure: impl FnOnce(&mut SortableAttributeCompoundSchemaBuilder),
    ) -> Result<&mut Self, SchemaError> {
        let compound = Members::of(
            &self.owner,
            &self.schema.attributes,
            &self.schema.sortable_attribute_compounds,
        )
        .configure_compound(name, elements.into_iter().collect(), configure)?;

        if let Some(compound) = compound {
            self.schema
                .sortable_attribute_compounds
                .insert(compound.name.clone(), compound);
        }

        Ok(self)
    }

    pub fn without_sortable_attribute_compound(&mut self, name: &str) -> &mut Self {
        self.schema.sortable_attribute_compounds.remove(name);
        self
    }

    #[must_use]
    pub fn into_schema(self) -> StandardReferenceSchema {
        self.schema
    }

    pub(crate) fn retarget(
        &mut self,
        entity_type: &str,
        managed: bool,
        cardinality: Cardinality,
    ) -> &mut Self {
        entity_type.clone_into(&mut self.schema.referenced_entity_type);
        self.schema.referenced_entity_type_managed = managed;
        self.schema.cardinality = cardinality;
        self
    }
}

///
/// ReflectedReferenceSchemaBuilder
///
/// Each property is inherited from the origin until it is set here, and
/// goes back to inherited through the matching `*_inherited` method.
///

#[derive(Clone, Debug)]
pub struct ReflectedReferenceSchemaBuilder {
    owner: String,
    schema: ReflectedReferenceSchema,
}

impl ReflectedReferenceSchemaBuilder {
    pub(crate) fn new(entity: &str, schema: ReflectedReferenceSchema) -> Self {
        Self {
            owner: format!("{entity}.{}", schema.name),
            schema,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.schema.description = Some(description.into());
        self
    }

    pub fn with_description_inherited(&mut self) -> &mut Self {
        self.schema.description = None;
        self
    }

    pub fn deprecated(&mut self, notice: impl Into<String>) -> &mut Self {
        self.schema.deprecation_notice = Some(notice.into());
        self
    }

    pub fn with_deprecated_inherited(&mut self) -> &mut Self {
        self.schema.deprecation_notice = None;
        self
    }

    pub const fn with_cardinality(&mut self, cardinality: Cardinality) -> &mut Self {
        self.schema.cardinality = Some(cardinality);
        self
    }

    pub const fn with_cardinality_inherited(&mut self) -> &mut Self {
        self.schema.cardinality = None;
        self
    }

    pub const fn indexed(&mut self) -> &mut Self {
        self.schema.indexed = Some(true);
        self
    }

    pub const fn non_indexed(&mut self) -> &mut Self {
        self.schema.indexed = Some(false);
        self.schema.faceted = Some(false);
        self
    }

    pub const fn with_indexed_inherited(&mut self) -> &mut Self {
        self.schema.indexed = None;
        self
    }

    pub const fn faceted(&mut self) -> &mut Self {
        self.schema.faceted = Some(true);
        self
    }

    pub const fn non_faceted(&mut self) -> &mut Self {
        self.schema.faceted = Some(false);
        self
    }

    pub const fn with_faceted_inherited(&mut self) -> &mut Self {
        self.schema.faceted = None;
        self
    }

    /// Inherit every attribute of the origin reference.
    pub fn with_attributes_inherited(&mut self) -> &mut Self {
        self.schema.attribute_inheritance = AttributeInheritance::all();
        self
    }

    /// Inherit only the named attributes.
    pub fn with_attributes_inherited_only<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.attribute_inheritance = AttributeInheritance::OnlySpecified(collect(names));
        self
    }

    /// Inherit every attribute but the named ones.
    pub fn with_attributes_inherited_except<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.attribute_inheritance = AttributeInheritance::AllExcept(collect(names));
        self
    }

    pub fn without_attributes_inherited(&mut self) -> &mut Self {
        self.schema.attribute_inheritance = AttributeInheritance::none();
        self
    }

    /// Declared attributes are present whatever the inheritance mode.
    pub fn with_attribute(
        &mut self,
        name: &str,
        value_type: ValueType,
        configure: impl FnOnce(&mut AttributeSchemaBuilder),
    ) -> Result<&mut Self, SchemaError> {
        let attribute = Members::new(
            &self.owner,
            self.schema.attributes(),
            self.schema.sortable_attribute_compounds(),
        )
        .configure_attribute(name, value_type, configure)?;

        if let Some(attribute) = attribute {
            self.schema
                .attributes
                .insert(attribute.name.clone(), attribute);
        }

        Ok(self)
    }

    /// Drops a declared attribute. Inherited ones are controlled through
    /// the inheritance mode.
    pub fn without_attribute(&mut self, name: &str) -> Result<&mut Self, SchemaError> {
        Members::new(
            &self.owner,
            self.schema.attributes(),
            self.schema.sortable_attribute_compounds(),
        )
        .check_removal(name)?;
        self.schema.attributes.remove(name);

        Ok(self)
    }

    pub fn with_sortable_attribute_compound(
        &mut self,
        name: &str,
        elements: impl IntoIterator<Item = AttributeElement>,
        configure: impl FnOnce(&mut SortableAttributeCompoundSchemaBuilder),
    ) -> Result<&mut Self, SchemaError> {
        let compound = Members::new(
            &self.owner,
            self.schema.attributes(),
            self.schema.sortable_attribute_compounds(),
        )
        .configure_compound(name, elements.into_iter().collect(), configure)?;

        if let Some(compound) = compound {
            self.schema
                .sortable_attribute_compounds
                .insert(compound.name.clone(), compound);
        }

        Ok(self)
    }

    pub fn without_sortable_attribute_compound(&mut self, name: &str) -> &mut Self {
        self.schema.sortable_attribute_compounds.remove(name);
        self
    }

    #[must_use]
    pub fn into_schema(self) -> ReflectedReferenceSchema {
        self.schema
    }
}

fn collect<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}
