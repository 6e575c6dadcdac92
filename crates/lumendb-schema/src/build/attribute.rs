use crate::{
    node::{
        AssociatedDataSchema, AttributeSchema, GlobalAttributeSchema,
        SortableAttributeCompoundSchema,
    },
    types::Scope,
};
use lumendb_primitives::{Value, ValueType};

///
/// AttributeSchemaBuilder
///
/// Flags start off, calling a method switches the trait on.
///

#[derive(Clone, Debug)]
pub struct AttributeSchemaBuilder {
    schema: AttributeSchema,
}

impl AttributeSchemaBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            schema: AttributeSchema::new(name, value_type),
        }
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

    pub const fn unique(&mut self) -> &mut Self {
        self.schema.unique = true;
        self
    }

    pub const fn filterable(&mut self) -> &mut Self {
        self.schema.filterable = true;
        self
    }

    pub const fn sortable(&mut self) -> &mut Self {
        self.schema.sortable = true;
        self
    }

    pub const fn localized(&mut self) -> &mut Self {
        self.schema.localized = true;
        self
    }

    pub const fn nullable(&mut self) -> &mut Self {
        self.schema.nullable = true;
        self
    }

    pub const fn representative(&mut self) -> &mut Self {
        self.schema.representative = true;
        self
    }

    pub fn with_default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.schema.default_value = Some(value.into());
        self
    }

    pub const fn indexed_decimal_places(&mut self, places: u32) -> &mut Self {
        self.schema.indexed_decimal_places = places;
        self
    }

    #[must_use]
    pub fn into_schema(self) -> AttributeSchema {
        self.schema
    }
}

impl From<AttributeSchema> for AttributeSchemaBuilder {
    fn from(schema: AttributeSchema) -> Self {
        Self { schema }
    }
}

///
/// GlobalAttributeSchemaBuilder
///

#[derive(Clone, Debug)]
pub struct GlobalAttributeSchemaBuilder {
    attribute: AttributeSchemaBuilder,
    unique_globally: bool,
}

impl GlobalAttributeSchemaBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        GlobalAttributeSchema::new(name, value_type).into()
    }

    /// Per-attribute settings shared with entity attributes.
    pub const fn attribute(&mut self) -> &mut AttributeSchemaBuilder {
        &mut self.attribute
    }

    /// Values must be unique across all entity types of the catalog.
    pub const fn unique_globally(&mut self) -> &mut Self {
        self.unique_globally = true;
        self
    }

    #[must_use]
    pub fn into_schema(self) -> GlobalAttributeSchema {
        let mut attribute = self.attribute.into_schema();
        if self.unique_globally {
            attribute.unique = true;
        }

        GlobalAttributeSchema {
            attribute,
            unique_globally: self.unique_globally,
        }
    }
}

impl From<GlobalAttributeSchema> for GlobalAttributeSchemaBuilder {
    fn from(schema: GlobalAttributeSchema) -> Self {
        Self {
            attribute: schema.attribute.into(),
            unique_globally: schema.unique_globally,
        }
    }
}

///
/// AssociatedDataSchemaBuilder
///

#[derive(Clone, Debug)]
pub struct AssociatedDataSchemaBuilder {
    schema: AssociatedDataSchema,
}

impl AssociatedDataSchemaBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            schema: AssociatedDataSchema::new(name, value_type),
        }
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.schema.description = Some(description.into());
        self
    }

    pub fn deprecated(&mut self, notice: impl Into<String>) -> &mut Self {
        self.schema.deprecation_notice = Some(notice.into());
        self
    }

    pub const fn localized(&mut self) -> &mut Self {
        self.schema.localized = true;
        self
    }

    pub const fn nullable(&mut self) -> &mut Self {
        self.schema.nullable = true;
        self
    }

    #[must_use]
    pub fn into_schema(self) -> AssociatedDataSchema {
        self.schema
    }
}

impl From<AssociatedDataSchema> for AssociatedDataSchemaBuilder {
    fn from(schema: AssociatedDataSchema) -> Self {
        Self { schema }
    }
}

///
/// SortableAttributeCompoundSchemaBuilder
///

#[derive(Clone, Debug)]
pub struct SortableAttributeCompoundSchemaBuilder {
    schema: SortableAttributeCompoundSchema,
}

impl SortableAttributeCompoundSchemaBuilder {
    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.schema.description = Some(description.into());
        self
    }

    pub fn deprecated(&mut self, notice: impl Into<String>) -> &mut Self {
        self.schema.deprecation_notice = Some(notice.into());
        self
    }

    pub fn indexed_in(&mut self, scopes: &[Scope]) -> &mut Self {
        self.schema.indexed_in = scopes.iter().copied().collect();
        self
    }

    #[must_use]
    pub fn into_schema(self) -> SortableAttributeCompoundSchema {
        self.schema
    }
}

impl From<SortableAttributeCompoundSchema> for SortableAttributeCompoundSchemaBuilder {
    fn from(schema: SortableAttributeCompoundSchema) -> Self {
        Self { schema }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumendb_primitives::Scalar;

    #[test]
    fn attribute_flags_accumulate() {
        let mut builder = AttributeSchemaBuilder::new("code", ValueType::Scalar(Scalar::Text));
        builder.unique().filterable().sortable().with_description("Product code");
        let schema = builder.into_schema();

        assert!(schema.unique && schema.filterable && schema.sortable);
        assert!(!schema.localized);
        assert_eq!(schema.description.as_deref(), Some("Product code"));
    }

    #[test]
    fn global_uniqueness_implies_local_uniqueness() {
        let mut builder = GlobalAttributeSchemaBuilder::new("url", ValueType::Scalar(Scalar::Text));
        builder.unique_globally().attribute().localized();
        let schema = builder.into_schema();

        assert!(schema.unique_globally);
        assert!(schema.unique);
        assert!(schema.localized);
    }
}
