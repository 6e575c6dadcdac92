use derive_more::{Deref, DerefMut};
use lumendb_primitives::{Value, ValueType};
use lumendb_utils::NameVariants;
use serde::{Deserialize, Serialize};

///
/// AttributeSchema
///
/// Shared by entity attributes, reference attributes and (wrapped)
/// catalog-level global attributes.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AttributeSchema {
    pub name: String,
    pub name_variants: NameVariants,
    pub value_type: ValueType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_notice: Option<String>,

    pub unique: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub localized: bool,
    pub nullable: bool,
    pub representative: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    pub indexed_decimal_places: u32,
}

impl AttributeSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();

        Self {
            name_variants: NameVariants::generate(&name),
            name,
            value_type,
            description: None,
            deprecation_notice: None,
            unique: false,
            filterable: false,
            sortable: false,
            localized: false,
            nullable: false,
            representative: false,
            default_value: None,
            indexed_decimal_places: 0,
        }
    }

    /// A value must be provided on entity creation.
    #[must_use]
    pub const fn is_mandatory(&self) -> bool {
        !self.nullable && self.default_value.is_none()
    }
}

///
/// GlobalAttributeSchema
///
/// Catalog-level attribute that entity schemas opt into by name.
///

#[derive(Clone, Debug, Deref, DerefMut, Deserialize, PartialEq, Serialize)]
pub struct GlobalAttributeSchema {
    #[deref]
    #[deref_mut]
    pub attribute: AttributeSchema,

    pub unique_globally: bool,
}

impl GlobalAttributeSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            attribute: AttributeSchema::new(name, value_type),
            unique_globally: false,
        }
    }
}
