use lumendb_primitives::ValueType;
use lumendb_utils::NameVariants;
use serde::{Deserialize, Serialize};

///
/// AssociatedDataSchema
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AssociatedDataSchema {
    pub name: String,
    pub name_variants: NameVariants,
    pub value_type: ValueType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_notice: Option<String>,

    pub localized: bool,
    pub nullable: bool,
}

impl AssociatedDataSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();

        Self {
            name_variants: NameVariants::generate(&name),
            name,
            value_type,
            description: None,
            deprecation_notice: None,
            localized: false,
            nullable: false,
        }
    }
}
