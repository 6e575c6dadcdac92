use crate::{
    error::SchemaError,
    node::{AttributeSchema, SortableAttributeCompoundSchema},
};
use std::collections::BTreeSet;

/// Checks a compound against the attributes of its owner.
pub fn check_compound<'a>(
    compound: &SortableAttributeCompoundSchema,
    attribute: impl Fn(&str) -> Option<&'a AttributeSchema>,
) -> Result<(), SchemaError> {
    let name = &compound.name;
    if compound.attribute_elements.len() < 2 {
        return Err(SchemaError::compound(
            name,
            "a compound must consist of more than one attribute element",
        ));
    }

    let mut seen = BTreeSet::new();
    for element in &compound.attribute_elements {
        let attribute_name = element.attribute_name.as_str();
        if !seen.insert(attribute_name) {
            return Err(SchemaError::compound(
                name,
                format!("attribute `{attribute_name}` is listed more than once"),
            ));
        }

        match attribute(attribute_name) {
            None => {
                return Err(SchemaError::compound(
                    name,
                    format!("attribute `{attribute_name}` is not defined"),
                ));
            }
            Some(schema) if schema.value_type.is_array() => {
                return Err(SchemaError::compound(
                    name,
                    format!(
                        "attribute `{attribute_name}` is of array type `{}` and cannot be sorted",
                        schema.value_type
                    ),
                ));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Refuses to drop an attribute some compound still sorts by.
pub fn check_attribute_removal<'a>(
    attribute: &str,
    compounds: impl IntoIterator<Item = &'a SortableAttributeCompoundSchema>,
) -> Result<(), SchemaError> {
    match compounds
        .into_iter()
        .find(|compound| compound.references_attribute(attribute))
    {
        Some(compound) => Err(SchemaError::compound(
            &compound.name,
            format!(
                "attribute `{attribute}` cannot be removed while the compound refers to it, remove the compound first"
            ),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::attribute_element;
    use lumendb_primitives::{Scalar, ValueType};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn attributes() -> BTreeMap<String, AttributeSchema> {
        [
            AttributeSchema::new("code", ValueType::Scalar(Scalar::Text)),
            AttributeSchema::new("name", ValueType::Scalar(Scalar::Text)),
            AttributeSchema::new("tags", ValueType::Array(Scalar::Text)),
        ]
        .into_iter()
        .map(|a| (a.name.clone(), a))
        .collect()
    }

    #[test]
    fn valid_compound_passes() {
        let attributes = attributes();
        let compound = SortableAttributeCompoundSchema::new(
            "codeName",
            vec![attribute_element("code"), attribute_element("name").desc()],
        );

        assert!(check_compound(&compound, |n| attributes.get(n)).is_ok());
    }

    #[test]
    fn broken_compounds_are_rejected() {
        let attributes = attributes();
        let cases = [
            vec![attribute_element("code")],
            vec![attribute_element("code"), attribute_element("code")],
            vec![attribute_element("code"), attribute_element("missing")],
            vec![attribute_element("code"), attribute_element("tags")],
        ];

        for elements in cases {
            let compound = SortableAttributeCompoundSchema::new("broken", elements);
            assert!(matches!(
                check_compound(&compound, |n| attributes.get(n)),
                Err(SchemaError::SortableAttributeCompound { .. })
            ));
        }
    }

    #[test]
    fn removal_of_compound_member_is_refused() {
        let compound = SortableAttributeCompoundSchema::new(
            "codeName",
            vec![attribute_element("code"), attribute_element("name")],
        );

        assert!(check_attribute_removal("code", [&compound]).is_err());
        assert!(check_attribute_removal("tags", [&compound]).is_ok());
    }

    proptest! {
        #[test]
        fn compounds_repeating_an_attribute_are_rejected(
            picks in proptest::collection::vec(0usize..2, 3..6),
        ) {
            let attributes = attributes();
            let names = ["code", "name"];
            let elements = picks.iter().map(|&i| attribute_element(names[i])).collect();
            let compound = SortableAttributeCompoundSchema::new("picked", elements);

            prop_assert!(check_compound(&compound, |n| attributes.get(n)).is_err());
        }
    }
}
