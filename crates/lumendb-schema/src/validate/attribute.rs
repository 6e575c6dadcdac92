use crate::{error::SchemaError, node::AttributeSchema};

/// Checks an attribute definition on its own.
pub fn check_attribute(attribute: &AttributeSchema) -> Result<(), SchemaError> {
    let name = &attribute.name;

    if attribute.sortable && attribute.value_type.is_array() {
        return Err(SchemaError::invalid_change(
            name,
            format!(
                "sortable attribute cannot be of array type `{}`",
                attribute.value_type
            ),
        ));
    }

    if attribute.sortable && !attribute.value_type.is_sortable() {
        return Err(SchemaError::invalid_change(
            name,
            format!(
                "sortable attribute type `{}` has no ordering",
                attribute.value_type
            ),
        ));
    }

    if let Some(default) = &attribute.default_value
        && !default.conforms_to(attribute.value_type)
    {
        return Err(SchemaError::invalid_change(
            name,
            format!(
                "default value `{default}` is not of type `{}`",
                attribute.value_type
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumendb_primitives::{Scalar, Value, ValueType};

    #[test]
    fn sortable_arrays_are_rejected() {
        let mut attribute = AttributeSchema::new("tags", ValueType::Array(Scalar::Text));
        attribute.sortable = true;

        assert!(matches!(
            check_attribute(&attribute),
            Err(SchemaError::InvalidSchemaChange { .. })
        ));
    }

    #[test]
    fn default_value_must_match_type() {
        let mut attribute = AttributeSchema::new("priority", ValueType::Scalar(Scalar::Int));
        attribute.default_value = Some(Value::Text("high".to_string()));
        assert!(check_attribute(&attribute).is_err());

        attribute.default_value = Some(Value::Int(1));
        assert!(check_attribute(&attribute).is_ok());
    }
}
