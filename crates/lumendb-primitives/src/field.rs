use crate::{Currency, DateTimeRange, Locale, Scalar, Value, ValueType};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

///
/// FieldValue
///
/// Conversion boundary between Rust field types and stored values.
/// `value_type` lets the analyzer infer a schema type from a field.
///

pub trait FieldValue: Sized {
    fn value_type() -> ValueType;

    fn to_value(&self) -> Value;

    #[must_use]
    fn from_value(value: &Value) -> Option<Self>;
}

impl_field_value!(
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    Decimal => Decimal,
    DateTimeRange => DateTimeRange,
    DateTime<FixedOffset> => DateTime,
);

impl FieldValue for String {
    fn value_type() -> ValueType {
        ValueType::scalar(Scalar::Text)
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(ToString::to_string)
    }
}

impl FieldValue for Locale {
    fn value_type() -> ValueType {
        ValueType::scalar(Scalar::Locale)
    }

    fn to_value(&self) -> Value {
        Value::Locale(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Locale(v) => Some(v.clone()),
            Value::Text(v) => Some(Self::new(v.as_str())),
            _ => None,
        }
    }
}

impl From<Locale> for Value {
    fn from(v: Locale) -> Self {
        Self::Locale(v)
    }
}

impl FieldValue for Currency {
    fn value_type() -> ValueType {
        ValueType::scalar(Scalar::Currency)
    }

    fn to_value(&self) -> Value {
        Value::Currency(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Currency(v) => Some(v.clone()),
            Value::Text(v) => Some(Self::new(v)),
            _ => None,
        }
    }
}

impl From<Currency> for Value {
    fn from(v: Currency) -> Self {
        Self::Currency(v)
    }
}

impl FieldValue for serde_json::Value {
    fn value_type() -> ValueType {
        ValueType::scalar(Scalar::Complex)
    }

    fn to_value(&self) -> Value {
        Value::Complex(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.to_json().ok()
    }
}

fn array_type<T: FieldValue>() -> ValueType {
    ValueType::array(T::value_type().element())
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn value_type() -> ValueType {
        array_type::<T>()
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            // a scalar read through an array-shaped field
            scalar => T::from_value(scalar).map(|v| vec![v]),
        }
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn value_type() -> ValueType {
        array_type::<T>()
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: &Value) -> Option<Self> {
        Vec::<T>::from_value(value).map(|items| items.into_iter().collect())
    }
}
