use crate::{Currency, DateTimeRange, Locale};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error as ThisError;

///
/// ValueError
///

#[derive(Debug, ThisError)]
pub enum ValueError {
    #[error("value of type {actual} cannot be read as {expected}")]
    TypeMismatch { expected: ValueType, actual: String },

    #[error("empty array does not carry an element type")]
    UntypedArray,

    #[error("json conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}

///
/// Scalar
///
/// Element kinds a stored value may have. Complex values are
/// arbitrary json documents and only make sense for associated data.
///

#[remain::sorted]
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Scalar {
    Bool,
    Complex,
    Currency,
    DateTime,
    DateTimeRange,
    Decimal,
    Int,
    Locale,
    Text,
}

impl Scalar {
    /// Whether values of this kind have a natural order.
    #[must_use]
    pub const fn is_sortable(self) -> bool {
        !matches!(self, Self::Complex | Self::DateTimeRange)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

///
/// ValueType
///

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum ValueType {
    Array(Scalar),
    Scalar(Scalar),
}

impl ValueType {
    #[must_use]
    pub const fn scalar(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }

    #[must_use]
    pub const fn array(scalar: Scalar) -> Self {
        Self::Array(scalar)
    }

    #[must_use]
    pub const fn is_array(self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// The scalar kind, or the element kind for arrays.
    #[must_use]
    pub const fn element(self) -> Scalar {
        match self {
            Self::Array(s) | Self::Scalar(s) => s,
        }
    }

    #[must_use]
    pub const fn is_sortable(self) -> bool {
        !self.is_array() && self.element().is_sortable()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(s) => write!(f, "{s}[]"),
            Self::Scalar(s) => write!(f, "{s}"),
        }
    }
}

///
/// Value
///
/// A stored attribute, associated data or reference attribute value.
/// Absence is modelled by the owner, there is no null variant.
///

#[remain::sorted]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Array(Vec<Self>),
    Bool(bool),
    Complex(JsonValue),
    Currency(Currency),
    DateTime(DateTime<FixedOffset>),
    DateTimeRange(DateTimeRange),
    Decimal(Decimal),
    Int(i64),
    Locale(Locale),
    Text(String),
}

impl Value {
    /// Build a `Value::Array` from a slice of convertible items.
    pub fn from_slice<T>(items: &[T]) -> Self
    where
        T: Into<Self> + Clone,
    {
        Self::Array(items.iter().cloned().map(Into::into).collect())
    }

    const fn scalar(&self) -> Option<Scalar> {
        let scalar = match self {
            Self::Array(_) => return None,
            Self::Bool(_) => Scalar::Bool,
            Self::Complex(_) => Scalar::Complex,
            Self::Currency(_) => Scalar::Currency,
            Self::DateTime(_) => Scalar::DateTime,
            Self::DateTimeRange(_) => Scalar::DateTimeRange,
            Self::Decimal(_) => Scalar::Decimal,
            Self::Int(_) => Scalar::Int,
            Self::Locale(_) => Scalar::Locale,
            Self::Text(_) => Scalar::Text,
        };

        Some(scalar)
    }

    /// Type of this value, `None` for empty or mixed arrays.
    #[must_use]
    pub fn inferred_type(&self) -> Option<ValueType> {
        match self {
            Self::Array(items) => {
                let first = items.first()?.scalar()?;
                items
                    .iter()
                    .all(|item| item.scalar() == Some(first))
                    .then_some(ValueType::Array(first))
            }
            other => other.scalar().map(ValueType::Scalar),
        }
    }

    /// Whether this value may be stored under the declared type.
    #[must_use]
    pub fn conforms_to(&self, ty: ValueType) -> bool {
        match (self, ty) {
            (Self::Array(items), ValueType::Array(element)) => {
                items.iter().all(|item| item.scalar() == Some(element))
            }
            (_, ValueType::Scalar(scalar)) => self.scalar() == Some(scalar),
            _ => false,
        }
    }

    #[must_use]
    pub const fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    ///
    /// JSON
    ///

    /// Render as a json document, the shape serde-based readers consume.
    pub fn to_json(&self) -> Result<JsonValue, ValueError> {
        let json = match self {
            Self::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(Self::to_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Complex(v) => v.clone(),
            Self::Int(v) => JsonValue::from(*v),
            Self::Text(v) => JsonValue::String(v.clone()),
            Self::Currency(v) => serde_json::to_value(v)?,
            Self::DateTime(v) => serde_json::to_value(v)?,
            Self::DateTimeRange(v) => serde_json::to_value(v)?,
            Self::Decimal(v) => serde_json::to_value(v)?,
            Self::Locale(v) => serde_json::to_value(v)?,
        };

        Ok(json)
    }

    /// Read a json document back under the given type. Without a type the
    /// shape decides: objects become complex values, primitives map to the
    /// obvious scalar.
    pub fn from_json(json: JsonValue, ty: Option<ValueType>) -> Result<Self, ValueError> {
        match ty {
            Some(ValueType::Scalar(scalar)) => Self::scalar_from_json(json, scalar),
            Some(ValueType::Array(element)) => match json {
                JsonValue::Array(items) => Ok(Self::Array(
                    items
                        .into_iter()
                        .map(|item| Self::scalar_from_json(item, element))
                        .collect::<Result<Vec<_>, _>>()?,
                )),
                other => Err(ValueError::TypeMismatch {
                    expected: ValueType::Array(element),
                    actual: json_kind(&other).to_string(),
                }),
            },
            None => Ok(match json {
                JsonValue::Bool(v) => Self::Bool(v),
                JsonValue::String(v) => Self::Text(v),
                JsonValue::Number(n) if n.is_i64() => Self::Int(n.as_i64().unwrap_or_default()),
                other => Self::Complex(other),
            }),
        }
    }

    fn scalar_from_json(json: JsonValue, scalar: Scalar) -> Result<Self, ValueError> {
        let mismatch = |json: &JsonValue| ValueError::TypeMismatch {
            expected: ValueType::Scalar(scalar),
            actual: json_kind(json).to_string(),
        };

        let value = match (scalar, json) {
            (Scalar::Complex, json) => Self::Complex(json),
            (Scalar::Bool, JsonValue::Bool(v)) => Self::Bool(v),
            (Scalar::Text, JsonValue::String(v)) => Self::Text(v),
            (Scalar::Int, JsonValue::Number(n)) => {
                let v = n.as_i64().ok_or_else(|| mismatch(&JsonValue::Number(n.clone())))?;
                Self::Int(v)
            }
            (Scalar::Currency, json) => Self::Currency(serde_json::from_value(json)?),
            (Scalar::DateTime, json) => Self::DateTime(serde_json::from_value(json)?),
            (Scalar::DateTimeRange, json) => Self::DateTimeRange(serde_json::from_value(json)?),
            (Scalar::Decimal, json) => Self::Decimal(serde_json::from_value(json)?),
            (Scalar::Locale, json) => Self::Locale(serde_json::from_value(json)?),
            (_, json) => return Err(mismatch(&json)),
        };

        Ok(value)
    }
}

const fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Bool(v) => write!(f, "{v}"),
            Self::Complex(v) => write!(f, "{v}"),
            Self::Currency(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::DateTimeRange(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Locale(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Self::Complex(v)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}
