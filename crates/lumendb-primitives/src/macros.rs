// impl_field_value
macro_rules! impl_field_value {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl FieldValue for $type {
                fn value_type() -> ValueType {
                    ValueType::scalar(Scalar::$variant)
                }

                fn to_value(&self) -> Value {
                    Value::$variant((*self).into())
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => (*v).try_into().ok(),
                        _ => None,
                    }
                }
            }

            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

///
/// value_enum
///
/// Declares a fieldless enum stored as its variant name. Unknown names
/// fail to parse instead of defaulting.
///

#[macro_export]
macro_rules! value_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $( $variant ),*
        }

        impl $name {
            pub const ALL: &'static [Self] = &[ $( Self::$variant ),* ];

            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant) ),*
                }
            }
        }

        impl $crate::FieldValue for $name {
            fn value_type() -> $crate::ValueType {
                $crate::ValueType::scalar($crate::Scalar::Text)
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Text(self.as_str().to_string())
            }

            fn from_value(value: &$crate::Value) -> Option<Self> {
                let $crate::Value::Text(text) = value else {
                    return None;
                };

                match text.as_str() {
                    $( stringify!($variant) => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }

        impl From<$name> for $crate::Value {
            fn from(v: $name) -> Self {
                $crate::FieldValue::to_value(&v)
            }
        }
    };
}
