#[macro_use]
mod macros;

pub mod field;
pub mod locale;
pub mod range;
pub mod value;

pub use field::FieldValue;
pub use locale::{Currency, Locale};
pub use range::DateTimeRange;
pub use value::{Scalar, Value, ValueError, ValueType};

// re-exports
pub use chrono::{DateTime, FixedOffset};
pub use rust_decimal::Decimal;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        Currency, DateTime, DateTimeRange, Decimal, FieldValue, FixedOffset, Locale, Scalar,
        Value, ValueType,
    };
}
