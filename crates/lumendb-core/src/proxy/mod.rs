//! Typed proxies over sealed entities.
//!
//! `EntityProxy` reads, `EntityEditor` writes. Both address content by
//! model member name and resolve it through a `ModelBinding` cached in the
//! session's `ProxyFactory`.

mod binding;
mod editor;
mod entity;
mod reference;
mod reference_editor;
mod session;
mod upsert;

pub use binding::{Binding, ModelBinding, ProxyFactory, ReferenceBinding};
pub use editor::{BASIC_PRICE_LIST, EntityEditor};
pub use entity::EntityProxy;
pub use reference::ReferenceProxy;
pub use reference_editor::ReferenceEditor;
pub use session::ModelSession;
pub use upsert::UpsertResult;

use crate::error::{Error, ProxyError};
use lumendb_primitives::{FieldValue, Value};

// read a stored value as the member's Rust type
pub(crate) fn convert<T: FieldValue>(
    entity: &str,
    member: &str,
    value: &Value,
) -> Result<T, Error> {
    T::from_value(value).ok_or_else(|| {
        ProxyError::ValueMismatch {
            entity: entity.to_string(),
            member: member.to_string(),
            expected: T::value_type().to_string(),
            found: value.to_string(),
        }
        .into()
    })
}

/// Turn "not fetched" into an absent value.
pub fn if_present<T>(result: Result<Option<T>, Error>) -> Result<Option<T>, Error> {
    match result {
        Err(err) if err.is_context_missing() => Ok(None),
        result => result,
    }
}

///
/// TESTS
///
