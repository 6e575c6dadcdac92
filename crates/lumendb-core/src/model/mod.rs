//! Model classes.
//!
//! A model class is a plain Rust type describing how an entity is read
//! and written. Its static descriptor says *what exists*; the analyzer
//! turns it into schema, the proxy factory into a binding.

mod analyzer;
mod descriptor;

pub use analyzer::{AnalysisResult, ClassSchemaAnalyzer};
pub use descriptor::*;

use crate::{
    data::EntityReference,
    error::Error,
    proxy::{EntityProxy, ReferenceProxy},
};

///
/// EntityClass
///
/// A type stored as an entity of `DESCRIPTOR.entity`.
///

pub trait EntityClass: FromProxy + 'static {
    const DESCRIPTOR: &'static ClassDescriptor;

    #[must_use]
    fn entity_type() -> &'static str {
        Self::DESCRIPTOR.entity
    }
}

///
/// FromProxy
///
/// Materialization of a model value from a sealed proxy. Collection-shaped
/// members read as empty when absent, optional ones as `None`.
///

pub trait FromProxy: Sized {
    fn from_proxy(proxy: &EntityProxy<Self>) -> Result<Self, Error>;
}

///
/// ReferenceClass
///
/// A type describing the content of one reference: its attributes and
/// optionally the referenced or group bodies.
///

pub trait ReferenceClass: ReferenceTarget + 'static {
    const DESCRIPTOR: &'static ReferenceClassDescriptor;
}

///
/// ReferenceTarget
///
/// What a reference-shaped member of a model class reads as.
///

pub trait ReferenceTarget: Sized {
    /// Reference class declaring attributes, if any.
    #[must_use]
    fn class() -> Option<&'static ReferenceClassDescriptor> {
        None
    }

    fn from_reference(proxy: &ReferenceProxy) -> Result<Self, Error>;
}

impl ReferenceTarget for i32 {
    fn from_reference(proxy: &ReferenceProxy) -> Result<Self, Error> {
        Ok(proxy.referenced_primary_key())
    }
}

impl ReferenceTarget for EntityReference {
    fn from_reference(proxy: &ReferenceProxy) -> Result<Self, Error> {
        Ok(Self::new(
            proxy.referenced_entity_type(),
            proxy.referenced_primary_key(),
        ))
    }
}
