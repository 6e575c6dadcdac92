//! Builder-time rule checks. Each check returns the first broken rule as
//! a `SchemaError`; catalog-wide checks collect into an `ErrorTree`.

pub mod attribute;
pub mod compound;
pub mod naming;
