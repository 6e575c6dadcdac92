//! ## Crate layout
//! - `data`: entities, references, prices and their sealed read views.
//! - `db`: the in-memory catalog and the `EntitySession` it opens.
//! - `fetch`: what a read brings back from an entity.
//! - `model`: model class descriptors and the schema analyzer.
//! - `mutation`: entity mutations and the builder producing them.
//! - `proxy`: typed read proxies and write editors over model classes.
//! - `schema`: schema tree, builders and schema mutations.
//! - `primitives`: values, value types, locales and currencies.
//!
//! Model classes are declared with `#[derive(EntityClass)]` and
//! `#[derive(ReferenceClass)]`; the `prelude` carries everything a model
//! module needs.

pub use lumendb_core::{data, db, error, fetch, model, mutation, proxy};
pub use lumendb_derive::{EntityClass, ReferenceClass};
pub use lumendb_primitives as primitives;
pub use lumendb_schema as schema;
pub use lumendb_utils as utils;

// derived code names paths through `::lumendb`
extern crate self as lumendb;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::Error;

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::{EntityClass, ReferenceClass};
    pub use lumendb_core::prelude::*;
    pub use lumendb_primitives::prelude::*;
    pub use serde::{Deserialize, Serialize};
}
