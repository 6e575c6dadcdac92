//! Core runtime for LumenDB: entity data and mutations, the in-memory
//! catalog session, model class descriptors with their schema analyzer,
//! and the typed proxies exported via the `prelude`.

// public exports are one module level down
pub mod data;
pub mod db;
pub mod error;
pub mod fetch;
pub mod model;
pub mod mutation;
pub mod proxy;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Model vocabulary and the session entry points.
/// Schema builders and raw mutations stay one module level down.
///

pub mod prelude {
    pub use crate::{
        data::{EntityReference, Price, PriceKey, SealedEntity},
        db::{Catalog, CatalogConfig, EntitySession},
        error::Error,
        fetch::{EntityFetch, entity_fetch_all},
        model::{EntityClass, FromProxy, ReferenceClass, ReferenceTarget},
        proxy::{EntityEditor, EntityProxy, ModelSession, ReferenceEditor, ReferenceProxy},
    };
}
