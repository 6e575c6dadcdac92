mod catalog;
mod config;
mod query;
pub(crate) mod validate;

pub use catalog::{Catalog, CatalogSession};
pub use config::CatalogConfig;
pub use query::{Filter, Page, Query};

use crate::{
    data::{EntityReference, SealedEntity},
    error::{Error, SessionError},
    fetch::EntityFetch,
    mutation::EntityMutation,
    proxy::ProxyFactory,
};
use lumendb_schema::{
    mutation::{ModifyCatalogSchemaMutation, ModifyEntitySchemaMutation},
    node::{CatalogSchema, EntitySchema},
};
use std::sync::Arc;

///
/// EntitySession
///
/// Read and write access to one catalog. Proxies and editors only talk to
/// the store through this trait.
///

pub trait EntitySession {
    fn catalog_schema(&self) -> Arc<CatalogSchema>;

    fn entity_schema(&self, entity_type: &str) -> Option<Arc<EntitySchema>>;

    fn config(&self) -> &CatalogConfig;

    /// Shared cache of model bindings.
    fn proxy_factory(&self) -> Arc<ProxyFactory>;

    fn get_entity(
        &self,
        entity_type: &str,
        primary_key: i32,
        fetch: &EntityFetch,
    ) -> Result<Option<SealedEntity>, Error>;

    /// Apply one entity mutation, evolving the schema where it allows.
    fn upsert_entity(&mut self, mutation: &EntityMutation) -> Result<EntityReference, Error>;

    fn upsert_and_fetch_entity(
        &mut self,
        mutation: &EntityMutation,
        fetch: &EntityFetch,
    ) -> Result<SealedEntity, Error> {
        let reference = self.upsert_entity(mutation)?;

        self.get_entity(&reference.entity_type, reference.primary_key, fetch)?
            .ok_or_else(|| {
                SessionError::EntityNotFound {
                    entity_type: reference.entity_type,
                    primary_key: reference.primary_key,
                }
                .into()
            })
    }

    /// Returns false when nothing was stored under the key.
    fn delete_entity(&mut self, entity_type: &str, primary_key: i32) -> Result<bool, Error>;

    fn query_one(&self, query: &Query) -> Result<Option<SealedEntity>, Error>;

    fn query_list(&self, query: &Query) -> Result<Vec<SealedEntity>, Error>;

    fn query_count(&self, query: &Query) -> Result<usize, Error>;

    fn update_catalog_schema(
        &mut self,
        mutation: &ModifyCatalogSchemaMutation,
    ) -> Result<Arc<CatalogSchema>, Error>;

    /// Modify one entity schema, creating it first when missing.
    fn update_entity_schema(
        &mut self,
        mutation: &ModifyEntitySchemaMutation,
    ) -> Result<Arc<EntitySchema>, Error>;
}
