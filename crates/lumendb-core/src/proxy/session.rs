use crate::{
    db::{EntitySession, Query},
    error::Error,
    fetch::EntityFetch,
    model::{AnalysisResult, ClassSchemaAnalyzer, EntityClass},
    proxy::{EntityEditor, EntityProxy},
};
use lumendb_schema::build::EntitySchemaBuilder;
use tracing::{Level, event};

///
/// ModelSession
///
/// Model-class entry points on top of any `EntitySession`.
///

pub trait ModelSession: EntitySession {
    /// Builder over the current schema of `entity_type`, or over an empty
    /// one when the catalog does not know it yet.
    fn define_entity_schema(&self, entity_type: &str) -> EntitySchemaBuilder {
        let catalog = self.catalog_schema();

        match self.entity_schema(entity_type) {
            Some(schema) => EntitySchemaBuilder::new(catalog, schema),
            None => EntitySchemaBuilder::create(catalog, entity_type),
        }
    }

    /// Analyze `M` and apply the schema changes it needs.
    fn define_entity_schema_from_model_class<M: EntityClass>(
        &mut self,
    ) -> Result<AnalysisResult, Error> {
        let analysis = ClassSchemaAnalyzer::new(M::DESCRIPTOR).analyze(&*self)?;
        if let Some(mutation) = analysis.to_mutation(&self.catalog_schema().name) {
            self.update_catalog_schema(&mutation)?;
        }

        Ok(analysis)
    }

    /// Editor of a new entity of `M`. The store generates the primary key
    /// when none is given.
    fn create_new_entity<M: EntityClass>(
        &mut self,
        primary_key: Option<i32>,
    ) -> Result<EntityEditor<M>, Error> {
        register_model::<M, Self>(self)?;

        Ok(EntityEditor::new(
            primary_key,
            self.entity_schema(M::entity_type()),
            self.proxy_factory(),
        ))
    }

    fn get_entity_as<M: EntityClass>(
        &self,
        primary_key: i32,
        fetch: &EntityFetch,
    ) -> Result<Option<EntityProxy<M>>, Error> {
        Ok(self
            .get_entity(M::entity_type(), primary_key, fetch)?
            .map(|sealed| EntityProxy::new(sealed, self.proxy_factory())))
    }

    fn query_one_as<M: EntityClass>(
        &self,
        query: &Query,
    ) -> Result<Option<EntityProxy<M>>, Error> {
        Ok(self
            .query_one(query)?
            .map(|sealed| EntityProxy::new(sealed, self.proxy_factory())))
    }

    fn query_list_as<M: EntityClass>(&self, query: &Query) -> Result<Vec<EntityProxy<M>>, Error> {
        let factory = self.proxy_factory();

        Ok(self
            .query_list(query)?
            .into_iter()
            .map(|sealed| EntityProxy::new(sealed, std::sync::Arc::clone(&factory)))
            .collect())
    }
}

impl<S: EntitySession + ?Sized> ModelSession for S {}

/// Make sure the catalog knows the schema of `M` before it is written,
/// when the catalog registers model classes on its own.
pub(crate) fn register_model<M, S>(session: &mut S) -> Result<(), Error>
where
    M: EntityClass,
    S: EntitySession + ?Sized,
{
    if !session.config().auto_register_model_classes {
        return Ok(());
    }

    let analysis = ClassSchemaAnalyzer::new(M::DESCRIPTOR).analyze(&*session)?;
    if let Some(mutation) = analysis.to_mutation(&session.catalog_schema().name) {
        event!(
            Level::INFO,
            class = M::DESCRIPTOR.name,
            entity_type = M::entity_type(),
            changes = mutation.mutations.len(),
            "model class registered"
        );
        session.update_catalog_schema(&mutation)?;
    }

    Ok(())
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{Catalog, CatalogConfig, Filter},
        fetch::entity_fetch_all,
        test_fixtures::{Category, catalog},
    };

    #[test]
    fn model_class_defines_schema_once() {
        let mut catalog = Catalog::new(CatalogConfig::new("test"));
        let mut session = catalog.session();

        let first = session
            .define_entity_schema_from_model_class::<Category>()
            .expect("valid class");
        assert!(!first.is_empty());

        let schema = session.entity_schema("CATEGORY").expect("defined");
        assert!(schema.attribute("code").is_some());
        assert!(schema.associated_data("referencedFiles").is_some());

        let second = session
            .define_entity_schema_from_model_class::<Category>()
            .expect("valid class");
        assert!(second.is_empty());
    }

    #[test]
    fn schema_builder_starts_from_current_schema() {
        let mut catalog = catalog();
        let mut session = catalog.session();

        assert!(session.define_entity_schema("CATEGORY").current().attributes.is_empty());

        session.create_new_entity::<Category>(None).expect("registered");
        let builder = session.define_entity_schema("CATEGORY");
        assert!(builder.current().attribute("code").is_some());
        assert!(builder.to_mutation().is_none());
    }

    #[test]
    fn created_entities_read_back_as_model() {
        let mut catalog = catalog();
        let mut session = catalog.session();

        for code in ["alpha", "beta"] {
            let mut editor = session.create_new_entity::<Category>(None).expect("registered");
            editor.set_attribute("code", code).expect("declared");
            editor.upsert_via::<(), _>(&mut session).expect("stored");
        }

        let query = Query::new("CATEGORY")
            .filter(Filter::attribute_equals("code", "beta"))
            .fetch(entity_fetch_all());
        let beta = session
            .query_one_as::<Category>(&query)
            .expect("query")
            .expect("match");
        let primary_key = beta.primary_key().expect("stored");

        let again = session
            .get_entity_as::<Category>(primary_key, &entity_fetch_all())
            .expect("read")
            .expect("stored");
        assert_eq!(again.materialize().expect("complete").code, "beta");

        let all = session
            .query_list_as::<Category>(&Query::new("CATEGORY").fetch(entity_fetch_all()))
            .expect("query");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn registration_is_skipped_when_disabled() {
        let mut catalog =
            Catalog::new(CatalogConfig::new("test").auto_register_model_classes(false));
        let mut session = catalog.session();

        register_model::<Category, _>(&mut session).expect("noop");
        assert!(session.entity_schema("CATEGORY").is_none());
    }
}
