use crate::{
    data::{Entity, EntityReference, ReferenceKey, SealedEntity},
    db::{
        CatalogConfig, EntitySession, Query,
        validate::{Evolution, attribute_schemas, check_cardinality, check_mandatory, fill_defaults},
    },
    error::{Error, SessionError},
    fetch::EntityFetch,
    mutation::{EntityExistence, EntityMutation},
    proxy::ProxyFactory,
};
use lumendb_schema::{
    error::SchemaError,
    mutation::{
        CatalogSchemaMutation, EntitySchemaMutation, ModifyCatalogSchemaMutation,
        ModifyEntitySchemaMutation,
    },
    node::{CatalogSchema, EntitySchema},
    types::EvolutionMode,
};
use std::{cmp::Reverse, collections::BTreeMap, sync::Arc};
use tracing::{Level, event, info_span};

///
/// Collection
///

#[derive(Clone, Debug)]
struct Collection {
    entities: BTreeMap<i32, Arc<Entity>>,
    next_primary_key: i32,
}

impl Collection {
    const fn new(first_primary_key: i32) -> Self {
        Self {
            entities: BTreeMap::new(),
            next_primary_key: first_primary_key,
        }
    }
}

///
/// Catalog
///
/// In-memory catalog: one schema plus one collection of entities per
/// entity type. All access goes through a `CatalogSession`.
///

#[derive(Debug)]
pub struct Catalog {
    config: CatalogConfig,
    schema: Arc<CatalogSchema>,
    collections: BTreeMap<String, Collection>,
    factory: Arc<ProxyFactory>,
}

impl Catalog {
    #[must_use]
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            schema: Arc::new(CatalogSchema::new(config.name.clone())),
            config,
            collections: BTreeMap::new(),
            factory: Arc::new(ProxyFactory::default()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CatalogConfig {
        &self.config
    }

    #[must_use]
    pub fn schema(&self) -> Arc<CatalogSchema> {
        Arc::clone(&self.schema)
    }

    #[must_use]
    pub const fn session(&mut self) -> CatalogSession<'_> {
        CatalogSession::new(self)
    }

    /// Number of stored entities of one type.
    #[must_use]
    pub fn entity_count(&self, entity_type: &str) -> usize {
        self.collections
            .get(entity_type)
            .map_or(0, |collection| collection.entities.len())
    }

    fn stored(&self, entity_type: &str, primary_key: i32) -> Option<&Arc<Entity>> {
        self.collections.get(entity_type)?.entities.get(&primary_key)
    }

    fn collection_mut(&mut self, entity_type: &str) -> &mut Collection {
        let first = self.config.first_generated_primary_key;
        self.collections
            .entry(entity_type.to_string())
            .or_insert_with(|| Collection::new(first))
    }

    fn entity_schema_of(&self, entity_type: &str) -> Result<Arc<EntitySchema>, SchemaError> {
        self.schema
            .entity_schema_arc(entity_type)
            .ok_or_else(|| SchemaError::EntitySchemaNotFound {
                name: entity_type.to_string(),
            })
    }

    /// Scope a stored entity to a fetch request, loading the parent and
    /// referenced bodies the request asks for.
    fn seal(&self, entity: Arc<Entity>, fetch: &EntityFetch) -> Result<SealedEntity, Error> {
        let schema = self.entity_schema_of(&entity.entity_type)?;
        let mut sealed = SealedEntity::new(Arc::clone(&entity), schema, Arc::new(fetch.clone()));

        if let (Some(parent_fetch), Some(parent)) = (fetch.parent_fetch(), entity.parent)
            && let Some(body) = self.stored(&entity.entity_type, parent)
        {
            let body = self.seal(Arc::clone(body), parent_fetch)?;
            sealed = sealed.with_parent(Arc::new(body));
        }

        for reference in entity.references.values() {
            let Some(reference_fetch) = fetch.reference_fetch(reference.name()) else {
                continue;
            };

            if let Some(body_fetch) = &reference_fetch.entity
                && let Some(body) = self.stored(
                    &reference.referenced_entity_type,
                    reference.referenced_primary_key(),
                )
            {
                let body = self.seal(Arc::clone(body), body_fetch)?;
                sealed = sealed.with_referenced_entity(reference.key.clone(), Arc::new(body));
            }

            if let Some(group_fetch) = &reference_fetch.group_entity
                && let Some(group) = &reference.group
                && let Some(body) = self.stored(&group.entity_type, group.primary_key)
            {
                let body = self.seal(Arc::clone(body), group_fetch)?;
                sealed = sealed.with_group_entity(reference.key.clone(), Arc::new(body));
            }
        }

        Ok(sealed)
    }

    fn apply_schema(&mut self, mutation: &ModifyCatalogSchemaMutation) -> Result<(), SchemaError> {
        let next = self.schema.apply(mutation)?;

        self.collections
            .retain(|entity_type, _| next.entity_schema(entity_type).is_some());
        self.schema = Arc::new(next);

        Ok(())
    }

    fn check_unique(&self, schema: &EntitySchema, entity: &Entity) -> Result<(), SessionError> {
        for attribute in attribute_schemas(&self.schema, schema) {
            let globally = schema.is_global_attribute(&attribute.name)
                && self
                    .schema
                    .attribute(&attribute.name)
                    .is_some_and(|global| global.unique_globally);
            if !attribute.unique && !globally {
                continue;
            }

            let owners: Vec<&str> = if globally {
                self.schema
                    .entity_schemas
                    .values()
                    .filter(|other| other.is_global_attribute(&attribute.name))
                    .map(|other| other.name.as_str())
                    .collect()
            } else {
                vec![entity.entity_type.as_str()]
            };

            for (key, value) in entity
                .attributes
                .iter()
                .filter(|(key, _)| key.name == attribute.name)
            {
                for owner_type in &owners {
                    let Some(collection) = self.collections.get(*owner_type) else {
                        continue;
                    };
                    let conflict = collection.entities.values().find(|other| {
                        !(other.entity_type == entity.entity_type
                            && other.primary_key == entity.primary_key)
                            && other.attributes.get(key) == Some(value)
                    });

                    if let Some(other) = conflict {
                        return Err(SessionError::UniqueValueViolation {
                            entity_type: (*owner_type).to_string(),
                            attribute: key.to_string(),
                            value: value.to_string(),
                            owner: other.primary_key.unwrap_or_default(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

///
/// CatalogSession
///
/// Session-scoped handle over a catalog. Every write either applies
/// completely or leaves the catalog untouched.
///

pub struct CatalogSession<'a> {
    catalog: &'a mut Catalog,
    debug: bool,
}

impl<'a> CatalogSession<'a> {
    #[must_use]
    pub const fn new(catalog: &'a mut Catalog) -> Self {
        Self {
            catalog,
            debug: false,
        }
    }

    /// Log every local mutation of each upsert.
    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        self.catalog
    }

    // new schema for an unknown entity type, open per the catalog defaults
    fn create_entity_schema(&mut self, entity_type: &str) -> Result<(), Error> {
        event!(
            Level::WARN,
            entity_type,
            "entity collection created on the fly"
        );

        let modes = self.catalog.config.default_evolution_modes.clone();
        let mut mutations = vec![CatalogSchemaMutation::CreateEntitySchema(
            entity_type.to_string(),
        )];
        if modes != EvolutionMode::all() {
            mutations.push(CatalogSchemaMutation::ModifyEntitySchema(
                ModifyEntitySchemaMutation {
                    entity_type: entity_type.to_string(),
                    mutations: vec![EntitySchemaMutation::SetEvolutionModes(modes)],
                },
            ));
        }

        self.catalog.apply_schema(&ModifyCatalogSchemaMutation {
            catalog: self.catalog.schema.name.clone(),
            mutations,
        })?;

        Ok(())
    }

    fn upsert(&mut self, mutation: &EntityMutation) -> Result<EntityReference, Error> {
        let entity_type = mutation.entity_type.as_str();

        if self.catalog.schema.entity_schema(entity_type).is_none() {
            self.create_entity_schema(entity_type)?;
        }

        // existence
        let base = mutation
            .primary_key
            .and_then(|pk| self.catalog.stored(entity_type, pk).cloned());
        match (mutation.existence, &base, mutation.primary_key) {
            (EntityExistence::MustNotExist, Some(_), Some(primary_key)) => {
                return Err(SessionError::EntityAlreadyExists {
                    entity_type: entity_type.to_string(),
                    primary_key,
                }
                .into());
            }
            (EntityExistence::MustExist, None, primary_key) => {
                return Err(SessionError::EntityNotFound {
                    entity_type: entity_type.to_string(),
                    primary_key: primary_key.unwrap_or_default(),
                }
                .into());
            }
            _ => {}
        }

        // schema evolution
        let schema = self.catalog.entity_schema_of(entity_type)?;
        if let Some(evolution) = Evolution::new(&self.catalog.schema, schema).evolve(mutation)? {
            event!(
                Level::WARN,
                entity_type,
                changes = evolution.mutations.len(),
                "entity schema evolved on the fly"
            );
            self.catalog.apply_schema(&evolution.into())?;
        }
        let schema = self.catalog.entity_schema_of(entity_type)?;

        mutation.verify(base.as_deref())?;
        if self.debug {
            for local in &mutation.local_mutations {
                event!(Level::DEBUG, entity_type, mutation = ?local, "local mutation");
            }
        }

        let primary_key = match mutation.primary_key {
            Some(primary_key) => primary_key,
            None => self.catalog.collections.get(entity_type).map_or(
                self.catalog.config.first_generated_primary_key,
                |collection| collection.next_primary_key,
            ),
        };

        let mut entity = mutation.apply(base.as_deref());
        entity.primary_key = Some(primary_key);
        entity.version = base.as_ref().map_or(1, |base| base.version + 1);
        if base.is_none() {
            fill_defaults(&self.catalog.schema, &schema, &mut entity);
        }
        assign_internal_ids(&mut entity);

        check_mandatory(&self.catalog.schema, &schema, &entity)?;
        check_cardinality(&schema, &entity)?;
        self.catalog.check_unique(&schema, &entity)?;

        event!(
            Level::DEBUG,
            entity_type,
            primary_key,
            version = entity.version,
            mutations = mutation.local_mutations.len(),
            "entity stored"
        );
        let collection = self.catalog.collection_mut(entity_type);
        collection.next_primary_key = collection.next_primary_key.max(primary_key + 1);
        collection.entities.insert(primary_key, Arc::new(entity));

        Ok(EntityReference::new(entity_type, primary_key))
    }

    fn query_matching(&self, query: &Query) -> Result<Vec<Arc<Entity>>, Error> {
        self.catalog.entity_schema_of(&query.entity_type)?;

        let matching = self
            .catalog
            .collections
            .get(&query.entity_type)
            .into_iter()
            .flat_map(|collection| collection.entities.values())
            .filter(|entity| query.matches(entity))
            .cloned();

        Ok(match query.page {
            Some(page) => matching.skip(page.offset()).take(page.size).collect(),
            None => matching.collect(),
        })
    }
}

// replace the temporary negative ids of new references
fn assign_internal_ids(entity: &mut Entity) {
    if !entity.references.keys().any(ReferenceKey::is_new) {
        return;
    }

    let mut next = entity.max_internal_id() + 1;
    let (fresh, stored): (Vec<_>, Vec<_>) = std::mem::take(&mut entity.references)
        .into_iter()
        .partition(|(key, _)| key.is_new());

    entity.references = stored.into_iter().collect();
    // oldest first, so -1 gets the lowest new id
    let mut fresh = fresh;
    fresh.sort_by_key(|(key, _)| Reverse(key.internal_id));
    for (key, mut reference) in fresh {
        reference.key = ReferenceKey::new(key.name, key.primary_key, next);
        next += 1;
        entity.references.insert(reference.key.clone(), reference);
    }
}

impl EntitySession for CatalogSession<'_> {
    fn catalog_schema(&self) -> Arc<CatalogSchema> {
        self.catalog.schema()
    }

    fn entity_schema(&self, entity_type: &str) -> Option<Arc<EntitySchema>> {
        self.catalog.schema.entity_schema_arc(entity_type)
    }

    fn config(&self) -> &CatalogConfig {
        &self.catalog.config
    }

    fn proxy_factory(&self) -> Arc<ProxyFactory> {
        Arc::clone(&self.catalog.factory)
    }

    fn get_entity(
        &self,
        entity_type: &str,
        primary_key: i32,
        fetch: &EntityFetch,
    ) -> Result<Option<SealedEntity>, Error> {
        let span = info_span!("catalog.get_entity", entity_type, primary_key);
        let _enter = span.enter();

        self.catalog.entity_schema_of(entity_type)?;
        self.catalog
            .stored(entity_type, primary_key)
            .map(|entity| self.catalog.seal(Arc::clone(entity), fetch))
            .transpose()
    }

    fn upsert_entity(&mut self, mutation: &EntityMutation) -> Result<EntityReference, Error> {
        let span = info_span!(
            "catalog.upsert_entity",
            entity_type = %mutation.entity_type,
            primary_key = ?mutation.primary_key
        );
        let _enter = span.enter();

        // schema changes made on the way are undone with a rejected write
        let snapshot = self.catalog.schema();
        self.upsert(mutation).inspect_err(|err| {
            self.catalog.schema = snapshot;
            event!(Level::DEBUG, error = %err, "upsert rejected");
        })
    }

    fn delete_entity(&mut self, entity_type: &str, primary_key: i32) -> Result<bool, Error> {
        let span = info_span!("catalog.delete_entity", entity_type, primary_key);
        let _enter = span.enter();

        self.catalog.entity_schema_of(entity_type)?;
        let removed = self
            .catalog
            .collections
            .get_mut(entity_type)
            .and_then(|collection| collection.entities.remove(&primary_key))
            .is_some();
        event!(Level::DEBUG, removed, "entity delete processed");

        Ok(removed)
    }

    fn query_one(&self, query: &Query) -> Result<Option<SealedEntity>, Error> {
        let span = info_span!("catalog.query_one", entity_type = %query.entity_type);
        let _enter = span.enter();

        self.query_matching(query)?
            .into_iter()
            .next()
            .map(|entity| self.catalog.seal(entity, &query.fetch))
            .transpose()
    }

    fn query_list(&self, query: &Query) -> Result<Vec<SealedEntity>, Error> {
        let span = info_span!("catalog.query_list", entity_type = %query.entity_type);
        let _enter = span.enter();

        self.query_matching(query)?
            .into_iter()
            .map(|entity| self.catalog.seal(entity, &query.fetch))
            .collect()
    }

    fn query_count(&self, query: &Query) -> Result<usize, Error> {
        Ok(self.query_matching(query)?.len())
    }

    fn update_catalog_schema(
        &mut self,
        mutation: &ModifyCatalogSchemaMutation,
    ) -> Result<Arc<CatalogSchema>, Error> {
        let span = info_span!("catalog.update_schema", changes = mutation.mutations.len());
        let _enter = span.enter();

        self.catalog.apply_schema(mutation)?;

        Ok(self.catalog.schema())
    }

    fn update_entity_schema(
        &mut self,
        mutation: &ModifyEntitySchemaMutation,
    ) -> Result<Arc<EntitySchema>, Error> {
        let entity_type = mutation.entity_type.as_str();
        let mut mutations = Vec::with_capacity(2);
        if self.catalog.schema.entity_schema(entity_type).is_none() {
            mutations.push(CatalogSchemaMutation::CreateEntitySchema(entity_type.to_string()));
        }
        mutations.push(CatalogSchemaMutation::ModifyEntitySchema(mutation.clone()));

        self.update_catalog_schema(&ModifyCatalogSchemaMutation {
            catalog: self.catalog.schema.name.clone(),
            mutations,
        })?;

        Ok(self.catalog.entity_schema_of(entity_type)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::AttributeKey,
        db::Filter,
        fetch::{ReferenceFetch, entity_fetch_all},
        mutation::{EntityBuilder, LocalMutation},
    };
    use lumendb_primitives::{Scalar, Value, ValueType};
    use lumendb_schema::{
        build::EntitySchemaBuilder,
        types::Cardinality,
    };

    fn define_brand(session: &mut CatalogSession<'_>) {
        let mut builder = EntitySchemaBuilder::create(session.catalog_schema(), "BRAND");
        builder
            .with_attribute("code", ValueType::scalar(Scalar::Text), |a| {
                a.unique();
            })
            .expect("code");
        session
            .update_entity_schema(&builder.to_mutation().expect("new schema"))
            .expect("schema stored");
    }

    fn brand(session: &mut CatalogSession<'_>, code: &str) -> EntityReference {
        let mut builder = EntityBuilder::new("BRAND", None);
        builder.set_attribute("code", code);
        session
            .upsert_entity(&builder.to_mutation().expect("new entity"))
            .expect("brand stored")
    }

    #[test]
    fn generated_keys_start_from_config() {
        let mut catalog = Catalog::new(CatalogConfig::new("test").first_generated_primary_key(100));
        let mut session = catalog.session();
        define_brand(&mut session);

        assert_eq!(brand(&mut session, "a").primary_key, 100);
        assert_eq!(brand(&mut session, "b").primary_key, 101);
        assert_eq!(catalog.entity_count("BRAND"), 2);
    }

    #[test]
    fn unique_values_are_enforced() {
        let mut catalog = Catalog::default();
        let mut session = catalog.session();
        define_brand(&mut session);
        brand(&mut session, "a");

        let mut builder = EntityBuilder::new("BRAND", None);
        builder.set_attribute("code", "a");
        let err = session
            .upsert_entity(&builder.to_mutation().expect("new entity"))
            .expect_err("duplicate code");

        assert!(matches!(
            err,
            Error::Session(SessionError::UniqueValueViolation { owner: 1, .. })
        ));
        assert_eq!(session.catalog().entity_count("BRAND"), 1);
    }

    #[test]
    fn unknown_collection_is_created_on_the_fly() {
        let mut catalog = Catalog::default();
        let mut session = catalog.session();

        let mut builder = EntityBuilder::new("TAG", Some(5));
        builder.set_attribute("label", "new");
        let reference = session
            .upsert_entity(&builder.to_mutation().expect("new entity"))
            .expect("stored");

        assert_eq!(reference, EntityReference::new("TAG", 5));
        let schema = session.entity_schema("TAG").expect("created");
        assert!(schema.attribute("label").is_some());
        assert!(!schema.with_generated_primary_key);
    }

    #[test]
    fn strict_defaults_refuse_unknown_collection_content() {
        let mut catalog = Catalog::new(CatalogConfig::new("test").default_evolution_modes([]));
        let mut session = catalog.session();

        let mut builder = EntityBuilder::new("TAG", Some(5));
        builder.set_attribute("label", "new");
        let err = session
            .upsert_entity(&builder.to_mutation().expect("new entity"))
            .expect_err("strict");

        assert!(matches!(
            err,
            Error::Session(SessionError::EvolutionNotAllowed { .. })
        ));
        assert_eq!(session.catalog().entity_count("TAG"), 0);
        assert!(session.entity_schema("TAG").is_none());
    }

    #[test]
    fn existence_is_checked() {
        let mut catalog = Catalog::default();
        let mut session = catalog.session();
        define_brand(&mut session);
        let stored = brand(&mut session, "a");

        let mut duplicate = EntityBuilder::new("BRAND", Some(stored.primary_key))
            .to_mutation()
            .expect("new entity");
        duplicate.existence = EntityExistence::MustNotExist;
        assert!(matches!(
            session.upsert_entity(&duplicate),
            Err(Error::Session(SessionError::EntityAlreadyExists { .. }))
        ));

        let mut missing = EntityMutation::new("BRAND", Some(42));
        missing.existence = EntityExistence::MustExist;
        assert!(matches!(
            session.upsert_entity(&missing),
            Err(Error::Session(SessionError::EntityNotFound { primary_key: 42, .. }))
        ));
    }

    #[test]
    fn new_references_get_positive_ids_after_stored_ones() {
        let mut catalog = Catalog::default();
        let mut session = catalog.session();
        define_brand(&mut session);
        let brand = brand(&mut session, "a");

        let mut builder = EntityBuilder::new("PRODUCT", Some(1));
        for _ in 0..2 {
            builder.insert_reference(
                "brand",
                brand.primary_key,
                "BRAND",
                Cardinality::ZeroOrMoreWithDuplicates,
            );
        }
        session
            .upsert_entity(&builder.to_mutation().expect("new entity"))
            .expect("stored");

        let product = session
            .get_entity("PRODUCT", 1, &entity_fetch_all())
            .expect("read")
            .expect("present");
        let ids = product
            .entity()
            .references
            .keys()
            .map(|key| key.internal_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn referenced_bodies_follow_fetch() {
        let mut catalog = Catalog::default();
        let mut session = catalog.session();
        define_brand(&mut session);
        let brand = brand(&mut session, "a");

        let mut builder = EntityBuilder::new("PRODUCT", Some(1));
        builder.insert_reference("brand", brand.primary_key, "BRAND", Cardinality::ZeroOrOne);
        session
            .upsert_entity(&builder.to_mutation().expect("new entity"))
            .expect("stored");

        let fetch = EntityFetch::new().with_reference(
            "brand",
            ReferenceFetch::new().with_entity(EntityFetch::new().with_attributes()),
        );
        let product = session
            .get_entity("PRODUCT", 1, &fetch)
            .expect("read")
            .expect("present");
        let key = product.entity().references.keys().next().expect("brand").clone();
        let body = product
            .referenced_entity(&key)
            .expect("fetched")
            .expect("stored brand");

        assert_eq!(body.attribute("code").expect("fetched"), Some(&Value::from("a")));
    }

    #[test]
    fn queries_filter_and_page() {
        let mut catalog = Catalog::default();
        let mut session = catalog.session();
        define_brand(&mut session);
        for code in ["apple", "acme", "bosch", "asus"] {
            brand(&mut session, code);
        }

        let query = Query::new("BRAND")
            .filter(Filter::attribute_starts_with("code", "a"))
            .fetch(EntityFetch::new().with_attributes());
        assert_eq!(session.query_count(&query).expect("count"), 3);

        let page = session.query_list(&query.clone().page(2, 2)).expect("page");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].primary_key(), Some(4));

        let first = session.query_one(&query).expect("query").expect("match");
        assert_eq!(first.primary_key(), Some(1));
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let mut catalog = Catalog::default();
        let mut session = catalog.session();
        define_brand(&mut session);
        let stored = brand(&mut session, "a");

        assert!(session.delete_entity("BRAND", stored.primary_key).expect("delete"));
        assert!(!session.delete_entity("BRAND", stored.primary_key).expect("delete"));
    }

    #[test]
    fn evolution_modes_gate_new_attributes() {
        let mut catalog = Catalog::default();
        let mut session = catalog.session();
        let mut builder = EntitySchemaBuilder::create(session.catalog_schema(), "BRAND");
        builder.verify_schema_strictly().expect("strict");
        session
            .update_entity_schema(&builder.to_mutation().expect("new schema"))
            .expect("stored");

        let mut mutation = EntityMutation::new("BRAND", Some(1));
        mutation
            .local_mutations
            .push(LocalMutation::UpsertAttribute(AttributeKey::new("code"), Value::from("a")));
        let err = session.upsert_entity(&mutation).expect_err("strict schema");

        let Error::Session(SessionError::EvolutionNotAllowed { change, .. }) = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(change, "attribute `code`");
        assert!(
            !session
                .entity_schema("BRAND")
                .expect("schema")
                .allows(EvolutionMode::AddingAttributes)
        );
    }
}
