use crate::{
    data::{Price, PriceKey, ReferenceKey, SealedEntity},
    error::{Error, ProxyError},
    model::EntityClass,
    proxy::{
        EntityEditor, ModelBinding, ProxyFactory, ReferenceProxy, convert, if_present,
        reference_editor::IsolatedEditors,
    },
};
use lumendb_primitives::{Currency, FieldValue, Locale};
use serde::de::DeserializeOwned;
use std::{
    cell::{OnceCell, RefCell},
    collections::{BTreeMap, BTreeSet},
    fmt,
    marker::PhantomData,
    rc::Rc,
    sync::Arc,
};

///
/// EntityProxy
///
/// Sealed entity read through the model class `M`. Members are addressed
/// by field name and resolved through the cached class binding.
///
/// Reference and parent sub-proxies are created on first access and the
/// same `Rc` is handed out afterwards.
///

pub struct EntityProxy<M> {
    sealed: SealedEntity,
    binding: Arc<ModelBinding>,
    factory: Arc<ProxyFactory>,
    references: RefCell<BTreeMap<ReferenceKey, Rc<ReferenceProxy>>>,
    parent: OnceCell<Option<Rc<Self>>>,
    isolated: IsolatedEditors,
    _model: PhantomData<fn() -> M>,
}

impl<M: EntityClass> EntityProxy<M> {
    #[must_use]
    pub fn new(sealed: SealedEntity, factory: Arc<ProxyFactory>) -> Self {
        let binding = factory.binding::<M>(sealed.schema_arc());

        Self::with_binding(sealed, binding, factory)
    }

    pub(crate) fn with_binding(
        sealed: SealedEntity,
        binding: Arc<ModelBinding>,
        factory: Arc<ProxyFactory>,
    ) -> Self {
        Self {
            sealed,
            binding,
            factory,
            references: RefCell::default(),
            parent: OnceCell::new(),
            isolated: IsolatedEditors::default(),
            _model: PhantomData,
        }
    }

    #[must_use]
    pub const fn sealed(&self) -> &SealedEntity {
        &self.sealed
    }

    #[must_use]
    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.sealed.entity_type()
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<i32> {
        self.sealed.primary_key()
    }

    ///
    /// ATTRIBUTES
    ///

    pub fn attribute<T: FieldValue>(&self, member: &str) -> Result<Option<T>, Error> {
        let name = self.binding.attribute(member)?;

        self.sealed
            .attribute(&name)?
            .map(|value| convert(self.entity_type(), member, value))
            .transpose()
    }

    /// Like `attribute`, but reads as `None` when the attribute was not fetched.
    pub fn attribute_if_present<T: FieldValue>(&self, member: &str) -> Result<Option<T>, Error> {
        if_present(self.attribute(member))
    }

    pub fn localized_attribute<T: FieldValue>(
        &self,
        member: &str,
        locale: &Locale,
    ) -> Result<Option<T>, Error> {
        let name = self.binding.attribute(member)?;

        self.sealed
            .localized_attribute(&name, locale)?
            .map(|value| convert(self.entity_type(), member, value))
            .transpose()
    }

    /// Every fetched locale variant of a localized attribute.
    pub fn attribute_values<T: FieldValue>(
        &self,
        member: &str,
    ) -> Result<BTreeMap<Option<Locale>, T>, Error> {
        let name = self.binding.attribute(member)?;

        self.sealed
            .attribute_values(&name)?
            .into_iter()
            .map(|(locale, value)| {
                convert(self.entity_type(), member, value).map(|v| (locale.cloned(), v))
            })
            .collect()
    }

    ///
    /// ASSOCIATED DATA
    ///

    pub fn associated_data<T: DeserializeOwned>(&self, member: &str) -> Result<Option<T>, Error> {
        let name = self.binding.associated_data(member)?;

        self.sealed
            .associated_data(&name)?
            .map(|value| deserialize(self.entity_type(), member, value))
            .transpose()
    }

    pub fn associated_data_if_present<T: DeserializeOwned>(
        &self,
        member: &str,
    ) -> Result<Option<T>, Error> {
        if_present(self.associated_data(member))
    }

    pub fn localized_associated_data<T: DeserializeOwned>(
        &self,
        member: &str,
        locale: &Locale,
    ) -> Result<Option<T>, Error> {
        let name = self.binding.associated_data(member)?;

        self.sealed
            .localized_associated_data(&name, locale)?
            .map(|value| deserialize(self.entity_type(), member, value))
            .transpose()
    }

    ///
    /// REFERENCES
    ///

    fn reference_proxy(&self, key: &ReferenceKey) -> Option<Rc<ReferenceProxy>> {
        let reference = self.sealed.entity().references.get(key)?;
        let mut cache = self.references.borrow_mut();
        let proxy = cache.entry(key.clone()).or_insert_with(|| {
            Rc::new(ReferenceProxy::new(
                reference.clone(),
                &self.sealed,
                Arc::clone(&self.factory),
                self.isolated.clone(),
            ))
        });

        Some(Rc::clone(proxy))
    }

    /// All references of a reference member.
    pub fn references(&self, member: &str) -> Result<Vec<Rc<ReferenceProxy>>, Error> {
        let binding = self.binding.reference(member)?;
        let keys: Vec<ReferenceKey> = self
            .sealed
            .references(&binding.name)?
            .into_iter()
            .map(|reference| reference.key.clone())
            .collect();

        Ok(keys.iter().filter_map(|key| self.reference_proxy(key)).collect())
    }

    /// The single reference of a member. Fails when it holds more than one.
    pub fn reference(&self, member: &str) -> Result<Option<Rc<ReferenceProxy>>, Error> {
        let mut references = self.references(member)?;
        if references.len() > 1 {
            return Err(ProxyError::AmbiguousReference {
                entity: self.entity_type().to_string(),
                reference: member.to_string(),
                count: references.len(),
            }
            .into());
        }

        Ok(references.pop())
    }

    /// First reference of a member pointing at `primary_key`.
    pub fn reference_by_id(
        &self,
        member: &str,
        primary_key: i32,
    ) -> Result<Option<Rc<ReferenceProxy>>, Error> {
        let binding = self.binding.reference(member)?;
        let key = self
            .sealed
            .references_to(&binding.name, primary_key)?
            .first()
            .map(|reference| reference.key.clone());

        Ok(key.and_then(|key| self.reference_proxy(&key)))
    }

    /// Body of the single referenced entity read as `T`.
    pub fn referenced_entity<T: EntityClass>(
        &self,
        member: &str,
    ) -> Result<Option<Rc<EntityProxy<T>>>, Error> {
        match self.reference(member)? {
            Some(reference) => reference.referenced_entity(),
            None => Ok(None),
        }
    }

    /// Bodies of every referenced entity, skipping references whose body is
    /// not stored.
    pub fn referenced_entities<T: EntityClass>(
        &self,
        member: &str,
    ) -> Result<Vec<Rc<EntityProxy<T>>>, Error> {
        let mut bodies = Vec::new();
        for reference in self.references(member)? {
            if let Some(body) = reference.referenced_entity()? {
                bodies.push(body);
            }
        }

        Ok(bodies)
    }

    ///
    /// HIERARCHY
    ///

    pub fn parent_id(&self) -> Result<Option<i32>, Error> {
        Ok(self.sealed.parent_id()?)
    }

    /// Parent body, the same instance on every call.
    pub fn parent(&self) -> Result<Option<Rc<Self>>, Error> {
        let body = self.sealed.parent()?;
        let parent = self.parent.get_or_init(|| {
            body.map(|body| {
                Rc::new(Self::new(
                    body.as_ref().clone(),
                    Arc::clone(&self.factory),
                ))
            })
        });

        Ok(parent.clone())
    }

    pub fn parent_if_present(&self) -> Result<Option<Rc<Self>>, Error> {
        if_present(self.parent())
    }

    ///
    /// PRICES
    ///

    pub fn prices(&self) -> Result<Vec<Price>, Error> {
        Ok(self.sealed.prices()?.into_iter().cloned().collect())
    }

    pub fn price(
        &self,
        price_id: i32,
        price_list: &str,
        currency: impl Into<Currency>,
    ) -> Result<Option<Price>, Error> {
        let key = PriceKey::new(price_id, price_list, currency);

        Ok(self.sealed.price(&key)?.cloned())
    }

    pub fn price_for_sale(&self) -> Result<Option<Price>, Error> {
        Ok(self.sealed.price_for_sale()?)
    }

    pub fn price_for_sale_if_present(&self) -> Result<Option<Price>, Error> {
        if_present(self.price_for_sale())
    }

    #[must_use]
    pub fn locales(&self) -> BTreeSet<Locale> {
        self.sealed.locales()
    }

    ///
    /// CONVERSION
    ///

    /// Read every declared member into a model value.
    pub fn materialize(&self) -> Result<M, Error> {
        M::from_proxy(self)
    }

    /// Editor over the stored entity this proxy was sealed from. Its deep
    /// upsert also stores what isolated reference editors opened from this
    /// proxy recorded.
    #[must_use]
    pub fn open_for_write(&self) -> EntityEditor<M> {
        EntityEditor::from_sealed(
            &self.sealed,
            Arc::clone(&self.binding),
            Arc::clone(&self.factory),
            self.isolated.clone(),
        )
    }
}

impl<M> fmt::Debug for EntityProxy<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("class", &self.binding.class().name)
            .field("entity", &self.sealed.reference_to())
            .finish_non_exhaustive()
    }
}

fn deserialize<T: DeserializeOwned>(
    entity: &str,
    member: &str,
    value: &lumendb_primitives::Value,
) -> Result<T, Error> {
    let mismatch = |found: String| ProxyError::ValueMismatch {
        entity: entity.to_string(),
        member: member.to_string(),
        expected: std::any::type_name::<T>().to_string(),
        found,
    };

    let json = value.to_json().map_err(|err| mismatch(err.to_string()))?;

    Ok(serde_json::from_value(json).map_err(|err| mismatch(err.to_string()))?)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{AttributeKey, Entity, Reference},
        fetch::{EntityFetch, ReferenceFetch, entity_fetch_all},
        model::{
            AssociatedDataDescriptor, AttributeDescriptor, ClassDescriptor, FromProxy,
            MemberDescriptor, MemberRole, ReferenceDescriptor, TargetType,
        },
    };
    use lumendb_primitives::{Scalar, Value, ValueType};
    use lumendb_schema::{
        node::{
            AssociatedDataSchema, AttributeSchema, EntitySchema, ReferenceSchema,
            StandardReferenceSchema,
        },
        types::Cardinality,
    };
    use serde::Deserialize;

    fn text() -> ValueType {
        ValueType::Scalar(Scalar::Text)
    }

    fn complex() -> ValueType {
        ValueType::Scalar(Scalar::Complex)
    }

    static CATEGORY: ClassDescriptor = ClassDescriptor::new("Category", "CATEGORY")
        .hierarchy()
        .members(&[
            MemberDescriptor::new("id", &[MemberRole::PrimaryKey]),
            MemberDescriptor::new(
                "code",
                &[MemberRole::Attribute(AttributeDescriptor::new("code", text))],
            ),
            MemberDescriptor::new(
                "labels",
                &[MemberRole::AssociatedData(AssociatedDataDescriptor::new(
                    "labels", complex,
                ))],
            ),
            MemberDescriptor::new(
                "tags",
                &[MemberRole::Reference(ReferenceDescriptor::new(
                    "tags",
                    TargetType::Named("TAG"),
                ))],
            ),
            MemberDescriptor::new("parent", &[MemberRole::Parent]),
        ]);

    #[derive(Debug)]
    struct Category {
        code: Option<String>,
    }

    impl FromProxy for Category {
        fn from_proxy(proxy: &EntityProxy<Self>) -> Result<Self, Error> {
            Ok(Self {
                code: proxy.attribute("code")?,
            })
        }
    }

    impl EntityClass for Category {
        const DESCRIPTOR: &'static ClassDescriptor = &CATEGORY;
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Labels {
        title: String,
    }

    fn schema() -> Arc<EntitySchema> {
        let mut schema = EntitySchema::new("CATEGORY");
        schema
            .attributes
            .insert("code".into(), AttributeSchema::new("code", text()));
        schema.attributes.insert(
            "priority".into(),
            AttributeSchema::new("priority", ValueType::Scalar(Scalar::Int)),
        );
        schema.associated_data.insert(
            "labels".into(),
            AssociatedDataSchema::new("labels", complex()),
        );
        schema.references.insert(
            "tags".into(),
            ReferenceSchema::Standard(StandardReferenceSchema::new(
                "tags",
                "TAG",
                false,
                Cardinality::ZeroOrMore,
            )),
        );

        Arc::new(schema)
    }

    fn entity(primary_key: i32, parent: Option<i32>) -> Arc<Entity> {
        let mut entity = Entity::new("CATEGORY", Some(primary_key));
        entity.parent = parent;
        entity
            .attributes
            .insert(AttributeKey::new("code"), Value::from(format!("c{primary_key}")));
        entity
            .attributes
            .insert(AttributeKey::new("priority"), Value::Int(5));
        entity.associated_data.insert(
            AttributeKey::new("labels"),
            Value::Complex(serde_json::json!({ "title": "Root" })),
        );
        for (internal_id, tag) in [(1, 10), (2, 11)] {
            let key = ReferenceKey::new("tags", tag, internal_id);
            entity
                .references
                .insert(key.clone(), Reference::new(key, "TAG".into()));
        }

        Arc::new(entity)
    }

    fn proxy(fetch: EntityFetch) -> EntityProxy<Category> {
        let fetch = Arc::new(fetch);
        let parent = SealedEntity::new(entity(1, None), schema(), Arc::clone(&fetch));
        let sealed = SealedEntity::new(entity(2, Some(1)), schema(), fetch)
            .with_parent(Arc::new(parent));

        EntityProxy::new(sealed, Arc::new(ProxyFactory::default()))
    }

    #[test]
    fn declared_and_matched_members_read() {
        let proxy = proxy(entity_fetch_all());

        assert_eq!(proxy.primary_key(), Some(2));
        assert_eq!(
            proxy.attribute::<String>("code").expect("fetched"),
            Some("c2".to_string())
        );
        // not declared by the class, matched by name
        assert_eq!(proxy.attribute::<i64>("priority").expect("fetched"), Some(5));
        assert_eq!(
            proxy.associated_data::<Labels>("labels").expect("fetched"),
            Some(Labels {
                title: "Root".into()
            })
        );
        assert_eq!(proxy.materialize().expect("read").code.as_deref(), Some("c2"));
    }

    #[test]
    fn missing_context_fails_unless_optional() {
        let proxy = proxy(EntityFetch::new());

        let err = proxy.associated_data::<Labels>("labels").expect_err("not fetched");
        assert!(err.is_context_missing());
        assert_eq!(
            proxy
                .associated_data_if_present::<Labels>("labels")
                .expect("optional"),
            None
        );
        assert!(proxy.parent_id().is_err());
    }

    #[test]
    fn unknown_members_and_mismatches_are_reported() {
        let proxy = proxy(entity_fetch_all());

        assert!(matches!(
            proxy.attribute::<String>("weight"),
            Err(Error::Proxy(ProxyError::UnknownMember { .. }))
        ));
        assert!(matches!(
            proxy.attribute::<bool>("code"),
            Err(Error::Proxy(ProxyError::ValueMismatch { .. }))
        ));
    }

    #[test]
    fn single_reference_accessor_rejects_many() {
        let proxy = proxy(EntityFetch::new().with_reference("tags", ReferenceFetch::new()));

        assert!(matches!(
            proxy.reference("tags"),
            Err(Error::Proxy(ProxyError::AmbiguousReference { count: 2, .. }))
        ));
        let tag = proxy.reference_by_id("tags", 11).expect("fetched").expect("present");
        assert_eq!(tag.referenced_primary_key(), 11);
        assert_eq!(proxy.references("tags").expect("fetched").len(), 2);
    }

    #[test]
    fn sub_proxies_keep_identity() {
        let proxy = proxy(
            EntityFetch::new()
                .with_attributes()
                .with_parent_body(EntityFetch::new().with_attributes())
                .with_reference("tags", ReferenceFetch::new()),
        );

        let first = proxy.reference_by_id("tags", 10).expect("fetched").expect("present");
        let second = proxy.references("tags").expect("fetched").remove(0);
        assert!(Rc::ptr_eq(&first, &second));

        let parent = proxy.parent().expect("fetched").expect("present");
        assert!(Rc::ptr_eq(&parent, &proxy.parent().expect("fetched").expect("present")));
        assert_eq!(parent.primary_key(), Some(1));
        assert_eq!(proxy.parent_id().expect("fetched"), Some(1));
    }
}
