use crate::{
    data::{GroupReference, Reference, ReferenceKey, SealedEntity},
    error::{Error, ProxyError},
    fetch::Selection,
    model::{EntityClass, ReferenceTarget},
    mutation::EntityBuilder,
    proxy::{
        EntityProxy, ProxyFactory, ReferenceEditor, convert, reference_editor::IsolatedEditors,
    },
};
use lumendb_primitives::{FieldValue, Locale};
use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
    sync::Arc,
};

type Body = Result<Option<Arc<SealedEntity>>, ProxyError>;

///
/// ReferenceProxy
///
/// Read view of one reference of a sealed entity. Bodies of the referenced
/// and group entities are only reachable when the reference fetch asked for
/// them; the bare key is always readable.
///

pub struct ReferenceProxy {
    reference: Reference,
    owner: SealedEntity,
    attributes: Selection,
    body: Body,
    group: Body,
    group_type: Option<String>,
    factory: Arc<ProxyFactory>,
    isolated: IsolatedEditors,
    bodies: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
    groups: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl ReferenceProxy {
    pub(crate) fn new(
        reference: Reference,
        owner: &SealedEntity,
        factory: Arc<ProxyFactory>,
        isolated: IsolatedEditors,
    ) -> Self {
        let key = &reference.key;
        let attributes = owner
            .reference_fetch_of(&key.name)
            .map_or(Selection::None, |fetch| fetch.attributes.clone());
        let body = owner.referenced_entity(key).map(|body| body.cloned());
        let group = owner.group_entity(key).map(|body| body.cloned());
        let group_type = owner
            .reference_schema(&key.name)
            .and_then(|schema| schema.referenced_group_type())
            .map(ToString::to_string);

        Self {
            reference,
            owner: owner.clone(),
            attributes,
            body,
            group,
            group_type,
            factory,
            isolated,
            bodies: RefCell::default(),
            groups: RefCell::default(),
        }
    }

    #[must_use]
    pub const fn reference(&self) -> &Reference {
        &self.reference
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.reference.name()
    }

    #[must_use]
    pub const fn key(&self) -> &ReferenceKey {
        &self.reference.key
    }

    #[must_use]
    pub const fn referenced_primary_key(&self) -> i32 {
        self.reference.referenced_primary_key()
    }

    #[must_use]
    pub fn referenced_entity_type(&self) -> &str {
        &self.reference.referenced_entity_type
    }

    #[must_use]
    pub const fn group(&self) -> Option<&GroupReference> {
        self.reference.group.as_ref()
    }

    fn missing(&self, content: impl std::fmt::Display) -> ProxyError {
        ProxyError::context_missing(self.owner.entity_type(), content)
    }

    ///
    /// ATTRIBUTES
    ///

    pub fn attribute<T: FieldValue>(&self, name: &str) -> Result<Option<T>, Error> {
        if !self.attributes.contains(name) {
            return Err(self
                .missing(format_args!("attribute `{name}` of reference `{}`", self.name()))
                .into());
        }

        self.reference
            .attribute(name)
            .map(|value| convert(self.owner.entity_type(), name, value))
            .transpose()
    }

    pub fn attribute_if_present<T: FieldValue>(&self, name: &str) -> Result<Option<T>, Error> {
        super::if_present(self.attribute(name))
    }

    pub fn localized_attribute<T: FieldValue>(
        &self,
        name: &str,
        locale: &Locale,
    ) -> Result<Option<T>, Error> {
        if !self.attributes.contains(name) || !self.owner.fetch().wants_locale(locale) {
            return Err(self
                .missing(format_args!(
                    "attribute `{name}` in locale `{locale}` of reference `{}`",
                    self.name()
                ))
                .into());
        }

        self.reference
            .localized_attribute(name, locale)
            .map(|value| convert(self.owner.entity_type(), name, value))
            .transpose()
    }

    ///
    /// BODIES
    ///

    /// Referenced entity body read as `T`, the same instance on every call.
    pub fn referenced_entity<T: EntityClass>(&self) -> Result<Option<Rc<EntityProxy<T>>>, Error> {
        let body = self.body.clone()?;

        self.cached(&self.bodies, body)
    }

    pub fn referenced_entity_if_present<T: EntityClass>(
        &self,
    ) -> Result<Option<Rc<EntityProxy<T>>>, Error> {
        super::if_present(self.referenced_entity())
    }

    pub fn group_entity<T: EntityClass>(&self) -> Result<Option<Rc<EntityProxy<T>>>, Error> {
        let body = self.group.clone()?;

        self.cached(&self.groups, body)
    }

    fn cached<T: EntityClass>(
        &self,
        cache: &RefCell<HashMap<TypeId, Rc<dyn Any>>>,
        body: Option<Arc<SealedEntity>>,
    ) -> Result<Option<Rc<EntityProxy<T>>>, Error> {
        let Some(body) = body else {
            return Ok(None);
        };
        if body.entity_type() != T::entity_type() {
            return Err(ProxyError::invalid_usage(format!(
                "entity `{}` cannot be read as `{}`",
                body.entity_type(),
                T::DESCRIPTOR.name
            ))
            .into());
        }

        let entry = Rc::clone(cache.borrow_mut().entry(TypeId::of::<T>()).or_insert_with(|| {
            let proxy: Rc<dyn Any> = Rc::new(EntityProxy::<T>::new(
                body.as_ref().clone(),
                Arc::clone(&self.factory),
            ));
            proxy
        }));

        entry
            .downcast::<EntityProxy<T>>()
            .map(Some)
            .map_err(|_| ProxyError::invalid_usage("cached body has another model type").into())
    }

    /// Read the reference as a reference class or a bare key.
    pub fn materialize<R: ReferenceTarget>(&self) -> Result<R, Error> {
        R::from_reference(self)
    }

    /// Editor with its own mutation set. The changes reach the store through
    /// its own `upsert_via`, or through `upsert_deeply_via` of an editor
    /// opened from the owning entity proxy.
    #[must_use]
    pub fn open_for_write(&self) -> ReferenceEditor<'static> {
        self.isolated.open(
            EntityBuilder::from_entity(self.owner.entity_arc()),
            self.reference.key.clone(),
            self.group_type.clone(),
        )
    }
}

impl std::fmt::Debug for ReferenceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceProxy")
            .field("owner", &self.owner.reference_to())
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}
