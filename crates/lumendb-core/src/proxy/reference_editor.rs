use crate::{
    data::{AttributeKey, Entity, EntityReference, GroupReference, Reference, ReferenceKey},
    db::EntitySession,
    error::{Error, ProxyError, SessionError},
    fetch::entity_fetch_all,
    mutation::{EntityBuilder, EntityMutation, LocalMutation},
};
use lumendb_primitives::{FieldValue, Locale, Value};
use std::{cell::RefCell, rc::Rc, sync::Arc};

///
/// IsolatedEditors
///
/// Builders of the isolated reference editors opened over one entity. The
/// deep upsert of that entity's editor applies their pending changes.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct IsolatedEditors(Rc<RefCell<Vec<Rc<RefCell<EntityBuilder>>>>>);

impl IsolatedEditors {
    pub(crate) fn open(
        &self,
        builder: EntityBuilder,
        key: ReferenceKey,
        group_type: Option<String>,
    ) -> ReferenceEditor<'static> {
        let builder = Rc::new(RefCell::new(builder));
        self.0.borrow_mut().push(Rc::clone(&builder));

        ReferenceEditor {
            target: Target::Isolated(builder),
            key,
            group_type,
        }
    }

    /// Pending changes of every registered editor, in opening order.
    pub(crate) fn pending(&self) -> Vec<LocalMutation> {
        self.0
            .borrow()
            .iter()
            .flat_map(|builder| builder.borrow().mutations().to_vec())
            .collect()
    }

    /// Start every registered editor over from `base`.
    pub(crate) fn rebase(&self, base: &Arc<Entity>) {
        for builder in self.0.borrow().iter() {
            builder.borrow_mut().rebase(Arc::clone(base));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

///
/// Target
///

#[derive(Debug)]
enum Target<'a> {
    Isolated(Rc<RefCell<EntityBuilder>>),
    Shared(&'a mut EntityBuilder),
}

///
/// ReferenceEditor
///
/// Writes one reference. A shared editor records into the builder of the
/// entity editor it came from. An isolated one owns a private builder; it
/// is persisted on its own or by the deep upsert of the entity it was
/// opened over.
///

#[derive(Debug)]
pub struct ReferenceEditor<'a> {
    target: Target<'a>,
    key: ReferenceKey,
    group_type: Option<String>,
}

impl<'a> ReferenceEditor<'a> {
    pub(crate) fn shared(
        builder: &'a mut EntityBuilder,
        key: ReferenceKey,
        group_type: Option<String>,
    ) -> Self {
        Self {
            target: Target::Shared(builder),
            key,
            group_type,
        }
    }

    fn read<R>(&self, f: impl FnOnce(&EntityBuilder) -> R) -> R {
        match &self.target {
            Target::Isolated(builder) => f(&builder.borrow()),
            Target::Shared(builder) => f(builder),
        }
    }

    fn write(&mut self, f: impl FnOnce(&mut EntityBuilder, &ReferenceKey)) {
        match &mut self.target {
            Target::Isolated(builder) => f(&mut builder.borrow_mut(), &self.key),
            Target::Shared(builder) => f(builder, &self.key),
        }
    }

    #[must_use]
    pub const fn key(&self) -> &ReferenceKey {
        &self.key
    }

    #[must_use]
    pub const fn is_isolated(&self) -> bool {
        matches!(self.target, Target::Isolated(_))
    }

    /// The reference with every pending change applied.
    #[must_use]
    pub fn reference(&self) -> Option<Reference> {
        self.read(|builder| builder.view().references.get(&self.key).cloned())
    }

    #[must_use]
    pub fn attribute<T: FieldValue>(&self, name: &str) -> Option<T> {
        self.read(|builder| {
            builder
                .view()
                .references
                .get(&self.key)
                .and_then(|reference| reference.attribute(name))
                .and_then(T::from_value)
        })
    }

    #[must_use]
    pub fn group(&self) -> Option<GroupReference> {
        self.reference().and_then(|reference| reference.group)
    }

    ///
    /// SETTERS
    ///

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        self.write(|builder, key| {
            builder.set_reference_attribute(key, AttributeKey::new(name), value);
        });
        self
    }

    pub fn set_localized_attribute(
        &mut self,
        name: &str,
        locale: impl Into<Locale>,
        value: impl Into<Value>,
    ) -> &mut Self {
        let (locale, value) = (locale.into(), value.into());
        self.write(|builder, key| {
            builder.set_reference_attribute(key, AttributeKey::localized(name, locale), value);
        });
        self
    }

    pub fn remove_attribute(&mut self, name: &str) -> &mut Self {
        self.write(|builder, key| {
            builder.remove_reference_attribute(key, AttributeKey::new(name));
        });
        self
    }

    /// Point the reference at a group entity of the schema's group type.
    pub fn set_group(&mut self, primary_key: i32) -> Result<&mut Self, Error> {
        let Some(entity_type) = self.group_type.clone() else {
            return Err(ProxyError::invalid_usage(format!(
                "reference `{}` declares no group type",
                self.key.name
            ))
            .into());
        };

        Ok(self.set_group_of(entity_type, primary_key))
    }

    pub fn set_group_of(&mut self, entity_type: impl Into<String>, primary_key: i32) -> &mut Self {
        let group = GroupReference {
            entity_type: entity_type.into(),
            primary_key,
        };
        self.write(|builder, key| {
            builder.set_reference_group(key, group);
        });
        self
    }

    pub fn remove_group(&mut self) -> &mut Self {
        self.write(|builder, key| {
            builder.remove_reference_group(key);
        });
        self
    }

    ///
    /// PERSISTENCE
    ///

    /// Pending changes of the owning entity. For a shared editor these
    /// include changes recorded through the entity editor.
    #[must_use]
    pub fn to_mutation(&self) -> Option<EntityMutation> {
        self.read(EntityBuilder::to_mutation)
    }

    /// Store the changes recorded through an isolated editor.
    pub fn upsert_via<S: EntitySession + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<EntityReference, Error> {
        let Target::Isolated(builder) = &self.target else {
            return Err(ProxyError::invalid_usage(
                "a shared reference editor is stored with its entity editor",
            )
            .into());
        };

        let primary_key = builder.borrow().primary_key().ok_or_else(|| {
            ProxyError::invalid_usage("reference editor of an entity without primary key")
        })?;
        let mut builder = builder.borrow_mut();
        let Some(mutation) = builder.to_mutation() else {
            return Ok(EntityReference::new(builder.entity_type(), primary_key));
        };

        let stored = session.upsert_and_fetch_entity(&mutation, &entity_fetch_all())?;
        let reference = stored.reference_to().ok_or_else(|| SessionError::EntityNotFound {
            entity_type: mutation.entity_type.clone(),
            primary_key,
        })?;
        builder.rebase(stored.entity_arc());

        Ok(reference)
    }
}
