use crate::{
    error::ProxyError,
    model::{AssociatedDataDescriptor, ClassDescriptor, EntityClass, MemberRole, TargetType},
};
use lumendb_primitives::ValueType;
use lumendb_schema::{
    node::{AssociatedDataSchema, AttributeSchema, EntitySchema, NamedSchema, ReferenceSchema},
    types::Cardinality,
};
use std::{
    any::TypeId,
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{Level, event};

///
/// Binding
///
/// What a model member reads and writes.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Binding {
    AssociatedData(String),
    Attribute(String),
    Locales,
    Parent,
    PriceForSale,
    Prices,
    PrimaryKey,
    Reference(ReferenceBinding),
}

///
/// ReferenceBinding
///
/// Reference member resolved against the schema, or against the class
/// declaration while the schema does not know the reference yet.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReferenceBinding {
    pub name: String,
    pub referenced_entity_type: String,
    pub cardinality: Cardinality,
    pub group_type: Option<String>,
}

impl ReferenceBinding {
    fn from_schema(reference: &ReferenceSchema) -> Self {
        Self {
            name: reference.name().to_string(),
            referenced_entity_type: reference.referenced_entity_type().to_string(),
            cardinality: reference.cardinality(),
            group_type: reference.referenced_group_type().map(ToString::to_string),
        }
    }

    fn from_declaration(
        name: &str,
        target: TargetType,
        group: Option<TargetType>,
        cardinality: Option<Cardinality>,
    ) -> Self {
        Self {
            name: name.to_string(),
            referenced_entity_type: target.entity_type().to_string(),
            cardinality: cardinality.unwrap_or(Cardinality::ZeroOrMore),
            group_type: group.map(|group| group.entity_type().to_string()),
        }
    }
}

///
/// ModelBinding
///
/// Member table of one model class against one schema version. Members
/// the class does not declare fall back to schema members whose name
/// matches in any naming convention.
///

#[derive(Debug)]
pub struct ModelBinding {
    class: &'static ClassDescriptor,
    schema: Arc<EntitySchema>,
    members: BTreeMap<&'static str, Binding>,
}

impl ModelBinding {
    #[must_use]
    pub fn new(class: &'static ClassDescriptor, schema: Arc<EntitySchema>) -> Self {
        let mut members = BTreeMap::new();

        for member in class.members {
            let Some(role) = member.roles.first() else {
                continue;
            };
            let binding = match role {
                MemberRole::AssociatedData(data) => Binding::AssociatedData(data.name.to_string()),
                MemberRole::Attribute(attribute) => Binding::Attribute(attribute.name.to_string()),
                MemberRole::Locales => Binding::Locales,
                MemberRole::Parent => Binding::Parent,
                MemberRole::PriceForSale => Binding::PriceForSale,
                MemberRole::Prices => Binding::Prices,
                MemberRole::PrimaryKey => Binding::PrimaryKey,
                MemberRole::Reference(reference) => Binding::Reference(
                    schema.reference(reference.name).map_or_else(
                        || {
                            ReferenceBinding::from_declaration(
                                reference.name,
                                reference.target,
                                reference.group,
                                reference.cardinality,
                            )
                        },
                        ReferenceBinding::from_schema,
                    ),
                ),
                MemberRole::ReflectedReference(reflected) => Binding::Reference(
                    schema.reference(reflected.name).map_or_else(
                        || {
                            ReferenceBinding::from_declaration(
                                reflected.name,
                                reflected.target,
                                None,
                                reflected.cardinality,
                            )
                        },
                        ReferenceBinding::from_schema,
                    ),
                ),
                MemberRole::ReferencedEntity
                | MemberRole::ReferencedEntityGroup
                | MemberRole::ReferencedPrimaryKey => continue,
            };
            members.insert(member.field, binding);
        }

        Self {
            class,
            schema,
            members,
        }
    }

    /// Binding of a class whose entity type has no stored schema yet. The
    /// attributes and associated data the class declares stand in for it.
    #[must_use]
    pub fn declared(class: &'static ClassDescriptor) -> Self {
        Self::new(class, Arc::new(declared_schema(class)))
    }

    #[must_use]
    pub const fn class(&self) -> &'static ClassDescriptor {
        self.class
    }

    #[must_use]
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    #[must_use]
    pub fn schema_arc(&self) -> Arc<EntitySchema> {
        Arc::clone(&self.schema)
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.class.entity
    }

    /// Binding of a member, declared or matched by name.
    #[must_use]
    pub fn resolve(&self, member: &str) -> Option<Binding> {
        if let Some(binding) = self.members.get(member) {
            return Some(binding.clone());
        }

        let schema = &self.schema;
        if let Some(attribute) = schema
            .attributes
            .values()
            .find(|attribute| attribute.name_variants.matches(member))
        {
            return Some(Binding::Attribute(attribute.name.clone()));
        }
        if let Some(name) = schema
            .global_attributes
            .iter()
            .find(|name| lumendb_utils::NameVariants::generate(name).matches(member))
        {
            return Some(Binding::Attribute(name.clone()));
        }
        if let Some(data) = schema
            .associated_data
            .values()
            .find(|data| data.name_variants.matches(member))
        {
            return Some(Binding::AssociatedData(data.name.clone()));
        }

        schema
            .references
            .values()
            .find(|reference| reference.name_variants().matches(member))
            .map(|reference| Binding::Reference(ReferenceBinding::from_schema(reference)))
    }

    pub(crate) fn unknown(&self, member: &str) -> ProxyError {
        ProxyError::unknown_member(self.entity_type(), member)
    }

    pub(crate) fn attribute(&self, member: &str) -> Result<String, ProxyError> {
        match self.resolve(member) {
            Some(Binding::Attribute(name)) => Ok(name),
            _ => Err(self.unknown(member)),
        }
    }

    pub(crate) fn associated_data(&self, member: &str) -> Result<String, ProxyError> {
        match self.resolve(member) {
            Some(Binding::AssociatedData(name)) => Ok(name),
            _ => Err(self.unknown(member)),
        }
    }

    pub(crate) fn reference(&self, member: &str) -> Result<ReferenceBinding, ProxyError> {
        match self.resolve(member) {
            Some(Binding::Reference(reference)) => Ok(reference),
            _ => Err(self.unknown(member)),
        }
    }

    pub(crate) fn attribute_localized(&self, name: &str) -> bool {
        self.schema.attribute(name).map_or_else(
            || {
                self.class
                    .attributes()
                    .any(|attribute| attribute.name == name && attribute.localized)
            },
            |attribute| attribute.localized,
        )
    }

    fn associated_data_descriptor(&self, name: &str) -> Option<&'static AssociatedDataDescriptor> {
        self.class
            .members
            .iter()
            .flat_map(|member| member.roles)
            .find_map(|role| match role {
                MemberRole::AssociatedData(data) if data.name == name => Some(data),
                _ => None,
            })
    }

    pub(crate) fn associated_data_localized(&self, name: &str) -> bool {
        self.schema.associated_data(name).map_or_else(
            || self.associated_data_descriptor(name).is_some_and(|data| data.localized),
            |data| data.localized,
        )
    }

    /// Declared type of associated data, used to read serialized values back.
    pub(crate) fn associated_data_type(&self, name: &str) -> Option<ValueType> {
        self.schema.associated_data(name).map_or_else(
            || self.associated_data_descriptor(name).map(|data| (data.value_type)()),
            |data| Some(data.value_type),
        )
    }
}

fn declared_schema(class: &ClassDescriptor) -> EntitySchema {
    let mut schema = EntitySchema::new(class.entity);

    for role in class.members.iter().flat_map(|member| member.roles) {
        match role {
            MemberRole::Attribute(attribute) => {
                let mut declared = AttributeSchema::new(attribute.name, (attribute.value_type)());
                declared.localized = attribute.localized;
                declared.nullable = attribute.nullable;
                schema.attributes.insert(attribute.name.to_string(), declared);
            }
            MemberRole::AssociatedData(data) => {
                let mut declared = AssociatedDataSchema::new(data.name, (data.value_type)());
                declared.localized = data.localized;
                declared.nullable = data.nullable;
                schema.associated_data.insert(data.name.to_string(), declared);
            }
            _ => {}
        }
    }

    schema
}

///
/// ProxyFactory
///
/// Caches one binding per model type and schema version. Shared by every
/// proxy a session hands out.
///

#[derive(Debug, Default)]
pub struct ProxyFactory {
    bindings: Mutex<HashMap<(TypeId, u32), Arc<ModelBinding>>>,
}

impl ProxyFactory {
    #[must_use]
    pub fn binding<M: EntityClass>(&self, schema: Arc<EntitySchema>) -> Arc<ModelBinding> {
        let key = (TypeId::of::<M>(), schema.version);
        let mut bindings = self.bindings.lock().unwrap_or_else(PoisonError::into_inner);

        Arc::clone(bindings.entry(key).or_insert_with(|| {
            event!(
                Level::TRACE,
                class = M::DESCRIPTOR.name,
                entity_type = M::DESCRIPTOR.entity,
                schema_version = schema.version,
                "model binding created"
            );
            Arc::new(ModelBinding::new(M::DESCRIPTOR, schema))
        }))
    }

    /// Number of cached bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
