use lumendb_primitives::{Scalar, Value, ValueType};
use lumendb_schema::types::{Cardinality, EvolutionMode, OrderBehaviour, OrderDirection};

///
/// ClassDescriptor
///
/// Static description of one model class, usually emitted by
/// `#[derive(EntityClass)]`. The analyzer turns it into an entity schema,
/// the proxy factory into a binding.
///

#[derive(Debug)]
pub struct ClassDescriptor {
    /// Rust type name, used in diagnostics.
    pub name: &'static str,
    /// Entity type the class is stored as.
    pub entity: &'static str,
    pub description: Option<&'static str>,
    pub deprecated: Option<&'static str>,
    pub allowed_locales: &'static [&'static str],
    pub allowed_currencies: &'static [&'static str],

    /// `None` keeps every evolution mode open.
    pub evolution: Option<&'static [EvolutionMode]>,
    pub hierarchy: bool,
    pub price: bool,
    pub generated_primary_key: bool,
    pub sortable_compounds: &'static [CompoundDescriptor],
    pub members: &'static [MemberDescriptor],
}

impl ClassDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, entity: &'static str) -> Self {
        Self {
            name,
            entity,
            description: None,
            deprecated: None,
            allowed_locales: &[],
            allowed_currencies: &[],
            evolution: None,
            hierarchy: false,
            price: false,
            generated_primary_key: false,
            sortable_compounds: &[],
            members: &[],
        }
    }

    #[must_use]
    pub const fn members(mut self, members: &'static [MemberDescriptor]) -> Self {
        self.members = members;
        self
    }

    #[must_use]
    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub const fn deprecated(mut self, notice: &'static str) -> Self {
        self.deprecated = Some(notice);
        self
    }

    #[must_use]
    pub const fn allowed_locales(mut self, locales: &'static [&'static str]) -> Self {
        self.allowed_locales = locales;
        self
    }

    #[must_use]
    pub const fn allowed_currencies(mut self, currencies: &'static [&'static str]) -> Self {
        self.allowed_currencies = currencies;
        self
    }

    #[must_use]
    pub const fn evolution(mut self, modes: &'static [EvolutionMode]) -> Self {
        self.evolution = Some(modes);
        self
    }

    #[must_use]
    pub const fn hierarchy(mut self) -> Self {
        self.hierarchy = true;
        self
    }

    #[must_use]
    pub const fn price(mut self) -> Self {
        self.price = true;
        self
    }

    #[must_use]
    pub const fn generated_primary_key(mut self) -> Self {
        self.generated_primary_key = true;
        self
    }

    #[must_use]
    pub const fn sortable_compounds(mut self, compounds: &'static [CompoundDescriptor]) -> Self {
        self.sortable_compounds = compounds;
        self
    }

    /// Member declared for a field.
    #[must_use]
    pub fn member(&self, field: &str) -> Option<&'static MemberDescriptor> {
        self.members.iter().find(|member| member.field == field)
    }

    /// Attribute declarations, in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &'static AttributeDescriptor> {
        self.members.iter().filter_map(MemberDescriptor::attribute)
    }

    pub fn references(&self) -> impl Iterator<Item = &'static ReferenceDescriptor> {
        self.members.iter().filter_map(|member| {
            member.roles.iter().find_map(|role| match role {
                MemberRole::Reference(reference) => Some(reference),
                _ => None,
            })
        })
    }
}

///
/// MemberDescriptor
///
/// One field of a model class and the roles declared on it. More than one
/// schema role on a member makes the class invalid.
///

#[derive(Debug)]
pub struct MemberDescriptor {
    pub field: &'static str,
    pub roles: &'static [MemberRole],
}

impl MemberDescriptor {
    #[must_use]
    pub const fn new(field: &'static str, roles: &'static [MemberRole]) -> Self {
        Self { field, roles }
    }

    #[must_use]
    pub fn attribute(&self) -> Option<&AttributeDescriptor> {
        self.roles.iter().find_map(|role| match role {
            MemberRole::Attribute(attribute) => Some(attribute),
            _ => None,
        })
    }
}

///
/// MemberRole
///

#[remain::sorted]
#[derive(Debug)]
pub enum MemberRole {
    AssociatedData(AssociatedDataDescriptor),
    Attribute(AttributeDescriptor),
    Locales,
    Parent,
    PriceForSale,
    Prices,
    PrimaryKey,
    Reference(ReferenceDescriptor),
    ReferencedEntity,
    ReferencedEntityGroup,
    ReferencedPrimaryKey,
    ReflectedReference(ReflectedReferenceDescriptor),
}

impl MemberRole {
    /// Label used in diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AssociatedData(_) => "associated data",
            Self::Attribute(_) => "attribute",
            Self::Locales => "locales",
            Self::Parent => "parent",
            Self::PriceForSale => "price for sale",
            Self::Prices => "prices",
            Self::PrimaryKey => "primary key",
            Self::Reference(_) => "reference",
            Self::ReferencedEntity => "referenced entity",
            Self::ReferencedEntityGroup => "referenced entity group",
            Self::ReferencedPrimaryKey => "referenced primary key",
            Self::ReflectedReference(_) => "reflected reference",
        }
    }

    /// Schema member name the role binds to, if it binds to one.
    #[must_use]
    pub const fn schema_name(&self) -> Option<&'static str> {
        match self {
            Self::AssociatedData(data) => Some(data.name),
            Self::Attribute(attribute) => Some(attribute.name),
            Self::Reference(reference) => Some(reference.name),
            Self::ReflectedReference(reflected) => Some(reflected.name),
            _ => None,
        }
    }
}

///
/// AttributeDescriptor
///

#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct AttributeDescriptor {
    pub name: &'static str,
    pub value_type: fn() -> ValueType,
    pub description: Option<&'static str>,
    pub deprecated: Option<&'static str>,
    pub default_value: Option<fn() -> Value>,
    pub indexed_decimal_places: Option<u32>,
    pub unique: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub localized: bool,
    pub nullable: bool,
    pub representative: bool,

    /// Defined once at catalog level and shared by the entity.
    pub global: bool,
    pub unique_globally: bool,
}

impl AttributeDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, value_type: fn() -> ValueType) -> Self {
        Self {
            name,
            value_type,
            description: None,
            deprecated: None,
            default_value: None,
            indexed_decimal_places: None,
            unique: false,
            filterable: false,
            sortable: false,
            localized: false,
            nullable: false,
            representative: false,
            global: false,
            unique_globally: false,
        }
    }

    #[must_use]
    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub const fn deprecated(mut self, notice: &'static str) -> Self {
        self.deprecated = Some(notice);
        self
    }

    #[must_use]
    pub const fn default_value(mut self, value: fn() -> Value) -> Self {
        self.default_value = Some(value);
        self
    }

    #[must_use]
    pub const fn indexed_decimal_places(mut self, places: u32) -> Self {
        self.indexed_decimal_places = Some(places);
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    #[must_use]
    pub const fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    #[must_use]
    pub const fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn representative(mut self) -> Self {
        self.representative = true;
        self
    }

    #[must_use]
    pub const fn global(mut self) -> Self {
        self.global = true;
        self
    }

    #[must_use]
    pub const fn unique_globally(mut self) -> Self {
        self.global = true;
        self.unique_globally = true;
        self
    }
}

///
/// AssociatedDataDescriptor
///

#[derive(Debug)]
pub struct AssociatedDataDescriptor {
    pub name: &'static str,
    pub value_type: fn() -> ValueType,
    pub description: Option<&'static str>,
    pub deprecated: Option<&'static str>,
    pub localized: bool,
    pub nullable: bool,
}

impl AssociatedDataDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, value_type: fn() -> ValueType) -> Self {
        Self {
            name,
            value_type,
            description: None,
            deprecated: None,
            localized: false,
            nullable: false,
        }
    }

    #[must_use]
    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub const fn deprecated(mut self, notice: &'static str) -> Self {
        self.deprecated = Some(notice);
        self
    }

    #[must_use]
    pub const fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

///
/// TargetType
///
/// Entity type a reference or group points at.
///

#[derive(Clone, Copy, Debug)]
pub enum TargetType {
    /// Another model class, always a managed entity collection.
    Class(fn() -> &'static ClassDescriptor),

    /// Plain type name, managed only when the catalog knows it.
    Named(&'static str),
}

impl TargetType {
    #[must_use]
    pub fn entity_type(self) -> &'static str {
        match self {
            Self::Class(class) => class().entity,
            Self::Named(name) => name,
        }
    }

    #[must_use]
    pub fn class(self) -> Option<&'static ClassDescriptor> {
        match self {
            Self::Class(class) => Some(class()),
            Self::Named(_) => None,
        }
    }
}

/// Value type of associated data kept as a JSON document.
#[must_use]
pub const fn complex_type() -> ValueType {
    ValueType::scalar(Scalar::Complex)
}

// reference without a reference class
const fn no_class() -> Option<&'static ReferenceClassDescriptor> {
    None
}

///
/// ReferenceDescriptor
///

#[derive(Debug)]
pub struct ReferenceDescriptor {
    pub name: &'static str,
    pub target: TargetType,
    pub group: Option<TargetType>,

    /// Defaults to the shape of the field.
    pub cardinality: Option<Cardinality>,
    pub description: Option<&'static str>,
    pub deprecated: Option<&'static str>,
    pub indexed: bool,
    pub faceted: bool,

    /// Reference class contributing attributes.
    pub class: fn() -> Option<&'static ReferenceClassDescriptor>,
}

impl ReferenceDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, target: TargetType) -> Self {
        Self {
            name,
            target,
            group: None,
            cardinality: None,
            description: None,
            deprecated: None,
            indexed: false,
            faceted: false,
            class: no_class,
        }
    }

    #[must_use]
    pub const fn group(mut self, group: TargetType) -> Self {
        self.group = Some(group);
        self
    }

    #[must_use]
    pub const fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    #[must_use]
    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub const fn deprecated(mut self, notice: &'static str) -> Self {
        self.deprecated = Some(notice);
        self
    }

    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    #[must_use]
    pub const fn faceted(mut self) -> Self {
        self.indexed = true;
        self.faceted = true;
        self
    }

    #[must_use]
    pub const fn class(mut self, class: fn() -> Option<&'static ReferenceClassDescriptor>) -> Self {
        self.class = class;
        self
    }
}

///
/// Inheritance
///
/// Attributes a reflected reference copies from its origin.
///

#[derive(Clone, Copy, Debug)]
pub enum Inheritance {
    All,
    Except(&'static [&'static str]),
    None,
    Only(&'static [&'static str]),
}

///
/// ReflectedReferenceDescriptor
///

#[derive(Debug)]
pub struct ReflectedReferenceDescriptor {
    pub name: &'static str,
    pub target: TargetType,

    /// Origin reference on the target. Resolved from the target when there
    /// is exactly one reference pointing back.
    pub origin: Option<&'static str>,
    pub cardinality: Option<Cardinality>,
    pub description: Option<&'static str>,
    pub inheritance: Inheritance,
    pub class: fn() -> Option<&'static ReferenceClassDescriptor>,
}

impl ReflectedReferenceDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, target: TargetType) -> Self {
        Self {
            name,
            target,
            origin: None,
            cardinality: None,
            description: None,
            inheritance: Inheritance::All,
            class: no_class,
        }
    }

    #[must_use]
    pub const fn origin(mut self, origin: &'static str) -> Self {
        self.origin = Some(origin);
        self
    }

    #[must_use]
    pub const fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    #[must_use]
    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub const fn inheritance(mut self, inheritance: Inheritance) -> Self {
        self.inheritance = inheritance;
        self
    }

    #[must_use]
    pub const fn class(mut self, class: fn() -> Option<&'static ReferenceClassDescriptor>) -> Self {
        self.class = class;
        self
    }
}

///
/// ReferenceClassDescriptor
///
/// Members of a reference class: reference attributes, the referenced
/// primary key and the referenced or group bodies.
///

#[derive(Debug)]
pub struct ReferenceClassDescriptor {
    pub name: &'static str,
    pub members: &'static [MemberDescriptor],
}

impl ReferenceClassDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, members: &'static [MemberDescriptor]) -> Self {
        Self { name, members }
    }

    pub fn attributes(&self) -> impl Iterator<Item = &'static AttributeDescriptor> {
        self.members.iter().filter_map(MemberDescriptor::attribute)
    }
}

///
/// CompoundDescriptor
///

#[derive(Debug)]
pub struct CompoundDescriptor {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub elements: &'static [CompoundElement],
}

impl CompoundDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, elements: &'static [CompoundElement]) -> Self {
        Self {
            name,
            description: None,
            elements,
        }
    }

    #[must_use]
    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

///
/// CompoundElement
///

#[derive(Clone, Copy, Debug)]
pub struct CompoundElement {
    pub attribute: &'static str,
    pub direction: OrderDirection,
    pub behaviour: OrderBehaviour,
}

impl CompoundElement {
    #[must_use]
    pub const fn asc(attribute: &'static str) -> Self {
        Self {
            attribute,
            direction: OrderDirection::Asc,
            behaviour: OrderBehaviour::NullsLast,
        }
    }

    #[must_use]
    pub const fn desc(attribute: &'static str) -> Self {
        Self {
            attribute,
            direction: OrderDirection::Desc,
            behaviour: OrderBehaviour::NullsLast,
        }
    }

    #[must_use]
    pub const fn nulls_first(mut self) -> Self {
        self.behaviour = OrderBehaviour::NullsFirst;
        self
    }
}
