use crate::{
    db::EntitySession,
    error::{AnalyzerError, Error},
    model::{
        AssociatedDataDescriptor, AttributeDescriptor, ClassDescriptor, Inheritance, MemberRole,
        ReferenceClassDescriptor, ReferenceDescriptor, ReflectedReferenceDescriptor, TargetType,
    },
};
use lumendb_primitives::{Currency, Locale};
use lumendb_schema::{
    build::{
        AttributeSchemaBuilder, CatalogSchemaBuilder, EntitySchemaBuilder, ReferenceSchemaBuilder,
    },
    error::SchemaError,
    mutation::{CatalogSchemaMutation, ModifyCatalogSchemaMutation},
    node::{CatalogSchema, NamedSchema},
    types::{AttributeElement, Cardinality},
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{Level, event};

///
/// AnalysisResult
///

#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    pub entity_type: String,

    /// Catalog changes needed for the class, empty when the catalog
    /// already matches it.
    pub mutations: Vec<CatalogSchemaMutation>,
}

impl AnalysisResult {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    #[must_use]
    pub fn to_mutation(&self, catalog: &str) -> Option<ModifyCatalogSchemaMutation> {
        (!self.mutations.is_empty()).then(|| ModifyCatalogSchemaMutation {
            catalog: catalog.to_string(),
            mutations: self.mutations.clone(),
        })
    }
}

///
/// ClassSchemaAnalyzer
///
/// Derives catalog schema changes from a model class descriptor.
///
/// - Each member may declare one schema role.
/// - Global attributes are defined in the catalog and opted into.
/// - Classes targeted by reflected references are defined first when the
///   catalog does not know them yet.
///

pub struct ClassSchemaAnalyzer {
    class: &'static ClassDescriptor,
}

impl ClassSchemaAnalyzer {
    #[must_use]
    pub const fn new(class: &'static ClassDescriptor) -> Self {
        Self { class }
    }

    pub fn analyze<S: EntitySession + ?Sized>(&self, session: &S) -> Result<AnalysisResult, Error> {
        self.analyze_catalog(session.catalog_schema())
    }

    pub fn analyze_catalog(&self, catalog: Arc<CatalogSchema>) -> Result<AnalysisResult, Error> {
        let mut builder = CatalogSchemaBuilder::new(catalog);
        let mut visited = BTreeSet::new();

        define_class(&mut builder, self.class, &mut visited)
            .map_err(|err| Error::schema_class_invalid(self.class.name, err))?;

        let mutations = builder
            .to_mutation()
            .map(|mutation| mutation.mutations)
            .unwrap_or_default();
        event!(
            Level::DEBUG,
            class = self.class.name,
            entity_type = self.class.entity,
            mutations = mutations.len(),
            "model class analyzed"
        );

        Ok(AnalysisResult {
            entity_type: self.class.entity.to_string(),
            mutations,
        })
    }
}

fn define_class(
    builder: &mut CatalogSchemaBuilder,
    class: &'static ClassDescriptor,
    visited: &mut BTreeSet<&'static str>,
) -> Result<(), AnalyzerError> {
    if !visited.insert(class.entity) {
        return Ok(());
    }
    check_members(class)?;

    // reflected references need their target before validation
    for member in class.members {
        for role in member.roles {
            if let MemberRole::ReflectedReference(reflected) = role
                && let Some(target) = reflected.target.class()
                && builder.current().entity_schema(target.entity).is_none()
            {
                define_class(builder, target, visited)?;
            }
        }
    }

    for attribute in class.attributes().filter(|attribute| attribute.global) {
        builder.with_attribute(attribute.name, (attribute.value_type)(), |global| {
            configure_attribute(global.attribute(), attribute);
            if attribute.unique_globally {
                global.unique_globally();
            }
        })?;
    }

    let mut reflections = Vec::new();
    for member in class.members {
        for role in member.roles {
            if let MemberRole::ReflectedReference(reflected) = role {
                reflections.push((reflected, resolve_origin(builder.current(), class, reflected)?));
            }
        }
    }

    let catalog = builder.current().clone();
    builder.with_entity_schema(class.entity, |entity| {
        configure_entity(entity, class)?;

        for member in class.members {
            for role in member.roles {
                match role {
                    MemberRole::Attribute(attribute) if attribute.global => {
                        entity.with_global_attribute(attribute.name)?;
                    }
                    MemberRole::Attribute(attribute) => {
                        entity.with_attribute(attribute.name, (attribute.value_type)(), |b| {
                            configure_attribute(b, attribute);
                        })?;
                    }
                    MemberRole::AssociatedData(data) => define_associated_data(entity, data)?,
                    MemberRole::Reference(reference) => {
                        define_reference(entity, &catalog, reference)?;
                    }
                    _ => {}
                }
            }
        }

        for (reflected, origin) in &reflections {
            define_reflected(entity, reflected, origin)?;
        }

        for compound in class.sortable_compounds {
            let elements = compound.elements.iter().map(|element| AttributeElement {
                attribute_name: element.attribute.to_string(),
                direction: element.direction,
                behaviour: element.behaviour,
            });
            entity.with_sortable_attribute_compound(compound.name, elements, |b| {
                if let Some(description) = compound.description {
                    b.with_description(description);
                }
            })?;
        }

        Ok(())
    })?;

    Ok(())
}

// one schema role per member, reference-class roles stay in reference classes
fn check_members(class: &ClassDescriptor) -> Result<(), AnalyzerError> {
    for member in class.members {
        let roles = member
            .roles
            .iter()
            .map(MemberRole::label)
            .collect::<BTreeSet<_>>();
        if roles.len() > 1 {
            return Err(AnalyzerError::ConflictingRoles {
                member: member.field.to_string(),
                roles: roles.into_iter().map(ToString::to_string).collect(),
            });
        }

        for role in member.roles {
            if matches!(
                role,
                MemberRole::ReferencedEntity
                    | MemberRole::ReferencedEntityGroup
                    | MemberRole::ReferencedPrimaryKey
            ) {
                return Err(AnalyzerError::invalid_member(
                    member.field,
                    format!("{} is only valid in a reference class", role.label()),
                ));
            }
        }
    }

    Ok(())
}

fn configure_entity(
    entity: &mut EntitySchemaBuilder,
    class: &ClassDescriptor,
) -> Result<(), SchemaError> {
    if let Some(description) = class.description {
        entity.with_description(description)?;
    }
    if let Some(notice) = class.deprecated {
        entity.deprecated(notice)?;
    }
    if class.generated_primary_key {
        entity.with_generated_primary_key()?;
    }
    if class.hierarchy {
        entity.with_hierarchy()?;
    }
    if class.price {
        entity.with_price()?;
    }
    for locale in class.allowed_locales {
        entity.with_locale(Locale::new(*locale))?;
    }
    for currency in class.allowed_currencies {
        entity.with_currency(Currency::new(currency))?;
    }
    if let Some(modes) = class.evolution {
        entity.verify_schema_but_allow(modes)?;
    }

    Ok(())
}

fn configure_attribute(builder: &mut AttributeSchemaBuilder, attribute: &AttributeDescriptor) {
    if let Some(description) = attribute.description {
        builder.with_description(description);
    }
    if let Some(notice) = attribute.deprecated {
        builder.deprecated(notice);
    }
    if let Some(default_value) = attribute.default_value {
        builder.with_default_value(default_value());
    }
    if let Some(places) = attribute.indexed_decimal_places {
        builder.indexed_decimal_places(places);
    }
    if attribute.unique {
        builder.unique();
    }
    if attribute.filterable {
        builder.filterable();
    }
    if attribute.sortable {
        builder.sortable();
    }
    if attribute.localized {
        builder.localized();
    }
    if attribute.nullable {
        builder.nullable();
    }
    if attribute.representative {
        builder.representative();
    }
}

fn define_associated_data(
    entity: &mut EntitySchemaBuilder,
    data: &AssociatedDataDescriptor,
) -> Result<(), SchemaError> {
    entity.with_associated_data(data.name, (data.value_type)(), |b| {
        if let Some(description) = data.description {
            b.with_description(description);
        }
        if let Some(notice) = data.deprecated {
            b.deprecated(notice);
        }
        if data.localized {
            b.localized();
        }
        if data.nullable {
            b.nullable();
        }
    })?;

    Ok(())
}

// class targets are managed, named ones when the catalog knows them
fn is_managed(catalog: &CatalogSchema, owner: &str, target: TargetType) -> bool {
    match target {
        TargetType::Class(_) => true,
        TargetType::Named(name) => name == owner || catalog.entity_schema(name).is_some(),
    }
}

fn define_reference(
    entity: &mut EntitySchemaBuilder,
    catalog: &CatalogSchema,
    reference: &ReferenceDescriptor,
) -> Result<(), SchemaError> {
    let owner = entity.name().to_string();
    let target = reference.target.entity_type();
    let cardinality = reference.cardinality.unwrap_or(Cardinality::ZeroOrMore);
    let class = (reference.class)();

    let configure = |b: &mut ReferenceSchemaBuilder| -> Result<(), SchemaError> {
        if let Some(description) = reference.description {
            b.with_description(description);
        }
        if let Some(notice) = reference.deprecated {
            b.deprecated(notice);
        }
        if reference.faceted {
            b.faceted();
        } else if reference.indexed {
            b.indexed();
        }
        if let Some(group) = reference.group {
            if is_managed(catalog, &owner, group) {
                b.with_group_type_related_to_entity(group.entity_type());
            } else {
                b.with_group_type(group.entity_type());
            }
        }
        for attribute in class.iter().flat_map(|class| class.attributes()) {
            b.with_attribute(attribute.name, (attribute.value_type)(), |a| {
                configure_attribute(a, attribute);
            })?;
        }

        Ok(())
    };

    if is_managed(catalog, &owner, reference.target) {
        entity.with_reference_to_entity(reference.name, target, cardinality, configure)?;
    } else {
        entity.with_reference_to(reference.name, target, cardinality, configure)?;
    }

    Ok(())
}

// name of the reference the reflection mirrors
fn resolve_origin(
    catalog: &CatalogSchema,
    class: &ClassDescriptor,
    reflected: &ReflectedReferenceDescriptor,
) -> Result<String, AnalyzerError> {
    let target = reflected.target.entity_type();

    let candidates: Vec<String> = match (reflected.target.class(), catalog.entity_schema(target)) {
        (Some(target_class), _) => target_class
            .references()
            .filter(|reference| reference.target.entity_type() == class.entity)
            .map(|reference| reference.name.to_string())
            .collect(),
        (None, Some(schema)) => schema
            .references_to(class.entity)
            .filter(|reference| !reference.is_reflected())
            .map(|reference| reference.name().to_string())
            .collect(),
        (None, None) => Vec::new(),
    };

    let found = match reflected.origin {
        Some(origin) => candidates
            .into_iter()
            .filter(|candidate| candidate == origin)
            .collect::<Vec<_>>(),
        None => candidates,
    };

    match found.as_slice() {
        [origin] => Ok(origin.clone()),
        _ => Err(AnalyzerError::ReflectedOriginUnresolved {
            member: reflected.name.to_string(),
            entity_type: target.to_string(),
            found: found.len(),
        }),
    }
}

fn define_reflected(
    entity: &mut EntitySchemaBuilder,
    reflected: &ReflectedReferenceDescriptor,
    origin: &str,
) -> Result<(), SchemaError> {
    let class: Option<&ReferenceClassDescriptor> = (reflected.class)();

    entity.with_reflected_reference_to_entity(
        reflected.name,
        reflected.target.entity_type(),
        origin,
        |b| {
            if let Some(description) = reflected.description {
                b.with_description(description);
            }
            if let Some(cardinality) = reflected.cardinality {
                b.with_cardinality(cardinality);
            }
            match reflected.inheritance {
                Inheritance::All => b.with_attributes_inherited(),
                Inheritance::Except(names) => {
                    b.with_attributes_inherited_except(names.iter().copied())
                }
                Inheritance::None => b.without_attributes_inherited(),
                Inheritance::Only(names) => b.with_attributes_inherited_only(names.iter().copied()),
            };
            for attribute in class.iter().flat_map(|class| class.attributes()) {
                b.with_attribute(attribute.name, (attribute.value_type)(), |a| {
                    configure_attribute(a, attribute);
                })?;
            }

            Ok(())
        },
    )?;

    Ok(())
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompoundDescriptor, CompoundElement, MemberDescriptor};
    use lumendb_primitives::{FieldValue, Value};
    use lumendb_schema::node::ReferenceSchema;

    fn text() -> lumendb_primitives::ValueType {
        String::value_type()
    }

    fn brand() -> &'static ClassDescriptor {
        &BRAND
    }

    fn product() -> &'static ClassDescriptor {
        &PRODUCT
    }

    fn ten() -> Value {
        Value::Int(10)
    }

    static BRAND: ClassDescriptor = ClassDescriptor::new("Brand", "BRAND")
        .members(&[
            MemberDescriptor::new("id", &[MemberRole::PrimaryKey]),
            MemberDescriptor::new(
                "code",
                &[MemberRole::Attribute(AttributeDescriptor::new("code", text).unique_globally())],
            ),
            MemberDescriptor::new(
                "products",
                &[MemberRole::ReflectedReference(ReflectedReferenceDescriptor::new(
                    "products",
                    TargetType::Class(product),
                ))],
            ),
        ]);

    static PRODUCT: ClassDescriptor = ClassDescriptor::new("Product", "PRODUCT")
        .description("Sellable item")
        .allowed_locales(&["en", "cs"])
        .sortable_compounds(&[CompoundDescriptor::new(
            "codeWithPriority",
            &[CompoundElement::asc("code"), CompoundElement::desc("priority")],
        )])
        .members(&[
            MemberDescriptor::new("id", &[MemberRole::PrimaryKey]),
            MemberDescriptor::new(
                "code",
                &[MemberRole::Attribute(AttributeDescriptor::new("code", text).unique_globally())],
            ),
            MemberDescriptor::new(
                "name",
                &[MemberRole::Attribute(
                    AttributeDescriptor::new("name", text).localized().deprecated("use title"),
                )],
            ),
            MemberDescriptor::new(
                "priority",
                &[MemberRole::Attribute(
                    AttributeDescriptor::new("priority", i64::value_type)
                        .sortable()
                        .default_value(ten),
                )],
            ),
            MemberDescriptor::new(
                "brand",
                &[MemberRole::Reference(
                    ReferenceDescriptor::new("brand", TargetType::Class(brand))
                        .cardinality(Cardinality::ZeroOrOne)
                        .group(TargetType::Named("BRAND_GROUP")),
                )],
            ),
            MemberDescriptor::new(
                "labels",
                &[MemberRole::AssociatedData(
                    AssociatedDataDescriptor::new("labels", text).localized(),
                )],
            ),
        ]);

    static CONFLICTING: ClassDescriptor = ClassDescriptor::new("Conflicting", "CONFLICTING")
        .members(&[MemberDescriptor::new(
            "code",
            &[
                MemberRole::Attribute(AttributeDescriptor::new("code", text)),
                MemberRole::AssociatedData(AssociatedDataDescriptor::new("code", text)),
            ],
        )]);

    static ORPHAN: ClassDescriptor = ClassDescriptor::new("Orphan", "ORPHAN").members(&[
        MemberDescriptor::new(
            "products",
            &[MemberRole::ReflectedReference(ReflectedReferenceDescriptor::new(
                "products",
                TargetType::Named("UNKNOWN"),
            ))],
        ),
    ]);

    fn apply(result: &AnalysisResult, catalog: &CatalogSchema) -> CatalogSchema {
        catalog
            .apply(&result.to_mutation(&catalog.name).expect("changes"))
            .expect("valid catalog")
    }

    #[test]
    fn class_members_become_schema() {
        let catalog = Arc::new(CatalogSchema::new("test"));
        let result = ClassSchemaAnalyzer::new(&PRODUCT)
            .analyze_catalog(Arc::clone(&catalog))
            .expect("valid class");
        let catalog = apply(&result, &catalog);

        let schema = catalog.entity_schema("PRODUCT").expect("product");
        assert_eq!(schema.description.as_deref(), Some("Sellable item"));
        assert!(schema.supports_locale(&Locale::new("cs")));
        assert!(schema.is_global_attribute("code"));
        assert!(catalog.attribute("code").is_some_and(|a| a.unique_globally));

        let name = schema.attribute("name").expect("name");
        assert!(name.localized);
        assert_eq!(name.deprecation_notice.as_deref(), Some("use title"));
        assert_eq!(
            schema.attribute("priority").and_then(|a| a.default_value.clone()),
            Some(Value::Int(10))
        );
        assert!(schema.associated_data("labels").is_some_and(|d| d.localized));
        assert!(schema.sortable_attribute_compound("codeWithPriority").is_some());

        let brand = schema.reference("brand").expect("brand");
        assert_eq!(brand.cardinality(), Cardinality::ZeroOrOne);
        assert!(brand.is_referenced_entity_type_managed());
        assert_eq!(brand.referenced_group_type(), Some("BRAND_GROUP"));
    }

    #[test]
    fn reflected_target_class_is_defined_first() {
        let catalog = Arc::new(CatalogSchema::new("test"));
        let result = ClassSchemaAnalyzer::new(&BRAND)
            .analyze_catalog(Arc::clone(&catalog))
            .expect("valid class");
        let catalog = apply(&result, &catalog);

        assert!(catalog.entity_schema("PRODUCT").is_some());
        let reflected = catalog
            .entity_schema("BRAND")
            .and_then(|schema| schema.reference("products"))
            .expect("reflected");
        assert!(matches!(
            reflected,
            ReferenceSchema::Reflected(r) if r.reflected_reference_name == "brand"
        ));
    }

    #[test]
    fn analyzing_known_class_again_changes_nothing() {
        let catalog = Arc::new(CatalogSchema::new("test"));
        let analyzer = ClassSchemaAnalyzer::new(&PRODUCT);
        let first = analyzer.analyze_catalog(Arc::clone(&catalog)).expect("valid");
        let catalog = Arc::new(apply(&first, &catalog));

        let second = analyzer.analyze_catalog(catalog).expect("valid");
        assert!(second.is_empty());
    }

    #[test]
    fn conflicting_roles_are_rejected() {
        let err = ClassSchemaAnalyzer::new(&CONFLICTING)
            .analyze_catalog(Arc::new(CatalogSchema::new("test")))
            .expect_err("conflict");

        let Error::SchemaClassInvalid { class, source } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(class, "Conflicting");
        assert!(matches!(
            source,
            AnalyzerError::ConflictingRoles { ref roles, .. } if roles.len() == 2
        ));
    }

    #[test]
    fn unresolved_reflection_is_rejected() {
        let err = ClassSchemaAnalyzer::new(&ORPHAN)
            .analyze_catalog(Arc::new(CatalogSchema::new("test")))
            .expect_err("no origin");

        assert!(matches!(
            err,
            Error::SchemaClassInvalid {
                source: AnalyzerError::ReflectedOriginUnresolved { found: 0, .. },
                ..
            }
        ));
    }
}
