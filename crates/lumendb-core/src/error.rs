use lumendb_schema::{error::SchemaError, types::Cardinality};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Crate-level error so `?` flows through editor, analyzer and session
/// calls without manual mapping at every seam.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("model class `{class}` is not a valid schema source: {source}")]
    SchemaClassInvalid {
        class: String,
        #[source]
        source: AnalyzerError,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Error {
    pub fn schema_class_invalid(class: impl Into<String>, source: AnalyzerError) -> Self {
        Self::SchemaClassInvalid {
            class: class.into(),
            source,
        }
    }

    #[must_use]
    pub const fn as_proxy(&self) -> Option<&ProxyError> {
        match self {
            Self::Proxy(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_session(&self) -> Option<&SessionError> {
        match self {
            Self::Session(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_schema(&self) -> Option<&SchemaError> {
        match self {
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }

    /// True for the "data was not fetched" family of errors.
    #[must_use]
    pub const fn is_context_missing(&self) -> bool {
        matches!(self, Self::Proxy(ProxyError::ContextMissing { .. }))
    }
}

///
/// ProxyError
///
/// Raised by proxy accessors and editors at the offending call.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ProxyError {
    #[error(
        "reference `{reference}` of entity `{entity}` holds {count} references, ask for one by its primary key"
    )]
    AmbiguousReference {
        entity: String,
        reference: String,
        count: usize,
    },

    #[error("{content} of entity `{entity}` was not fetched, extend the fetch request")]
    ContextMissing { entity: String, content: String },

    #[error("invalid usage: {message}")]
    InvalidUsage { message: String },

    #[error("reference `{reference}` to `{primary_key}` is not present in entity `{entity}`")]
    ReferenceNotFound {
        entity: String,
        reference: String,
        primary_key: i32,
    },

    #[error("member `{member}` is not known to the schema of entity `{entity}`")]
    UnknownMember { entity: String, member: String },

    #[error("member `{member}` of entity `{entity}` cannot be read as {expected}: {found}")]
    ValueMismatch {
        entity: String,
        member: String,
        expected: String,
        found: String,
    },

    #[error("member `{member}` of entity `{entity}` has no value")]
    ValueMissing { entity: String, member: String },
}

impl ProxyError {
    pub fn context_missing(entity: impl Into<String>, content: impl fmt::Display) -> Self {
        Self::ContextMissing {
            entity: entity.into(),
            content: content.to_string(),
        }
    }

    pub fn invalid_usage(message: impl Into<String>) -> Self {
        Self::InvalidUsage {
            message: message.into(),
        }
    }

    pub fn unknown_member(entity: impl Into<String>, member: impl Into<String>) -> Self {
        Self::UnknownMember {
            entity: entity.into(),
            member: member.into(),
        }
    }

    pub fn value_missing(entity: impl Into<String>, member: impl Into<String>) -> Self {
        Self::ValueMissing {
            entity: entity.into(),
            member: member.into(),
        }
    }
}

///
/// SessionError
///
/// Persistence-time rule violations. Nothing is written when one of these
/// is returned.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SessionError {
    #[error("entity `{entity_type}` with primary key `{primary_key}` already exists")]
    EntityAlreadyExists { entity_type: String, primary_key: i32 },

    #[error("entity `{entity_type}` with primary key `{primary_key}` does not exist")]
    EntityNotFound { entity_type: String, primary_key: i32 },

    #[error("schema of entity `{entity_type}` does not allow {change} on the fly")]
    EvolutionNotAllowed { entity_type: String, change: String },

    #[error("invalid mutation of entity `{entity_type}`: {message}")]
    InvalidMutation { entity_type: String, message: String },

    #[error(
        "entity `{entity_type}` misses mandatory attributes: {}",
        .missing.join(", ")
    )]
    MandatoryAttributesNotProvided {
        entity_type: String,
        missing: Vec<String>,
    },

    #[error(
        "reference `{reference}` of entity `{entity_type}` is {cardinality} but {count} references would be stored{}",
        duplicates_suffix(.duplicates)
    )]
    ReferenceCardinalityViolated {
        entity_type: String,
        reference: String,
        cardinality: Cardinality,
        count: usize,
        duplicates: bool,
    },

    #[error(
        "value `{value}` of unique attribute `{attribute}` is already used by `{entity_type}` `{owner}`"
    )]
    UniqueValueViolation {
        entity_type: String,
        attribute: String,
        value: String,
        owner: i32,
    },
}

// mark violations caused by repeated primary keys
const fn duplicates_suffix(duplicates: &bool) -> &'static str {
    if *duplicates { " (with duplicates)" } else { "" }
}

impl SessionError {
    pub fn invalid_mutation(entity_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidMutation {
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }
}

///
/// AnalyzerError
///
/// Why a model class could not be turned into a schema.
///

#[remain::sorted]
#[derive(Debug, ThisError)]
pub enum AnalyzerError {
    #[error("member `{member}` declares conflicting roles: {}", .roles.join(", "))]
    ConflictingRoles { member: String, roles: Vec<String> },

    #[error("member `{member}`: {message}")]
    InvalidMember { member: String, message: String },

    #[error(
        "reflected reference `{member}` must mirror exactly one reference of `{entity_type}`, found {found}"
    )]
    ReflectedOriginUnresolved {
        member: String,
        entity_type: String,
        found: usize,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl AnalyzerError {
    pub fn invalid_member(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidMember {
            member: member.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinality_violation_names_reference() {
        let err = SessionError::ReferenceCardinalityViolated {
            entity_type: "PRODUCT".to_string(),
            reference: "brand".to_string(),
            cardinality: Cardinality::ExactlyOne,
            count: 0,
            duplicates: false,
        };

        assert_eq!(
            err.to_string(),
            "reference `brand` of entity `PRODUCT` is EXACTLY_ONE but 0 references would be stored"
        );
    }

    #[test]
    fn schema_class_invalid_keeps_source() {
        let err = Error::schema_class_invalid(
            "Product",
            AnalyzerError::ConflictingRoles {
                member: "code".to_string(),
                roles: vec!["attribute".to_string(), "associated data".to_string()],
            },
        );

        assert!(err.to_string().contains("conflicting roles: attribute, associated data"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn context_missing_is_detected_through_crate_error() {
        let err = Error::from(ProxyError::context_missing("CATEGORY", "associated data `labels`"));

        assert!(err.is_context_missing());
        assert_eq!(
            err.to_string(),
            "associated data `labels` of entity `CATEGORY` was not fetched, extend the fetch request"
        );
    }
}
