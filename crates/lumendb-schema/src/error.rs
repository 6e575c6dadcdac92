use lumendb_utils::NamingConvention;
use std::{collections::BTreeMap, fmt};
use thiserror::Error as ThisError;

///
/// NameConflict
///
/// The existing member a new name clashes with, and the convention
/// under which both names project to the same string.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NameConflict {
    pub existing: String,
    pub convention: NamingConvention,
    pub variant: String,
}

impl fmt::Display for NameConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` (both are `{}` in {})",
            self.existing, self.variant, self.convention
        )
    }
}

// render an optional conflict as a message suffix
fn conflict_suffix(conflict: Option<&NameConflict>) -> String {
    conflict.map_or_else(
        || " with a different definition".to_string(),
        |c| format!(" as {c}"),
    )
}

///
/// SchemaError
///
/// Raised synchronously by the builder call that would break a rule.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SchemaError {
    #[error(
        "associated data `{name}` is already present in entity schema `{entity}`{}",
        conflict_suffix(.conflict.as_ref())
    )]
    AssociatedDataAlreadyPresent {
        entity: String,
        name: String,
        conflict: Option<NameConflict>,
    },

    #[error("attribute `{name}` is already defined in catalog schema `{catalog}`, use the global attribute instead")]
    AttributeAlreadyPresentInCatalogSchema { catalog: String, name: String },

    #[error(
        "attribute `{name}` is already present in `{owner}`{}",
        conflict_suffix(.conflict.as_ref())
    )]
    AttributeAlreadyPresentInEntitySchema {
        owner: String,
        name: String,
        conflict: Option<NameConflict>,
    },

    #[error("entity schema `{name}` is not present in the catalog")]
    EntitySchemaNotFound { name: String },

    #[error("invalid change of `{member}`: {message}")]
    InvalidSchemaChange { member: String, message: String },

    #[error("invalid schema mutation: {message}")]
    InvalidSchemaMutation { message: String },

    #[error(
        "reference `{name}` is already present in entity schema `{entity}`{}",
        conflict_suffix(.conflict.as_ref())
    )]
    ReferenceAlreadyPresent {
        entity: String,
        name: String,
        conflict: Option<NameConflict>,
    },

    #[error("sortable attribute compound `{compound}`: {message}")]
    SortableAttributeCompound { compound: String, message: String },
}

impl SchemaError {
    pub fn invalid_mutation(message: impl Into<String>) -> Self {
        Self::InvalidSchemaMutation {
            message: message.into(),
        }
    }

    pub fn invalid_change(member: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchemaChange {
            member: member.into(),
            message: message.into(),
        }
    }

    pub fn compound(compound: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SortableAttributeCompound {
            compound: compound.into(),
            message: message.into(),
        }
    }
}

impl From<ErrorTree> for SchemaError {
    fn from(tree: ErrorTree) -> Self {
        Self::invalid_mutation(tree.to_string())
    }
}

///
/// ErrorTree
///
/// Accumulates validation messages under nested routes so that one pass
/// reports every problem instead of the first one.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ErrorTree {
    messages: Vec<String>,
    children: BTreeMap<String, Self>,
}

impl ErrorTree {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
            children: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, message: impl ToString) {
        self.messages.push(message.to_string());
    }

    pub fn add_result<E: ToString>(&mut self, result: Result<(), E>) {
        if let Err(e) = result {
            self.add(e);
        }
    }

    /// Attach a child tree under `route`, dropping it when empty.
    pub fn merge_for(&mut self, route: impl Into<String>, child: Self) {
        if child.is_empty() {
            return;
        }

        let route = route.into();
        match self.children.get_mut(&route) {
            Some(existing) => existing.merge(child),
            None => {
                self.children.insert(route, child);
            }
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.messages.extend(other.messages);
        for (route, child) in other.children {
            self.merge_for(route, child);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.children.values().all(Self::is_empty)
    }

    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "\t".repeat(depth);
        for message in &self.messages {
            writeln!(f, "{indent}{message}")?;
        }
        for (route, child) in &self.children {
            writeln!(f, "{indent}{route} contains validation errors:")?;
            child.fmt_indented(f, depth + 1)?;
        }

        Ok(())
    }
}

impl fmt::Display for ErrorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl std::error::Error for ErrorTree {}

/// Push a formatted message into an `ErrorTree`.
#[macro_export]
macro_rules! err {
    ($errs:expr, $($arg:tt)*) => {
        $errs.add(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_children_do_not_make_tree_dirty() {
        let mut tree = ErrorTree::new();
        tree.merge_for("Reference schema `brand`", ErrorTree::new());

        assert!(tree.is_empty());
        assert!(tree.result().is_ok());
    }

    #[test]
    fn nested_messages_render_with_routes() {
        let mut inner = ErrorTree::new();
        err!(inner, "reflected reference `{}` is broken", "products");

        let mut tree = ErrorTree::new();
        tree.merge_for("Schema `CATEGORY`", inner);

        let rendered = tree.to_string();
        assert!(rendered.starts_with("Schema `CATEGORY` contains validation errors:"));
        assert!(rendered.contains("\treflected reference `products` is broken"));
    }

    #[test]
    fn conflict_is_described_in_message() {
        let err = SchemaError::AttributeAlreadyPresentInEntitySchema {
            owner: "PRODUCT".to_string(),
            name: "Abc".to_string(),
            conflict: Some(NameConflict {
                existing: "abc".to_string(),
                convention: NamingConvention::CamelCase,
                variant: "abc".to_string(),
            }),
        };

        assert_eq!(
            err.to_string(),
            "attribute `Abc` is already present in `PRODUCT` as `abc` (both are `abc` in camelCase)"
        );
    }
}
