use crate::{error::NameConflict, node::NamedSchema};
use lumendb_utils::NameVariants;

/// First member of `others` (other than `name` itself) sharing a name
/// variant with `variants` under the same convention.
pub fn find_conflict<'a, T>(
    name: &str,
    variants: &NameVariants,
    others: impl IntoIterator<Item = &'a T>,
) -> Option<NameConflict>
where
    T: NamedSchema + ?Sized + 'a,
{
    others
        .into_iter()
        .filter(|other| other.name() != name)
        .find_map(|other| {
            variants
                .conflict_with(other.name_variants())
                .map(|(convention, variant)| NameConflict {
                    existing: other.name().to_string(),
                    convention,
                    variant: variant.to_string(),
                })
        })
}

/// Like `find_conflict`, but an identical name counts as a conflict too.
/// Used across member kinds, e.g. an attribute against compounds.
pub fn find_any_conflict<'a, T>(
    variants: &NameVariants,
    others: impl IntoIterator<Item = &'a T>,
) -> Option<NameConflict>
where
    T: NamedSchema + ?Sized + 'a,
{
    others.into_iter().find_map(|other| {
        variants
            .conflict_with(other.name_variants())
            .map(|(convention, variant)| NameConflict {
                existing: other.name().to_string(),
                convention,
                variant: variant.to_string(),
            })
    })
}
