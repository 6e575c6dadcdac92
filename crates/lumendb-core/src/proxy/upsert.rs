use crate::{
    data::{EntityReference, SealedEntity},
    error::{Error, SessionError},
};

///
/// UpsertResult
///
/// What `EntityEditor::upsert_via` hands back, picked by the caller's
/// expected type.
///

pub trait UpsertResult: Sized {
    fn from_upserted(stored: SealedEntity) -> Result<Self, Error>;
}

fn reference_of(stored: &SealedEntity) -> Result<EntityReference, Error> {
    stored.reference_to().ok_or_else(|| {
        SessionError::invalid_mutation(stored.entity_type(), "stored entity has no primary key")
            .into()
    })
}

impl UpsertResult for () {
    fn from_upserted(_: SealedEntity) -> Result<Self, Error> {
        Ok(())
    }
}

impl UpsertResult for i32 {
    fn from_upserted(stored: SealedEntity) -> Result<Self, Error> {
        reference_of(&stored).map(|reference| reference.primary_key)
    }
}

impl UpsertResult for EntityReference {
    fn from_upserted(stored: SealedEntity) -> Result<Self, Error> {
        reference_of(&stored)
    }
}

/// The stored entity, reloaded with all of its content.
impl UpsertResult for SealedEntity {
    fn from_upserted(stored: SealedEntity) -> Result<Self, Error> {
        Ok(stored)
    }
}
