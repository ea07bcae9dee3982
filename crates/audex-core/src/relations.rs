//! Relationship mutation events
//!
//! The editing layer announces every many-to-many mutation to its registered
//! [`RelationObserver`]s, once before the junction is touched and once after.

use crate::auditable::Auditable;
use crate::errors::Result;
use crate::model::entity_ref::EntityId;
use crate::writer::LogWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationAction {
    PreAdd,
    PostAdd,
    PreRemove,
    PostRemove,
    PreClear,
    PostClear,
}

impl RelationAction {
    pub fn is_pre(&self) -> bool {
        matches!(
            self,
            RelationAction::PreAdd | RelationAction::PreRemove | RelationAction::PreClear
        )
    }
}

/// Which end of the junction the mutation was invoked from
pub enum RelationSide<'e> {
    /// Invoked on the entity declaring the many-to-many field
    Forward {
        owner: &'e mut dyn Auditable,
        /// Related ids; empty for clear
        ids: &'e [EntityId],
    },
    /// Invoked on the related entity
    Reverse {
        related: EntityId,
        /// Owner ids; `None` for clear
        owners: Option<&'e [EntityId]>,
    },
}

pub struct RelationEvent<'e> {
    pub junction: &'e str,
    pub action: RelationAction,
    pub side: RelationSide<'e>,
}

impl RelationEvent<'_> {
    pub fn is_reverse(&self) -> bool {
        matches!(self.side, RelationSide::Reverse { .. })
    }
}

/// Callback for relationship mutations
pub trait RelationObserver {
    fn on_relation_event(
        &self,
        event: &mut RelationEvent<'_>,
        writer: &mut LogWriter<'_>,
    ) -> Result<()>;
}
