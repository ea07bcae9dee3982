//! Relationship change listener
//!
//! Translates pre-mutation events into relationship changes on the pending
//! entries of the owning entities.

use crate::auditable::StoredEntity;
use crate::errors::Result;
use crate::model::entity_ref::EntityId;
use crate::model::log_entry::FieldActionKind;
use crate::relations::{RelationAction, RelationEvent, RelationObserver, RelationSide};
use crate::writer::{LogWriter, Persist};

/// Observer that records many-to-many changes in the audit log
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRelationListener;

impl AuditRelationListener {
    pub fn new() -> Self {
        Self
    }
}

impl RelationObserver for AuditRelationListener {
    fn on_relation_event(
        &self,
        event: &mut RelationEvent<'_>,
        writer: &mut LogWriter<'_>,
    ) -> Result<()> {
        if !event.action.is_pre() {
            return Ok(());
        }
        let Some(binding) = writer.schema().resolve_junction(event.junction).copied() else {
            tracing::debug!(junction = event.junction, "junction not audited");
            return Ok(());
        };
        let logged = writer
            .schema()
            .descriptor(binding.owner_type)?
            .is_logged(binding.field);

        match &mut event.side {
            RelationSide::Forward { owner, ids } => {
                if !logged {
                    return Ok(());
                }
                let (kind, items): (FieldActionKind, &[EntityId]) = match event.action {
                    RelationAction::PreAdd => (FieldActionKind::Add, *ids),
                    RelationAction::PreRemove => (FieldActionKind::Remove, *ids),
                    _ => (FieldActionKind::Clear, &[]),
                };
                writer.record_relationship_change(
                    &mut **owner,
                    binding.field,
                    kind,
                    items,
                    Persist::Now,
                )
            }
            RelationSide::Reverse { related, owners } => {
                if !logged {
                    return Ok(());
                }
                // the related entity is not the one being cleared, so its
                // owners each lose one item
                let kind = match event.action {
                    RelationAction::PreAdd => FieldActionKind::Add,
                    _ => FieldActionKind::Remove,
                };
                let owner_ids = match owners {
                    Some(ids) => ids.to_vec(),
                    None => writer.data().owners_of(event.junction, *related)?,
                };
                for owner_id in owner_ids {
                    let Some(row) = writer.data().fetch_row(binding.owner_type, owner_id)? else {
                        continue;
                    };
                    let mut owner = StoredEntity::new(binding.owner_type, owner_id, row);
                    writer.record_relationship_change(
                        &mut owner,
                        binding.field,
                        kind,
                        &[*related],
                        Persist::Now,
                    )?;
                }
                Ok(())
            }
        }
    }
}
