//! Log entry writer
//!
//! Turns lifecycle events of auditable entities into staged and persisted
//! log entries. Borrowed for the duration of one operation; it owns nothing.

use crate::auditable::Auditable;
use crate::context;
use crate::diff::{compute_changes, Membership};
use crate::errors::{AuditError, Result};
use crate::model::entity_ref::{EntityId, EntityRef};
use crate::model::log_entry::{ActionKind, FieldActionKind, LogEntry, LogEntryId};
use crate::model::schema::{EntityDescriptor, FieldKind, Schema};
use crate::model::value::Snapshot;
use crate::settings::AuditSettings;
use crate::store::{DataStore, Link, LogEntryStore};
use serde_json::Value;
use std::collections::BTreeMap;

/// When a relationship change reaches the log store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persist {
    /// Upsert the pending entry right away
    #[default]
    Now,
    /// Leave the entry pending; a batch or the entity's next save or
    /// delete writes it
    Deferred,
}

pub struct LogWriter<'a> {
    schema: &'a Schema,
    settings: &'a AuditSettings,
    data: &'a mut dyn DataStore,
    log: &'a mut dyn LogEntryStore,
}

impl<'a> LogWriter<'a> {
    pub fn new(
        schema: &'a Schema,
        settings: &'a AuditSettings,
        data: &'a mut dyn DataStore,
        log: &'a mut dyn LogEntryStore,
    ) -> Self {
        Self {
            schema,
            settings,
            data,
            log,
        }
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn data(&self) -> &dyn DataStore {
        &*self.data
    }

    /// Record the creation of a freshly inserted entity
    pub fn log_create(&mut self, entity: &mut dyn Auditable) -> Result<()> {
        self.log_instance(entity, ActionKind::Create).map(|_| ())
    }

    /// Record changes against the persisted row; call before the row is updated
    pub fn log_change(&mut self, entity: &mut dyn Auditable) -> Result<()> {
        self.log_instance(entity, ActionKind::Change).map(|_| ())
    }

    /// Record the deletion of an entity; call before the row is deleted
    ///
    /// Returns the id of the persisted entry, if one was written.
    pub fn log_delete(&mut self, entity: &mut dyn Auditable) -> Result<Option<LogEntryId>> {
        self.log_instance(entity, ActionKind::Delete)
    }

    fn log_instance(
        &mut self,
        entity: &mut dyn Auditable,
        action: ActionKind,
    ) -> Result<Option<LogEntryId>> {
        if !context::logging_enabled() {
            return Ok(None);
        }

        let descriptor = self.schema.descriptor(entity.entity_type())?;
        let id = require_id(entity)?;
        let current = entity.snapshot();
        let previous = match action {
            ActionKind::Create => None,
            ActionKind::Change | ActionKind::Delete => {
                self.data.fetch_row(descriptor.entity_type, id)?
            }
        };
        let membership = match action {
            ActionKind::Delete => self.membership(descriptor, id)?,
            ActionKind::Create | ActionKind::Change => Membership::new(),
        };

        let changes = compute_changes(
            action,
            descriptor,
            Some(id),
            &current,
            previous.as_ref(),
            &membership,
            self.settings,
        )?;
        let field_count = changes.len();

        let entry = new_entry(descriptor, id, &current, action);
        let state = entity.audit_state_mut();
        if !state.stage(changes, || entry) {
            tracing::debug!(
                entity_type = descriptor.entity_type,
                entity_id = id,
                action = action.as_str(),
                "no changes to log"
            );
            return Ok(None);
        }
        state.persist(self.log)?;

        tracing::debug!(
            entity_type = descriptor.entity_type,
            entity_id = id,
            action = action.as_str(),
            changed_fields = field_count,
            "log entry written"
        );
        Ok(state.pending().and_then(|entry| entry.id))
    }

    fn membership(&self, descriptor: &EntityDescriptor, id: EntityId) -> Result<Membership> {
        let mut membership = Membership::new();
        for field in descriptor.logged_many_to_many_fields() {
            if let FieldKind::ManyToMany { junction, .. } = field.kind {
                membership.insert(field.name.to_string(), self.data.related_ids(junction, id)?);
            }
        }
        Ok(membership)
    }

    /// Merge a many-to-many change into the entity's pending entry
    ///
    /// Items accumulate per field and change kind for the rest of the cycle,
    /// so the entry always holds everything recorded since it was created.
    /// Unlogged fields are ignored.
    ///
    /// # Errors
    ///
    /// - `UnknownField` / `NotManyToMany` when `field` is not a many-to-many
    ///   field of the entity's type
    /// - `EntityNotSaved` when the entity has no id yet
    pub fn record_relationship_change(
        &mut self,
        entity: &mut dyn Auditable,
        field: &str,
        kind: FieldActionKind,
        ids: &[EntityId],
        persist: Persist,
    ) -> Result<()> {
        let descriptor = self.schema.descriptor(entity.entity_type())?;
        let field_desc = descriptor
            .get_field(field)
            .ok_or_else(|| AuditError::UnknownField {
                entity_type: descriptor.entity_type.to_string(),
                field: field.to_string(),
            })?;
        if !field_desc.is_many_to_many() {
            return Err(AuditError::NotManyToMany {
                entity_type: descriptor.entity_type.to_string(),
                field: field.to_string(),
            });
        }
        if !descriptor.is_logged(field) || !context::logging_enabled() {
            return Ok(());
        }

        let id = require_id(entity)?;
        let current = entity.snapshot();
        let entry = new_entry(descriptor, id, &current, ActionKind::Change);
        let items = ids.iter().map(|id| Value::from(*id)).collect();

        let state = entity.audit_state_mut();
        let accumulated = state.accumulate(field, kind, items);
        if state.stage(accumulated, || entry) && persist == Persist::Now {
            state.persist(self.log)?;
        }

        tracing::debug!(
            entity_type = descriptor.entity_type,
            entity_id = id,
            field = field,
            kind = kind.as_str(),
            items = ids.len(),
            "relationship change recorded"
        );
        Ok(())
    }

    /// Stage CREATE entries for freshly inserted entities and insert them in one batch
    pub fn log_bulk_create<T: Auditable>(&mut self, entities: &mut [T]) -> Result<usize> {
        if !context::logging_enabled() {
            return Ok(0);
        }

        for entity in entities.iter_mut() {
            let descriptor = self.schema.descriptor(entity.entity_type())?;
            let id = require_id(entity)?;
            let current = entity.snapshot();
            let changes = compute_changes(
                ActionKind::Create,
                descriptor,
                Some(id),
                &current,
                None,
                &Membership::new(),
                self.settings,
            )?;
            let entry = new_entry(descriptor, id, &current, ActionKind::Create);
            entity.audit_state_mut().stage(changes, || entry);
        }

        let mut to_insert: Vec<&mut LogEntry> = entities
            .iter_mut()
            .filter_map(|entity| entity.audit_state_mut().pending_mut())
            .filter(|entry| !entry.is_persisted())
            .collect();
        let count = to_insert.len();
        if count > 0 {
            self.log.insert_many(&mut to_insert)?;
        }
        for entity in entities.iter_mut() {
            entity.audit_state_mut().mark_written();
        }
        Ok(count)
    }

    /// Record ADD changes for links just inserted into a junction
    ///
    /// Links are grouped by owner; owners without links are left alone.
    /// Exactly one batch insert (owners without a stored entry) and one batch
    /// update (owners whose entry is already stored) are issued.
    pub fn log_bulk_links<T: Auditable>(
        &mut self,
        owners: &mut [T],
        field: &str,
        links: &[Link],
    ) -> Result<()> {
        let mut added: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
        for (owner, related) in links {
            added.entry(*owner).or_default().push(*related);
        }

        for owner in owners.iter_mut() {
            let Some(ids) = owner.id().and_then(|id| added.get(&id)) else {
                continue;
            };
            self.record_relationship_change(
                owner,
                field,
                FieldActionKind::Add,
                ids,
                Persist::Deferred,
            )?;
        }

        if !context::logging_enabled() {
            return Ok(());
        }

        let mut to_insert: Vec<&mut LogEntry> = Vec::new();
        let mut to_update: Vec<&LogEntry> = Vec::new();
        for owner in owners.iter_mut() {
            if let Some(entry) = owner.audit_state_mut().pending_mut() {
                if entry.is_persisted() {
                    to_update.push(entry);
                } else {
                    to_insert.push(entry);
                }
            }
        }

        tracing::debug!(
            field = field,
            inserted = to_insert.len(),
            updated = to_update.len(),
            "bulk relationship entries"
        );
        self.log.insert_many(&mut to_insert)?;
        self.log.update_many(&to_update)?;

        for owner in owners.iter_mut() {
            owner.audit_state_mut().mark_written();
        }
        Ok(())
    }
}

fn require_id(entity: &dyn Auditable) -> Result<EntityId> {
    entity.id().ok_or_else(|| AuditError::EntityNotSaved {
        entity_type: entity.entity_type().to_string(),
    })
}

fn new_entry(
    descriptor: &EntityDescriptor,
    id: EntityId,
    current: &Snapshot,
    action: ActionKind,
) -> LogEntry {
    LogEntry::new(
        EntityRef::new(descriptor.entity_type, id),
        descriptor.anchor_for(id, current),
        action,
        &context::current_context(),
    )
}
