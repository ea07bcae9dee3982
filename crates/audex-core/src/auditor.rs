//! Editing layer with audit hooks
//!
//! [`Auditor`] owns the data store and the log store and performs every
//! mutation of auditable entities, calling the log writer at the right point
//! of each lifecycle step and announcing relationship mutations to the
//! registered observers.
//!
//! ## Logging Ownership
//!
//! This layer owns lifecycle logging:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! The writer and listener use only `tracing::debug!()` for internal details.

use std::sync::Arc;
use std::time::Instant;

use audex_core_types::ActorId;

use crate::auditable::Auditable;
use crate::errors::{AuditError, Result};
use crate::history::{GroupedHistory, HistoryQuery};
use crate::listener::AuditRelationListener;
use crate::model::entity_ref::{EntityId, EntityRef};
use crate::model::log_entry::FieldActionKind;
use crate::model::schema::Schema;
use crate::relations::{RelationAction, RelationEvent, RelationObserver, RelationSide};
use crate::settings::AuditSettings;
use crate::store::{DataStore, Link, LogEntryStore};
use crate::writer::{LogWriter, Persist};
use crate::{log_op_end, log_op_error, log_op_start};

pub struct Auditor<D: DataStore, L: LogEntryStore> {
    schema: Arc<Schema>,
    settings: AuditSettings,
    data: D,
    log: L,
    observers: Vec<Box<dyn RelationObserver>>,
}

impl<D: DataStore, L: LogEntryStore> Auditor<D, L> {
    /// Create an editing layer with the audit listener registered
    pub fn new(schema: Arc<Schema>, settings: AuditSettings, data: D, log: L) -> Self {
        Self {
            schema,
            settings,
            data,
            log,
            observers: vec![Box::new(AuditRelationListener::new())],
        }
    }

    pub fn register_observer(&mut self, observer: Box<dyn RelationObserver>) {
        self.observers.push(observer);
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn settings(&self) -> &AuditSettings {
        &self.settings
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }

    pub fn into_parts(self) -> (D, L) {
        (self.data, self.log)
    }

    fn writer(&mut self) -> LogWriter<'_> {
        LogWriter::new(&self.schema, &self.settings, &mut self.data, &mut self.log)
    }

    /// Insert or update an entity, logging CREATE or CHANGE
    ///
    /// A new entity is inserted first so the entry can reference its id; an
    /// existing one is diffed against its persisted row before the update.
    ///
    /// # Errors
    ///
    /// - `UnknownEntityType` if the entity's type is not registered
    /// - `EntityNotFound` if an existing entity's row is gone
    /// - store errors from either store
    pub fn save(&mut self, entity: &mut dyn Auditable) -> Result<()> {
        let entity_type = entity.entity_type();
        log_op_start!("save", entity_type = entity_type);
        let start = Instant::now();

        self.save_impl(entity).map_err(|e| {
            log_op_error!(
                "save",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                entity_type = entity_type
            );
            e
        })?;

        log_op_end!(
            "save",
            duration_ms = start.elapsed().as_millis() as u64,
            entity_type = entity_type,
            entity_id = entity.id()
        );
        Ok(())
    }

    fn save_impl(&mut self, entity: &mut dyn Auditable) -> Result<()> {
        let entity_type = self.schema.descriptor(entity.entity_type())?.entity_type;
        entity.audit_state_mut().begin_cycle(&mut self.log)?;
        let row = entity.snapshot();

        match entity.id() {
            None => {
                let id = self.data.insert_row(entity_type, &row)?;
                entity.set_id(id);
                self.writer().log_create(entity)
            }
            Some(id) => {
                self.writer().log_change(entity)?;
                self.data.update_row(entity_type, id, &row)
            }
        }
    }

    /// Delete an entity, logging DELETE
    ///
    /// Entries previously anchored to the entity are removed; the DELETE
    /// entry itself is kept.
    ///
    /// # Errors
    ///
    /// - `EntityNotSaved` if the entity has no id
    /// - `EntityNotFound` if its row is gone
    pub fn delete(&mut self, entity: &mut dyn Auditable) -> Result<()> {
        let entity_type = entity.entity_type();
        log_op_start!("delete", entity_type = entity_type, entity_id = entity.id());
        let start = Instant::now();

        let removed = self.delete_impl(entity).map_err(|e| {
            log_op_error!(
                "delete",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                entity_type = entity_type
            );
            e
        })?;

        log_op_end!(
            "delete",
            duration_ms = start.elapsed().as_millis() as u64,
            entity_type = entity_type,
            entry_count = removed
        );
        Ok(())
    }

    fn delete_impl(&mut self, entity: &mut dyn Auditable) -> Result<usize> {
        let entity_type = self.schema.descriptor(entity.entity_type())?.entity_type;
        let id = entity.id().ok_or_else(|| AuditError::EntityNotSaved {
            entity_type: entity_type.to_string(),
        })?;
        entity.audit_state_mut().close_pending(&mut self.log)?;

        let kept = self.writer().log_delete(entity)?;
        let removed = self
            .log
            .delete_for_anchor(&EntityRef::new(entity_type, id), kept)?;
        self.data.delete_row(entity_type, id)?;
        Ok(removed)
    }

    fn notify(&mut self, event: &mut RelationEvent<'_>) -> Result<()> {
        let mut writer =
            LogWriter::new(&self.schema, &self.settings, &mut self.data, &mut self.log);
        for observer in &self.observers {
            observer.on_relation_event(event, &mut writer)?;
        }
        Ok(())
    }

    /// Link `ids` to `owner` through its many-to-many `field`
    ///
    /// Ids that are already linked are skipped; nothing is announced when no
    /// new link remains.
    pub fn add_related(
        &mut self,
        owner: &mut dyn Auditable,
        field: &str,
        ids: &[EntityId],
    ) -> Result<()> {
        self.relation_op("add_related", |this| {
            let (junction, owner_id) = this.forward_target(&*owner, field)?;
            let existing = this.data.related_ids(junction, owner_id)?;
            let new_ids = distinct(ids.iter().filter(|id| !existing.contains(id)));
            if new_ids.is_empty() {
                return Ok(());
            }
            let links: Vec<Link> = new_ids.iter().map(|id| (owner_id, *id)).collect();

            this.forward_event(junction, RelationAction::PreAdd, owner, &new_ids)?;
            this.data.add_links(junction, &links)?;
            this.forward_event(junction, RelationAction::PostAdd, owner, &new_ids)
        })
    }

    /// Unlink `ids` from `owner`; ids that are not linked are skipped
    pub fn remove_related(
        &mut self,
        owner: &mut dyn Auditable,
        field: &str,
        ids: &[EntityId],
    ) -> Result<()> {
        self.relation_op("remove_related", |this| {
            let (junction, owner_id) = this.forward_target(&*owner, field)?;
            let existing = this.data.related_ids(junction, owner_id)?;
            let old_ids = distinct(ids.iter().filter(|id| existing.contains(id)));
            if old_ids.is_empty() {
                return Ok(());
            }
            let links: Vec<Link> = old_ids.iter().map(|id| (owner_id, *id)).collect();

            this.forward_event(junction, RelationAction::PreRemove, owner, &old_ids)?;
            this.data.remove_links(junction, &links)?;
            this.forward_event(junction, RelationAction::PostRemove, owner, &old_ids)
        })
    }

    /// Unlink everything from `owner`'s many-to-many `field`
    pub fn clear_related(&mut self, owner: &mut dyn Auditable, field: &str) -> Result<()> {
        self.relation_op("clear_related", |this| {
            let (junction, owner_id) = this.forward_target(&*owner, field)?;
            this.forward_event(junction, RelationAction::PreClear, owner, &[])?;
            let links: Vec<Link> = this
                .data
                .related_ids(junction, owner_id)?
                .into_iter()
                .map(|id| (owner_id, id))
                .collect();
            this.data.remove_links(junction, &links)?;
            this.forward_event(junction, RelationAction::PostClear, owner, &[])
        })
    }

    /// Link `related` to each of `owner_ids` from the related side
    ///
    /// `owner_type` and `field` name the many-to-many field declaring the
    /// junction.
    pub fn add_reverse(
        &mut self,
        owner_type: &str,
        field: &str,
        related: EntityId,
        owner_ids: &[EntityId],
    ) -> Result<()> {
        self.relation_op("add_reverse", |this| {
            let junction = this.schema.junction_for(owner_type, field)?;
            let existing = this.data.owners_of(junction, related)?;
            let new_owners = distinct(owner_ids.iter().filter(|id| !existing.contains(id)));
            if new_owners.is_empty() {
                return Ok(());
            }
            let links: Vec<Link> = new_owners.iter().map(|owner| (*owner, related)).collect();

            this.reverse_event(junction, RelationAction::PreAdd, related, Some(&new_owners))?;
            this.data.add_links(junction, &links)?;
            this.reverse_event(junction, RelationAction::PostAdd, related, Some(&new_owners))
        })
    }

    /// Unlink `related` from each of `owner_ids` from the related side
    pub fn remove_reverse(
        &mut self,
        owner_type: &str,
        field: &str,
        related: EntityId,
        owner_ids: &[EntityId],
    ) -> Result<()> {
        self.relation_op("remove_reverse", |this| {
            let junction = this.schema.junction_for(owner_type, field)?;
            let existing = this.data.owners_of(junction, related)?;
            let old_owners = distinct(owner_ids.iter().filter(|id| existing.contains(id)));
            if old_owners.is_empty() {
                return Ok(());
            }
            let links: Vec<Link> = old_owners.iter().map(|owner| (*owner, related)).collect();

            this.reverse_event(junction, RelationAction::PreRemove, related, Some(&old_owners))?;
            this.data.remove_links(junction, &links)?;
            this.reverse_event(junction, RelationAction::PostRemove, related, Some(&old_owners))
        })
    }

    /// Unlink `related` from every owner from the related side
    pub fn clear_reverse(&mut self, owner_type: &str, field: &str, related: EntityId) -> Result<()> {
        self.relation_op("clear_reverse", |this| {
            let junction = this.schema.junction_for(owner_type, field)?;
            this.reverse_event(junction, RelationAction::PreClear, related, None)?;
            let links: Vec<Link> = this
                .data
                .owners_of(junction, related)?
                .into_iter()
                .map(|owner| (owner, related))
                .collect();
            this.data.remove_links(junction, &links)?;
            this.reverse_event(junction, RelationAction::PostClear, related, None)
        })
    }

    fn relation_op<F>(&mut self, op: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        log_op_start!(op);
        let start = Instant::now();

        f(self).map_err(|e| {
            log_op_error!(op, e.clone(), duration_ms = start.elapsed().as_millis() as u64);
            e
        })?;

        log_op_end!(op, duration_ms = start.elapsed().as_millis() as u64);
        Ok(())
    }

    fn forward_target(&self, owner: &dyn Auditable, field: &str) -> Result<(&'static str, EntityId)> {
        let junction = self.schema.junction_for(owner.entity_type(), field)?;
        let owner_id = owner.id().ok_or_else(|| AuditError::EntityNotSaved {
            entity_type: owner.entity_type().to_string(),
        })?;
        Ok((junction, owner_id))
    }

    fn forward_event(
        &mut self,
        junction: &str,
        action: RelationAction,
        owner: &mut dyn Auditable,
        ids: &[EntityId],
    ) -> Result<()> {
        self.notify(&mut RelationEvent {
            junction,
            action,
            side: RelationSide::Forward { owner, ids },
        })
    }

    fn reverse_event(
        &mut self,
        junction: &str,
        action: RelationAction,
        related: EntityId,
        owners: Option<&[EntityId]>,
    ) -> Result<()> {
        self.notify(&mut RelationEvent {
            junction,
            action,
            side: RelationSide::Reverse { related, owners },
        })
    }

    /// Merge a relationship change into `entity`'s pending entry
    ///
    /// For callers that maintain junctions themselves; the junction is not
    /// touched.
    pub fn record_relationship_change(
        &mut self,
        entity: &mut dyn Auditable,
        field: &str,
        kind: FieldActionKind,
        ids: &[EntityId],
        persist: Persist,
    ) -> Result<()> {
        self.writer()
            .record_relationship_change(entity, field, kind, ids, persist)
    }

    /// Insert new entities in one batch and log one CREATE entry each
    ///
    /// # Errors
    ///
    /// `InvalidSchema` if the entities are not all of one type or one of
    /// them already has an id.
    pub fn bulk_create<T: Auditable>(&mut self, entities: &mut [T]) -> Result<()> {
        log_op_start!("bulk_create", entry_count = entities.len());
        let start = Instant::now();

        let logged = self.bulk_create_impl(entities).map_err(|e| {
            log_op_error!(
                "bulk_create",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "bulk_create",
            duration_ms = start.elapsed().as_millis() as u64,
            entry_count = logged
        );
        Ok(())
    }

    fn bulk_create_impl<T: Auditable>(&mut self, entities: &mut [T]) -> Result<usize> {
        let Some(first) = entities.first() else {
            return Ok(0);
        };
        let entity_type = self.schema.descriptor(first.entity_type())?.entity_type;
        if entities
            .iter()
            .any(|e| e.entity_type() != entity_type || e.id().is_some())
        {
            return Err(AuditError::InvalidSchema {
                reason: format!("bulk create expects unsaved {} entities only", entity_type),
            });
        }

        let rows: Vec<_> = entities.iter().map(|e| e.snapshot()).collect();
        let ids = self.data.insert_rows(entity_type, &rows)?;
        for (entity, id) in entities.iter_mut().zip(ids) {
            entity.audit_state_mut().begin_cycle(&mut self.log)?;
            entity.set_id(id);
        }
        self.writer().log_bulk_create(entities)
    }

    /// Insert junction links for many owners and log them in two batches
    ///
    /// Each link is `(owner id, related id)`. Owners without links are left
    /// alone.
    pub fn bulk_add_related<T: Auditable>(
        &mut self,
        owners: &mut [T],
        field: &str,
        links: &[Link],
    ) -> Result<()> {
        log_op_start!("bulk_add_related", field = field, entry_count = links.len());
        let start = Instant::now();

        self.bulk_add_related_impl(owners, field, links)
            .map_err(|e| {
                log_op_error!(
                    "bulk_add_related",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    field = field
                );
                e
            })?;

        log_op_end!(
            "bulk_add_related",
            duration_ms = start.elapsed().as_millis() as u64,
            field = field
        );
        Ok(())
    }

    fn bulk_add_related_impl<T: Auditable>(
        &mut self,
        owners: &mut [T],
        field: &str,
        links: &[Link],
    ) -> Result<()> {
        let Some(first) = owners.first() else {
            return Ok(());
        };
        let junction = self.schema.junction_for(first.entity_type(), field)?;
        self.data.add_links(junction, links)?;
        self.writer().log_bulk_links(owners, field, links)
    }

    /// Entries displayed under `anchor`, newest first
    pub fn history(&self, anchor: &EntityRef) -> HistoryQuery<'_> {
        HistoryQuery::new(&self.log, anchor.clone())
    }

    /// Entries displayed under `anchor`, grouped by request
    pub fn grouped_history(&self, anchor: &EntityRef) -> Result<GroupedHistory> {
        self.history(anchor).grouped()
    }

    /// Attribute every entry of `from` to `to`, as when two users are merged
    pub fn merge_actor(&mut self, from: ActorId, to: ActorId) -> Result<usize> {
        log_op_start!("merge_actor", actor_id = from.get());
        let start = Instant::now();

        let moved = self.log.reassign_actor(from, to).map_err(|e| {
            log_op_error!(
                "merge_actor",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "merge_actor",
            duration_ms = start.elapsed().as_millis() as u64,
            entry_count = moved
        );
        Ok(moved)
    }

    /// Detach a removed user from its entries
    pub fn forget_actor(&mut self, actor: ActorId) -> Result<usize> {
        log_op_start!("forget_actor", actor_id = actor.get());
        let start = Instant::now();

        let cleared = self.log.clear_actor(actor).map_err(|e| {
            log_op_error!(
                "forget_actor",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "forget_actor",
            duration_ms = start.elapsed().as_millis() as u64,
            entry_count = cleared
        );
        Ok(cleared)
    }

    /// Drop every entry about an entity type that is removed from the system
    pub fn forget_entity_type(&mut self, entity_type: &str) -> Result<usize> {
        log_op_start!("forget_entity_type", entity_type = entity_type);
        let start = Instant::now();

        let deleted = self.log.delete_for_entity_type(entity_type).map_err(|e| {
            log_op_error!(
                "forget_entity_type",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "forget_entity_type",
            duration_ms = start.elapsed().as_millis() as u64,
            entry_count = deleted
        );
        Ok(deleted)
    }
}

/// Ids in first-seen order without repeats
fn distinct<'a>(ids: impl Iterator<Item = &'a EntityId>) -> Vec<EntityId> {
    let mut out: Vec<EntityId> = Vec::new();
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}
