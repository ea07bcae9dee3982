//! The auditable capability
//!
//! An entity opts into auditing by implementing [`Auditable`] and embedding
//! an [`AuditState`], which holds the pending log entry of the current
//! mutation cycle.

use crate::context;
use crate::errors::Result;
use crate::model::entity_ref::{EntityId, EntityRef};
use crate::model::log_entry::{Changes, FieldActionKind, LogEntry};
use crate::model::value::Snapshot;
use crate::store::LogEntryStore;
use serde_json::Value;

/// An entity whose lifecycle is recorded in the audit log
pub trait Auditable {
    /// Type tag registered in the schema
    fn entity_type(&self) -> &'static str;

    /// Primary key, `None` until first saved
    fn id(&self) -> Option<EntityId>;

    fn set_id(&mut self, id: EntityId);

    /// Current in-memory values of the entity's own (non-many-to-many) fields
    fn snapshot(&self) -> Snapshot;

    fn audit_state(&self) -> &AuditState;

    fn audit_state_mut(&mut self) -> &mut AuditState;

    fn entity_ref(&self) -> Option<EntityRef> {
        self.id().map(|id| EntityRef::new(self.entity_type(), id))
    }
}

/// Per-instance audit bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditState {
    pending: Option<LogEntry>,
    /// Relationship changes accumulated during the current cycle
    relation_changes: Changes,
    /// The pending entry holds changes the log store has not seen yet
    unwritten: bool,
}

impl AuditState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&LogEntry> {
        self.pending.as_ref()
    }

    pub(crate) fn pending_mut(&mut self) -> Option<&mut LogEntry> {
        self.pending.as_mut()
    }

    pub fn has_unwritten_changes(&self) -> bool {
        self.unwritten
    }

    /// Start a new save cycle
    ///
    /// A pending entry that has already been persisted is closed, after any
    /// deferred changes merged into it since are written. An entry that was
    /// never persisted keeps accumulating and is written by the save.
    pub fn begin_cycle(&mut self, log: &mut dyn LogEntryStore) -> Result<()> {
        if !self.pending.as_ref().is_some_and(LogEntry::is_persisted) {
            return Ok(());
        }
        if self.unwritten {
            self.persist(log)?;
        }
        self.reset();
        Ok(())
    }

    /// Write whatever is pending and start from an empty state
    ///
    /// Used before a delete, whose entry must never absorb earlier changes.
    pub fn close_pending(&mut self, log: &mut dyn LogEntryStore) -> Result<()> {
        if self.unwritten {
            self.persist(log)?;
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.pending = None;
        self.relation_changes.clear();
        self.unwritten = false;
    }

    /// Record that the pending entry was written by a batch
    pub(crate) fn mark_written(&mut self) {
        self.unwritten = false;
    }

    /// Append ids to the relationship accumulator and return its contents
    pub fn accumulate(&mut self, field: &str, kind: FieldActionKind, items: Vec<Value>) -> Changes {
        self.relation_changes
            .entry(field.to_string())
            .or_default()
            .entry(kind)
            .or_default()
            .extend(items);
        self.relation_changes.clone()
    }

    /// Merge `changes` into the pending entry, creating it with `new_entry`
    ///
    /// Returns `false` without touching anything when `changes` is empty or
    /// logging is disabled on this thread.
    pub fn stage(&mut self, changes: Changes, new_entry: impl FnOnce() -> LogEntry) -> bool {
        if changes.is_empty() || !context::logging_enabled() {
            return false;
        }
        self.pending
            .get_or_insert_with(new_entry)
            .merge(changes);
        self.unwritten = true;
        true
    }

    /// Write the pending entry: insert on first persist, update afterwards
    pub fn persist(&mut self, log: &mut dyn LogEntryStore) -> Result<()> {
        let Some(entry) = self.pending.as_mut() else {
            return Ok(());
        };
        if entry.is_persisted() {
            log.update_changes(entry)?;
        } else {
            log.insert(entry)?;
        }
        self.unwritten = false;
        Ok(())
    }
}

/// An entity loaded by id from the data store
///
/// Used when the audit layer has to record changes on entities the caller
/// never handed in, such as the owners affected by a reverse-side
/// relationship change.
#[derive(Debug, Clone)]
pub struct StoredEntity {
    entity_type: &'static str,
    id: EntityId,
    row: Snapshot,
    state: AuditState,
}

impl StoredEntity {
    pub fn new(entity_type: &'static str, id: EntityId, row: Snapshot) -> Self {
        Self {
            entity_type,
            id,
            row,
            state: AuditState::new(),
        }
    }
}

impl Auditable for StoredEntity {
    fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    fn id(&self) -> Option<EntityId> {
        Some(self.id)
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn snapshot(&self) -> Snapshot {
        self.row.clone()
    }

    fn audit_state(&self) -> &AuditState {
        &self.state
    }

    fn audit_state_mut(&mut self) -> &mut AuditState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::log_entry::ActionKind;
    use crate::store::MemoryLogStore;
    use audex_core_types::RequestContext;
    use serde_json::json;

    fn new_entry() -> LogEntry {
        let course = EntityRef::new("course", 1);
        LogEntry::new(course.clone(), course, ActionKind::Change, &RequestContext::background())
    }

    #[test]
    fn test_accumulate_concatenates() {
        let mut state = AuditState::new();
        state.accumulate("tags", FieldActionKind::Add, vec![json!(1)]);
        let all = state.accumulate("tags", FieldActionKind::Add, vec![json!(1), json!(2)]);

        assert_eq!(all["tags"][&FieldActionKind::Add], vec![json!(1), json!(1), json!(2)]);
    }

    #[test]
    fn test_stage_ignores_empty_changes() {
        let mut state = AuditState::new();
        assert!(!state.stage(Changes::new(), new_entry));
        assert!(state.pending().is_none());
    }

    #[test]
    fn test_persist_inserts_then_updates() {
        let mut state = AuditState::new();
        let mut log = MemoryLogStore::new();
        let changes = state.accumulate("tags", FieldActionKind::Add, vec![json!(1)]);
        state.stage(changes, new_entry);

        state.persist(&mut log).unwrap();
        state.persist(&mut log).unwrap();

        assert_eq!(log.stats().inserts, 1);
        assert_eq!(log.stats().updates, 1);
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn test_begin_cycle_keeps_unpersisted_entry() {
        let mut state = AuditState::new();
        let mut log = MemoryLogStore::new();
        let changes = state.accumulate("tags", FieldActionKind::Add, vec![json!(1)]);
        state.stage(changes, new_entry);

        state.begin_cycle(&mut log).unwrap();
        assert!(state.pending().is_some());
        assert_eq!(log.stats().inserts, 0);

        state.persist(&mut log).unwrap();
        state.begin_cycle(&mut log).unwrap();
        assert!(state.pending().is_none());
    }

    #[test]
    fn test_begin_cycle_writes_changes_merged_after_persist() {
        let mut state = AuditState::new();
        let mut log = MemoryLogStore::new();
        let changes = state.accumulate("tags", FieldActionKind::Add, vec![json!(1)]);
        state.stage(changes, new_entry);
        state.persist(&mut log).unwrap();
        assert!(!state.has_unwritten_changes());

        let changes = state.accumulate("tags", FieldActionKind::Add, vec![json!(2)]);
        state.stage(changes, new_entry);
        assert!(state.has_unwritten_changes());
        state.begin_cycle(&mut log).unwrap();

        assert!(state.pending().is_none());
        assert_eq!(log.stats().updates, 1);
        assert_eq!(
            log.entries()[0].changes["tags"][&FieldActionKind::Add],
            vec![json!(1), json!(2)]
        );
    }

    #[test]
    fn test_close_pending_inserts_unpersisted_entry() {
        let mut state = AuditState::new();
        let mut log = MemoryLogStore::new();
        let changes = state.accumulate("tags", FieldActionKind::Add, vec![json!(1)]);
        state.stage(changes, new_entry);

        state.close_pending(&mut log).unwrap();

        assert!(state.pending().is_none());
        assert_eq!(log.stats().inserts, 1);
    }
}
