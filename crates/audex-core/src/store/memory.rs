use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use audex_core_types::ActorId;

use crate::errors::{AuditError, Result};
use crate::model::entity_ref::{EntityId, EntityRef};
use crate::model::log_entry::{LogEntry, LogEntryId};
use crate::model::schema::Schema;
use crate::model::value::Snapshot;
use crate::store::{sort_newest_first, DataStore, Link, LogEntryStore};

/// In-memory persistence engine for audited entities
///
/// Rows are keyed by entity type and id; ids are allocated from one counter
/// shared by all types. Junction links behave as a set of pairs.
#[derive(Debug, Clone)]
pub struct MemoryDataStore {
    schema: Arc<Schema>,
    rows: HashMap<String, BTreeMap<EntityId, Snapshot>>,
    links: HashMap<String, Vec<Link>>,
    next_id: EntityId,
}

impl MemoryDataStore {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            rows: HashMap::new(),
            links: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn row_count(&self, entity_type: &str) -> usize {
        self.rows.get(entity_type).map_or(0, BTreeMap::len)
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn not_found(entity_type: &str, id: EntityId) -> AuditError {
        AuditError::EntityNotFound {
            entity_type: entity_type.to_string(),
            entity_id: id,
        }
    }
}

impl DataStore for MemoryDataStore {
    fn fetch_row(&self, entity_type: &str, id: EntityId) -> Result<Option<Snapshot>> {
        Ok(self
            .rows
            .get(entity_type)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    fn insert_row(&mut self, entity_type: &str, row: &Snapshot) -> Result<EntityId> {
        self.schema.descriptor(entity_type)?;
        let id = self.allocate_id();
        self.rows
            .entry(entity_type.to_string())
            .or_default()
            .insert(id, row.clone());
        Ok(id)
    }

    fn insert_rows(&mut self, entity_type: &str, rows: &[Snapshot]) -> Result<Vec<EntityId>> {
        self.schema.descriptor(entity_type)?;
        rows.iter()
            .map(|row| self.insert_row(entity_type, row))
            .collect()
    }

    fn update_row(&mut self, entity_type: &str, id: EntityId, row: &Snapshot) -> Result<()> {
        let stored = self
            .rows
            .get_mut(entity_type)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| Self::not_found(entity_type, id))?;
        *stored = row.clone();
        Ok(())
    }

    fn delete_row(&mut self, entity_type: &str, id: EntityId) -> Result<()> {
        self.rows
            .get_mut(entity_type)
            .and_then(|rows| rows.remove(&id))
            .ok_or_else(|| Self::not_found(entity_type, id))?;

        for (junction, binding) in self.schema.junctions() {
            let Some(links) = self.links.get_mut(junction) else {
                continue;
            };
            if binding.owner_type == entity_type {
                links.retain(|(owner, _)| *owner != id);
            }
            if binding.related_type == entity_type {
                links.retain(|(_, related)| *related != id);
            }
        }
        Ok(())
    }

    fn related_ids(&self, junction: &str, owner: EntityId) -> Result<Vec<EntityId>> {
        Ok(self
            .links
            .get(junction)
            .map(|links| {
                links
                    .iter()
                    .filter(|(o, _)| *o == owner)
                    .map(|(_, related)| *related)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn owners_of(&self, junction: &str, related: EntityId) -> Result<Vec<EntityId>> {
        Ok(self
            .links
            .get(junction)
            .map(|links| {
                links
                    .iter()
                    .filter(|(_, r)| *r == related)
                    .map(|(owner, _)| *owner)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn add_links(&mut self, junction: &str, links: &[Link]) -> Result<()> {
        let stored = self.links.entry(junction.to_string()).or_default();
        for link in links {
            if !stored.contains(link) {
                stored.push(*link);
            }
        }
        Ok(())
    }

    fn remove_links(&mut self, junction: &str, links: &[Link]) -> Result<()> {
        if let Some(stored) = self.links.get_mut(junction) {
            stored.retain(|link| !links.contains(link));
        }
        Ok(())
    }

    fn display_names(
        &self,
        entity_type: &str,
        ids: &[EntityId],
    ) -> Result<BTreeMap<EntityId, String>> {
        let descriptor = self.schema.descriptor(entity_type)?;
        let Some(rows) = self.rows.get(entity_type) else {
            return Ok(BTreeMap::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| {
                rows.get(id)
                    .map(|row| (*id, descriptor.display_name(*id, row)))
            })
            .collect())
    }
}

/// Counts of write calls against a [`MemoryLogStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub inserts: usize,
    pub updates: usize,
    pub batch_inserts: usize,
    pub batch_updates: usize,
}

/// In-memory log entry store
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStore {
    entries: Vec<LogEntry>,
    next_id: LogEntryId,
    stats: BatchStats,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored entries in insertion order
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = BatchStats::default();
    }

    fn store(&mut self, entry: &mut LogEntry) -> LogEntryId {
        self.next_id += 1;
        entry.id = Some(self.next_id);
        self.entries.push(entry.clone());
        self.next_id
    }

    fn overwrite(&mut self, entry: &LogEntry) -> Result<()> {
        let stored = entry
            .id
            .and_then(|id| self.entries.iter_mut().find(|e| e.id == Some(id)))
            .ok_or_else(|| AuditError::Internal {
                message: format!("log entry {:?} is not stored", entry.id),
            })?;
        stored.changes = entry.changes.clone();
        Ok(())
    }
}

impl LogEntryStore for MemoryLogStore {
    fn insert(&mut self, entry: &mut LogEntry) -> Result<LogEntryId> {
        self.stats.inserts += 1;
        Ok(self.store(entry))
    }

    fn update_changes(&mut self, entry: &LogEntry) -> Result<()> {
        self.stats.updates += 1;
        self.overwrite(entry)
    }

    fn insert_many(&mut self, entries: &mut [&mut LogEntry]) -> Result<()> {
        self.stats.batch_inserts += 1;
        for entry in entries.iter_mut() {
            self.store(entry);
        }
        Ok(())
    }

    fn update_many(&mut self, entries: &[&LogEntry]) -> Result<()> {
        self.stats.batch_updates += 1;
        entries.iter().try_for_each(|entry| self.overwrite(entry))
    }

    fn entries_for_anchor(&self, anchor: &EntityRef) -> Result<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self
            .entries
            .iter()
            .filter(|e| &e.anchor == anchor)
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    fn delete_for_anchor(
        &mut self,
        anchor: &EntityRef,
        keep: Option<LogEntryId>,
    ) -> Result<usize> {
        let before = self.entries.len();
        self.entries
            .retain(|e| &e.anchor != anchor || (keep.is_some() && e.id == keep));
        Ok(before - self.entries.len())
    }

    fn reassign_actor(&mut self, from: ActorId, to: ActorId) -> Result<usize> {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|e| e.actor == Some(from)) {
            entry.actor = Some(to);
            count += 1;
        }
        Ok(count)
    }

    fn clear_actor(&mut self, actor: ActorId) -> Result<usize> {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|e| e.actor == Some(actor)) {
            entry.actor = None;
            count += 1;
        }
        Ok(count)
    }

    fn delete_for_entity_type(&mut self, entity_type: &str) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|e| {
            e.target.entity_type != entity_type && e.anchor.entity_type != entity_type
        });
        Ok(before - self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::log_entry::ActionKind;
    use audex_core_types::RequestContext;

    fn entry(anchor: EntityRef, actor: Option<ActorId>) -> LogEntry {
        let context = match actor {
            Some(actor) => RequestContext::new().with_actor(actor),
            None => RequestContext::background(),
        };
        LogEntry::new(anchor.clone(), anchor, ActionKind::Change, &context)
    }

    #[test]
    fn test_ids_increase_with_insertion() {
        let mut store = MemoryLogStore::new();
        let mut a = entry(EntityRef::new("course", 1), None);
        let mut b = entry(EntityRef::new("course", 1), None);

        let first = store.insert(&mut a).unwrap();
        let second = store.insert(&mut b).unwrap();

        assert!(second > first);
        assert_eq!(store.stats().inserts, 2);
    }

    #[test]
    fn test_same_timestamp_orders_by_id_desc() {
        let mut store = MemoryLogStore::new();
        let anchor = EntityRef::new("course", 1);
        let mut a = entry(anchor.clone(), None);
        let mut b = entry(anchor.clone(), None);
        b.created_at = a.created_at;
        store.insert(&mut a).unwrap();
        store.insert(&mut b).unwrap();

        let ids: Vec<_> = store
            .entries_for_anchor(&anchor)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn test_delete_for_anchor_keeps_requested_entry() {
        let mut store = MemoryLogStore::new();
        let anchor = EntityRef::new("course", 1);
        let mut old = entry(anchor.clone(), None);
        let mut last = entry(anchor.clone(), None);
        let mut other = entry(EntityRef::new("course", 2), None);
        store.insert(&mut old).unwrap();
        store.insert(&mut last).unwrap();
        store.insert(&mut other).unwrap();

        let deleted = store.delete_for_anchor(&anchor, last.id).unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(store.entries().len(), 2);
        assert!(store.entries().iter().any(|e| e.id == last.id));
    }

    #[test]
    fn test_reassign_and_clear_actor() {
        let mut store = MemoryLogStore::new();
        let anchor = EntityRef::new("course", 1);
        store.insert(&mut entry(anchor.clone(), Some(ActorId::new(5)))).unwrap();
        store.insert(&mut entry(anchor.clone(), Some(ActorId::new(6)))).unwrap();

        assert_eq!(store.reassign_actor(ActorId::new(5), ActorId::new(6)).unwrap(), 1);
        assert_eq!(store.clear_actor(ActorId::new(6)).unwrap(), 2);
        assert!(store.entries().iter().all(|e| e.actor.is_none()));
    }

    #[test]
    fn test_update_of_unsaved_entry_fails() {
        let mut store = MemoryLogStore::new();
        let unsaved = entry(EntityRef::new("course", 1), None);
        assert!(store.update_changes(&unsaved).is_err());
    }
}
