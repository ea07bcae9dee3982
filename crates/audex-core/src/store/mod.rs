//! Storage seams
//!
//! [`DataStore`] is what the audit layer needs from the persistence engine
//! holding the audited entities. [`LogEntryStore`] is where log entries live.
//! Both have in-memory implementations in [`memory`]; the SQLite log store is
//! provided by the `audex-store` crate.

pub mod memory;

use crate::errors::Result;
use crate::model::entity_ref::{EntityId, EntityRef};
use crate::model::log_entry::{LogEntry, LogEntryId};
use crate::model::value::Snapshot;
use audex_core_types::ActorId;
use std::collections::BTreeMap;

pub use memory::{BatchStats, MemoryDataStore, MemoryLogStore};

/// A junction row: (owner id, related id)
pub type Link = (EntityId, EntityId);

/// Persistence engine operations used by the audit layer
pub trait DataStore {
    /// Persisted row of an entity, `None` when it does not exist
    fn fetch_row(&self, entity_type: &str, id: EntityId) -> Result<Option<Snapshot>>;

    /// Insert a row and return its new id
    fn insert_row(&mut self, entity_type: &str, row: &Snapshot) -> Result<EntityId>;

    /// Insert many rows at once, returning ids in input order
    fn insert_rows(&mut self, entity_type: &str, rows: &[Snapshot]) -> Result<Vec<EntityId>>;

    fn update_row(&mut self, entity_type: &str, id: EntityId, row: &Snapshot) -> Result<()>;

    /// Delete a row together with every junction link it takes part in
    fn delete_row(&mut self, entity_type: &str, id: EntityId) -> Result<()>;

    /// Ids linked to `owner` through `junction`
    fn related_ids(&self, junction: &str, owner: EntityId) -> Result<Vec<EntityId>>;

    /// Owners linked to `related` through `junction`
    fn owners_of(&self, junction: &str, related: EntityId) -> Result<Vec<EntityId>>;

    fn add_links(&mut self, junction: &str, links: &[Link]) -> Result<()>;

    fn remove_links(&mut self, junction: &str, links: &[Link]) -> Result<()>;

    /// Display strings of the given entities; ids that no longer exist are absent
    fn display_names(
        &self,
        entity_type: &str,
        ids: &[EntityId],
    ) -> Result<BTreeMap<EntityId, String>>;

    fn display_name(&self, entity: &EntityRef) -> Result<Option<String>> {
        let mut names = self.display_names(&entity.entity_type, &[entity.id])?;
        Ok(names.remove(&entity.id))
    }
}

/// Append-only storage of log entries
///
/// Only the change map of a persisted entry is ever updated.
pub trait LogEntryStore {
    /// Insert an entry and assign its id
    fn insert(&mut self, entry: &mut LogEntry) -> Result<LogEntryId>;

    /// Overwrite the stored changes of a persisted entry
    fn update_changes(&mut self, entry: &LogEntry) -> Result<()>;

    /// Insert all entries in one batch, assigning ids
    fn insert_many(&mut self, entries: &mut [&mut LogEntry]) -> Result<()>;

    /// Overwrite the stored changes of all entries in one batch
    fn update_many(&mut self, entries: &[&LogEntry]) -> Result<()>;

    /// Entries displayed under `anchor`, newest first
    fn entries_for_anchor(&self, anchor: &EntityRef) -> Result<Vec<LogEntry>>;

    /// Delete entries displayed under `anchor`, except `keep`
    fn delete_for_anchor(&mut self, anchor: &EntityRef, keep: Option<LogEntryId>)
        -> Result<usize>;

    /// Attribute every entry of `from` to `to`
    fn reassign_actor(&mut self, from: ActorId, to: ActorId) -> Result<usize>;

    /// Forget the actor of every entry attributed to `actor`
    fn clear_actor(&mut self, actor: ActorId) -> Result<usize>;

    /// Delete entries whose target or anchor is of `entity_type`
    fn delete_for_entity_type(&mut self, entity_type: &str) -> Result<usize>;
}

/// Newest-first display order
pub fn sort_newest_first(entries: &mut [LogEntry]) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
