//! History queries and display grouping

use crate::errors::Result;
use crate::model::entity_ref::EntityRef;
use crate::model::log_entry::LogEntry;
use crate::store::LogEntryStore;

/// Query for the entries displayed under one entity
///
/// Nothing is read until [`fetch`](Self::fetch) or
/// [`grouped`](Self::grouped) is called.
pub struct HistoryQuery<'s> {
    store: &'s dyn LogEntryStore,
    anchor: EntityRef,
}

impl<'s> HistoryQuery<'s> {
    pub fn new(store: &'s dyn LogEntryStore, anchor: EntityRef) -> Self {
        Self { store, anchor }
    }

    pub fn anchor(&self) -> &EntityRef {
        &self.anchor
    }

    /// Entries newest first
    pub fn fetch(&self) -> Result<Vec<LogEntry>> {
        self.store.entries_for_anchor(&self.anchor)
    }

    pub fn grouped(&self) -> Result<GroupedHistory> {
        Ok(GroupedHistory::new(self.fetch()?))
    }
}

/// Entries grouped by request for display
///
/// Entries sharing a non-empty request id form one group, placed where the
/// first of them appears, even when other entries sit between them.
/// Entries without a request id stand alone. Order within a group is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedHistory {
    entries: Vec<LogEntry>,
    groups: Vec<Vec<usize>>,
}

impl GroupedHistory {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_of_request: Vec<(&str, usize)> = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            match entry.group_key() {
                Some(key) => match group_of_request.iter().find(|(k, _)| *k == key) {
                    Some((_, group)) => groups[*group].push(index),
                    None => {
                        group_of_request.push((key, groups.len()));
                        groups.push(vec![index]);
                    }
                },
                None => groups.push(vec![index]),
            }
        }

        Self { entries, groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in display order; may be iterated any number of times
    pub fn iter(&self) -> impl Iterator<Item = Vec<&LogEntry>> + '_ {
        self.groups
            .iter()
            .map(|group| group.iter().map(|&i| &self.entries[i]).collect())
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}
