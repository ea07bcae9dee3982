//! The audit record and its change map

use crate::errors::{AuditError, Result};
use crate::model::entity_ref::EntityRef;
use audex_core_types::{ActorId, RequestContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Store-assigned identifier of a persisted log entry
pub type LogEntryId = i64;

/// Lifecycle action an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Change,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Change => "change",
            ActionKind::Delete => "delete",
        }
    }
}

impl FromStr for ActionKind {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(ActionKind::Create),
            "change" => Ok(ActionKind::Change),
            "delete" => Ok(ActionKind::Delete),
            other => Err(AuditError::UnknownActionKind {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change recorded for a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldActionKind {
    Add,
    Remove,
    Clear,
    Create,
    Change,
    Delete,
}

impl FieldActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldActionKind::Add => "add",
            FieldActionKind::Remove => "remove",
            FieldActionKind::Clear => "clear",
            FieldActionKind::Create => "create",
            FieldActionKind::Change => "change",
            FieldActionKind::Delete => "delete",
        }
    }
}

impl FromStr for FieldActionKind {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(FieldActionKind::Add),
            "remove" => Ok(FieldActionKind::Remove),
            "clear" => Ok(FieldActionKind::Clear),
            "create" => Ok(FieldActionKind::Create),
            "change" => Ok(FieldActionKind::Change),
            "delete" => Ok(FieldActionKind::Delete),
            other => Err(AuditError::UnknownFieldActionKind {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for FieldActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change kind → ordered values for one field
pub type FieldChanges = BTreeMap<FieldActionKind, Vec<Value>>;

/// Field name → its changes
pub type Changes = BTreeMap<String, FieldChanges>;

/// One audit record
///
/// Changes may be merged into an entry until it is read back for display;
/// `created_at`, target and anchor never change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: Option<LogEntryId>,
    pub target: EntityRef,
    pub anchor: EntityRef,
    pub created_at: DateTime<Utc>,
    pub actor: Option<ActorId>,
    pub action: ActionKind,
    /// Empty when the change happened outside any request
    pub request_id: String,
    pub changes: Changes,
}

impl LogEntry {
    /// New unsaved entry attributed to the given request context
    pub fn new(
        target: EntityRef,
        anchor: EntityRef,
        action: ActionKind,
        context: &RequestContext,
    ) -> Self {
        Self {
            id: None,
            target,
            anchor,
            created_at: Utc::now(),
            actor: context.actor,
            action,
            request_id: context.request_id_str().to_string(),
            changes: Changes::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Merge a change set into this entry
    ///
    /// For each field and change kind present in `changes` the stored list is
    /// replaced; kinds and fields not mentioned are kept.
    pub fn merge(&mut self, changes: Changes) {
        for (field, kinds) in changes {
            let slot = self.changes.entry(field).or_default();
            for (kind, values) in kinds {
                slot.insert(kind, values);
            }
        }
    }

    /// Changes encoded as the JSON document stored with the entry
    pub fn changes_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.changes)?)
    }

    /// Decode a stored changes document
    ///
    /// # Errors
    ///
    /// `UnknownFieldActionKind` when a change kind is not recognized,
    /// `Serialization` for malformed JSON.
    pub fn changes_from_json(json: &str) -> Result<Changes> {
        let raw: BTreeMap<String, BTreeMap<String, Vec<Value>>> = serde_json::from_str(json)?;
        let mut changes = Changes::new();
        for (field, kinds) in raw {
            let mut parsed = FieldChanges::new();
            for (kind, values) in kinds {
                parsed.insert(kind.parse()?, values);
            }
            changes.insert(field, parsed);
        }
        Ok(changes)
    }

    /// Key used to group entries for display
    ///
    /// Entries sharing a non-empty request id group together; entries without
    /// one stand alone.
    pub fn group_key(&self) -> Option<&str> {
        if self.request_id.is_empty() {
            None
        } else {
            Some(&self.request_id)
        }
    }
}
