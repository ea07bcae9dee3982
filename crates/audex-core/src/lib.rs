//! audex core - change auditing for a mutable-object data layer
//!
//! This crate records, for every audited entity, a structured history of
//! field-level creations, modifications, deletions and many-to-many
//! relationship changes, attributed to an actor and a request:
//! - Field descriptor tables describing each audited entity type
//! - A diff engine producing per-field change maps
//! - The `Auditable` capability and the `Auditor` editing layer
//! - An observer for relationship mutations
//! - History grouping and display formatting of stored entries

pub mod auditable;
pub mod auditor;
pub mod context;
pub mod diff;
pub mod errors;
pub mod history;
pub mod listener;
pub mod logging_facility;
pub mod model;
pub mod relations;
pub mod render;
pub mod settings;
pub mod store;
pub mod writer;

// Re-export commonly used types
pub use auditable::{AuditState, Auditable, StoredEntity};
pub use auditor::Auditor;
pub use errors::{AuditError, ExError, ExErrorKind, Result};
pub use history::{GroupedHistory, HistoryQuery};
pub use listener::AuditRelationListener;
pub use model::{
    ActionKind, AnchorRule, Changes, Choice, EntityDescriptor, EntityId, EntityRef,
    FieldActionKind, FieldDescriptor, FieldKind, FieldValue, LogEntry, LogEntryId, Schema,
    Snapshot,
};
pub use relations::{RelationAction, RelationEvent, RelationObserver, RelationSide};
pub use settings::AuditSettings;
pub use store::{DataStore, LogEntryStore, MemoryDataStore, MemoryLogStore};
pub use writer::{LogWriter, Persist};
