pub mod entity_ref;
pub mod log_entry;
pub mod schema;
pub mod value;

pub use entity_ref::{EntityId, EntityRef};
pub use log_entry::{ActionKind, Changes, FieldActionKind, FieldChanges, LogEntry, LogEntryId};
pub use schema::{
    AnchorRule, Choice, EntityDescriptor, FieldDescriptor, FieldKind, JunctionBinding, Schema,
    SchemaBuilder,
};
pub use value::{FieldValue, Snapshot};
