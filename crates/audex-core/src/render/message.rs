//! One-sentence summaries of log entries

use crate::model::log_entry::{ActionKind, LogEntry};
use crate::model::schema::Schema;
use crate::render::capitalize_first;
use crate::store::DataStore;

/// Summary sentence such as `The Course "Logic" was changed.`
///
/// The entity is named only while it still exists.
pub fn message(entry: &LogEntry, schema: &Schema, data: &dyn DataStore) -> String {
    let verbose_name = schema
        .get(&entry.target.entity_type)
        .map_or(entry.target.entity_type.as_str(), |d| d.verbose_name);
    let cls = capitalize_first(verbose_name);

    let object = match entry.action {
        ActionKind::Delete => None,
        ActionKind::Create | ActionKind::Change => {
            data.display_name(&entry.target).ok().flatten()
        }
    };

    match (entry.action, object) {
        (ActionKind::Create, Some(obj)) => format!("The {} \"{}\" was created.", cls, obj),
        (ActionKind::Create, None) => format!("A {} was created.", cls),
        (ActionKind::Change, Some(obj)) => format!("The {} \"{}\" was changed.", cls, obj),
        (ActionKind::Change, None) => format!("A {} was changed.", cls),
        (ActionKind::Delete, _) => format!("A {} was deleted.", cls),
    }
}
