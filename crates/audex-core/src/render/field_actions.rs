//! Per-field display of a log entry's changes

use crate::model::entity_ref::EntityId;
use crate::model::log_entry::{FieldActionKind, LogEntry};
use crate::model::schema::{FieldDescriptor, FieldKind, Schema};
use crate::render::capitalize_first;
use crate::settings::AuditSettings;
use crate::store::DataStore;
use serde_json::Value;
use std::collections::BTreeMap;

/// One change of one field, ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAction {
    pub label: String,
    pub kind: FieldActionKind,
    pub items: Vec<String>,
}

/// Render the changes of `entry` field by field
pub fn field_actions(
    entry: &LogEntry,
    schema: &Schema,
    data: &dyn DataStore,
    settings: &AuditSettings,
) -> BTreeMap<String, Vec<FieldAction>> {
    let descriptor = schema.get(&entry.target.entity_type);

    entry
        .changes
        .iter()
        .map(|(name, kinds)| {
            let field = descriptor.and_then(|d| d.get_field(name));
            let label = capitalize_first(field.map_or(name.as_str(), |f| f.label));
            let actions = kinds
                .iter()
                .map(|(kind, values)| FieldAction {
                    label: label.clone(),
                    kind: *kind,
                    items: match field {
                        Some(field) => display_items(field, values, data, settings),
                        None => values.iter().map(literal).collect(),
                    },
                })
                .collect();
            (name.clone(), actions)
        })
        .collect()
}

fn display_items(
    field: &FieldDescriptor,
    values: &[Value],
    data: &dyn DataStore,
    settings: &AuditSettings,
) -> Vec<String> {
    match &field.kind {
        FieldKind::Relation { target } | FieldKind::ManyToMany { target, .. } => {
            related_items(target, values, data, settings)
                .unwrap_or_else(|| values.iter().map(literal).collect())
        }
        FieldKind::Choice(_) => values
            .iter()
            .map(|value| {
                field
                    .choice_label(value)
                    .map_or_else(|| literal(value), str::to_string)
            })
            .collect(),
        FieldKind::Boolean => values
            .iter()
            .map(|value| match value {
                Value::Bool(true) => settings.yes.clone(),
                Value::Bool(false) => settings.no.clone(),
                Value::Null => settings.maybe.clone(),
                other => literal(other),
            })
            .collect(),
        FieldKind::Scalar => values.iter().map(literal).collect(),
    }
}

/// Display strings of related entities, one placeholder per missing entity
///
/// `None` when the lookup itself fails.
fn related_items(
    target: &str,
    values: &[Value],
    data: &dyn DataStore,
    settings: &AuditSettings,
) -> Option<Vec<String>> {
    let ids: Vec<EntityId> = values.iter().filter_map(Value::as_i64).collect();
    let names = match data.display_names(target, &ids) {
        Ok(names) => names,
        Err(err) => {
            tracing::debug!(entity_type = target, error = %err, "related lookup failed");
            return None;
        }
    };

    let mut items: Vec<String> = ids.iter().filter_map(|id| names.get(id).cloned()).collect();
    let missing = values.len() - items.len();
    items.extend(std::iter::repeat(settings.deleted_placeholder.clone()).take(missing));
    Some(items)
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}
