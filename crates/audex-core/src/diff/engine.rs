//! Change-set computation per lifecycle action.

use crate::errors::{AuditError, Result};
use crate::model::entity_ref::EntityId;
use crate::model::log_entry::{ActionKind, Changes, FieldActionKind, FieldChanges};
use crate::model::schema::EntityDescriptor;
use crate::model::value::{FieldValue, Snapshot};
use crate::settings::AuditSettings;
use serde_json::Value;
use std::collections::BTreeMap;

/// Many-to-many field name → ids of currently related entities
pub type Membership = BTreeMap<String, Vec<EntityId>>;

static NULL: FieldValue = FieldValue::Null;

fn value_of<'a>(snapshot: &'a Snapshot, field: &str) -> &'a FieldValue {
    snapshot.get(field).unwrap_or(&NULL)
}

fn single(kind: FieldActionKind, values: Vec<Value>) -> FieldChanges {
    FieldChanges::from([(kind, values)])
}

/// Every non-null logged field as a `create` change
pub fn create_changes(
    descriptor: &EntityDescriptor,
    current: &Snapshot,
    settings: &AuditSettings,
) -> Changes {
    descriptor
        .logged_value_fields()
        .filter_map(|field| {
            let value = value_of(current, field.name);
            (!value.is_null()).then(|| {
                (
                    field.name.to_string(),
                    single(FieldActionKind::Create, vec![value.encode(settings)]),
                )
            })
        })
        .collect()
}

/// Every logged field whose value differs as a `change: [old, new]` change
pub fn change_changes(
    descriptor: &EntityDescriptor,
    previous: &Snapshot,
    current: &Snapshot,
    settings: &AuditSettings,
) -> Changes {
    descriptor
        .logged_value_fields()
        .filter_map(|field| {
            let old = value_of(previous, field.name);
            let new = value_of(current, field.name);
            (old != new).then(|| {
                (
                    field.name.to_string(),
                    single(
                        FieldActionKind::Change,
                        vec![old.encode(settings), new.encode(settings)],
                    ),
                )
            })
        })
        .collect()
}

/// Every non-null persisted field plus full m2m membership as `delete` changes
pub fn delete_changes(
    descriptor: &EntityDescriptor,
    persisted: &Snapshot,
    membership: &Membership,
    settings: &AuditSettings,
) -> Changes {
    let mut changes: Changes = descriptor
        .logged_value_fields()
        .filter_map(|field| {
            let value = value_of(persisted, field.name);
            (!value.is_null()).then(|| {
                (
                    field.name.to_string(),
                    single(FieldActionKind::Delete, vec![value.encode(settings)]),
                )
            })
        })
        .collect();

    for field in descriptor.logged_many_to_many_fields() {
        let ids = membership
            .get(field.name)
            .map(|ids| ids.iter().map(|id| Value::from(*id)).collect())
            .unwrap_or_default();
        changes.insert(field.name.to_string(), single(FieldActionKind::Delete, ids));
    }

    changes
}

/// Compute the change map for `action`
///
/// `current` holds the in-memory values being saved; `previous` is the row as
/// currently persisted.
///
/// # Errors
///
/// `EntityNotFound` when CHANGE or DELETE is requested without a persisted
/// row to compare against.
pub fn compute_changes(
    action: ActionKind,
    descriptor: &EntityDescriptor,
    entity_id: Option<EntityId>,
    current: &Snapshot,
    previous: Option<&Snapshot>,
    membership: &Membership,
    settings: &AuditSettings,
) -> Result<Changes> {
    let require_previous = || {
        previous.ok_or_else(|| AuditError::EntityNotFound {
            entity_type: descriptor.entity_type.to_string(),
            entity_id: entity_id.unwrap_or_default(),
        })
    };

    match action {
        ActionKind::Create => Ok(create_changes(descriptor, current, settings)),
        ActionKind::Change => Ok(change_changes(
            descriptor,
            require_previous()?,
            current,
            settings,
        )),
        ActionKind::Delete => Ok(delete_changes(
            descriptor,
            require_previous()?,
            membership,
            settings,
        )),
    }
}
