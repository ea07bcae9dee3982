#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use audex_core::{ActionKind, AuditError, FieldActionKind, StoredEntity};
use audex_core_types::ActorId;
use chrono::NaiveDate;
use common::{auditor, request, Contribution, Course, Evaluation};
use serde_json::json;
use std::collections::BTreeSet;

#[test]
fn test_create_logs_every_non_null_logged_field() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    course.order = 4;

    auditor.save(&mut course).unwrap();

    let entries = auditor.history(&course.reference()).fetch().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, ActionKind::Create);
    assert_eq!(entry.target, course.reference());

    let fields: BTreeSet<_> = entry.changes.keys().map(String::as_str).collect();
    assert_eq!(fields, BTreeSet::from(["is_private", "name", "state"]));
    assert_eq!(
        entry.changes["name"][&FieldActionKind::Create],
        vec![json!("Logic")]
    );
    assert_eq!(
        entry.changes["is_private"][&FieldActionKind::Create],
        vec![json!(false)]
    );
}

#[test]
fn test_entry_is_attributed_to_ambient_request() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");

    {
        let _request = request("req-attr", 7);
        auditor.save(&mut course).unwrap();
    }

    let entry = &auditor.history(&course.reference()).fetch().unwrap()[0];
    assert_eq!(entry.actor, Some(ActorId::new(7)));
    assert_eq!(entry.request_id, "req-attr");
}

#[test]
fn test_entry_outside_request_has_no_actor() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();

    let entry = &auditor.history(&course.reference()).fetch().unwrap()[0];
    assert_eq!(entry.actor, None);
    assert_eq!(entry.request_id, "");
}

#[test]
fn test_change_records_old_and_new_value_only() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();

    course.name = "Logic II".to_string();
    auditor.save(&mut course).unwrap();

    let entries = auditor.history(&course.reference()).fetch().unwrap();
    assert_eq!(entries.len(), 2);
    let newest = &entries[0];
    assert_eq!(newest.action, ActionKind::Change);
    assert_eq!(newest.changes.len(), 1);
    assert_eq!(
        newest.changes["name"][&FieldActionKind::Change],
        vec![json!("Logic"), json!("Logic II")]
    );
}

#[test]
fn test_save_without_differences_writes_nothing() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();

    auditor.save(&mut course).unwrap();
    course.order = 9;
    auditor.save(&mut course).unwrap();

    assert_eq!(auditor.history(&course.reference()).fetch().unwrap().len(), 1);
    assert_eq!(auditor.log().entries().len(), 1);
}

#[test]
fn test_change_is_diffed_against_persisted_row() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();

    // a stale copy edits another field; the persisted name wins as "old"
    let mut stale = course.reloaded();
    course.name = "Logic II".to_string();
    auditor.save(&mut course).unwrap();
    stale.state = 20;
    auditor.save(&mut stale).unwrap();

    let newest = &auditor.history(&course.reference()).fetch().unwrap()[0];
    assert_eq!(
        newest.changes["name"][&FieldActionKind::Change],
        vec![json!("Logic II"), json!("Logic")]
    );
    assert_eq!(
        newest.changes["state"][&FieldActionKind::Change],
        vec![json!(10), json!(20)]
    );
}

#[test]
fn test_dates_are_stored_localized() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();

    course.starts_on = NaiveDate::from_ymd_opt(2026, 4, 20);
    auditor.save(&mut course).unwrap();

    let newest = &auditor.history(&course.reference()).fetch().unwrap()[0];
    assert_eq!(
        newest.changes["starts_on"][&FieldActionKind::Change],
        vec![json!(null), json!("Apr. 20, 2026")]
    );
}

#[test]
fn test_redirected_anchor_shows_entry_under_parent() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();
    let mut evaluation = Evaluation::new("Midterm", &course);
    auditor.save(&mut evaluation).unwrap();

    let mut contribution = Contribution {
        evaluation: evaluation.id,
        role: 1,
        ..Contribution::default()
    };
    auditor.save(&mut contribution).unwrap();

    let under_evaluation = auditor.history(&evaluation.reference()).fetch().unwrap();
    assert_eq!(under_evaluation.len(), 2);
    assert_eq!(under_evaluation[0].target.entity_type, "contribution");
    assert_eq!(under_evaluation[0].target.id, contribution.id.unwrap());
}

#[test]
fn test_unset_anchor_relation_falls_back_to_entity() {
    let mut auditor = auditor();
    let mut contribution = Contribution::default();
    auditor.save(&mut contribution).unwrap();

    let target = audex_core::EntityRef::new("contribution", contribution.id.unwrap());
    let entries = auditor.history(&target).fetch().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].anchor, target);
}

#[test]
fn test_unregistered_entity_type_is_rejected() {
    let mut auditor = auditor();
    let mut room = StoredEntity::new("room", 1, Default::default());

    let err = auditor.save(&mut room).unwrap_err();
    assert_eq!(
        err,
        AuditError::UnknownEntityType {
            entity_type: "room".to_string()
        }
    );
}

#[test]
fn test_change_of_missing_row_fails() {
    let mut auditor = auditor();
    let mut course = Course::new("Ghost");
    course.id = Some(999);

    let err = auditor.save(&mut course).unwrap_err();
    assert_eq!(
        err,
        AuditError::EntityNotFound {
            entity_type: "course".to_string(),
            entity_id: 999
        }
    );
    assert!(auditor.log().entries().is_empty());
}
