#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use audex_core::render::{field_actions, message, FieldAction};
use audex_core::{
    ActionKind, AuditSettings, Changes, EntityRef, FieldActionKind, LogEntry,
};
use audex_core_types::RequestContext;
use chrono::NaiveDate;
use common::{auditor, Course, Evaluation, TestAuditor, User};
use serde_json::json;
use std::collections::BTreeMap;

fn newest(auditor: &TestAuditor, anchor: &EntityRef) -> LogEntry {
    auditor.history(anchor).fetch().unwrap().remove(0)
}

fn render(auditor: &TestAuditor, entry: &LogEntry) -> BTreeMap<String, Vec<FieldAction>> {
    field_actions(entry, auditor.schema(), auditor.data(), auditor.settings())
}

fn manual_entry(entity_type: &str, changes: serde_json::Value) -> LogEntry {
    let target = EntityRef::new(entity_type, 1);
    let mut entry = LogEntry::new(
        target.clone(),
        target,
        ActionKind::Change,
        &RequestContext::background(),
    );
    entry.changes = LogEntry::changes_from_json(&changes.to_string()).unwrap();
    entry
}

#[test]
fn test_deleted_related_objects_render_as_placeholder() {
    let mut auditor = auditor();
    let mut ada = User::new("ada");
    let mut bob = User::new("bob");
    auditor.save(&mut ada).unwrap();
    auditor.save(&mut bob).unwrap();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();
    let mut course = course.reloaded();
    auditor
        .add_related(&mut course, "responsibles", &[bob.id.unwrap(), ada.id.unwrap()])
        .unwrap();
    auditor.delete(&mut bob).unwrap();

    let actions = render(&auditor, &newest(&auditor, &course.reference()));

    assert_eq!(
        actions["responsibles"],
        vec![FieldAction {
            label: "Responsibles".to_string(),
            kind: FieldActionKind::Add,
            items: vec!["ada".to_string(), "<deleted object>".to_string()],
        }]
    );
}

#[test]
fn test_relation_field_renders_related_name() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();
    let mut evaluation = Evaluation::new("Midterm", &course);
    auditor.save(&mut evaluation).unwrap();

    let actions = render(&auditor, &newest(&auditor, &evaluation.reference()));
    assert_eq!(actions["course"][0].items, vec!["Logic".to_string()]);
    assert_eq!(actions["course"][0].label, "Course");
}

#[test]
fn test_choices_render_labels_and_fall_back_to_raw() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();
    course.state = 20;
    auditor.save(&mut course).unwrap();
    course.state = 30;
    auditor.save(&mut course).unwrap();

    let entries = auditor.history(&course.reference()).fetch().unwrap();
    let latest = render(&auditor, &entries[0]);
    let previous = render(&auditor, &entries[1]);

    assert_eq!(previous["state"][0].items, vec!["new", "published"]);
    assert_eq!(latest["state"][0].items, vec!["published", "30"]);
}

#[test]
fn test_booleans_render_as_tokens() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();
    course.is_private = Some(true);
    auditor.save(&mut course).unwrap();
    course.is_private = None;
    auditor.save(&mut course).unwrap();

    let entries = auditor.history(&course.reference()).fetch().unwrap();
    assert_eq!(render(&auditor, &entries[1])["is_private"][0].items, vec!["no", "yes"]);
    assert_eq!(render(&auditor, &entries[0])["is_private"][0].items, vec!["yes", "maybe"]);
    assert_eq!(render(&auditor, &entries[0])["is_private"][0].label, "Is private");
}

#[test]
fn test_boolean_tokens_follow_settings() {
    let auditor = auditor();
    let settings = AuditSettings::from_toml_str("yes = \"ja\"\nno = \"nein\"").unwrap();
    let entry = manual_entry("course", json!({"is_private": {"change": [false, true]}}));

    let actions = field_actions(&entry, auditor.schema(), auditor.data(), &settings);
    assert_eq!(actions["is_private"][0].items, vec!["nein", "ja"]);
}

#[test]
fn test_removed_field_renders_raw_values() {
    let auditor = auditor();
    let entry = manual_entry("course", json!({"room": {"change": ["A1", null, 3]}}));

    let actions = render(&auditor, &entry);
    assert_eq!(actions["room"][0].label, "Room");
    assert_eq!(actions["room"][0].items, vec!["A1", "None", "3"]);
}

#[test]
fn test_unknown_entity_type_renders_raw_values() {
    let auditor = auditor();
    let entry = manual_entry("building", json!({"floors": {"create": [4]}}));

    let actions = render(&auditor, &entry);
    assert_eq!(actions["floors"][0].items, vec!["4"]);
    assert_eq!(message(&entry, auditor.schema(), auditor.data()), "A Building was changed.");
}

#[test]
fn test_messages_name_existing_targets_only() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();
    let reference = course.reference();

    let created = newest(&auditor, &reference);
    assert_eq!(
        message(&created, auditor.schema(), auditor.data()),
        "The Course \"Logic\" was created."
    );

    course.name = "Logic II".to_string();
    auditor.save(&mut course).unwrap();
    let changed = newest(&auditor, &reference);
    assert_eq!(
        message(&changed, auditor.schema(), auditor.data()),
        "The Course \"Logic II\" was changed."
    );

    auditor.delete(&mut course).unwrap();
    let deleted = newest(&auditor, &reference);
    assert_eq!(
        message(&deleted, auditor.schema(), auditor.data()),
        "A Course was deleted."
    );
    assert_eq!(
        message(&changed, auditor.schema(), auditor.data()),
        "A Course was changed."
    );
    assert_eq!(
        message(&created, auditor.schema(), auditor.data()),
        "A Course was created."
    );
}

#[test]
fn test_dates_render_identically_after_storage_round_trip() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");
    course.starts_on = NaiveDate::from_ymd_opt(2026, 10, 16);
    auditor.save(&mut course).unwrap();
    course.starts_on = NaiveDate::from_ymd_opt(2027, 1, 4);
    auditor.save(&mut course).unwrap();

    let entry = newest(&auditor, &course.reference());
    let before = render(&auditor, &entry);

    let stored = entry.changes_json().unwrap();
    let mut reloaded = entry.clone();
    reloaded.changes = LogEntry::changes_from_json(&stored).unwrap();
    let after = render(&auditor, &reloaded);

    assert_eq!(before, after);
    assert_eq!(after["starts_on"][0].items, vec!["Oct. 16, 2026", "Jan. 4, 2027"]);
}

#[test]
fn test_empty_changes_render_nothing() {
    let auditor = auditor();
    let mut entry = manual_entry("course", json!({}));
    entry.changes = Changes::new();

    assert!(render(&auditor, &entry).is_empty());
}
