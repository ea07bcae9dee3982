#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use audex_core::context::{disable_logging, logging_enabled, without_logging};
use audex_core::AuditError;
use common::{auditor, users, Course};

#[test]
fn test_no_entries_inside_disabled_block() {
    let mut auditor = auditor();
    let ids = users(&mut auditor, &["ada"]);
    let before = auditor.log().entries().len();

    without_logging(|| {
        let mut course = Course::new("Logic");
        auditor.save(&mut course).unwrap();
        course.name = "Logic II".to_string();
        auditor.save(&mut course).unwrap();
        auditor.add_related(&mut course, "responsibles", &ids).unwrap();
        auditor.clear_reverse("course", "responsibles", ids[0]).unwrap();
        auditor.delete(&mut course).unwrap();
    });

    assert_eq!(auditor.log().entries().len(), before);
    assert!(logging_enabled());
}

#[test]
fn test_physical_writes_proceed_while_disabled() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");

    {
        let _quiet = disable_logging();
        auditor.save(&mut course).unwrap();
    }

    assert_eq!(auditor.data().row_count("course"), 1);
    assert!(auditor.history(&course.reference()).fetch().unwrap().is_empty());

    course.name = "Logic II".to_string();
    auditor.save(&mut course).unwrap();
    assert_eq!(auditor.history(&course.reference()).fetch().unwrap().len(), 1);
}

#[test]
fn test_logging_resumes_after_error_exit() {
    let mut auditor = auditor();

    let result: Result<(), AuditError> = (|| {
        let _quiet = disable_logging();
        let mut ghost = Course::new("Ghost");
        ghost.id = Some(404);
        auditor.save(&mut ghost)?;
        Ok(())
    })();

    assert!(result.is_err());
    assert!(logging_enabled());

    let mut course = Course::new("Logic");
    auditor.save(&mut course).unwrap();
    assert_eq!(auditor.history(&course.reference()).fetch().unwrap().len(), 1);
}

#[test]
fn test_logging_resumes_after_panic() {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        without_logging(|| panic!("import failed"));
    }));

    assert!(outcome.is_err());
    assert!(logging_enabled());
}

#[test]
fn test_nested_disable_keeps_outer_block_quiet() {
    let mut auditor = auditor();
    let mut course = Course::new("Logic");

    {
        let _outer = disable_logging();
        without_logging(|| ());
        auditor.save(&mut course).unwrap();
    }

    assert!(auditor.log().entries().is_empty());
}
