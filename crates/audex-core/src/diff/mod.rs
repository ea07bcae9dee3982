//! Field diff engine.
//!
//! Compares a current snapshot of an entity's logged attributes with the
//! persisted one and produces the change map stored on a log entry.
//!
//! ## Entry point
//!
//! ```ignore
//! use audex_core::diff::compute_changes;
//!
//! let changes = compute_changes(
//!     ActionKind::Change,
//!     descriptor,
//!     Some(id),
//!     &current,
//!     Some(&persisted),
//!     &membership,
//!     &settings,
//! )?;
//! ```
//!
//! ## Guarantees
//!
//! - Only logged, non-many-to-many fields take part in value diffs.
//! - A field whose value did not change never appears in a CHANGE diff.
//! - DELETE diffs carry the full many-to-many membership of every logged
//!   many-to-many field, even when it is empty.
//! - Temporal values are localized before they are stored.

pub mod engine;

pub use engine::{change_changes, compute_changes, create_changes, delete_changes, Membership};
