//! Display formatting of stored log entries
//!
//! Every lookup made while rendering is allowed to fail: unknown entity types,
//! fields removed from the schema and store errors fall back to the raw
//! stored values instead of failing the whole render.

pub mod field_actions;
pub mod message;

pub use field_actions::{field_actions, FieldAction};
pub use message::message;

/// Uppercase the first character, leaving the rest untouched
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
