//! Core types shared across audex crates
//!
//! - **Correlation types**: RequestId, ActorId, RequestContext
//! - **Schema constants**: Canonical field keys and event names for logging

pub mod correlation;
pub mod schema;

pub use correlation::{ActorId, RequestContext, RequestId};
