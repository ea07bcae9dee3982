//! Ambient request context
//!
//! The acting user, the request id and the logging switch are kept per
//! thread. Request boundaries install a context with [`enter_request`];
//! system-internal writes suppress logging with [`disable_logging`]. Both
//! return guards that restore the previous state when dropped, so every exit
//! path (including `?` returns and unwinding) puts things back.

use audex_core_types::{ActorId, RequestContext};
use std::cell::{Cell, RefCell};

thread_local! {
    static CURRENT: RefCell<RequestContext> = RefCell::new(RequestContext::background());
    static LOGGING_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Restores the previous request context on drop
#[must_use = "the request context is reset as soon as the guard is dropped"]
pub struct RequestGuard {
    previous: Option<RequestContext>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT.with(|current| *current.borrow_mut() = previous);
        }
    }
}

/// Make `context` the ambient context of this thread
pub fn enter_request(context: RequestContext) -> RequestGuard {
    let previous = CURRENT.with(|current| current.replace(context));
    RequestGuard {
        previous: Some(previous),
    }
}

/// Snapshot of the ambient context
pub fn current_context() -> RequestContext {
    CURRENT.with(|current| current.borrow().clone())
}

pub fn current_actor() -> Option<ActorId> {
    CURRENT.with(|current| current.borrow().actor)
}

/// Ambient request id, empty outside of a request
pub fn current_request_id() -> String {
    CURRENT.with(|current| current.borrow().request_id_str().to_string())
}

/// Restores the previous logging switch on drop
#[must_use = "logging is re-enabled as soon as the guard is dropped"]
pub struct LoggingGuard {
    previous: bool,
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        LOGGING_ENABLED.with(|enabled| enabled.set(self.previous));
    }
}

/// Suppress log entry creation on this thread until the guard drops
pub fn disable_logging() -> LoggingGuard {
    let previous = LOGGING_ENABLED.with(|enabled| enabled.replace(false));
    LoggingGuard { previous }
}

pub fn logging_enabled() -> bool {
    LOGGING_ENABLED.with(Cell::get)
}

/// Run `f` with logging disabled
pub fn without_logging<T>(f: impl FnOnce() -> T) -> T {
    let _guard = disable_logging();
    f()
}
