//! Reactive Runtime
//!
//! The runtime holds the per-thread settings shared by signals, observers
//! and the batch scheduler:
//!
//! - the active [`SchedulerConfig`]
//! - the handler that receives failures nobody else can take
//!
//! # Failure Isolation
//!
//! Observer callbacks run inside [`Runtime::guard`]. With
//! `isolate_panics` enabled (the default), a panicking callback is caught,
//! turned into a [`ReactiveError`] and passed to the error handler, and the
//! walk or flush that invoked it carries on with the next observer. With
//! isolation disabled the panic propagates immediately, which is the loud
//! behavior you want while developing.
//!
//! Without a handler, failures are logged at `error` level through
//! `tracing`.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::error;

use crate::config::SchedulerConfig;
use crate::error::ReactiveError;

type ErrorHandler = Rc<dyn Fn(&ReactiveError)>;

thread_local! {
    static CONFIG: RefCell<SchedulerConfig> = RefCell::new(SchedulerConfig::default());
    static ERROR_HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
}

/// Per-thread runtime settings.
pub struct Runtime;

impl Runtime {
    /// Install `config` for the current thread.
    pub fn configure(config: SchedulerConfig) {
        CONFIG.with(|c| *c.borrow_mut() = config);
    }

    /// The configuration active on this thread.
    pub fn config() -> SchedulerConfig {
        CONFIG.with(|c| c.borrow().clone())
    }

    /// Route unhandled failures to `handler` instead of the log.
    pub fn set_error_handler<F>(handler: F)
    where
        F: Fn(&ReactiveError) + 'static,
    {
        ERROR_HANDLER.with(|h| *h.borrow_mut() = Some(Rc::new(handler)));
    }

    /// Go back to logging unhandled failures.
    pub fn clear_error_handler() {
        ERROR_HANDLER.with(|h| *h.borrow_mut() = None);
    }

    /// Deliver a failure to the error handler, or log it.
    pub fn report(failure: ReactiveError) {
        let handler = ERROR_HANDLER.with(|h| h.borrow().clone());
        match handler {
            Some(handler) => handler(&failure),
            None => error!(%failure, "unhandled reactive failure"),
        }
    }

    /// Run `f`, catching a panic when isolation is enabled.
    ///
    /// Returns the panic message on failure.
    pub fn guard<F>(f: F) -> Result<(), String>
    where
        F: FnOnce(),
    {
        if !Self::config().isolate_panics {
            f();
            return Ok(());
        }
        panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
    }
}

/// Extract a readable message from a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
