//! Developer bench lines ("level 6") with an optional per-thread capture buffer.
//!
//! Executor code emits one JSON line per evaluated collection and per query
//! through [`dev6!`](crate::dev6). The lines always go to the `log` facade
//! under the `camtrap_query::dev6` target; tests can additionally capture the
//! lines written on their own thread without touching the global logger.

use std::cell::RefCell;

/// Log target used for developer bench lines.
pub const DEV6_TARGET: &str = "camtrap_query::dev6";

thread_local! {
    static CAPTURE: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Active capture on the current thread. Capturing stops when the guard drops.
pub struct Capture {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Capture {
    /// Lines captured so far, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        CAPTURE.with(|c| c.borrow().clone().unwrap_or_default())
    }

    /// Removes and returns the captured lines.
    pub fn take(&self) -> Vec<String> {
        CAPTURE.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        CAPTURE.with(|c| *c.borrow_mut() = None);
    }
}

/// Starts capturing bench lines written on the current thread.
#[must_use]
pub fn capture() -> Capture {
    CAPTURE.with(|c| *c.borrow_mut() = Some(Vec::new()));
    Capture { _not_send: std::marker::PhantomData }
}

#[doc(hidden)]
pub fn record(line: &str) {
    CAPTURE.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(line.to_owned());
        }
    });
}

/// Emit a developer bench line: captured on this thread if enabled, and logged at TRACE.
#[macro_export]
macro_rules! dev6 {
    ($($arg:tt)*) => {{
        let __line = format!($($arg)*);
        $crate::utils::devlog::record(&__line);
        log::log!(target: $crate::utils::devlog::DEV6_TARGET, log::Level::Trace, "{}", __line);
    }};
}
