//! Panic capture.
//!
//! Panics are the uncaught failures of a Rust program. Code that can recover
//! from a panic (the throwable middleware) runs the risky work inside
//! [`catch`], which marks the thread as catching. The process panic hook
//! installed by [`ProcessHooks`](crate::handler::ProcessHooks) checks that mark:
//! inside a catch scope it only stashes a [`Throwable`] with the panic location
//! and backtrace for the catcher to pick up, outside it hands the panic to the
//! error handler's uncaught-exception entry point.

use crate::exception::{HttpException, Throwable};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, Location, PanicHookInfo};

thread_local! {
    static CATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    static STASHED: RefCell<Option<Throwable>> = const { RefCell::new(None) };
}

pub(crate) const PANIC_KIND: &str = "panic";

/// Run `f`, converting a panic into a [`Throwable`].
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, Throwable> {
    CATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let result = std::panic::catch_unwind(AssertUnwindSafe(f));
    CATCH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));

    let stashed = STASHED.with(|slot| slot.borrow_mut().take());
    result.map_err(|payload| {
        stashed.unwrap_or_else(|| from_payload(payload.as_ref(), None, Backtrace::disabled()))
    })
}

/// Whether the current thread is inside a [`catch`] scope.
pub(crate) fn is_catching() -> bool {
    CATCH_DEPTH.with(|depth| depth.get() > 0)
}

pub(crate) fn stash(throwable: Throwable) {
    STASHED.with(|slot| *slot.borrow_mut() = Some(throwable));
}

/// Build a throwable from the information handed to a panic hook.
pub(crate) fn from_hook_info(info: &PanicHookInfo<'_>) -> Throwable {
    from_payload(info.payload(), info.location(), Backtrace::force_capture())
}

/// Build a throwable from a panic payload.
///
/// Payloads that already are a `Throwable` or an `HttpException`
/// (raised with `std::panic::panic_any`) keep their status.
pub(crate) fn from_payload(
    payload: &(dyn Any + Send),
    location: Option<&Location<'_>>,
    trace: Backtrace,
) -> Throwable {
    if let Some(throwable) = payload.downcast_ref::<Throwable>() {
        return throwable.clone();
    }

    let (file, line) = location
        .map(|l| (l.file().to_string(), l.line()))
        .unwrap_or_else(|| ("<unknown>".to_string(), 0));

    if let Some(http) = payload.downcast_ref::<HttpException>() {
        return Throwable::at("HttpException", http.message(), file, line, trace)
            .with_status(http.status())
            .with_code(i64::from(http.status().as_u16()));
    }

    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    };

    Throwable::at(PANIC_KIND, message, file, line, trace)
}
