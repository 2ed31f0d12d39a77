use crate::exception::panic;
use crate::handler::ErrorHandler;
use crate::runtime::FaultRuntime;
use std::sync::{Arc, Weak};

/// Where an [`ErrorHandler`] installs its three entry points.
///
/// Hooks only hold a weak reference: once the handler is dropped they fall
/// through to whatever was there before.
pub trait HookRegistry: Send + Sync {
    /// Route uncaught failures to [`ErrorHandler::exception_handler`].
    fn install_exception_hook(&self, handler: Weak<ErrorHandler>);

    /// Route runtime errors to [`ErrorHandler::error_handler`].
    fn install_error_hook(&self, handler: Weak<ErrorHandler>);

    /// Run [`ErrorHandler::shutdown_function`] when the process finishes.
    fn install_shutdown_hook(&self, handler: Weak<ErrorHandler>);
}

/// Installs the hooks into the process.
///
/// - the exception hook is the process panic hook. Panics inside a
///   [`panic::catch`] scope are stashed for the catcher; the others go to the
///   handler, or to the previous panic hook when the handler is gone or
///   disabled.
/// - the error hook is the runtime's error hook.
/// - the shutdown hook is an ordinary finalizer of the runtime.
#[derive(Debug, Clone)]
pub struct ProcessHooks {
    runtime: Arc<FaultRuntime>,
}

impl ProcessHooks {
    pub fn new(runtime: Arc<FaultRuntime>) -> Self {
        Self { runtime }
    }
}

impl HookRegistry for ProcessHooks {
    fn install_exception_hook(&self, handler: Weak<ErrorHandler>) {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if panic::is_catching() {
                panic::stash(panic::from_hook_info(info));
                return;
            }

            match handler.upgrade().filter(|handler| handler.is_registered()) {
                Some(handler) => handler.exception_handler(panic::from_hook_info(info)),
                None => previous(info),
            }
        }));
        tracing::debug!("Panic hook installed");
    }

    fn install_error_hook(&self, handler: Weak<ErrorHandler>) {
        self.runtime
            .install_error_hook(move |error| match handler.upgrade() {
                Some(handler) => handler.error_handler(error),
                None => Ok(false),
            });
        tracing::debug!("Runtime error hook installed");
    }

    fn install_shutdown_hook(&self, handler: Weak<ErrorHandler>) {
        self.runtime.finalizers().push("error handler", move || {
            if let Some(handler) = handler.upgrade() {
                handler.shutdown_function();
            }
        });
        tracing::debug!("Shutdown hook installed");
    }
}
