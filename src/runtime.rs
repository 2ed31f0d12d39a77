//! Process fault runtime.
//!
//! A [`FaultRuntime`] owns the process-level state error handling hangs off:
//! the finalizer queue, the last fatal error and the installed runtime-error
//! hook. The process has one global runtime; tests and embedders can create
//! their own.

use crate::exception::{ErrorException, RuntimeError, Severity};
use crate::lifecycle::Finalizers;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// Callback receiving runtime errors.
///
/// `Ok(true)`: handled. `Ok(false)`: not handled, the runtime logs it.
/// `Err`: the error was promoted and must be propagated by the caller.
pub type ErrorHook = Arc<dyn Fn(RuntimeError) -> Result<bool, ErrorException> + Send + Sync>;

static GLOBAL: OnceLock<Arc<FaultRuntime>> = OnceLock::new();

pub struct FaultRuntime {
    finalizers: Finalizers,
    last_error: Mutex<Option<RuntimeError>>,
    error_hook: RwLock<Option<ErrorHook>>,
}

impl FaultRuntime {
    pub fn new() -> Self {
        Self {
            finalizers: Finalizers::new(),
            last_error: Mutex::new(None),
            error_hook: RwLock::new(None),
        }
    }

    /// The process-wide runtime.
    pub fn global() -> Arc<FaultRuntime> {
        GLOBAL.get_or_init(|| Arc::new(FaultRuntime::new())).clone()
    }

    pub fn finalizers(&self) -> &Finalizers {
        &self.finalizers
    }

    /// Replace the runtime-error hook. Returns the previous one.
    pub fn install_error_hook<F>(&self, hook: F) -> Option<ErrorHook>
    where
        F: Fn(RuntimeError) -> Result<bool, ErrorException> + Send + Sync + 'static,
    {
        self.error_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(hook))
    }

    pub fn remove_error_hook(&self) -> Option<ErrorHook> {
        self.error_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn has_error_hook(&self) -> bool {
        self.error_hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Report a runtime error located at the caller.
    ///
    /// The error goes to the installed hook. When the hook promotes it, the
    /// resulting [`ErrorException`] is returned for the caller to propagate.
    #[track_caller]
    pub fn trigger_error(
        &self,
        severity: Severity,
        message: impl Into<String>,
    ) -> Result<(), ErrorException> {
        self.report(RuntimeError::here(severity, message))
    }

    /// Route an existing runtime error through the installed hook.
    pub fn report(&self, error: RuntimeError) -> Result<(), ErrorException> {
        let hook = self
            .error_hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let handled = match hook {
            Some(hook) => hook(error.clone())?,
            None => false,
        };
        if !handled {
            tracing::warn!(
                severity = %error.severity,
                file = %error.file,
                line = error.line,
                "{}",
                error.message
            );
        }
        Ok(())
    }

    /// Record a fatal error located at the caller. The shutdown hook renders
    /// it when the process finishes.
    #[track_caller]
    pub fn fatal_error(&self, message: impl Into<String>) {
        self.record_fatal(RuntimeError::here(Severity::FATAL, message));
    }

    pub fn record_fatal(&self, error: RuntimeError) {
        tracing::error!(file = %error.file, line = error.line, "Fatal error: {}", error.message);
        *self.lock_last_error() = Some(error);
    }

    /// The last recorded fatal error.
    pub fn last_error(&self) -> Option<RuntimeError> {
        self.lock_last_error().clone()
    }

    pub fn take_last_error(&self) -> Option<RuntimeError> {
        self.lock_last_error().take()
    }

    /// Run the finalizers. Only the first call runs anything.
    pub fn shutdown(&self) -> usize {
        self.finalizers.run()
    }

    fn lock_last_error(&self) -> std::sync::MutexGuard<'_, Option<RuntimeError>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FaultRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FaultRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultRuntime")
            .field("finalizers", &self.finalizers)
            .field("last_error", &self.last_error())
            .field("error_hook", &self.has_error_hook())
            .finish()
    }
}

/// Report a runtime error to the global runtime.
///
/// ```
/// use faultline::exception::Severity;
///
/// fn load_settings() -> Result<(), faultline::exception::ErrorException> {
///     faultline::trigger_error(Severity::NOTICE, "settings file missing, using defaults")?;
///     Ok(())
/// }
/// # load_settings().unwrap();
/// ```
#[track_caller]
pub fn trigger_error(severity: Severity, message: impl Into<String>) -> Result<(), ErrorException> {
    FaultRuntime::global().trigger_error(severity, message)
}

/// Record a fatal error on the global runtime.
#[track_caller]
pub fn fatal_error(message: impl Into<String>) {
    FaultRuntime::global().fatal_error(message)
}

/// Run the global runtime's finalizers.
pub fn shutdown() -> usize {
    FaultRuntime::global().shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_trigger_error_without_hook_is_ok() {
        let runtime = FaultRuntime::new();
        assert!(runtime.trigger_error(Severity::WARNING, "odd").is_ok());
    }

    #[test]
    #[traced_test]
    fn test_unhandled_error_is_logged() {
        let runtime = FaultRuntime::new();
        runtime.install_error_hook(|_| Ok(false));
        runtime.trigger_error(Severity::NOTICE, "not handled").unwrap();
        assert!(logs_contain("not handled"));
    }

    #[test]
    fn test_hook_promotes_error() {
        let runtime = FaultRuntime::new();
        runtime.install_error_hook(|error| Err(ErrorException::from(error)));

        let line = line!() + 1;
        let exception = runtime.trigger_error(Severity::ERROR, "bad input").unwrap_err();
        assert_eq!(exception.message(), "bad input");
        assert_eq!(exception.severity(), Severity::ERROR);
        assert_eq!(exception.line(), line);
        assert!(exception.file().ends_with("runtime.rs"));
    }

    #[test]
    fn test_install_returns_previous_hook() {
        let runtime = FaultRuntime::new();
        assert!(runtime.install_error_hook(|_| Ok(true)).is_none());
        assert!(runtime.install_error_hook(|_| Ok(true)).is_some());
        assert!(runtime.remove_error_hook().is_some());
        assert!(!runtime.has_error_hook());
    }

    #[test]
    fn test_fatal_error_is_kept_for_shutdown() {
        let runtime = FaultRuntime::new();
        assert!(runtime.last_error().is_none());

        runtime.fatal_error("out of memory");
        let error = runtime.last_error().unwrap();
        assert_eq!(error.severity, Severity::FATAL);
        assert_eq!(error.message, "out of memory");

        assert!(runtime.take_last_error().is_some());
        assert!(runtime.last_error().is_none());
    }
}
