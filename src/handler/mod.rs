//! The error handler.
//!
//! [`ErrorHandler`] turns failures into rendered [`ErrorRecord`]s and, once
//! registered, serves as the process' handler for uncaught failures, runtime
//! errors and shutdown.

mod hooks;
mod output;
mod reserve;

pub use hooks::{HookRegistry, ProcessHooks};
pub use output::{BufferWriter, ResponseWriter, StdoutWriter};
pub use reserve::DEFAULT_MEMORY_RESERVE_SIZE;

use crate::config::HandlerConfig;
use crate::error::Result;
use crate::exception::{ErrorException, RuntimeError, Severity, Throwable};
use crate::render::{ErrorRecord, HtmlRenderer, ThrowableRenderer};
use crate::request::RequestSnapshot;
use crate::runtime::FaultRuntime;
use reserve::MemoryReserve;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

type ExitFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Renders failures and handles what escapes the request pipeline.
///
/// The handler is usable as soon as it is built: [`handle`](Self::handle)
/// renders a failure in common or detailed mode depending on
/// [`is_debug`](Self::is_debug). [`register`](Self::register) additionally
/// installs it as the process' handler for panics, runtime errors and
/// shutdown.
///
/// # Example
///
/// ```
/// use faultline::handler::ErrorHandler;
/// use faultline::exception::{HttpException, Throwable};
///
/// let handler = ErrorHandler::builder().debug(false).build();
/// let failure = Throwable::from(HttpException::not_found("no such order"));
///
/// let record = handler.handle(&failure, None, None);
/// assert_eq!(record.status_code().as_u16(), 404);
/// assert!(record.content().contains("no such order"));
/// ```
pub struct ErrorHandler {
    default_renderer: Arc<dyn ThrowableRenderer>,
    writer: Arc<dyn ResponseWriter>,
    runtime: Arc<FaultRuntime>,
    registered: AtomicBool,
    hooks_installed: AtomicBool,
    debug: AtomicBool,
    error_reporting: AtomicU32,
    reserve: MemoryReserve,
    exit: ExitFn,
}

impl ErrorHandler {
    pub fn builder() -> ErrorHandlerBuilder {
        ErrorHandlerBuilder::new()
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Build a handler from configuration. Fails when custom views cannot be
    /// loaded.
    pub fn from_config(config: &HandlerConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .debug(config.debug)
            .memory_reserve_size(config.memory_reserve_size)
            .error_reporting(config.error_reporting);
        if let Some(path) = &config.view_path {
            builder = builder.renderer(Arc::new(HtmlRenderer::from_view_path(path)?));
        }
        Ok(builder.build())
    }

    /// Render a failure.
    ///
    /// Uses `renderer` when given, the default renderer otherwise. The output
    /// is detailed in debug mode and common otherwise. Every call logs the
    /// failure once.
    pub fn handle(
        &self,
        failure: &Throwable,
        request: Option<&RequestSnapshot>,
        renderer: Option<&dyn ThrowableRenderer>,
    ) -> ErrorRecord {
        tracing::error!(
            kind = failure.kind(),
            code = failure.code(),
            status = failure.status_code().as_u16(),
            file = failure.file(),
            line = failure.line(),
            "{}",
            failure.message()
        );

        let renderer = renderer.unwrap_or(self.default_renderer.as_ref());
        if self.is_debug() {
            renderer.render_detailed(failure, request)
        } else {
            renderer.render_common(failure, request)
        }
    }

    /// Install the handler into the process.
    ///
    /// Allocates the memory reserve and installs the panic, runtime-error and
    /// shutdown hooks. Calling it again while registered does nothing.
    pub fn register(self: &Arc<Self>) {
        self.register_with(&ProcessHooks::new(self.runtime.clone()));
    }

    /// [`register`](Self::register) with another hook registry.
    pub fn register_with(self: &Arc<Self>, hooks: &dyn HookRegistry) {
        if self.registered.swap(true, Ordering::SeqCst) {
            tracing::debug!("Error handler already registered");
            return;
        }

        self.reserve.allocate();
        if !self.hooks_installed.swap(true, Ordering::SeqCst) {
            let handler = Arc::downgrade(self);
            hooks.install_exception_hook(handler.clone());
            hooks.install_error_hook(handler.clone());
            hooks.install_shutdown_hook(handler);
        }
        tracing::info!(debug = self.is_debug(), "Error handler registered");
    }

    /// Stop handling process failures and release the memory reserve.
    ///
    /// Installed hooks stay in place but do nothing until the handler is
    /// registered again.
    pub fn disable(&self) {
        self.registered.store(false, Ordering::SeqCst);
        self.reserve.release();
        tracing::info!("Error handler disabled");
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn set_debug_mode(&self, debug: bool) {
        self.debug.store(debug, Ordering::SeqCst);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    /// Change the memory reserve size; `None` disables the reserve. A
    /// registered handler re-allocates right away.
    pub fn set_memory_reserve_size(&self, size: Option<usize>) {
        self.reserve.resize(size);
        if self.is_registered() {
            self.reserve.allocate();
        }
    }

    pub fn memory_reserve_size(&self) -> Option<usize> {
        self.reserve.size()
    }

    /// Bytes currently held by the memory reserve.
    pub fn reserved_bytes(&self) -> usize {
        self.reserve.held()
    }

    /// Severities promoted into errors by [`error_handler`](Self::error_handler).
    pub fn set_error_reporting(&self, mask: Severity) {
        self.error_reporting.store(mask.bits(), Ordering::SeqCst);
    }

    pub fn error_reporting(&self) -> Severity {
        Severity::from_bits_truncate(self.error_reporting.load(Ordering::SeqCst))
    }

    pub fn default_renderer(&self) -> &Arc<dyn ThrowableRenderer> {
        &self.default_renderer
    }

    pub fn runtime(&self) -> &Arc<FaultRuntime> {
        &self.runtime
    }

    /// Entry point for failures nothing else caught.
    ///
    /// Renders the failure, writes it to the output writer and schedules the
    /// process to exit with status 1 once every other finalizer has run. After
    /// the finalizers ran, it exits right away.
    pub fn exception_handler(&self, failure: Throwable) {
        if !self.is_registered() {
            return;
        }

        let record = self.handle(&failure, None, None);
        self.write(&record);

        let finalizers = self.runtime.finalizers();
        if finalizers.is_drained() {
            tracing::warn!("Finalizers already ran, exiting now");
            (self.exit)(1);
            return;
        }
        let exit = self.exit.clone();
        finalizers.push_last("exit", move || exit(1));
    }

    /// Entry point for runtime errors.
    ///
    /// `Ok(false)` when the handler is not registered, `Ok(true)` when the
    /// severity is not reported. Otherwise the error is promoted into an
    /// [`ErrorException`] for the caller to propagate.
    pub fn error_handler(&self, error: RuntimeError) -> std::result::Result<bool, ErrorException> {
        if !self.is_registered() {
            return Ok(false);
        }
        if !self.error_reporting().intersects(error.severity) {
            return Ok(true);
        }
        Err(ErrorException::from(error))
    }

    /// Entry point run when the process finishes.
    ///
    /// Releases the memory reserve, then renders the last fatal error, if any.
    pub fn shutdown_function(&self) {
        if !self.is_registered() {
            return;
        }

        self.reserve.release();
        if let Some(error) = self.runtime.take_last_error() {
            let failure = Throwable::from(ErrorException::from(error));
            let record = self.handle(&failure, None, None);
            self.write(&record);
        }
    }

    fn write(&self, record: &ErrorRecord) {
        if let Err(e) =
            self.writer
                .write_response(record.status_code(), record.headers(), record.content())
        {
            tracing::error!(error = %e, "Failed to write error response");
        }
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("registered", &self.is_registered())
            .field("debug", &self.is_debug())
            .field("error_reporting", &self.error_reporting())
            .field("memory_reserve_size", &self.memory_reserve_size())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ErrorHandler`].
pub struct ErrorHandlerBuilder {
    renderer: Option<Arc<dyn ThrowableRenderer>>,
    writer: Arc<dyn ResponseWriter>,
    runtime: Option<Arc<FaultRuntime>>,
    debug: bool,
    memory_reserve_size: Option<usize>,
    error_reporting: Severity,
    exit: ExitFn,
}

impl ErrorHandlerBuilder {
    pub fn new() -> Self {
        Self {
            renderer: None,
            writer: Arc::new(StdoutWriter),
            runtime: None,
            debug: false,
            memory_reserve_size: Some(DEFAULT_MEMORY_RESERVE_SIZE),
            error_reporting: Severity::ALL,
            exit: Arc::new(exit_process),
        }
    }

    /// Renderer used when no other is resolved. Defaults to HTML.
    pub fn renderer(mut self, renderer: Arc<dyn ThrowableRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Output for the uncaught-failure and shutdown hooks. Defaults to stdout.
    pub fn writer(mut self, writer: Arc<dyn ResponseWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Runtime the handler belongs to. Defaults to the global runtime.
    pub fn runtime(mut self, runtime: Arc<FaultRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn memory_reserve_size(mut self, size: Option<usize>) -> Self {
        self.memory_reserve_size = size;
        self
    }

    pub fn error_reporting(mut self, mask: Severity) -> Self {
        self.error_reporting = mask;
        self
    }

    /// What the exit finalizer calls. Defaults to [`std::process::exit`].
    pub fn on_exit(mut self, exit: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.exit = Arc::new(exit);
        self
    }

    pub fn build(self) -> ErrorHandler {
        ErrorHandler {
            default_renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(HtmlRenderer::new())),
            writer: self.writer,
            runtime: self.runtime.unwrap_or_else(FaultRuntime::global),
            registered: AtomicBool::new(false),
            hooks_installed: AtomicBool::new(false),
            debug: AtomicBool::new(self.debug),
            error_reporting: AtomicU32::new(self.error_reporting.bits()),
            reserve: MemoryReserve::new(self.memory_reserve_size),
            exit: self.exit,
        }
    }
}

fn exit_process(code: i32) {
    std::process::exit(code)
}

impl Default for ErrorHandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::HttpException;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tracing_test::traced_test;

    /// Renders "common:<message>" or "detailed:<message>".
    struct Recording;

    impl ThrowableRenderer for Recording {
        fn render_common(&self, failure: &Throwable, _: Option<&RequestSnapshot>) -> ErrorRecord {
            ErrorRecord::new(format!("common:{}", failure.message()), failure.clone())
        }

        fn render_detailed(&self, failure: &Throwable, _: Option<&RequestSnapshot>) -> ErrorRecord {
            ErrorRecord::new(format!("detailed:{}", failure.message()), failure.clone())
        }
    }

    /// Counts installs instead of touching the process.
    #[derive(Default)]
    struct LocalHooks {
        installs: AtomicUsize,
        handler: Mutex<Option<std::sync::Weak<ErrorHandler>>>,
    }

    impl HookRegistry for LocalHooks {
        fn install_exception_hook(&self, handler: std::sync::Weak<ErrorHandler>) {
            self.installs.fetch_add(1, Ordering::SeqCst);
            *self.handler.lock().unwrap() = Some(handler);
        }

        fn install_error_hook(&self, _: std::sync::Weak<ErrorHandler>) {
            self.installs.fetch_add(1, Ordering::SeqCst);
        }

        fn install_shutdown_hook(&self, _: std::sync::Weak<ErrorHandler>) {
            self.installs.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        handler: Arc<ErrorHandler>,
        runtime: Arc<FaultRuntime>,
        output: Arc<BufferWriter>,
        exits: Arc<Mutex<Vec<i32>>>,
    }

    fn fixture(debug: bool) -> Fixture {
        let runtime = Arc::new(FaultRuntime::new());
        let output = Arc::new(BufferWriter::new());
        let exits = Arc::new(Mutex::new(Vec::new()));
        let recorded = exits.clone();
        let handler = ErrorHandler::builder()
            .renderer(Arc::new(Recording))
            .writer(output.clone())
            .runtime(runtime.clone())
            .debug(debug)
            .on_exit(move |code| recorded.lock().unwrap().push(code))
            .build();
        Fixture {
            handler: Arc::new(handler),
            runtime,
            output,
            exits,
        }
    }

    fn registered(debug: bool) -> Fixture {
        let fixture = fixture(debug);
        fixture.handler.register_with(&LocalHooks::default());
        fixture
    }

    #[test]
    fn test_handle_common_in_production() {
        let fixture = fixture(false);
        let record = fixture.handler.handle(&Throwable::new("error", "boom"), None, None);
        assert_eq!(record.content(), "common:boom");
    }

    #[test]
    fn test_handle_detailed_in_debug() {
        let fixture = fixture(false);
        fixture.handler.set_debug_mode(true);
        let record = fixture.handler.handle(&Throwable::new("error", "boom"), None, None);
        assert_eq!(record.content(), "detailed:boom");
    }

    #[test]
    fn test_explicit_renderer_wins() {
        let handler = ErrorHandler::builder().build();
        let record = handler.handle(&Throwable::new("error", "boom"), None, Some(&Recording));
        assert_eq!(record.content(), "common:boom");
    }

    #[test]
    fn test_default_renderer_is_html() {
        let handler = ErrorHandler::new();
        let record = handler.handle(&Throwable::new("error", "boom"), None, None);
        assert_eq!(
            record.header(crate::render::CONTENT_TYPE),
            Some(HtmlRenderer::CONTENT_TYPE)
        );
    }

    #[test]
    #[traced_test]
    fn test_handle_logs_once() {
        for debug in [false, true] {
            let fixture = fixture(debug);
            let message = format!("logged once with debug {debug}");
            fixture
                .handler
                .handle(&Throwable::new("error", message.clone()), None, None);
            logs_assert(|lines: &[&str]| {
                match lines.iter().filter(|line| line.contains(message.as_str())).count() {
                    1 => Ok(()),
                    n => Err(format!("expected one log line, got {n}")),
                }
            });
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let fixture = fixture(false);
        let hooks = LocalHooks::default();

        fixture.handler.register_with(&hooks);
        fixture.handler.register_with(&hooks);

        assert!(fixture.handler.is_registered());
        assert_eq!(hooks.installs.load(Ordering::SeqCst), 3);
        assert!(hooks.handler.lock().unwrap().as_ref().unwrap().upgrade().is_some());
    }

    #[test]
    fn test_hooks_are_installed_once_across_re_registration() {
        let fixture = fixture(false);
        let hooks = LocalHooks::default();

        fixture.handler.register_with(&hooks);
        fixture.handler.disable();
        fixture.handler.register_with(&hooks);

        assert!(fixture.handler.is_registered());
        assert_eq!(hooks.installs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_register_allocates_reserve_and_disable_releases_it() {
        let fixture = fixture(false);
        assert_eq!(fixture.handler.reserved_bytes(), 0);

        fixture.handler.register_with(&LocalHooks::default());
        assert_eq!(fixture.handler.reserved_bytes(), DEFAULT_MEMORY_RESERVE_SIZE);

        fixture.handler.disable();
        assert!(!fixture.handler.is_registered());
        assert_eq!(fixture.handler.reserved_bytes(), 0);
    }

    #[test]
    fn test_disabled_reserve() {
        let handler = Arc::new(
            ErrorHandler::builder()
                .runtime(Arc::new(FaultRuntime::new()))
                .memory_reserve_size(None)
                .build(),
        );
        handler.register_with(&LocalHooks::default());
        assert_eq!(handler.reserved_bytes(), 0);
    }

    #[test]
    fn test_memory_reserve_resize_while_registered() {
        let fixture = registered(false);
        fixture.handler.set_memory_reserve_size(Some(1024));
        assert_eq!(fixture.handler.reserved_bytes(), 1024);

        fixture.handler.set_memory_reserve_size(None);
        assert_eq!(fixture.handler.reserved_bytes(), 0);
    }

    #[test]
    fn test_entry_points_do_nothing_when_unregistered() {
        let fixture = fixture(false);
        fixture.runtime.fatal_error("out of memory");

        fixture.handler.exception_handler(Throwable::new("error", "boom"));
        fixture.handler.shutdown_function();
        let handled = fixture
            .handler
            .error_handler(RuntimeError::here(Severity::ERROR, "oops"));

        assert!(fixture.output.is_empty());
        assert!(fixture.runtime.finalizers().is_empty());
        assert!(matches!(handled, Ok(false)));
        assert!(fixture.runtime.last_error().is_some());
    }

    #[test]
    fn test_exception_handler_writes_and_exits_last() {
        let fixture = registered(false);
        let order = Arc::new(Mutex::new(Vec::new()));

        fixture
            .handler
            .exception_handler(Throwable::from(HttpException::not_found("gone")));

        let log = order.clone();
        fixture
            .runtime
            .finalizers()
            .push("flush", move || log.lock().unwrap().push("flush"));

        assert_eq!(
            fixture.output.contents(),
            "Status: 404 Not Found\r\n\r\ncommon:gone"
        );
        assert!(fixture.exits.lock().unwrap().is_empty());

        fixture.runtime.shutdown();
        assert_eq!(*order.lock().unwrap(), vec!["flush"]);
        assert_eq!(*fixture.exits.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_exception_handler_after_shutdown_exits_immediately() {
        let fixture = registered(false);
        fixture.runtime.shutdown();
        assert!(fixture.runtime.finalizers().is_drained());

        fixture
            .handler
            .exception_handler(Throwable::new("error", "too late"));

        assert!(fixture.output.contents().contains("common:too late"));
        assert_eq!(*fixture.exits.lock().unwrap(), vec![1]);
        assert!(fixture.runtime.finalizers().is_empty());
    }

    #[test]
    fn test_error_handler_promotes_reported_severity() {
        let fixture = registered(false);
        let error = fixture
            .handler
            .error_handler(RuntimeError::new(Severity::WARNING, "careful", "src/app.rs", 7))
            .unwrap_err();

        assert_eq!(error.severity(), Severity::WARNING);
        assert_eq!(error.file(), "src/app.rs");
        assert_eq!(error.line(), 7);
    }

    #[test]
    fn test_error_handler_ignores_masked_severity() {
        let fixture = registered(false);
        fixture
            .handler
            .set_error_reporting(Severity::ALL & !Severity::DEPRECATED);

        let handled = fixture
            .handler
            .error_handler(RuntimeError::here(Severity::DEPRECATED, "old api"));
        assert!(matches!(handled, Ok(true)));
    }

    #[test]
    fn test_shutdown_renders_last_fatal_error() {
        let fixture = registered(true);
        fixture.runtime.fatal_error("allowed memory size exhausted");

        fixture.handler.shutdown_function();

        assert_eq!(fixture.handler.reserved_bytes(), 0);
        assert!(fixture
            .output
            .contents()
            .ends_with("detailed:allowed memory size exhausted"));
        assert!(fixture.runtime.last_error().is_none());
        assert!(fixture.exits.lock().unwrap().is_empty());
    }

    #[test]
    fn test_shutdown_without_fatal_error_writes_nothing() {
        let fixture = registered(false);
        fixture.handler.shutdown_function();
        assert!(fixture.output.is_empty());
        assert_eq!(fixture.handler.reserved_bytes(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = HandlerConfig {
            debug: true,
            memory_reserve_size: None,
            error_reporting: Severity::ERROR | Severity::FATAL,
            view_path: None,
        };
        let handler = ErrorHandler::from_config(&config).unwrap();

        assert!(handler.is_debug());
        assert_eq!(handler.memory_reserve_size(), None);
        assert_eq!(handler.error_reporting(), Severity::ERROR | Severity::FATAL);
    }
}
