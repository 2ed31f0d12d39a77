//! Process lifecycle
//!
//! The end of a process is modelled as an ordered queue of finalizers owned by
//! a [`FaultRuntime`](crate::FaultRuntime).
//!
//! ```text
//! 1. ErrorHandler::register         (shutdown hook queued)
//!    ↓
//! [Running...]
//!    ↓
//! 2. Shutdown signal, or an uncaught failure
//!    ↓
//! 3. Ordinary finalizers            (FIFO, including the error handler's)
//!    ↓
//! 4. Terminal finalizers            (FIFO, e.g. exit with status 1)
//! ```

mod finalizers;
mod shutdown;

pub use finalizers::Finalizers;
pub use shutdown::{ShutdownHandler, shutdown_signal};
