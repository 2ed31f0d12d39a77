//! Failure model.
//!
//! Every failure the crate deals with is normalized into a [`Throwable`].
//! [`HttpException`] carries an explicit response status, [`ErrorException`]
//! is a runtime error promoted by the error hook.

pub mod http;
pub mod panic;
mod runtime_error;
mod severity;
mod throwable;

pub use http::HttpException;
pub use runtime_error::{ErrorException, RuntimeError};
pub use severity::Severity;
pub use throwable::Throwable;

pub(crate) use throwable::UncaughtFailure;
