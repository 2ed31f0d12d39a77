//! Ordered finalizer queue
//!
//! Finalizers are the process' shutdown functions. Ordinary finalizers run
//! first, in the order they were added, then terminal finalizers in the order
//! they were added.

use crate::exception::panic;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

type Finalizer = Box<dyn FnOnce() + Send + 'static>;

struct Entry {
    name: String,
    run: Finalizer,
}

#[derive(Default)]
struct Queues {
    ordinary: VecDeque<Entry>,
    terminal: VecDeque<Entry>,
    ran: bool,
    drained: bool,
}

impl Queues {
    /// Ordinary entries first; a terminal entry only once none is left.
    fn next(&mut self) -> Option<Entry> {
        self.ordinary
            .pop_front()
            .or_else(|| self.terminal.pop_front())
    }
}

/// Shutdown functions of a [`FaultRuntime`](crate::FaultRuntime).
///
/// # Example
///
/// ```
/// use faultline::lifecycle::Finalizers;
/// use std::sync::{Arc, Mutex};
///
/// let order = Arc::new(Mutex::new(Vec::new()));
/// let finalizers = Finalizers::new();
///
/// let log = order.clone();
/// finalizers.push_last("exit", move || log.lock().unwrap().push("exit"));
/// let log = order.clone();
/// finalizers.push("flush", move || log.lock().unwrap().push("flush"));
///
/// finalizers.run();
/// assert_eq!(*order.lock().unwrap(), vec!["flush", "exit"]);
/// ```
pub struct Finalizers {
    queues: Mutex<Queues>,
}

impl Finalizers {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Queues::default()),
        }
    }

    /// Add an ordinary finalizer.
    ///
    /// A finalizer added while the queue is running still runs, before any
    /// terminal finalizer.
    pub fn push(&self, name: impl Into<String>, finalizer: impl FnOnce() + Send + 'static) {
        let entry = Entry {
            name: name.into(),
            run: Box::new(finalizer),
        };
        self.lock().ordinary.push_back(entry);
    }

    /// Add a terminal finalizer: it runs after every ordinary finalizer,
    /// including those added later.
    pub fn push_last(&self, name: impl Into<String>, finalizer: impl FnOnce() + Send + 'static) {
        let entry = Entry {
            name: name.into(),
            run: Box::new(finalizer),
        };
        self.lock().terminal.push_back(entry);
    }

    /// Number of finalizers waiting to run.
    pub fn len(&self) -> usize {
        let queues = self.lock();
        queues.ordinary.len() + queues.terminal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_run(&self) -> bool {
        self.lock().ran
    }

    /// Whether [`run`](Self::run) has emptied the queue. Finalizers added
    /// from now on never run.
    pub fn is_drained(&self) -> bool {
        self.lock().drained
    }

    /// Run every finalizer once and return how many ran.
    ///
    /// Only the first call drains the queue; later calls return 0. A panicking
    /// finalizer is logged and does not stop the others.
    pub fn run(&self) -> usize {
        {
            let mut queues = self.lock();
            if queues.ran {
                tracing::debug!("Finalizers already ran");
                return 0;
            }
            queues.ran = true;
        }

        let mut executed = 0;
        // The lock is released while a finalizer runs, so it may add more.
        while let Some(entry) = self.next() {
            tracing::debug!(finalizer = %entry.name, "Running finalizer");
            if let Err(failure) = panic::catch(entry.run) {
                tracing::error!(
                    finalizer = %entry.name,
                    error = %failure,
                    "Finalizer panicked"
                );
            }
            executed += 1;
        }

        tracing::debug!(executed, "Finalizers complete");
        executed
    }

    fn next(&self) -> Option<Entry> {
        let mut queues = self.lock();
        let entry = queues.next();
        if entry.is_none() {
            queues.drained = true;
        }
        entry
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Finalizers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Finalizers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.lock();
        f.debug_struct("Finalizers")
            .field("ordinary", &queues.ordinary.len())
            .field("terminal", &queues.terminal.len())
            .field("ran", &queues.ran)
            .field("drained", &queues.drained)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce() + Send>) {
        let order = Arc::new(Mutex::new(Vec::new()));
        let log = order.clone();
        let make = move |name: &'static str| {
            let log = log.clone();
            Box::new(move || log.lock().unwrap().push(name)) as Box<dyn FnOnce() + Send>
        };
        (order, make)
    }

    #[test]
    fn test_ordinary_finalizers_run_in_order() {
        let (order, make) = recorder();
        let finalizers = Finalizers::new();
        finalizers.push("a", make("a"));
        finalizers.push("b", make("b"));

        assert_eq!(finalizers.run(), 2);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_terminal_runs_last_even_when_added_first() {
        let (order, make) = recorder();
        let finalizers = Finalizers::new();
        finalizers.push_last("exit", make("exit"));
        finalizers.push("flush", make("flush"));
        finalizers.push("close", make("close"));

        finalizers.run();
        assert_eq!(*order.lock().unwrap(), vec!["flush", "close", "exit"]);
    }

    #[test]
    fn test_finalizer_added_while_running_precedes_terminal() {
        let (order, make) = recorder();
        let finalizers = Arc::new(Finalizers::new());
        finalizers.push_last("exit", make("exit"));

        let queue = finalizers.clone();
        let late = make("late");
        let log = order.clone();
        finalizers.push("first", move || {
            log.lock().unwrap().push("first");
            assert!(!queue.is_drained());
            queue.push("late", late);
        });

        assert_eq!(finalizers.run(), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "late", "exit"]);
    }

    #[test]
    fn test_panicking_finalizer_does_not_stop_the_rest() {
        let (order, make) = recorder();
        let finalizers = Finalizers::new();
        finalizers.push("broken", || panic!("finalizer failed"));
        finalizers.push("after", make("after"));

        assert_eq!(finalizers.run(), 2);
        assert_eq!(*order.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn test_runs_only_once() {
        let (order, make) = recorder();
        let finalizers = Finalizers::new();
        finalizers.push("once", make("once"));

        assert!(!finalizers.is_drained());
        assert_eq!(finalizers.run(), 1);
        assert!(finalizers.has_run());
        assert!(finalizers.is_drained());
        assert_eq!(finalizers.run(), 0);
        assert_eq!(*order.lock().unwrap(), vec!["once"]);
    }

    #[test]
    fn test_len_counts_both_queues() {
        let finalizers = Finalizers::new();
        assert!(finalizers.is_empty());
        finalizers.push("a", || {});
        finalizers.push_last("b", || {});
        assert_eq!(finalizers.len(), 2);
    }
}
