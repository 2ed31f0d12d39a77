use std::sync::{Mutex, PoisonError};

/// Default size of the memory reserve, in bytes.
pub const DEFAULT_MEMORY_RESERVE_SIZE: usize = 32 * 1024;

#[derive(Debug, Default)]
struct State {
    size: Option<usize>,
    buffer: Option<Vec<u8>>,
}

/// Memory held while the handler is registered and released right before
/// the shutdown hook renders, so rendering has room after an out-of-memory
/// failure.
#[derive(Debug, Default)]
pub(crate) struct MemoryReserve {
    state: Mutex<State>,
}

impl MemoryReserve {
    pub fn new(size: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State { size, buffer: None }),
        }
    }

    pub fn size(&self) -> Option<usize> {
        self.lock().size
    }

    /// Change the configured size. An allocated reserve is re-allocated at
    /// the new size, or released when the size is `None`.
    pub fn resize(&self, size: Option<usize>) {
        let mut state = self.lock();
        state.size = size;
        if state.buffer.is_some() {
            state.buffer = size.map(fill);
        }
    }

    /// Allocate the reserve if a size is configured.
    pub fn allocate(&self) {
        let mut state = self.lock();
        state.buffer = state.size.map(fill);
    }

    pub fn release(&self) {
        self.lock().buffer = None;
    }

    /// Bytes currently held.
    pub fn held(&self) -> usize {
        self.lock().buffer.as_ref().map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Written, not just reserved, so the pages are actually committed.
fn fill(size: usize) -> Vec<u8> {
    vec![b'x'; size]
}
