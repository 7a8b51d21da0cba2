//! Async locks shared by engine state.

mod atomic_mutex;

pub use atomic_mutex::AtomicMutex;
