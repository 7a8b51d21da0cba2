use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::MutexGuard;

/// An `Arc<Mutex<T>>` wrapper shared between concurrent engine calls.
///
/// # Example
/// ```
/// # use glyph_engine::locks::tokio::AtomicMutex;
/// struct Tally {
///     spent: u64,
/// };
/// # tokio_test::block_on(async {
/// let tally = AtomicMutex::from(Tally { spent: 0 });
/// tally.lock_mut(|t| t.spent += 546).await;
/// assert_eq!(546, tally.lock(|t| t.spent).await);
/// # })
/// ```
#[derive(Debug, Default)]
pub struct AtomicMutex<T>(Arc<Mutex<T>>);

impl<T> Clone for AtomicMutex<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> From<T> for AtomicMutex<T> {
    #[inline]
    fn from(t: T) -> Self {
        Self(Arc::new(Mutex::new(t)))
    }
}

impl<T> AtomicMutex<T> {
    /// Acquire lock and return a `MutexGuard`.
    ///
    /// Hold the guard across a read-then-write sequence that must not
    /// interleave with other callers.
    pub async fn lock_guard_mut(&self) -> MutexGuard<'_, T> {
        self.0.lock().await
    }

    /// Immutably access the data of type `T` in a closure and return a result
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let lock = self.0.lock().await;
        f(&lock)
    }

    /// Mutably access the data of type `T` in a closure and return a result
    pub async fn lock_mut<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut lock = self.0.lock().await;
        f(&mut lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_state() {
        let a = AtomicMutex::from(vec![1u64]);
        let b = a.clone();
        b.lock_mut(|v| v.push(2)).await;
        assert_eq!(vec![1, 2], a.lock(|v| v.clone()).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn guard_serializes_read_then_write() {
        let slot = AtomicMutex::from(Option::<usize>::None);
        let mut handles = vec![];
        for i in 0..16 {
            let slot = slot.clone();
            handles.push(tokio::spawn(async move {
                let mut guard = slot.lock_guard_mut().await;
                if guard.is_none() {
                    tokio::task::yield_now().await;
                    *guard = Some(i);
                    true
                } else {
                    false
                }
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(1, winners);
    }
}
