//! Trailing-edge debounce for bursty writes (title autosave).
//!
//! Each call cancels the previously scheduled work and re-schedules, so only
//! the final call of a settled burst actually runs. Last write wins; there is
//! no coalescing guarantee beyond that.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Fixed-delay, cancel-and-reschedule debouncer.
///
/// ```no_run
/// # async fn demo() {
/// use std::time::Duration;
/// use voicedo::debounce::Debouncer;
///
/// let saver = Debouncer::new(Duration::from_secs(1));
/// for title in ["B", "Bu", "Buy", "Buy milk"] {
///     let title = title.to_string();
///     saver.call(async move {
///         // persist the title; only "Buy milk" ever gets here
///         let _ = title;
///     });
/// }
/// # }
/// ```
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `work` to run after the delay, cancelling any previously
    /// scheduled work that has not started yet.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call<Fut>(&self, work: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });

        let mut pending = self.pending.lock().expect("debounce lock poisoned");
        if let Some(prev) = pending.replace(handle) {
            prev.abort();
        }
    }

    /// Drop any scheduled work without running it.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().expect("debounce lock poisoned");
        if let Some(prev) = pending.take() {
            prev.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
