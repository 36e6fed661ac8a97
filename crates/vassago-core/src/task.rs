//! Cancellable background tasks

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Handle to a spawned background task
///
/// Cancelling (or dropping) the handle stops the task; no tick runs after
/// `cancel` returns.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Run `tick` every `period`, first tick one period from now
    ///
    /// `tick` returns `false` to end the task. Returns `None` when called
    /// outside a tokio runtime.
    pub fn repeating<F>(name: &'static str, period: Duration, mut tick: F) -> Option<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if period.is_zero() {
            warn!("Refusing to schedule {} with a zero period", name);
            return None;
        }

        Self::spawn(name, move |stopped| async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if stopped.load(Ordering::SeqCst) || !tick() {
                    break;
                }
            }
        })
    }

    /// Call `on_change` with every new value published on `rx`
    ///
    /// Ends when the sender is dropped or `on_change` returns `false`.
    pub fn watch<T, F>(name: &'static str, mut rx: watch::Receiver<T>, mut on_change: F) -> Option<Self>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut(T) -> bool + Send + 'static,
    {
        Self::spawn(name, move |stopped| async move {
            while rx.changed().await.is_ok() {
                let value = rx.borrow_and_update().clone();
                if stopped.load(Ordering::SeqCst) || !on_change(value) {
                    break;
                }
            }
        })
    }

    fn spawn<F, Fut>(name: &'static str, body: F) -> Option<Self>
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No tokio runtime, {} will not run in the background", name);
                return None;
            }
        };

        let stopped = Arc::new(AtomicBool::new(false));
        let handle = runtime.spawn(body(stopped.clone()));
        debug!("Spawned background task {}", name);

        Some(Self {
            name,
            stopped,
            handle: Some(handle),
        })
    }

    /// Task name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check if the task is still scheduled
    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
            && self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Stop the task
    pub fn cancel(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Cancelled background task {}", self.name);
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
