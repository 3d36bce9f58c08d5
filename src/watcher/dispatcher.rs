//! Serial executor for watcher callbacks.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::WatcherError;
use crate::observability::spans;
use crate::Result;

type Action = Box<dyn FnOnce() -> Result<()> + Send>;

/// Runs watcher callbacks one at a time, in the order they were dispatched.
///
/// All raw notifications pass through here so that watcher state is only
/// ever touched from a single thread.
pub struct WatchDispatcher {
    sender: Mutex<Option<Sender<Action>>>,
    closed: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl WatchDispatcher {
    /// Start the dispatcher thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn new() -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Action>();
        let closed = Arc::new(AtomicBool::new(false));
        let worker_closed = Arc::clone(&closed);

        let worker = std::thread::Builder::new()
            .name("watch-dispatcher".to_string())
            .spawn(move || run(&receiver, &worker_closed))?;
        let worker_id = worker.thread().id();

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            closed,
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    /// Queue `action` behind everything already dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::DispatcherClosed`] after [`shutdown`](Self::shutdown).
    pub fn dispatch<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(WatcherError::DispatcherClosed.into());
        }
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(WatcherError::DispatcherClosed.into());
        };
        sender
            .send(Box::new(action))
            .map_err(|_| WatcherError::DispatcherClosed.into())
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop accepting work, drop queued actions and wait for the running one.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        drop(self.sender.lock().take());

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if std::thread::current().id() == self.worker_id {
                // Called from a dispatched action; the loop exits on return.
                return;
            }
            if worker.join().is_err() {
                tracing::error!("Watch dispatcher thread panicked");
            }
            tracing::debug!("Watch dispatcher stopped");
        }
    }
}

impl Drop for WatchDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchDispatcher")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn run(receiver: &Receiver<Action>, closed: &AtomicBool) {
    for action in receiver {
        if closed.load(Ordering::Acquire) {
            break;
        }
        execute(action);
    }
}

fn execute(action: Action) {
    let span = spans::action_span();
    let _entered = span.enter();

    match catch_unwind(AssertUnwindSafe(action)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Watcher action failed"),
        Err(payload) => {
            tracing::warn!(panic = %panic_message(payload.as_ref()), "Watcher action panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
