//! Watcher wrapper that keeps retrying until its inner watcher starts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{after, select, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use super::Watcher;
use crate::Result;

/// Builds a fresh inner watcher for each start attempt.
pub type WatcherBuilder = Box<dyn Fn() -> Result<Box<dyn Watcher>> + Send + Sync>;

/// Starts its inner watcher in the background, retrying after a fixed delay
/// until it succeeds or the wrapper is dropped.
///
/// A path that does not exist yet is therefore picked up as soon as it
/// appears, within one retry delay.
pub struct ResilientWatcher {
    path: PathBuf,
    state: Arc<State>,
    builder: Mutex<Option<WatcherBuilder>>,
    restart_delay: Duration,
    cancel: Mutex<Option<Sender<()>>>,
    starter: Mutex<Option<JoinHandle<()>>>,
}

struct State {
    inner: Mutex<Option<Box<dyn Watcher>>>,
    running: AtomicBool,
}

impl ResilientWatcher {
    /// Wrap the watchers produced by `builder`.
    pub fn new(path: impl Into<PathBuf>, builder: WatcherBuilder, restart_delay: Duration) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(State {
                inner: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
            builder: Mutex::new(Some(builder)),
            restart_delay,
            cancel: Mutex::new(None),
            starter: Mutex::new(None),
        }
    }

    /// The watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begin starting the inner watcher on a background thread.
    ///
    /// Returns immediately. Calling it again has no effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the starter thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let Some(builder) = self.builder.lock().take() else {
            return Ok(());
        };

        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(0);
        let state = Arc::clone(&self.state);
        let path = self.path.clone();
        let delay = self.restart_delay;

        let handle = std::thread::Builder::new()
            .name("watch-starter".to_string())
            .spawn(move || start_until_cancelled(&path, &builder, &state, &cancel_rx, delay))?;

        *self.cancel.lock() = Some(cancel_tx);
        *self.starter.lock() = Some(handle);
        Ok(())
    }

    /// Whether the inner watcher is up.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }
}

fn start_until_cancelled(
    path: &Path,
    builder: &WatcherBuilder,
    state: &State,
    cancel: &Receiver<()>,
    delay: Duration,
) {
    let mut attempt: u32 = 1;
    loop {
        match builder().and_then(|watcher| watcher.start().map(|()| watcher)) {
            Ok(watcher) => {
                if matches!(cancel.try_recv(), Err(TryRecvError::Disconnected)) {
                    return;
                }
                *state.inner.lock() = Some(watcher);
                state.running.store(true, Ordering::Release);
                tracing::debug!(path = %path.display(), attempt, "Watcher started");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    error = %e,
                    retry_in = ?delay,
                    "Failed to start watcher, retrying"
                );
            }
        }

        select! {
            recv(cancel) -> _ => return,
            recv(after(delay)) -> _ => {}
        }
        attempt = attempt.saturating_add(1);
    }
}

impl Drop for ResilientWatcher {
    fn drop(&mut self) {
        drop(self.cancel.lock().take());
        if let Some(starter) = self.starter.lock().take() {
            if starter.join().is_err() {
                tracing::error!(path = %self.path.display(), "Watch starter thread panicked");
            }
        }
        self.state.running.store(false, Ordering::Release);
        drop(self.state.inner.lock().take());
    }
}

impl std::fmt::Debug for ResilientWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientWatcher")
            .field("path", &self.path)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
