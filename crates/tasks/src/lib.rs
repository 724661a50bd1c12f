//! Process-wide task supervision: a single [`TaskManager`] owns the tokio
//! runtime handle, hands out [`TaskExecutor`]s to every subsystem that needs
//! to spawn work, and propagates one cooperative [`ShutdownSignal`] to all
//! of them.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
};
use tracing::{error, info, warn};

/// Shared flag observed by every long-running loop in the process. Cloning
/// is cheap; all clones see the same underlying signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn should_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been signaled. Useful in `select!` arms
    /// inside an async loop.
    pub async fn wait(&mut self) {
        let _ = self.rx.changed().await;
    }
}

struct Inner {
    handle: Handle,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    joins: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    critical_failed: Arc<AtomicBool>,
}

/// Top-level task supervisor, constructed once in `main`.
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    pub fn new(handle: Handle) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                handle,
                shutdown_tx,
                shutdown_rx,
                joins: Mutex::new(Vec::new()),
                critical_failed: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            inner: self.inner.clone(),
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.inner.shutdown_rx.clone(),
        }
    }

    /// Installs SIGINT/SIGTERM handlers that trigger shutdown. Call once
    /// from `main` after all tasks are spawned.
    pub fn start_signal_listeners(&self) {
        let inner = self.inner.clone();
        self.inner.handle.spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            let _ = inner.shutdown_tx.send(true);
        });
    }

    /// Blocks the calling thread until every spawned task exits, or until
    /// `poll_interval` elapses between liveness checks if provided. Returns
    /// once all handles are joined or a critical task has failed.
    pub fn monitor(&self, poll_interval: Option<Duration>) {
        loop {
            let all_done = {
                let mut joins = self.inner.joins.lock();
                joins.retain(|(name, h)| {
                    if h.is_finished() {
                        info!(task = name, "task exited");
                        false
                    } else {
                        true
                    }
                });
                joins.is_empty()
            };

            if all_done || self.inner.critical_failed.load(Ordering::SeqCst) {
                break;
            }

            std::thread::sleep(poll_interval.unwrap_or(Duration::from_millis(200)));
        }
    }
}

/// Handle passed to subsystems so they can spawn supervised work without
/// holding a reference to the [`TaskManager`] itself.
#[derive(Clone)]
pub struct TaskExecutor {
    inner: Arc<Inner>,
}

impl TaskExecutor {
    pub fn handle(&self) -> Handle {
        self.inner.handle.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.inner.shutdown_rx.clone(),
        }
    }

    /// Spawns a blocking closure on a dedicated OS thread. If it returns an
    /// error, shutdown is triggered for the whole process: this task is
    /// load-bearing and the process cannot make progress without it.
    pub fn spawn_critical<F>(&self, name: &'static str, f: F)
    where
        F: FnOnce(ShutdownSignal) -> anyhow::Result<()> + Send + 'static,
    {
        let shutdown = self.shutdown_signal();
        let inner = self.inner.clone();
        let join = self.inner.handle.spawn_blocking(move || {
            if let Err(e) = f(shutdown) {
                error!(task = name, err = %e, "critical task failed");
                inner.critical_failed.store(true, Ordering::SeqCst);
                let _ = inner.shutdown_tx.send(true);
            }
        });
        // spawn_blocking returns a JoinHandle<()> already, store it directly
        self.inner.joins.lock().push((name, join));
    }

    /// Spawns an async critical task on the tokio runtime.
    pub fn spawn_critical_async<F>(&self, name: &'static str, fut: F)
    where
        F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let join = self.inner.handle.spawn(async move {
            if let Err(e) = fut.await {
                error!(task = name, err = %e, "critical task failed");
                inner.critical_failed.store(true, Ordering::SeqCst);
                let _ = inner.shutdown_tx.send(true);
            }
        });
        self.inner.joins.lock().push((name, join));
    }

    /// Spawns best-effort background work: failures are logged but do not
    /// bring down the process.
    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let join = self.inner.handle.spawn(fut);
        self.inner.joins.lock().push((name, join));
        let _ = name;
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if self.inner.shutdown_tx.send(true).is_err() {
            warn!("shutdown channel already closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_signal_propagates() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let tm = TaskManager::new(rt.handle().clone());
        let sig = tm.shutdown_signal();
        assert!(!sig.should_shutdown());
        drop(tm);
        assert!(sig.should_shutdown());
    }

    #[test]
    fn monitor_returns_when_tasks_complete() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let tm = TaskManager::new(rt.handle().clone());
        let ex = tm.executor();
        ex.spawn_critical("noop", |_shutdown| Ok(()));
        tm.monitor(Some(Duration::from_millis(10)));
    }
}
