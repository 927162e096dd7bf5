use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Receiving side of a task's stop request.
///
/// The request is delivered by dropping the paired sender, so every pending
/// `wait` wakes up at once and later calls return immediately.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

impl ShutdownSignal {
    pub(crate) fn pair() -> (Sender<()>, ShutdownSignal) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, ShutdownSignal { rx })
    }

    /// Sleeps for up to `timeout`. Returns `true` if shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        !matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
    }

    pub fn is_requested(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// For use inside `crossbeam_channel::select!` alongside other receivers.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

/// A named background thread with explicit stop-and-join semantics.
///
/// Dropping the handle stops and joins the thread as well, so a task never
/// outlives its owner.
pub struct SupervisedTask<T: Send + 'static> {
    name: String,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> SupervisedTask<T> {
    pub fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(ShutdownSignal) -> T + Send + 'static,
    {
        let (tx, signal) = ShutdownSignal::pair();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(signal))?;
        log::debug!("Started task {name}");
        Ok(Self {
            name: name.to_string(),
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests shutdown and blocks until the task returns.
    ///
    /// Returns `None` if the task panicked.
    pub fn stop(mut self) -> Option<T> {
        self.shutdown.take();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(value) => {
                log::debug!("Stopped task {}", self.name);
                Some(value)
            }
            Err(_) => {
                log::error!("Task {} panicked", self.name);
                None
            }
        }
    }
}

impl<T: Send + 'static> Drop for SupervisedTask<T> {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
