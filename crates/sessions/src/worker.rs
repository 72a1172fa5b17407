use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Periodic background sweep on a dedicated thread.
///
/// The thread sleeps on its shutdown channel, so stopping it does not wait
/// for the current interval to elapse. Dropping the handle also stops and
/// joins the thread.
#[derive(Debug)]
pub struct PurgeWorker {
    name: String,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl PurgeWorker {
    /// Run `sweep` every `interval` until shut down.
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut sweep: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new().name(name.clone()).spawn(move || {
            loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => sweep(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        debug!(worker = %name, interval_ms, "worker started");

        Ok(Self {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }

    /// Request shutdown and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        let _ = self.shutdown.send(());
        if join.join().is_err() {
            warn!(worker = %self.name, "worker thread panicked");
        } else {
            debug!(worker = %self.name, "worker stopped");
        }
    }
}

impl Drop for PurgeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
