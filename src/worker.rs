//! Off-thread refinement with cooperative cancellation.
//!
//! A refinement can take thousands of scene evaluations, so callers that
//! must stay responsive hand it to a [`RefinementWorker`]. The result comes
//! back over a channel; cancelling only raises a flag that the descent loop
//! checks between iterations, so the worker always finishes with a usable
//! best-so-far value.

use crate::{Error, Result};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Raw flag in the form the optimizer polls
    #[must_use]
    pub fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// Handle to a computation running on its own thread
#[derive(Debug)]
pub struct RefinementWorker<T> {
    name: String,
    token: CancellationToken,
    receiver: Receiver<T>,
    handle: Option<JoinHandle<()>>,
    pending: Option<T>,
}

impl<T: Send + 'static> RefinementWorker<T> {
    /// Start `task` on a named thread
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the thread cannot be spawned
    pub fn spawn<F>(name: impl Into<String>, task: F) -> Result<Self>
    where
        F: FnOnce(&CancellationToken) -> T + Send + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();
        let (sender, receiver) = mpsc::channel();

        let worker_token = token.clone();
        let handle = std::thread::Builder::new().name(name.clone()).spawn(move || {
            let result = task(&worker_token);
            // The receiver may already be gone if the handle was dropped
            let _ = sender.send(result);
        })?;
        debug!("Started worker '{name}'");

        Ok(Self {
            name,
            token,
            receiver,
            handle: Some(handle),
            pending: None,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the task to stop at its next iteration boundary
    pub fn cancel(&self) {
        debug!("Cancelling worker '{}'", self.name);
        self.token.cancel();
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the task has produced its result (or died)
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.pending.is_some() || self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Non-blocking poll; `Ok(None)` while the task is still running
    ///
    /// Once a result has been returned here it is consumed and [`join`](Self::join)
    /// will report an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerError` if the task panicked before producing a result
    pub fn try_result(&mut self) -> Result<Option<T>> {
        if let Some(result) = self.pending.take() {
            return Ok(Some(result));
        }
        match self.receiver.try_recv() {
            Ok(result) => Ok(Some(result)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.failure()),
        }
    }

    /// Block until the task finishes and return its result
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerError` if the task panicked or its result was
    /// already taken by [`try_result`](Self::try_result)
    pub fn join(mut self) -> Result<T> {
        let result = match self.pending.take() {
            Some(result) => Ok(result),
            None => self.receiver.recv().map_err(|_| self.failure()),
        };
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() && result.is_ok() {
                return Err(Error::WorkerError(format!("Worker '{}' panicked after finishing", self.name)));
            }
        }
        debug!("Joined worker '{}'", self.name);
        result
    }

    /// Block until the task completes without consuming the handle
    pub fn wait(&mut self) {
        if self.pending.is_none() {
            self.pending = self.receiver.recv().ok();
        }
    }

    fn failure(&self) -> Error {
        Error::WorkerError(format!("Worker '{}' exited without producing a result", self.name))
    }
}
