//! Background fetch worker.
//!
//! Schema and preview fetches are blocking request/response calls. Each kind
//! runs on its own named thread, fed through crossbeam channels:
//!
//! ```text
//! submit(job) ──▶ [job channel] ──▶ handler(job) ──▶ [reply channel] ──▶ try_recv()/drain()
//! ```
//!
//! Jobs are processed in submission order. Supersession is left to the
//! caller: jobs carry a generation and the owner ignores stale replies.
//! Dropping the worker closes the job channel and joins the thread.

use crate::error::{BuilderError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

pub struct FetchWorker<J, R> {
    name: String,
    job_tx: Option<Sender<J>>,
    reply_rx: Receiver<R>,
    handle: Option<JoinHandle<()>>,
}

impl<J, R> FetchWorker<J, R>
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Spawn a worker thread running `handler` for every submitted job.
    pub fn spawn<F>(name: impl Into<String>, mut handler: F) -> Result<Self>
    where
        F: FnMut(J) -> R + Send + 'static,
    {
        let name = name.into();
        let (job_tx, job_rx) = unbounded::<J>();
        let (reply_tx, reply_rx) = unbounded::<R>();

        let thread_name = name.clone();
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                tracing::debug!("Fetch worker '{}' started", thread_name);
                for job in job_rx.iter() {
                    if reply_tx.send(handler(job)).is_err() {
                        break;
                    }
                }
                tracing::debug!("Fetch worker '{}' stopped", thread_name);
            })?;

        Ok(Self {
            name,
            job_tx: Some(job_tx),
            reply_rx,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job.
    pub fn submit(&self, job: J) -> Result<()> {
        let tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| BuilderError::Channel(format!("worker '{}' is shut down", self.name)))?;
        tx.send(job)
            .map_err(|_| BuilderError::Channel(format!("worker '{}' has stopped", self.name)))
    }

    /// Try to receive a single reply without blocking.
    pub fn try_recv(&self) -> Option<R> {
        self.reply_rx.try_recv().ok()
    }

    /// Drain all pending replies.
    pub fn drain(&self) -> Vec<R> {
        let mut replies = Vec::new();
        while let Ok(reply) = self.reply_rx.try_recv() {
            replies.push(reply);
        }
        replies
    }

    /// Block up to `timeout` for the next reply.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<R> {
        match self.reply_rx.recv_timeout(timeout) {
            Ok(reply) => Some(reply),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("Fetch worker '{}' disconnected", self.name);
                None
            }
        }
    }
}

impl<J, R> Drop for FetchWorker<J, R> {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Fetch worker '{}' panicked", self.name);
            }
        }
    }
}
