//! Bounded job queue drained by a fixed pool of delivery workers.

use std::sync::Arc;

use mailpush_common::internal;
use parking_lot::Mutex;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};

use crate::{
    client::{Transport, deliver},
    job::DispatchJob,
    policy::RetryPolicy,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Jobs that may wait in the queue before new ones are dropped
    pub capacity: usize,
    /// Concurrent delivery workers
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            workers: 5,
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to a job handed to [`Dispatcher::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,
    /// The queue was full or closed; the job was discarded
    Dropped,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<DispatchJob>>>;

#[derive(Debug)]
pub struct Dispatcher {
    sender: Mutex<Option<mpsc::Sender<DispatchJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start `config.workers` workers delivering through `transport`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: DispatcherConfig, transport: Arc<dyn Transport>) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..config.workers.max(1))
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&transport),
                    config.retry.clone(),
                ))
            })
            .collect();

        internal!(
            level = INFO,
            "Dispatcher started with {} workers and capacity {}",
            config.workers.max(1),
            config.capacity.max(1)
        );

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Queue `job` without waiting. A full or closed queue drops the job.
    pub fn enqueue(&self, job: DispatchJob) -> EnqueueOutcome {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            internal!(
                level = WARN,
                "Dispatcher closed, dropping notification for {} to {}",
                job.rule.recipient,
                job.rule.destination_key
            );
            return EnqueueOutcome::Dropped;
        };

        match sender.try_send(job) {
            Ok(()) => EnqueueOutcome::Enqueued,
            Err(TrySendError::Full(job)) => {
                internal!(
                    level = WARN,
                    "Dispatch queue full, dropping notification for {} to {}",
                    job.rule.recipient,
                    job.rule.destination_key
                );
                EnqueueOutcome::Dropped
            }
            Err(TrySendError::Closed(job)) => {
                internal!(
                    level = WARN,
                    "Dispatch queue closed, dropping notification for {} to {}",
                    job.rule.recipient,
                    job.rule.destination_key
                );
                EnqueueOutcome::Dropped
            }
        }
    }

    /// Whether [`Self::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stop accepting jobs, then wait for every queued and in-flight job to
    /// finish. Calling this more than once is harmless.
    pub async fn close(&self) {
        drop(self.sender.lock().take());

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }

        internal!(level = INFO, "Draining dispatcher ...");
        for worker in workers {
            if let Err(err) = worker.await {
                internal!(level = ERROR, "Dispatch worker failed: {err}");
            }
        }
        internal!(level = INFO, "Dispatcher drained");
    }
}

async fn worker(
    id: usize,
    receiver: SharedReceiver,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            internal!(level = DEBUG, "Dispatch worker {id} exiting");
            return;
        };

        match deliver(transport.as_ref(), &job.url, &job.payload, &policy).await {
            Ok(attempts) => internal!(
                level = INFO,
                "Delivered notification for {} to {} in {attempts} attempt(s)",
                job.rule.recipient,
                job.rule.destination_key
            ),
            Err(err) => internal!(
                level = ERROR,
                "Giving up on notification for {} to {}: {err}",
                job.rule.recipient,
                job.rule.destination_key
            ),
        }
    }
}
