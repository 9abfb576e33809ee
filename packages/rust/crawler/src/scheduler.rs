//! Bounded-concurrency fetch scheduler.
//!
//! Every URL gets its own task in a [`JoinSet`] owned by the batch. A task
//! holds one semaphore permit for its whole lifetime, so at most `budget`
//! extractions are in flight. Outcomes are forwarded in completion order.
//! Cancelling the token aborts every task still owned by the set.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use sitemark_shared::FetchOutcome;

use crate::fetcher::PageExtractor;

/// Counts for one scheduled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// URLs that never produced an outcome because the batch was cancelled.
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn was_cancelled(&self) -> bool {
        self.cancelled > 0
    }
}

/// Runs page extractions under a fixed concurrency budget.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    budget: usize,
}

impl Scheduler {
    /// A budget of zero is treated as one.
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.max(1),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Extract every URL, sending each outcome to `outcomes` as it completes.
    ///
    /// Returns once every URL has produced an outcome, or early when `cancel`
    /// fires or the receiver is dropped.
    #[instrument(skip_all, fields(urls = urls.len(), budget = self.budget))]
    pub async fn run<E: PageExtractor>(
        &self,
        extractor: Arc<E>,
        urls: Vec<String>,
        outcomes: mpsc::Sender<FetchOutcome>,
        cancel: CancellationToken,
    ) -> BatchSummary {
        let cancel = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.budget));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, String> = HashMap::with_capacity(urls.len());

        let mut summary = BatchSummary {
            submitted: urls.len(),
            ..BatchSummary::default()
        };

        for url in urls {
            let semaphore = semaphore.clone();
            let extractor = extractor.clone();
            let task_url = url.clone();

            let handle = tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return FetchOutcome::failure(task_url, "concurrency budget closed");
                };
                extractor.extract(task_url).await
            });
            pending.insert(handle.id(), url);
        }

        info!("batch started");

        loop {
            let joined = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(remaining = tasks.len(), "batch cancelled");
                    tasks.abort_all();
                    break;
                }
                joined = tasks.join_next_with_id() => joined,
            };

            let Some(joined) = joined else {
                break;
            };

            let outcome = match joined {
                Ok((id, outcome)) => {
                    pending.remove(&id);
                    outcome
                }
                Err(err) if err.is_cancelled() => continue,
                Err(err) => {
                    let url = pending.remove(&err.id()).unwrap_or_default();
                    warn!(%url, "fetch task panicked");
                    FetchOutcome::failure(url, format!("fetch task panicked: {err}"))
                }
            };

            if outcome.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            debug!(url = outcome.url(), success = outcome.is_success(), "outcome");

            if outcomes.send(outcome).await.is_err() {
                debug!("outcome receiver dropped");
                cancel.cancel();
            }
        }

        // Aborted tasks release their permits as they unwind.
        while tasks.join_next().await.is_some() {}

        summary.cancelled = summary.submitted - summary.succeeded - summary.failed;

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "batch finished"
        );

        summary
    }
}
