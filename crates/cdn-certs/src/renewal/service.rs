use std::sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::errors::{BuilderError, RenewalError};
use super::orchestrator::{BatchContext, RenewalOrchestrator};
use super::scanner::CandidateScanner;
use super::summary::ExpirationSummary;

/// A batch that has been accepted and is running in the background.
/// Dropping the handle detaches the batch; it keeps running.
pub struct BatchHandle {
    pub batch_id: Uuid,
    pub candidates: usize,
    pub deadline: Instant,
    task: JoinHandle<Result<ExpirationSummary, RenewalError>>,
}

impl BatchHandle {
    pub async fn wait(self) -> Result<ExpirationSummary, RenewalError> {
        self.task
            .await
            .map_err(|e| RenewalError::Task(e.to_string()))?
    }
}

struct RunningBatch {
    batch_id: Uuid,
    cancel: CancellationToken,
}

type RunningSlot = Arc<SyncMutex<Option<RunningBatch>>>;

fn lock_slot(slot: &RunningSlot) -> MutexGuard<'_, Option<RunningBatch>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the running slot when the batch task ends, however it ends.
struct RunningGuard {
    slot: RunningSlot,
    batch_id: Uuid,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut running = lock_slot(&self.slot);
        if running.as_ref().map(|r| r.batch_id) == Some(self.batch_id) {
            *running = None;
        }
    }
}

/// Starts renewal batches, allowing one at a time.
pub struct AutorenewService {
    scanner: Arc<dyn CandidateScanner>,
    orchestrator: Arc<RenewalOrchestrator>,
    guard: Arc<Mutex<()>>,
    running: RunningSlot,
}

impl AutorenewService {
    pub fn new(scanner: Arc<dyn CandidateScanner>, orchestrator: Arc<RenewalOrchestrator>) -> Self {
        Self {
            scanner,
            orchestrator,
            guard: Arc::new(Mutex::new(())),
            running: Arc::new(SyncMutex::new(None)),
        }
    }

    /// Scans for candidates and spawns the batch. Returns as soon as the batch
    /// is spawned, before any candidate is processed.
    ///
    /// The deadline is the per-certificate timeout times the candidate count.
    pub async fn trigger(&self, requested_by: &str) -> Result<BatchHandle, RenewalError> {
        let permit = self
            .guard
            .clone()
            .try_lock_owned()
            .map_err(|_| RenewalError::BatchInProgress)?;

        let candidates = match self.scanner.scan_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                let err = RenewalError::from(e);
                error!("Certificate renewal not started: {}", err);
                let ctx = BatchContext::new(requested_by, Instant::now());
                self.orchestrator.record_abort(&ctx, 0, &err).await;
                return Err(err);
            }
        };

        let per_certificate = self
            .orchestrator
            .settings()
            .acme_renewal
            .per_certificate_timeout();
        let count = u32::try_from(candidates.len()).unwrap_or(u32::MAX);
        let deadline = Instant::now() + per_certificate.saturating_mul(count);

        let ctx = BatchContext::new(requested_by, deadline);
        let batch_id = ctx.batch_id;
        let total = candidates.len();

        *lock_slot(&self.running) = Some(RunningBatch {
            batch_id,
            cancel: ctx.cancel.clone(),
        });
        let running = RunningGuard {
            slot: self.running.clone(),
            batch_id,
        };

        info!(
            "Accepted certificate renewal batch {} with {} candidate(s)",
            batch_id, total
        );

        let orchestrator = self.orchestrator.clone();
        let span = info_span!("autorenew_batch", batch_id = %batch_id, requested_by = %requested_by);
        let task = tokio::spawn(
            async move {
                let _permit = permit;
                let _running = running;

                let batch = {
                    let orchestrator = orchestrator.clone();
                    let ctx = ctx.clone();
                    tokio::spawn(
                        async move { orchestrator.run_batch(candidates, &ctx).await }
                            .in_current_span(),
                    )
                };

                match batch.await {
                    Ok(result) => result,
                    Err(e) => {
                        let err = RenewalError::Task(e.to_string());
                        error!("Certificate renewal batch {} aborted: {}", batch_id, err);
                        orchestrator.record_abort(&ctx, total, &err).await;
                        Err(err)
                    }
                }
            }
            .instrument(span),
        );

        Ok(BatchHandle {
            batch_id,
            candidates: total,
            deadline,
            task,
        })
    }

    /// Runs one batch to completion.
    pub async fn run_once(&self, requested_by: &str) -> Result<ExpirationSummary, RenewalError> {
        self.trigger(requested_by).await?.wait().await
    }

    /// Signals the running batch to stop. It finishes with a truncated summary.
    pub async fn cancel(&self) -> Result<Uuid, RenewalError> {
        let running = lock_slot(&self.running);
        match running.as_ref() {
            Some(batch) => {
                info!("Cancelling certificate renewal batch {}", batch.batch_id);
                batch.cancel.cancel();
                Ok(batch.batch_id)
            }
            None => Err(RenewalError::NoBatchRunning),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.try_lock().is_err()
    }
}

// Builder pattern
#[derive(Default)]
pub struct AutorenewServiceBuilder {
    scanner: Option<Arc<dyn CandidateScanner>>,
    orchestrator: Option<Arc<RenewalOrchestrator>>,
}

impl AutorenewServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn CandidateScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn with_orchestrator(mut self, orchestrator: Arc<RenewalOrchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn build(self) -> Result<AutorenewService, BuilderError> {
        Ok(AutorenewService::new(
            self.scanner.ok_or(BuilderError::MissingScanner)?,
            self.orchestrator.ok_or(BuilderError::MissingOrchestrator)?,
        ))
    }
}
