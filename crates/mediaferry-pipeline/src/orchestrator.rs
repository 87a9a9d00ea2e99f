//! Import orchestrator: worker pool, batching, retry, and reconciliation.
//!
//! Every source item yields exactly one report entry, exactly once, even
//! under partial failure. Fetch+stage runs concurrently up to the configured
//! bound; batch accumulation is a single-writer task fed over a channel, so
//! only one place ever mutates the pending batch buffer.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use mediaferry_client::{CommitClient, ContentFetcher, UploadStager};
use mediaferry_core::{
    derive_display_name, CommitBatch, CommitError, CommitOutcome, FailureReason,
    ImportConfig, ImportDisposition, ImportError, ImportReport, RetryPolicy, SourceMediaItem,
    StagedUpload, StageError,
};

/// Message from a stage worker to the batcher. Each input item produces
/// exactly one of these.
#[derive(Debug)]
enum WorkerOutcome {
    Staged(StagedUpload),
    Failed {
        source_id: String,
        reason: FailureReason,
    },
    NotAttempted {
        source_id: String,
    },
}

/// Drives the end-to-end pipeline: fetch → stage → batch → commit →
/// reconcile.
pub struct ImportOrchestrator {
    fetcher: Arc<dyn ContentFetcher>,
    stager: Arc<dyn UploadStager>,
    committer: Arc<dyn CommitClient>,
    config: ImportConfig,
}

impl ImportOrchestrator {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        stager: Arc<dyn UploadStager>,
        committer: Arc<dyn CommitClient>,
        config: ImportConfig,
    ) -> Self {
        Self {
            fetcher,
            stager,
            committer,
            config,
        }
    }

    /// Run the pipeline over a finite set of items without cancellation.
    pub async fn run_to_completion(
        &self,
        items: Vec<SourceMediaItem>,
    ) -> Result<ImportReport, ImportError> {
        self.run(items, CancellationToken::new()).await
    }

    /// Run the pipeline over a finite set of items.
    ///
    /// Returns a report with exactly one entry per input identity. After
    /// `cancel` fires, in-flight remote calls finish but no new item or
    /// batch is started; everything not yet started reports `NotAttempted`.
    #[tracing::instrument(skip_all, fields(items = items.len()))]
    pub async fn run(
        &self,
        items: Vec<SourceMediaItem>,
        cancel: CancellationToken,
    ) -> Result<ImportReport, ImportError> {
        self.config.validate()?;

        tracing::info!(
            items = items.len(),
            batch_limit = self.config.batch_limit,
            concurrency = self.config.concurrency,
            "Import run started"
        );

        let (tx, rx) = mpsc::channel::<WorkerOutcome>(items.len().max(1));
        let batcher = tokio::spawn(accumulate_and_commit(
            rx,
            Arc::clone(&self.committer),
            self.config.clone(),
            cancel.clone(),
        ));

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut workers = Vec::with_capacity(items.len());
        for item in items {
            if cancel.is_cancelled() {
                let _ = tx
                    .send(WorkerOutcome::NotAttempted { source_id: item.id })
                    .await;
                continue;
            }
            // Wait for a worker slot, but give up on the item if the run is
            // cancelled first: it was never started.
            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        let _ = tx
                            .send(WorkerOutcome::NotAttempted { source_id: item.id })
                            .await;
                        continue;
                    }
                },
                _ = cancel.cancelled() => {
                    let _ = tx
                        .send(WorkerOutcome::NotAttempted { source_id: item.id })
                        .await;
                    continue;
                }
            };

            let fetcher = Arc::clone(&self.fetcher);
            let stager = Arc::clone(&self.stager);
            let policy = self.config.stage_retry.clone();
            let worker_tx = tx.clone();
            let worker_cancel = cancel.clone();
            let source_id = item.id.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = fetch_and_stage(
                    fetcher.as_ref(),
                    stager.as_ref(),
                    &item,
                    &policy,
                    &worker_cancel,
                )
                .await;
                let _ = worker_tx.send(outcome).await;
            });
            workers.push((source_id, handle));
        }

        // A crashed worker never sent its outcome; record the failure here
        // so the item still gets its report entry.
        for (source_id, worker) in workers {
            if let Err(e) = worker.await {
                tracing::error!(source_id = %source_id, error = %e, "Stage worker task failed");
                let _ = tx
                    .send(WorkerOutcome::Failed {
                        source_id,
                        reason: FailureReason::Rejected {
                            code: None,
                            message: format!("stage worker crashed: {}", e),
                        },
                    })
                    .await;
            }
        }
        drop(tx);

        let report = batcher
            .await
            .map_err(|e| ImportError::Internal(e.to_string()))?;

        tracing::info!(
            imported = report.imported_count(),
            failed = report.failed_count(),
            "Import run finished"
        );
        Ok(report)
    }
}

/// Fetch an item's content and stage it, retrying transient failures with
/// capped exponential backoff. A stage retry re-fetches the content, since
/// a stream is consumed by the attempt that used it.
async fn fetch_and_stage(
    fetcher: &dyn ContentFetcher,
    stager: &dyn UploadStager,
    item: &SourceMediaItem,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> WorkerOutcome {
    let display_name = derive_display_name(item);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let transient_error = match fetcher.fetch(&item.locator).await {
            Ok(stream) => match stager.stage(stream, &display_name).await {
                Ok(upload_token) => {
                    tracing::debug!(source_id = %item.id, "Item staged");
                    return WorkerOutcome::Staged(StagedUpload {
                        source_id: item.id.clone(),
                        upload_token,
                        display_name,
                        description: item.description.clone(),
                    });
                }
                Err(StageError::Rejected { code, message }) => {
                    tracing::warn!(source_id = %item.id, code = ?code, message = %message, "Staging rejected");
                    return WorkerOutcome::Failed {
                        source_id: item.id.clone(),
                        reason: FailureReason::Rejected {
                            code: code.map(i32::from),
                            message,
                        },
                    };
                }
                Err(StageError::Transient(message)) => message,
            },
            Err(err) if err.is_transient() => err.to_string(),
            Err(err) => {
                tracing::warn!(source_id = %item.id, error = %err, "Fetch failed terminally");
                return WorkerOutcome::Failed {
                    source_id: item.id.clone(),
                    reason: FailureReason::Rejected {
                        code: None,
                        message: err.to_string(),
                    },
                };
            }
        };

        if attempt >= policy.max_attempts {
            tracing::warn!(
                source_id = %item.id,
                attempts = attempt,
                error = %transient_error,
                "Stage retries exhausted"
            );
            return WorkerOutcome::Failed {
                source_id: item.id.clone(),
                reason: FailureReason::Transient {
                    message: transient_error,
                    attempts: attempt,
                },
            };
        }

        let backoff = policy.backoff_for(attempt - 1);
        tracing::debug!(
            source_id = %item.id,
            attempt = attempt,
            backoff_ms = backoff.as_millis() as u64,
            "Scheduling stage retry"
        );
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = cancel.cancelled() => {
                return WorkerOutcome::Failed {
                    source_id: item.id.clone(),
                    reason: FailureReason::Transient {
                        message: transient_error,
                        attempts: attempt,
                    },
                };
            }
        }
    }
}

/// Single-writer batch accumulator. Staged uploads are grouped in arrival
/// order; a batch seals when it reaches the size limit or when the flush
/// deadline elapses with entries pending, whichever comes first.
async fn accumulate_and_commit(
    mut rx: mpsc::Receiver<WorkerOutcome>,
    committer: Arc<dyn CommitClient>,
    config: ImportConfig,
    cancel: CancellationToken,
) -> ImportReport {
    let mut report = ImportReport::new();
    let mut pending: Vec<StagedUpload> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let message = match deadline {
            Some(when) => {
                tokio::select! {
                    msg = rx.recv() => msg,
                    _ = tokio::time::sleep_until(when) => {
                        tracing::debug!(entries = pending.len(), "Flush deadline elapsed, sealing batch");
                        dispatch_batch(&mut pending, committer.as_ref(), &config.commit_retry, &cancel, &mut report).await;
                        deadline = None;
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        match message {
            Some(WorkerOutcome::Staged(staged)) => {
                if pending.is_empty() {
                    deadline = Some(Instant::now() + config.flush_deadline);
                }
                pending.push(staged);
                if pending.len() >= config.batch_limit {
                    dispatch_batch(
                        &mut pending,
                        committer.as_ref(),
                        &config.commit_retry,
                        &cancel,
                        &mut report,
                    )
                    .await;
                    deadline = None;
                }
            }
            Some(WorkerOutcome::Failed { source_id, reason }) => {
                report.record(source_id, ImportDisposition::Failed { reason });
            }
            Some(WorkerOutcome::NotAttempted { source_id }) => {
                report.record(source_id, ImportDisposition::NotAttempted);
            }
            None => {
                dispatch_batch(
                    &mut pending,
                    committer.as_ref(),
                    &config.commit_retry,
                    &cancel,
                    &mut report,
                )
                .await;
                break;
            }
        }
    }

    report
}

/// Seal the pending buffer into a batch and commit it. After cancellation
/// no new batch is dispatched; its staged entries report `NotAttempted`.
async fn dispatch_batch(
    pending: &mut Vec<StagedUpload>,
    committer: &dyn CommitClient,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    report: &mut ImportReport,
) {
    if pending.is_empty() {
        return;
    }
    let batch = CommitBatch::new(std::mem::take(pending));

    if cancel.is_cancelled() {
        tracing::info!(entries = batch.len(), "Run cancelled, abandoning sealed batch");
        for entry in batch.into_entries() {
            report.record(entry.source_id, ImportDisposition::NotAttempted);
        }
        return;
    }

    tracing::debug!(entries = batch.len(), "Committing batch");
    commit_with_retry(batch, committer, policy, report).await;
}

/// Commit one batch, retrying the whole unit (same token list) on transient
/// failure. A rejected commit fails every entry; no guess is made about
/// which entries would individually have failed.
async fn commit_with_retry(
    batch: CommitBatch,
    committer: &dyn CommitClient,
    policy: &RetryPolicy,
    report: &mut ImportReport,
) {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match committer.commit(&batch).await {
            Ok(outcomes) => {
                reconcile(batch, outcomes, report);
                return;
            }
            Err(CommitError::Rejected { code, message }) => {
                tracing::warn!(
                    entries = batch.len(),
                    code = ?code,
                    message = %message,
                    "Commit rejected, failing whole batch"
                );
                for entry in batch.into_entries() {
                    report.record(
                        entry.source_id,
                        ImportDisposition::Failed {
                            reason: FailureReason::Rejected {
                                code: code.map(i32::from),
                                message: message.clone(),
                            },
                        },
                    );
                }
                return;
            }
            Err(CommitError::Transient(message)) => {
                if attempt >= policy.max_attempts {
                    tracing::warn!(
                        entries = batch.len(),
                        attempts = attempt,
                        error = %message,
                        "Commit retries exhausted"
                    );
                    for entry in batch.into_entries() {
                        report.record(
                            entry.source_id,
                            ImportDisposition::Failed {
                                reason: FailureReason::Transient {
                                    message: message.clone(),
                                    attempts: attempt,
                                },
                            },
                        );
                    }
                    return;
                }
                let backoff = policy.backoff_for(attempt - 1);
                tracing::debug!(
                    entries = batch.len(),
                    attempt = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Scheduling commit retry"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Match outcome `i` to batch entry `i`. The remote protocol correlates
/// results by array index only; outcomes are never matched by ID.
fn reconcile(batch: CommitBatch, outcomes: Vec<CommitOutcome>, report: &mut ImportReport) {
    let entries = batch.into_entries();
    if outcomes.len() != entries.len() {
        tracing::warn!(
            expected = entries.len(),
            got = outcomes.len(),
            "Commit outcome count mismatch, failing whole batch"
        );
        for entry in entries {
            report.record(
                entry.source_id,
                ImportDisposition::Failed {
                    reason: FailureReason::Rejected {
                        code: None,
                        message: "commit outcome count did not match batch size".to_string(),
                    },
                },
            );
        }
        return;
    }

    for (entry, outcome) in entries.into_iter().zip(outcomes) {
        let disposition = match outcome {
            CommitOutcome::Created { remote_id } => ImportDisposition::Imported { remote_id },
            CommitOutcome::Failed { code, message } => ImportDisposition::Failed {
                reason: FailureReason::PartialBatchFailure { code, message },
            },
        };
        report.record(entry.source_id, disposition);
    }
}
