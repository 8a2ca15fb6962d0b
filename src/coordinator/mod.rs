//! Resumable, checkpointed extraction over the work-item universe.
//!
//! The coordinator is the only writer of the [`Checkpoint`]: workers hand their
//! results back through a `JoinSet` and the control loop applies them, so a
//! checkpoint persisted after an item completes always accounts for that item.

mod progress;

pub use self::progress::{Progress, ProgressSnapshot};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{Id, JoinSet};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::checkpoint::{
    unique_certifier_names, write_json_atomic, Checkpoint, CheckpointStore, ConsolidatedExport,
    DataLayout,
};
use crate::error::{ExtractionFailure, HarvestError};
use crate::extract::{ExtractionRecord, ItemExtractor};
use crate::universe::WorkUniverse;
use crate::TARGET_COORDINATOR;

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_SAVE_EVERY: usize = 20;
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Maximum extractions in flight.
    pub workers: usize,
    /// Persist the checkpoint after this many completions.
    pub save_every: usize,
    /// Pause each worker takes before issuing its request.
    pub request_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            save_every: DEFAULT_SAVE_EVERY,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Finalizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every remaining item was attempted and the consolidated export written.
    Completed,
    /// A stop signal arrived; in-flight work finished and the checkpoint was saved.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items still outside both `processed` and `failed` after the run.
    pub remaining: usize,
}

type Completion = Result<ExtractionRecord, ExtractionFailure>;

/// Worker tasks in flight, keyed so a lost task can still be attributed.
struct InFlight {
    tasks: JoinSet<Completion>,
    items: HashMap<Id, String>,
}

impl InFlight {
    fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            items: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

pub struct Coordinator {
    extractor: Arc<dyn ItemExtractor>,
    store: CheckpointStore,
    layout: DataLayout,
    config: CoordinatorConfig,
    state: RunState,
}

impl Coordinator {
    pub fn new(
        extractor: Arc<dyn ItemExtractor>,
        layout: DataLayout,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            extractor,
            store: CheckpointStore::new(layout.checkpoint()),
            layout,
            config,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Extract every item of `universe` not yet accounted for in `checkpoint`.
    ///
    /// Item failures are recorded and never abort the run. An `Err` means the
    /// checkpoint could not be persisted; the last saved checkpoint is then the
    /// recovery point.
    pub async fn run(
        &mut self,
        universe: &WorkUniverse,
        checkpoint: &mut Checkpoint,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary, HarvestError> {
        self.state = RunState::Idle;
        checkpoint.reconcile();
        let remaining = universe.remaining(checkpoint);

        info!(
            target: TARGET_COORDINATOR,
            "Universe: {} | processed: {} | failed: {} | remaining: {}",
            universe.len(),
            checkpoint.processed.len(),
            checkpoint.failed.len(),
            remaining.len()
        );

        if remaining.is_empty() {
            info!(target: TARGET_COORDINATOR, "Nothing left to extract");
            return self.finalize(universe, checkpoint, Progress::new(0));
        }

        self.state = RunState::Running;
        let workers = self.config.workers.max(1);
        let save_every = self.config.save_every.max(1);
        let mut progress = Progress::new(remaining.len());
        let mut pending = remaining.into_iter();
        let mut in_flight = InFlight::new();
        let mut since_save = 0;
        let mut signal_open = true;

        if *shutdown.borrow() {
            info!(target: TARGET_COORDINATOR, "Stop requested before start, draining");
            self.state = RunState::Draining;
        }

        loop {
            if self.state == RunState::Running {
                while in_flight.len() < workers {
                    let Some(work_item) = pending.next() else {
                        break;
                    };
                    self.spawn_extraction(&mut in_flight, work_item);
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed(), if signal_open && self.state == RunState::Running => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => {
                            warn!(
                                target: TARGET_COORDINATOR,
                                "Stop requested, waiting for {} in-flight extraction(s)",
                                in_flight.len()
                            );
                            self.state = RunState::Draining;
                        }
                        Ok(()) => {}
                        // Sender gone: nobody can ask us to stop any more.
                        Err(_) => signal_open = false,
                    }
                }
                Some(joined) = in_flight.tasks.join_next_with_id() => {
                    let (id, completion) = match joined {
                        Ok((id, completion)) => (id, completion.map_err(|f| f.to_string())),
                        Err(e) => (e.id(), Err(format!("extraction task aborted: {}", e))),
                    };
                    let Some(work_item) = in_flight.items.remove(&id) else {
                        error!(target: TARGET_COORDINATOR, "Completion from unknown task {}", id);
                        continue;
                    };
                    let success = apply(checkpoint, &work_item, completion);
                    progress.record(success);
                    since_save += 1;

                    if since_save >= save_every {
                        self.store.save(checkpoint)?;
                        since_save = 0;
                        info!(target: TARGET_COORDINATOR, "Checkpoint saved | {}", progress.snapshot());
                    }
                }
            }
        }

        // Write-then-stop: nothing touches the checkpoint after this save.
        self.store.save(checkpoint)?;
        debug!(target: TARGET_COORDINATOR, "Final checkpoint saved to {}", self.store.path().display());

        if self.state == RunState::Draining {
            let summary = summarize(RunOutcome::Interrupted, &progress, universe, checkpoint);
            info!(
                target: TARGET_COORDINATOR,
                "Interrupted: {} attempted, {} remaining; rerun to resume",
                summary.attempted,
                summary.remaining
            );
            return Ok(summary);
        }

        self.finalize(universe, checkpoint, progress)
    }

    fn spawn_extraction(&self, in_flight: &mut InFlight, work_item: String) {
        let extractor = Arc::clone(&self.extractor);
        let delay = self.config.request_delay;
        let item = work_item.clone();

        let handle = in_flight.tasks.spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            extractor.extract(&item).await
        });
        in_flight.items.insert(handle.id(), work_item);
    }

    fn finalize(
        &mut self,
        universe: &WorkUniverse,
        checkpoint: &mut Checkpoint,
        progress: Progress,
    ) -> Result<RunSummary, HarvestError> {
        self.state = RunState::Finalizing;

        let export = ConsolidatedExport::from_checkpoint(checkpoint);
        write_json_atomic(&self.layout.export(), &export)?;
        write_json_atomic(
            &self.layout.unique_certifiers(),
            &unique_certifier_names(checkpoint),
        )?;
        info!(
            target: TARGET_COORDINATOR,
            "Extraction complete: {} processed, {} failed, {} certifier relationships -> {}",
            export.summary.ecs_processed,
            export.summary.ecs_failed,
            export.summary.total_certifier_relationships,
            self.layout.export().display()
        );

        Ok(summarize(RunOutcome::Completed, &progress, universe, checkpoint))
    }
}

/// Fold one completion into the checkpoint. Returns whether it succeeded.
fn apply(checkpoint: &mut Checkpoint, work_item: &str, completion: Result<ExtractionRecord, String>) -> bool {
    match completion {
        Ok(record) => {
            checkpoint.record_success(record);
            true
        }
        Err(reason) => {
            warn!(target: TARGET_COORDINATOR, "{} failed: {}", work_item, reason);
            checkpoint.record_failure(work_item);
            false
        }
    }
}

fn summarize(
    outcome: RunOutcome,
    progress: &Progress,
    universe: &WorkUniverse,
    checkpoint: &Checkpoint,
) -> RunSummary {
    RunSummary {
        outcome,
        attempted: progress.completed,
        succeeded: progress.succeeded,
        failed: progress.failed,
        remaining: universe.remaining(checkpoint).len(),
    }
}
