//! Run lifecycle for the displayed parent.
//!
//! The controller owns at most one active run. Starting a new run cancels
//! the previous one and hands the new run a fresh table, so a superseded
//! run can only ever write into its own, already abandoned, table.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mastertable_catalog::CatalogClient;
use mastertable_shared::{ParentId, PipelineConfig};
use mastertable_table::{SharedTable, TableViewModel};

use crate::pipeline::{ProgressReporter, RunOutcome, RunRequest, RunSummary, SilentProgress, run_pipeline};

/// Lifecycle phase of the active run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    /// Listing failed; holds the message shown in the error row.
    Failed(String),
}

/// Notification that the host view changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewChange {
    /// Parent now displayed, if any.
    pub parent_id: Option<ParentId>,
    /// Whether the host still shows this controller's table.
    pub table_present: bool,
    /// Parent year read from the host page.
    pub display_year: Option<String>,
}

/// What [`PipelineController::on_view_changed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChangeOutcome {
    /// Same parent, table still shown; the active run continues.
    Ignored,
    /// A fresh run was started.
    Restarted,
    /// No parent is displayed any more; the active run was dropped.
    Cleared,
}

/// Snapshot of the active run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRunState {
    pub run_id: Uuid,
    pub parent_id: ParentId,
    pub phase: RunPhase,
}

struct ActiveRun {
    run_id: Uuid,
    parent_id: ParentId,
    table: SharedTable,
    cancel: CancellationToken,
    phase: Arc<watch::Sender<RunPhase>>,
    handle: Option<JoinHandle<RunSummary>>,
}

impl ActiveRun {
    fn abandon(&self) {
        self.cancel.cancel();
        debug!(run_id = %self.run_id, parent = %self.parent_id, "run abandoned");
    }
}

/// Session-scoped owner of the table and its pipeline runs.
pub struct PipelineController {
    client: CatalogClient,
    config: PipelineConfig,
    progress: Arc<dyn ProgressReporter>,
    active: Option<ActiveRun>,
    /// Table of the last dropped run; its criteria seed the next table.
    retired: Option<SharedTable>,
}

impl PipelineController {
    pub fn new(client: CatalogClient, config: PipelineConfig) -> Self {
        Self {
            client,
            config,
            progress: Arc::new(SilentProgress),
            active: None,
            retired: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Start a run for `parent`, superseding any active run.
    ///
    /// Must be called from within a tokio runtime. Returns the run's table.
    pub fn start(&mut self, parent: ParentId, fallback_year: Option<String>) -> SharedTable {
        if let Some(previous) = self.active.take() {
            previous.abandon();
            self.retired = Some(previous.table);
        }

        let table = SharedTable::new(match &self.retired {
            Some(old) => old.with(|t| TableViewModel::inherit_view(t)),
            None => TableViewModel::new(),
        });
        let request = RunRequest::new(parent, fallback_year, self.config.clone());
        let cancel = CancellationToken::new();
        let (phase_tx, _) = watch::channel(RunPhase::Running);
        let phase = Arc::new(phase_tx);

        info!(run_id = %request.run_id, %parent, "starting run");

        let handle = {
            let client = self.client.clone();
            let table = table.clone();
            let cancel = cancel.clone();
            let phase = Arc::clone(&phase);
            let progress = Arc::clone(&self.progress);
            let request = request.clone();
            tokio::spawn(async move {
                let summary =
                    run_pipeline(&client, &request, &table, &cancel, progress.as_ref()).await;
                phase.send_replace(match &summary.outcome {
                    RunOutcome::Failed(message) => RunPhase::Failed(message.clone()),
                    RunOutcome::Completed | RunOutcome::Cancelled => RunPhase::Idle,
                });
                summary
            })
        };

        self.active = Some(ActiveRun {
            run_id: request.run_id,
            parent_id: parent,
            table: table.clone(),
            cancel,
            phase,
            handle: Some(handle),
        });
        table
    }

    /// React to a host view change.
    pub fn on_view_changed(&mut self, change: ViewChange) -> ViewChangeOutcome {
        let Some(parent) = change.parent_id else {
            return match self.active.take() {
                Some(run) => {
                    run.abandon();
                    self.retired = Some(run.table);
                    ViewChangeOutcome::Cleared
                }
                None => ViewChangeOutcome::Ignored,
            };
        };

        if change.table_present && self.parent_id() == Some(parent) {
            debug!(%parent, "view change for the active parent ignored");
            return ViewChangeOutcome::Ignored;
        }

        self.start(parent, change.display_year);
        ViewChangeOutcome::Restarted
    }

    /// Phase of the active run; `Idle` when there is none.
    pub fn phase(&self) -> RunPhase {
        self.active
            .as_ref()
            .map(|run| run.phase.borrow().clone())
            .unwrap_or_default()
    }

    pub fn state(&self) -> Option<PipelineRunState> {
        self.active.as_ref().map(|run| PipelineRunState {
            run_id: run.run_id,
            parent_id: run.parent_id,
            phase: run.phase.borrow().clone(),
        })
    }

    /// Move a displayed failure back to `Idle`.
    pub fn acknowledge_error(&self) {
        if let Some(run) = &self.active {
            run.phase
                .send_if_modified(|phase| match phase {
                    RunPhase::Failed(_) => {
                        *phase = RunPhase::Idle;
                        true
                    }
                    _ => false,
                });
        }
    }

    /// Table of the active run.
    pub fn table(&self) -> Option<SharedTable> {
        self.active.as_ref().map(|run| run.table.clone())
    }

    pub fn parent_id(&self) -> Option<ParentId> {
        self.active.as_ref().map(|run| run.parent_id)
    }

    /// Phase updates of the active run.
    pub fn subscribe(&self) -> Option<watch::Receiver<RunPhase>> {
        self.active.as_ref().map(|run| run.phase.subscribe())
    }

    /// Wait for the active run to finish.
    ///
    /// Returns `None` when there is no active run or it was already awaited.
    pub async fn wait(&mut self) -> Option<RunSummary> {
        let handle = self.active.as_mut()?.handle.take()?;
        match handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "pipeline task did not complete");
                None
            }
        }
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            run.cancel.cancel();
        }
    }
}
