//! Pipeline orchestration for MasterTable.
//!
//! This crate ties the catalog pager, the detail enricher and the table
//! view model together into one run per displayed parent (`run_pipeline`),
//! and guards runs against duplication when the host view changes
//! (`PipelineController`).

pub mod controller;
pub mod pipeline;
pub mod scheduler;

pub use controller::{PipelineController, PipelineRunState, RunPhase, ViewChange, ViewChangeOutcome};
pub use pipeline::{ProgressReporter, RunOutcome, RunRequest, RunSummary, SilentProgress, run_pipeline};
pub use scheduler::{EnrichmentOptions, EnrichmentScheduler, EnrichmentSummary};
