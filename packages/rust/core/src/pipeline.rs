//! One pipeline run: parent id → listing → placeholder rows → enrichment.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use mastertable_catalog::{CatalogClient, CollectionPager};
use mastertable_shared::{MasterTableError, ParentId, PipelineConfig};
use mastertable_table::SharedTable;

use crate::scheduler::{EnrichmentOptions, EnrichmentScheduler, EnrichmentSummary};

/// Everything a single run needs to know up front.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Identifier used to correlate log lines of one run.
    pub run_id: Uuid,
    pub parent_id: ParentId,
    /// Parent year supplied by the host page, if it showed one.
    pub fallback_year: Option<String>,
    pub config: PipelineConfig,
}

impl RunRequest {
    pub fn new(parent_id: ParentId, fallback_year: Option<String>, config: PipelineConfig) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            parent_id,
            fallback_year,
            config,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The listing could not be fetched; the table shows one error row.
    Failed(String),
    /// A newer run superseded this one.
    Cancelled,
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub parent_id: ParentId,
    pub outcome: RunOutcome,
    /// Rows listed (0 when the listing failed).
    pub rows: usize,
    /// Year substituted for rows whose detail had none.
    pub parent_year: Option<String>,
    pub enrichment: EnrichmentSummary,
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the full listing is known.
    fn rows_listed(&self, count: usize);
    /// Called after each enrichment batch is written.
    fn batch_completed(&self, done: usize, total: usize);
    /// Called when the run ends, whatever the outcome.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn rows_listed(&self, _count: usize) {}
    fn batch_completed(&self, _done: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run the full pipeline for one parent into `table`.
///
/// 1. List every member (any page failure → single error row, stop)
/// 2. Show all rows with placeholders
/// 3. Resolve the parent year once (host-supplied, else the API)
/// 4. Enrich rows batch by batch
#[instrument(skip_all, fields(run_id = %request.run_id, parent = %request.parent_id))]
pub async fn run_pipeline(
    client: &CatalogClient,
    request: &RunRequest,
    table: &SharedTable,
    cancel: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> RunSummary {
    let start = Instant::now();
    let mut summary = RunSummary {
        run_id: request.run_id,
        parent_id: request.parent_id,
        outcome: RunOutcome::Completed,
        rows: 0,
        parent_year: None,
        enrichment: EnrichmentSummary::default(),
        elapsed: Duration::ZERO,
        finished_at: Utc::now(),
    };

    info!("starting pipeline run");

    // --- Phase 1: Listing ---
    progress.phase("Listing versions");
    let pager = CollectionPager::new(client, request.config.per_page);
    match pager.fetch_all(request.parent_id, cancel).await {
        Ok(_) if cancel.is_cancelled() => {
            summary.outcome = RunOutcome::Cancelled;
        }
        Ok(records) => {
            summary.rows = records.len();
            progress.rows_listed(records.len());
            table.with(|t| t.set_rows(records));
        }
        Err(MasterTableError::Cancelled) => {
            summary.outcome = RunOutcome::Cancelled;
        }
        Err(e) => {
            error!(error = %e, "listing failed");
            let message = e.to_string();
            table.with(|t| t.set_error(message.clone()));
            summary.outcome = RunOutcome::Failed(message);
        }
    }

    if summary.outcome == RunOutcome::Completed {
        // --- Phase 2: Parent year ---
        summary.parent_year = match &request.fallback_year {
            Some(year) if !year.is_empty() => Some(year.clone()),
            _ => resolve_parent_year(client, request.parent_id).await,
        };

        // --- Phase 3: Enrichment ---
        progress.phase("Fetching release details");
        let scheduler = EnrichmentScheduler::new(EnrichmentOptions::from(&request.config));
        summary.enrichment = scheduler
            .enrich(
                client,
                table,
                summary.parent_year.as_deref(),
                cancel,
                progress,
            )
            .await;
        if summary.enrichment.cancelled {
            summary.outcome = RunOutcome::Cancelled;
        }
    }

    summary.elapsed = start.elapsed();
    summary.finished_at = Utc::now();
    progress.done(&summary);

    info!(
        outcome = ?summary.outcome,
        rows = summary.rows,
        batches = summary.enrichment.batches,
        elapsed_ms = summary.elapsed.as_millis(),
        "pipeline run finished"
    );

    summary
}

/// Ask the API for the parent's own year. Best-effort.
async fn resolve_parent_year(client: &CatalogClient, parent: ParentId) -> Option<String> {
    match client.fetch_master(parent).await {
        Ok(master) => master.year(),
        Err(e) => {
            warn!(%parent, error = %e, "could not resolve parent year");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastertable_shared::{ApiConfig, MemberId, RecordStatus};
    use mastertable_table::Column;
    use serde_json::json;
    use wiremock::matchers::{method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn versions(start: u64, count: u64) -> serde_json::Value {
        let list: Vec<_> = (start..start + count)
            .map(|id| json!({"id": id, "title": format!("Release {id}"), "country": "UK"}))
            .collect();
        json!({ "versions": list })
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            batch_delay: Duration::ZERO,
            ..PipelineConfig::default()
        }
    }

    async fn run(server: &MockServer, fallback: Option<&str>) -> (RunSummary, SharedTable) {
        let client = CatalogClient::new(&ApiConfig::with_base_url(server.uri())).unwrap();
        let request = RunRequest::new(ParentId(1), fallback.map(String::from), fast_config());
        let table = SharedTable::default();
        let summary = run_pipeline(
            &client,
            &request,
            &table,
            &CancellationToken::new(),
            &SilentProgress,
        )
        .await;
        (summary, table)
    }

    #[tokio::test]
    async fn test_run_pipeline_end_to_end() {
        let server = MockServer::start().await;

        for (page, start, count) in [(1u32, 1u64, 100u64), (2, 101, 100), (3, 201, 37)] {
            Mock::given(method("GET"))
                .and(path("/masters/1/versions"))
                .and(query_param("page", page.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(versions(start, count)))
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/masters/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"year": 1971})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/releases/\d+$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"year": 0, "tracklist": [{}, {}, {}]})),
            )
            .expect(237)
            .mount(&server)
            .await;

        let (summary, table) = run(&server, None).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.rows, 237);
        assert_eq!(summary.enrichment.batches, 48);
        assert_eq!(summary.parent_year.as_deref(), Some("1971"));
        table.with(|t| {
            assert_eq!(t.len(), 237);
            assert_eq!(t.loaded_len(), 237);
            let first = &t.rows()[0];
            assert_eq!(first.record().id, MemberId(1));
            assert_eq!(first.cell(Column::Tracks), "3");
            assert_eq!(first.cell(Column::Year), "1971");
        });
    }

    #[tokio::test]
    async fn test_run_pipeline_first_page_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/masters/1/versions"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/releases/\d+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/masters/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"year": 1971})))
            .expect(0)
            .mount(&server)
            .await;

        let (summary, table) = run(&server, None).await;

        assert!(matches!(summary.outcome, RunOutcome::Failed(ref m) if m.contains("page 1")));
        table.with(|t| {
            assert_eq!(t.len(), 0);
            assert!(t.error_row().unwrap().starts_with("Error: "));
        });
    }

    #[tokio::test]
    async fn test_run_pipeline_detail_failure_uses_host_year() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/masters/1/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(versions(1, 3)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/releases/2"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/releases/[13]$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"year": 1999, "tracklist": [{}]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/masters/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"year": 1971})))
            .expect(0)
            .mount(&server)
            .await;

        let (summary, table) = run(&server, Some("1980")).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.enrichment.defaulted, 1);
        table.with(|t| {
            let failed = &t.rows()[1];
            assert_eq!(failed.record().id, MemberId(2));
            assert_eq!(failed.record().status, RecordStatus::Loaded);
            assert_eq!(failed.cell(Column::Tracks), "0");
            assert_eq!(failed.cell(Column::Year), "1980");

            let ok = &t.rows()[0];
            assert_eq!(ok.cell(Column::Year), "1999");
            assert_eq!(ok.cell(Column::Tracks), "1");
        });
    }

    #[tokio::test]
    async fn test_run_pipeline_cancelled_leaves_table_untouched() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/masters/1/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(versions(1, 3)))
            .expect(0)
            .mount(&server)
            .await;

        let client = CatalogClient::new(&ApiConfig::with_base_url(server.uri())).unwrap();
        let request = RunRequest::new(ParentId(1), None, fast_config());
        let table = SharedTable::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = run_pipeline(&client, &request, &table, &cancel, &SilentProgress).await;

        assert_eq!(summary.outcome, RunOutcome::Cancelled);
        table.with(|t| {
            assert!(t.is_empty());
            assert_eq!(t.error_row(), None);
        });
    }
}
