//! Batched, paced enrichment of table rows.
//!
//! Rows are enriched in contiguous batches. All requests of a batch are
//! issued together and joined on the current task; the next batch starts
//! only after every request of the previous one resolved and the pacing
//! delay elapsed. This caps outstanding requests at the batch size.

use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use mastertable_catalog::DetailFetcher;
use mastertable_shared::{MemberDetail, PipelineConfig};
use mastertable_table::SharedTable;

use crate::pipeline::ProgressReporter;

/// Default number of concurrent detail requests.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default pause between batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(200);

/// Batch sizing and pacing.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentOptions {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

impl From<&PipelineConfig> for EnrichmentOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            inter_batch_delay: config.batch_delay,
        }
    }
}

/// What one enrichment pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    /// Batches whose results were written.
    pub batches: usize,
    /// Rows that received detail.
    pub loaded: usize,
    /// Rows whose detail came back empty (failed fetch or empty release).
    pub defaulted: usize,
    /// Whether the pass stopped early because its run was superseded.
    pub cancelled: bool,
}

/// Drives a [`DetailFetcher`] over every pending row of a table.
#[derive(Debug, Clone)]
pub struct EnrichmentScheduler {
    options: EnrichmentOptions,
}

impl EnrichmentScheduler {
    pub fn new(options: EnrichmentOptions) -> Self {
        Self {
            options: EnrichmentOptions {
                batch_size: options.batch_size.max(1),
                ..options
            },
        }
    }

    /// Number of batches needed for `rows` rows.
    pub fn batch_count(&self, rows: usize) -> usize {
        rows.div_ceil(self.options.batch_size)
    }

    /// Enrich every pending row of `table`.
    ///
    /// Results are written back by each row's listing position, so a sort
    /// applied while batches are in flight does not misroute them. Rows
    /// whose detail has no year get `fallback_year`. The scheduler never
    /// creates, removes or reorders rows.
    #[instrument(skip_all, fields(batch_size = self.options.batch_size))]
    pub async fn enrich<F: DetailFetcher>(
        &self,
        fetcher: &F,
        table: &SharedTable,
        fallback_year: Option<&str>,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> EnrichmentSummary {
        let started = Instant::now();
        let targets = table.with(|t| t.pending_targets());
        let total_batches = self.batch_count(targets.len());
        let mut summary = EnrichmentSummary::default();

        info!(rows = targets.len(), batches = total_batches, "starting enrichment");

        for (index, batch) in targets.chunks(self.options.batch_size).enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let details = join_all(batch.iter().map(|(_, id)| fetcher.fetch_detail(*id))).await;

            // A superseded run drops whatever its last batch returned.
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            table.with(|t| {
                for ((origin, _), detail) in batch.iter().zip(details) {
                    if detail == MemberDetail::default() {
                        summary.defaulted += 1;
                    }
                    if t.apply_detail(*origin, detail.with_fallback_year(fallback_year)) {
                        summary.loaded += 1;
                    }
                }
            });
            summary.batches += 1;
            progress.batch_completed(index + 1, total_batches);
            debug!(batch = index + 1, of = total_batches, "batch written");

            if index + 1 < total_batches && !self.options.inter_batch_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.options.inter_batch_delay) => {}
                }
            }
        }

        info!(
            batches = summary.batches,
            loaded = summary.loaded,
            defaulted = summary.defaulted,
            cancelled = summary.cancelled,
            elapsed_ms = started.elapsed().as_millis(),
            "enrichment finished"
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mastertable_shared::{MemberId, MemberRecord, RecordStatus};
    use mastertable_table::{Column, TableViewModel};

    use crate::pipeline::SilentProgress;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Start(u64),
        End(u64),
    }

    /// In-process fetcher recording concurrency and call order.
    #[derive(Default)]
    struct FakeFetcher {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        events: Mutex<Vec<Event>>,
        failing: HashSet<u64>,
        /// Cancelled on the first call, when set.
        cancel_on_call: Option<CancellationToken>,
        /// Sorted on the first call, when set.
        sort_on_call: Option<SharedTable>,
    }

    impl FakeFetcher {
        fn record(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DetailFetcher for FakeFetcher {
        async fn fetch_detail(&self, id: MemberId) -> MemberDetail {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.record(Event::Start(id.0));

            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }
            if let Some(table) = &self.sort_on_call {
                table.with(|t| {
                    if t.sort_state().is_none() {
                        t.sort_by_column(Column::Release);
                        t.sort_by_column(Column::Release);
                    }
                });
            }

            // Finish out of order within a batch.
            tokio::time::sleep(Duration::from_millis((id.0 % 3 + 1) * 2)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.record(Event::End(id.0));

            if self.failing.contains(&id.0) {
                MemberDetail::default()
            } else {
                MemberDetail {
                    year: Some((1900 + id.0).to_string()),
                    detail_count: id.0 as u32,
                }
            }
        }
    }

    fn table_with(count: u64) -> SharedTable {
        let mut model = TableViewModel::new();
        model.set_rows(
            (1..=count)
                .map(|id| MemberRecord::listed(MemberId(id), format!("Release {id:03}"), "UK"))
                .collect(),
        );
        SharedTable::new(model)
    }

    fn scheduler(batch_size: usize, delay_ms: u64) -> EnrichmentScheduler {
        EnrichmentScheduler::new(EnrichmentOptions {
            batch_size,
            inter_batch_delay: Duration::from_millis(delay_ms),
        })
    }

    #[test]
    fn test_batch_count() {
        assert_eq!(scheduler(5, 0).batch_count(237), 48);
        assert_eq!(scheduler(5, 0).batch_count(0), 0);
        assert_eq!(scheduler(0, 0).batch_count(3), 3);
    }

    #[tokio::test]
    async fn test_enrich_fills_every_row() {
        let table = table_with(237);
        let fetcher = FakeFetcher::default();

        let summary = scheduler(5, 0)
            .enrich(&fetcher, &table, None, &CancellationToken::new(), &SilentProgress)
            .await;

        assert_eq!(summary.batches, 48);
        assert_eq!(summary.loaded, 237);
        assert!(!summary.cancelled);
        table.with(|t| {
            assert_eq!(t.loaded_len(), 237);
            for row in t.rows() {
                let id = row.record().id.0;
                assert_eq!(row.cell(Column::Tracks), id.to_string());
                assert_eq!(row.cell(Column::Year), (1900 + id).to_string());
            }
        });
    }

    #[tokio::test]
    async fn test_enrich_never_exceeds_batch_size() {
        for batch_size in [1, 3, 5] {
            let table = table_with(17);
            let fetcher = FakeFetcher::default();

            scheduler(batch_size, 0)
                .enrich(&fetcher, &table, None, &CancellationToken::new(), &SilentProgress)
                .await;

            assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), batch_size);
        }
    }

    #[tokio::test]
    async fn test_batches_run_strictly_in_sequence() {
        let table = table_with(12);
        let fetcher = FakeFetcher::default();

        scheduler(5, 0)
            .enrich(&fetcher, &table, None, &CancellationToken::new(), &SilentProgress)
            .await;

        let events = fetcher.events();
        let batch_of = |id: u64| (id - 1) / 5;
        for (i, event) in events.iter().enumerate() {
            if let Event::Start(id) = event {
                // Every request of an earlier batch already ended.
                let earlier_ended = events[..i]
                    .iter()
                    .filter(|e| matches!(e, Event::End(other) if batch_of(*other) < batch_of(*id)))
                    .count();
                let earlier_total = (batch_of(*id) * 5) as usize;
                assert_eq!(earlier_ended, earlier_total, "batch overlap at {id}");
            }
        }
    }

    #[tokio::test]
    async fn test_failed_detail_uses_fallback_year() {
        let table = table_with(6);
        let fetcher = FakeFetcher {
            failing: HashSet::from([4]),
            ..FakeFetcher::default()
        };

        let summary = scheduler(5, 0)
            .enrich(
                &fetcher,
                &table,
                Some("1971"),
                &CancellationToken::new(),
                &SilentProgress,
            )
            .await;

        assert_eq!(summary.defaulted, 1);
        table.with(|t| {
            let row = t.rows().iter().find(|r| r.record().id == MemberId(4)).unwrap();
            assert_eq!(row.record().status, RecordStatus::Loaded);
            assert_eq!(row.cell(Column::Tracks), "0");
            assert_eq!(row.cell(Column::Year), "1971");
        });
    }

    #[tokio::test]
    async fn test_sort_during_enrichment_keeps_mapping() {
        let table = table_with(9);
        let fetcher = FakeFetcher {
            sort_on_call: Some(table.clone()),
            ..FakeFetcher::default()
        };

        scheduler(4, 0)
            .enrich(&fetcher, &table, None, &CancellationToken::new(), &SilentProgress)
            .await;

        table.with(|t| {
            let order: Vec<u64> = t.rows().iter().map(|r| r.record().id.0).collect();
            assert_eq!(order, (1..=9).rev().collect::<Vec<_>>());
            for row in t.rows() {
                assert_eq!(row.cell(Column::Tracks), row.record().id.0.to_string());
            }
        });
    }

    #[tokio::test]
    async fn test_pacing_delay_only_between_batches() {
        let table = table_with(4);
        let fetcher = FakeFetcher::default();

        let started = Instant::now();
        let summary = scheduler(2, 30)
            .enrich(&fetcher, &table, None, &CancellationToken::new(), &SilentProgress)
            .await;

        assert_eq!(summary.batches, 2);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_issues_nothing() {
        let table = table_with(4);
        let fetcher = FakeFetcher::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = scheduler(2, 0)
            .enrich(&fetcher, &table, None, &cancel, &SilentProgress)
            .await;

        assert!(summary.cancelled);
        assert!(fetcher.events().is_empty());
        assert_eq!(table.with(|t| t.loaded_len()), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_discards_results() {
        let table = table_with(6);
        let cancel = CancellationToken::new();
        let fetcher = FakeFetcher {
            cancel_on_call: Some(cancel.clone()),
            ..FakeFetcher::default()
        };

        let summary = scheduler(3, 0)
            .enrich(&fetcher, &table, None, &cancel, &SilentProgress)
            .await;

        assert!(summary.cancelled);
        assert_eq!(summary.batches, 0);
        // Only the first batch was ever issued.
        let starts = fetcher
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Start(_)))
            .count();
        assert_eq!(starts, 3);
        assert_eq!(table.with(|t| t.loaded_len()), 0);
    }

    #[tokio::test]
    async fn test_already_loaded_rows_are_skipped() {
        let table = table_with(3);
        table.with(|t| t.apply_detail(1, MemberDetail::default()));
        let fetcher = FakeFetcher::default();

        let summary = scheduler(5, 0)
            .enrich(&fetcher, &table, None, &CancellationToken::new(), &SilentProgress)
            .await;

        assert_eq!(summary.loaded, 2);
        assert!(!fetcher.events().contains(&Event::Start(2)));
    }
}
