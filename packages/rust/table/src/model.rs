//! The table view model: ordered rows plus sort and filter state.

use std::cmp::Ordering;

use tracing::debug;

use mastertable_shared::{MemberDetail, MemberId, MemberRecord, RecordStatus};

use crate::row::{Column, ViewRow};

/// Direction of the active sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Column and direction of the active sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: Column,
    pub direction: SortDirection,
}

/// Owns the row collection for one pipeline run.
///
/// Sorting physically reorders rows; filtering only flips per-row
/// visibility. The two therefore commute, and writes addressed by a row's
/// origin stay valid under both.
#[derive(Debug, Clone, Default)]
pub struct TableViewModel {
    rows: Vec<ViewRow>,
    sort: Option<SortState>,
    /// Lowercased filter query; empty shows everything.
    query: String,
    error: Option<String>,
}

impl TableViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, empty table that keeps the sort and filter criteria of `previous`.
    pub fn inherit_view(previous: &TableViewModel) -> Self {
        Self {
            sort: previous.sort,
            query: previous.query.clone(),
            ..Self::default()
        }
    }

    /// Replace every row. Current sort and filter criteria are re-applied.
    pub fn set_rows(&mut self, records: Vec<MemberRecord>) {
        self.error = None;
        self.rows = records
            .into_iter()
            .enumerate()
            .map(|(origin, record)| ViewRow::new(record, origin))
            .collect();
        if let Some(sort) = self.sort {
            self.apply_sort(sort);
        }
        self.apply_filter();
    }

    /// Replace the content with a single error row.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.rows.clear();
        self.error = Some(message.into());
    }

    /// Text of the error row, when the run failed.
    pub fn error_row(&self) -> Option<String> {
        self.error.as_ref().map(|m| format!("Error: {m}"))
    }

    /// Sort by the column at `index`. Clicking the active column flips its
    /// direction; any other column starts ascending. Out-of-range indices
    /// are ignored.
    pub fn sort_by(&mut self, index: usize) -> Option<SortState> {
        let column = Column::from_index(index)?;
        Some(self.sort_by_column(column))
    }

    pub fn sort_by_column(&mut self, column: Column) -> SortState {
        let direction = match self.sort {
            Some(current) if current.column == column => current.direction.flipped(),
            _ => SortDirection::Ascending,
        };
        let state = SortState { column, direction };
        self.sort = Some(state);
        self.apply_sort(state);
        debug!(column = %column, ?direction, "table sorted");
        state
    }

    /// Show only rows whose displayed text contains `query`, case-insensitively.
    pub fn filter(&mut self, query: &str) {
        self.query = query.to_lowercase();
        self.apply_filter();
    }

    /// Write resolved detail into the row listed at `origin`.
    ///
    /// Returns `false` when no such row exists (e.g. the table was reset).
    pub fn apply_detail(&mut self, origin: usize, detail: MemberDetail) -> bool {
        let query = &self.query;
        let Some(row) = self.rows.iter_mut().find(|r| r.origin() == origin) else {
            return false;
        };
        row.record_mut().resolve(detail);
        let visible = matches_query(row, query);
        row.set_visible(visible);
        true
    }

    /// `(origin, id)` of every row still waiting for detail, in listing order.
    pub fn pending_targets(&self) -> Vec<(usize, MemberId)> {
        let mut targets: Vec<_> = self
            .rows
            .iter()
            .filter(|r| r.record().status == RecordStatus::Pending)
            .map(|r| (r.origin(), r.record().id))
            .collect();
        targets.sort_by_key(|(origin, _)| *origin);
        targets
    }

    pub fn rows(&self) -> &[ViewRow] {
        &self.rows
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &ViewRow> {
        self.rows.iter().filter(|r| r.is_visible())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn visible_len(&self) -> usize {
        self.visible_rows().count()
    }

    pub fn loaded_len(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.record().status == RecordStatus::Loaded)
            .count()
    }

    pub fn sort_state(&self) -> Option<SortState> {
        self.sort
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    fn apply_sort(&mut self, state: SortState) {
        // Stable: equal cells keep their previous relative order.
        // Mixing numeric and non-numeric cells in one column ("6", "+50",
        // "+x") is not a total order; the result is then some permutation
        // of the rows, never a lost or duplicated row.
        self.rows.sort_by(|a, b| {
            let ord = compare_cells(&a.cell(state.column), &b.cell(state.column));
            match state.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }

    fn apply_filter(&mut self) {
        let query = &self.query;
        for row in &mut self.rows {
            let visible = matches_query(row, query);
            row.set_visible(visible);
        }
    }
}

fn matches_query(row: &ViewRow, query: &str) -> bool {
    query.is_empty() || row.search_text().contains(query)
}

/// Numeric when both cells start with an integer, plain string order otherwise.
fn compare_cells(a: &str, b: &str) -> Ordering {
    match (leading_int(a), leading_int(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Parse a leading integer: optional whitespace, optional sign, digits.
/// Trailing text is ignored, so `"1999-05"` reads as 1999.
fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let value: i64 = rest[..digits_end].parse().ok()?;
    Some(if negative { -value } else { value })
}
