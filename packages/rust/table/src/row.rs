//! Columns and rows of the versions table.

use std::fmt;

use mastertable_shared::{MemberRecord, RecordStatus};

/// Cell text shown while a record's detail is still pending.
pub const PENDING_PLACEHOLDER: &str = "...";

/// Title shown for records listed without one.
const UNTITLED: &str = "Release";

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Table columns, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Release,
    Country,
    Year,
    Tracks,
}

impl Column {
    pub const ALL: [Column; 4] = [Self::Release, Self::Country, Self::Year, Self::Tracks];

    /// Column at display position `index`, if any.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            Self::Release => 0,
            Self::Country => 1,
            Self::Year => 2,
            Self::Tracks => 3,
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Self::Release => "Release",
            Self::Country => "Country",
            Self::Year => "Year",
            Self::Tracks => "# Tracks",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

// ---------------------------------------------------------------------------
// ViewRow
// ---------------------------------------------------------------------------

/// One displayed row, owning its record.
///
/// `origin` is the row's position in listing order. It never changes, so
/// detail written by origin lands on the right row even after a sort.
#[derive(Debug, Clone)]
pub struct ViewRow {
    record: MemberRecord,
    origin: usize,
    visible: bool,
}

impl ViewRow {
    pub(crate) fn new(record: MemberRecord, origin: usize) -> Self {
        Self {
            record,
            origin,
            visible: true,
        }
    }

    pub fn record(&self) -> &MemberRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut MemberRecord {
        &mut self.record
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Displayed text of one cell.
    pub fn cell(&self, column: Column) -> String {
        let record = &self.record;
        let pending = record.status == RecordStatus::Pending;
        match column {
            Column::Release if record.title.is_empty() => UNTITLED.to_string(),
            Column::Release => record.title.clone(),
            Column::Country => record.subregion.clone(),
            Column::Year if pending => PENDING_PLACEHOLDER.to_string(),
            Column::Year => record.year.clone().unwrap_or_default(),
            Column::Tracks if pending => PENDING_PLACEHOLDER.to_string(),
            Column::Tracks => record
                .detail_count
                .map(|n| n.to_string())
                .unwrap_or_default(),
        }
    }

    /// All displayed cells, in column order.
    pub fn cells(&self) -> [String; 4] {
        Column::ALL.map(|c| self.cell(c))
    }

    /// Link to the release page on the site rooted at `site_url`.
    pub fn release_link(&self, site_url: &str) -> String {
        format!("{}/release/{}", site_url.trim_end_matches('/'), self.record.id)
    }

    /// Lowercased concatenation of the displayed cells, as searched by the filter.
    pub(crate) fn search_text(&self) -> String {
        self.cells().join(" ").to_lowercase()
    }
}
