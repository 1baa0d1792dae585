//! Core domain types for master/version tables.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of the parent entity (a catalog "master").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentId(pub u64);

impl std::fmt::Display for ParentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ParentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Identifier of a collection member (a "version"/"release").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MemberRecord
// ---------------------------------------------------------------------------

/// Enrichment lifecycle of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Listed, detail not yet resolved.
    #[default]
    Pending,
    /// Detail resolved, possibly to defaulted values.
    Loaded,
    /// Never reached through per-item detail errors; those resolve to
    /// [`RecordStatus::Loaded`] with defaulted values.
    Failed,
}

/// One item of the paginated collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Stable identifier, assigned once from the listing.
    pub id: MemberId,
    /// Display title (may be empty).
    pub title: String,
    /// Country or other subregion (may be empty).
    pub subregion: String,
    /// Release year, absent until enriched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// Track count, absent until enriched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_count: Option<u32>,
    pub status: RecordStatus,
}

impl MemberRecord {
    /// Create a freshly listed record with no detail yet.
    pub fn listed(id: MemberId, title: impl Into<String>, subregion: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            subregion: subregion.into(),
            year: None,
            detail_count: None,
            status: RecordStatus::Pending,
        }
    }

    /// Fill in the enrichable fields. Only `year`, `detail_count` and the
    /// status change; the id is never touched.
    pub fn resolve(&mut self, detail: MemberDetail) {
        self.year = Some(detail.year.unwrap_or_default());
        self.detail_count = Some(detail.detail_count);
        self.status = RecordStatus::Loaded;
    }
}

// ---------------------------------------------------------------------------
// MemberDetail
// ---------------------------------------------------------------------------

/// Supplementary per-member detail fetched from the detail endpoint.
///
/// The default value is the "failed fetch" value: zero tracks, no year.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemberDetail {
    pub year: Option<String>,
    pub detail_count: u32,
}

impl MemberDetail {
    /// Substitute `fallback` when no year was resolved.
    pub fn with_fallback_year(mut self, fallback: Option<&str>) -> Self {
        if self.year.as_deref().is_none_or(str::is_empty) {
            self.year = fallback.filter(|y| !y.is_empty()).map(str::to_string);
        }
        self
    }
}
