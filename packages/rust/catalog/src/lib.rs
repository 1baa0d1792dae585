//! Remote catalog access: listing traversal, per-member detail, and the
//! host-page collaborators that identify the parent being displayed.
//!
//! This crate provides:
//! - [`CatalogClient`]: HTTP client for the masters/releases JSON API
//! - [`CollectionPager`]: walks the versions listing to completion
//! - [`DetailFetcher`]: best-effort per-member detail lookup
//! - [`host`]: parent id extraction and the DOM year fallback

pub mod client;
pub mod detail;
pub mod host;
pub mod pager;

pub use client::{CatalogClient, MasterSummary, ReleaseDetail, VersionEntry, VersionsPage};
pub use detail::DetailFetcher;
pub use host::{display_year_from_html, parent_id_from_location};
pub use pager::CollectionPager;
