//! Shared types, error model, and configuration for MasterTable.
//!
//! This crate is the foundation depended on by all other MasterTable crates.
//! It provides:
//! - [`MasterTableError`]: the unified error type
//! - Domain types ([`ParentId`], [`MemberId`], [`MemberRecord`], [`MemberDetail`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, EnrichmentSection, MAX_PER_PAGE, PagerSection, PipelineConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{MasterTableError, Result};
pub use types::{MemberDetail, MemberId, MemberRecord, ParentId, RecordStatus};
