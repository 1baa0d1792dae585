//! TUI screens.

mod versions;

pub(crate) use versions::VersionsScreen;
