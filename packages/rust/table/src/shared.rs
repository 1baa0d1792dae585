//! Cloneable handle to one table instance.

use std::sync::{Arc, Mutex, PoisonError};

use crate::model::TableViewModel;

/// Shared handle to a [`TableViewModel`].
///
/// The controller, the scheduler and the UI each hold a clone. Every
/// access goes through [`SharedTable::with`], which holds the lock only for
/// the duration of the closure, so no lock is ever held across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedTable {
    inner: Arc<Mutex<TableViewModel>>,
}

impl SharedTable {
    pub fn new(model: TableViewModel) -> Self {
        Self {
            inner: Arc::new(Mutex::new(model)),
        }
    }

    /// Run `f` against the table.
    pub fn with<R>(&self, f: impl FnOnce(&mut TableViewModel) -> R) -> R {
        // Writes are whole-row; a poisoned lock still guards consistent rows.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Whether two handles point at the same table instance.
    pub fn same_table(&self, other: &SharedTable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
