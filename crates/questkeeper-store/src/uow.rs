use rusqlite::{Connection, Transaction};

use crate::error::Result;

/// A scoped transactional boundary over the repository set.
///
/// All writes made through `tx()` commit atomically on [`UnitOfWork::commit`]
/// and are fully discarded if the `UnitOfWork` is dropped without
/// committing. Repositories are plain free functions taking `&Connection`
/// (a `Transaction` derefs to one), so there is no repository object whose
/// lifetime could outlive the scope — only `tx()` itself does, and it
/// borrows `self`.
///
/// Nested scopes are disallowed by construction: `begin` takes `&mut
/// Connection`, so the borrow checker refuses a second `UnitOfWork` over the
/// same connection while one is already open.
pub struct UnitOfWork<'c> {
    tx: Transaction<'c>,
}

impl<'c> UnitOfWork<'c> {
    pub fn begin(conn: &'c mut Connection) -> Result<Self> {
        let tx = conn.transaction()?;
        Ok(Self { tx })
    }

    /// Borrow the underlying transaction to pass into repository functions.
    pub fn tx(&self) -> &Transaction<'c> {
        &self.tx
    }

    /// Commit every write made through `tx()` so far.
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}
