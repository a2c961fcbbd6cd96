//! # Connection Guard
//!
//! Owns the store's connection-acceptance flag for the duration of a
//! maintenance run. Blocking returns a guard value; the block is lifted by
//! an explicit [`ConnectionGuard::release`] on the success path, and by the
//! guard's `Drop` on every other exit path. Either way the store is never
//! left refusing connections.

use std::sync::Arc;

use crate::audit::{note, AuditSink};
use crate::store::{StoreResult, VersionedStore};

/// Scoped block on new connections to the store.
pub struct ConnectionGuard {
    store: Arc<dyn VersionedStore>,
    audit: Arc<dyn AuditSink>,
    released: bool,
}

impl ConnectionGuard {
    /// Block new connections and arm the release backstop.
    pub fn block(
        store: Arc<dyn VersionedStore>,
        audit: Arc<dyn AuditSink>,
    ) -> StoreResult<Self> {
        store.accept_connections(false)?;
        note(audit.as_ref(), "Database connections blocked.");
        Ok(Self {
            store,
            audit,
            released: false,
        })
    }

    /// Census the session table and force-disconnect other users.
    ///
    /// The orchestrator's own connection is always present in the listing,
    /// so the disconnect only fires when the adjusted count (observed minus
    /// one) is above zero.
    pub fn disconnect_other_users(&self) -> StoreResult<()> {
        let sessions = self.store.list_sessions()?;
        let users: Vec<&str> = sessions.iter().map(|s| s.user.as_str()).collect();
        note(self.audit.as_ref(), &format!("{:?}", users));

        let others = sessions.len().saturating_sub(1);
        if others > 0 {
            note(
                self.audit.as_ref(),
                &format!("There are {} database connections.", others),
            );
            self.store.disconnect_all()?;
            note(self.audit.as_ref(), "User(s) have been disconnected.");
        } else {
            note(
                self.audit.as_ref(),
                "There are no connections to the geodatabase.",
            );
        }
        Ok(())
    }

    /// Lift the block. Later calls are no-ops.
    pub fn release(&mut self) -> StoreResult<()> {
        if self.released {
            return Ok(());
        }
        self.store.accept_connections(true)?;
        self.released = true;
        note(self.audit.as_ref(), "Database block removed.");
        Ok(())
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
