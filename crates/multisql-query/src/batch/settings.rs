//! Scoped override of connection settings

use multisql_core::{Connection, ConnectionSettings, Result};

/// Applies connection settings for a scope and restores the previous ones
/// when dropped.
///
/// Restoration runs on every exit path, including `?` returns, panics and a
/// batch future dropped mid-flight. A transaction still marked open at that
/// point is aborted first, so restoring auto-commit never commits a partial
/// batch.
#[must_use = "settings are restored as soon as the guard is dropped"]
pub struct SettingsGuard<'a> {
    connection: &'a dyn Connection,
    saved: ConnectionSettings,
    transaction_open: bool,
}

impl<'a> SettingsGuard<'a> {
    /// Capture the current settings and apply `settings`.
    ///
    /// If applying fails, whatever was already changed is put back before the
    /// error is returned.
    pub fn apply(connection: &'a dyn Connection, settings: ConnectionSettings) -> Result<Self> {
        let guard = Self {
            connection,
            saved: connection.settings(),
            transaction_open: false,
        };
        connection.apply_settings(settings)?;
        Ok(guard)
    }

    /// Settings that will be restored
    pub fn saved(&self) -> ConnectionSettings {
        self.saved
    }

    /// Record whether the scope currently owns an open transaction
    pub fn set_transaction_open(&mut self, open: bool) {
        self.transaction_open = open;
    }
}

impl Drop for SettingsGuard<'_> {
    fn drop(&mut self) {
        if self.transaction_open {
            tracing::warn!("batch ended with its transaction open, aborting it");
            if let Err(e) = self.connection.abort_transaction() {
                tracing::error!(error = %e, "failed to abort batch transaction");
            }
        }
        if let Err(e) = self.connection.apply_settings(self.saved) {
            tracing::error!(
                error = %e,
                auto_commit = self.saved.auto_commit,
                strict_error = self.saved.strict_error,
                "failed to restore connection settings"
            );
        }
    }
}

impl std::fmt::Debug for SettingsGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsGuard")
            .field("driver", &self.connection.driver_name())
            .field("saved", &self.saved)
            .field("transaction_open", &self.transaction_open)
            .finish()
    }
}
