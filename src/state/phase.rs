use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

use super::now_iso;

/// The migration runs through these phases strictly in order. Comparisons
/// use `<`/`>=` against the derived ordering, never raw integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Scanning,
    GlacierRestore,
    GlacierWait,
    Syncing,
    Verifying,
    Deleting,
    Complete,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Scanning => "scanning",
            Phase::GlacierRestore => "glacier_restore",
            Phase::GlacierWait => "glacier_wait",
            Phase::Syncing => "syncing",
            Phase::Verifying => "verifying",
            Phase::Deleting => "deleting",
            Phase::Complete => "complete",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        Some(match value {
            "scanning" => Phase::Scanning,
            "glacier_restore" => Phase::GlacierRestore,
            "glacier_wait" => Phase::GlacierWait,
            "syncing" => Phase::Syncing,
            "verifying" => Phase::Verifying,
            "deleting" => Phase::Deleting,
            "complete" => Phase::Complete,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const PHASE_KEY: &str = "phase";

pub(super) struct PhaseStore<'a> {
    pub(super) conn: &'a Arc<Mutex<Connection>>,
}

impl PhaseStore<'_> {
    /// Seed the phase row on first open. A reopened database with an
    /// existing row is left untouched, so resuming a run picks up where it
    /// left off.
    pub fn init_phase(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO migration_metadata (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![PHASE_KEY, Phase::Scanning.as_str(), now_iso()],
        )?;
        Ok(())
    }

    pub fn get_phase(&self) -> Result<Phase> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM migration_metadata WHERE key = ?1",
                params![PHASE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| Phase::from_str(&v)).unwrap_or(Phase::Scanning))
    }

    /// Advances the persisted phase. A request to move to a phase that is not
    /// strictly later than the current one is ignored rather than applied —
    /// `current_phase` only ever moves forward outside of an explicit reset
    /// (which drops the whole database rather than going through here).
    pub fn set_phase(&self, phase: Phase) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let current: Option<String> = conn
            .query_row("SELECT value FROM migration_metadata WHERE key = ?1", params![PHASE_KEY], |row| row.get(0))
            .optional()?;
        if let Some(current) = current.as_deref().and_then(Phase::from_str) {
            if phase <= current {
                return Ok(());
            }
        }
        conn.execute(
            "INSERT INTO migration_metadata (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![PHASE_KEY, phase.as_str(), now_iso()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::state::{MigrationStateStore, Phase};

    #[test]
    fn phase_defaults_to_scanning() {
        let store = MigrationStateStore::open_in_memory().unwrap();
        assert_eq!(store.get_phase().unwrap(), Phase::Scanning);
    }

    #[test]
    fn phase_ordering_is_monotonic_by_declaration() {
        assert!(Phase::Scanning < Phase::GlacierRestore);
        assert!(Phase::Syncing < Phase::Verifying);
        assert!(Phase::Deleting < Phase::Complete);
    }

    #[test]
    fn set_phase_persists_across_calls() {
        let store = MigrationStateStore::open_in_memory().unwrap();
        store.set_phase(Phase::Verifying).unwrap();
        assert_eq!(store.get_phase().unwrap(), Phase::Verifying);
    }

    #[test]
    fn set_phase_rejects_backward_transitions() {
        let store = MigrationStateStore::open_in_memory().unwrap();
        store.set_phase(Phase::Deleting).unwrap();
        store.set_phase(Phase::Scanning).unwrap();
        assert_eq!(store.get_phase().unwrap(), Phase::Deleting);
    }
}
