use std::path::PathBuf;

use clap::Args;

/// Runtime configuration for a migration run.
///
/// Mirrors the module-level constants in the original `config.py`
/// (`EXCLUDED_BUCKETS`, `GLACIER_RESTORE_DAYS`, `GLACIER_RESTORE_TIER`,
/// `STATE_DB_PATH`, `LOCAL_BASE_PATH`), but sourced from CLI flags with
/// environment-variable fallbacks instead of a checked-in module.
#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Directory objects are downloaded into, one subdirectory per bucket.
    #[arg(long, env = "EVAC_BASE_PATH", default_value = "./evacuated")]
    pub base_path: PathBuf,

    /// Path to the SQLite state database.
    #[arg(long, env = "EVAC_STATE_DB", default_value = "./migration_state.db")]
    pub state_db_path: PathBuf,

    /// Bucket names to skip during scanning. May be repeated.
    #[arg(long = "exclude-bucket", env = "EVAC_EXCLUDED_BUCKETS", value_delimiter = ',')]
    pub excluded_buckets: Vec<String>,

    /// Number of days restored Glacier objects remain downloadable.
    #[arg(long, env = "EVAC_GLACIER_RESTORE_DAYS", default_value_t = 90)]
    pub glacier_restore_days: i32,

    /// Restore tier used for GLACIER-class objects (DEEP_ARCHIVE always uses Bulk).
    #[arg(long, env = "EVAC_GLACIER_RESTORE_TIER", default_value = "Standard")]
    pub glacier_restore_tier: String,

    /// Number of concurrent download workers per bucket.
    #[arg(long, env = "EVAC_DOWNLOAD_CONCURRENCY", default_value_t = 16)]
    pub download_concurrency: usize,
}

impl Config {
    #[cfg(test)]
    pub fn for_test(base_path: PathBuf, state_db_path: PathBuf) -> Self {
        Self {
            base_path,
            state_db_path,
            excluded_buckets: Vec::new(),
            glacier_restore_days: 90,
            glacier_restore_tier: "Standard".to_string(),
            download_concurrency: 16,
        }
    }
}
