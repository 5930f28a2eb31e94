mod bucket;
mod checksum;
mod common;
mod inventory;

pub use bucket::{BucketVerifier, VerifyOutcome};
pub use checksum::{verify_single_file, ChecksumOutcome};
pub use common::MAX_ERROR_DISPLAY;
pub use inventory::{partition_inventory, scan_local_directory, InventoryReport};
