use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};

/// Compresses `path` in place with `xz --keep -9e`, leaving the original
/// file untouched alongside the new `.xz`.
pub fn compress_with_xz(path: &Path) -> Result<()> {
    let status = Command::new("xz")
        .arg("--keep")
        .arg("-9e")
        .arg(path)
        .status()
        .context("failed to spawn xz")?;
    if !status.success() {
        bail!("xz exited with {status}");
    }
    Ok(())
}

/// Runs `xz -t` against a compressed file to confirm it isn't truncated or
/// corrupt before the original is considered safe to discard.
pub fn verify_compressed_file(path: &Path) -> Result<bool> {
    let status = Command::new("xz").arg("-t").arg(path).status().context("failed to spawn xz -t")?;
    Ok(status.success())
}
