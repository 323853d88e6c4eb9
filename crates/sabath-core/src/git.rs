//! Revision lookup for cloned cache directories.

use std::path::Path;
use std::process::Command;

use tracing::debug;

/// Commit checked out in a cloned cache directory.
///
/// `None` unless `dir` is the top of its own work tree (a cache directory
/// nested inside some other checkout has no revision of its own) or when git
/// cannot resolve `HEAD`.
pub fn clone_revision(dir: &Path) -> Option<String> {
    if !dir.join(".git").exists() {
        return None;
    }

    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
        .ok()?;
    if !output.status.success() {
        debug!(
            dir = %dir.display(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "no revision for clone"
        );
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
