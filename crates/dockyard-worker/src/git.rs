//! Async git operations for the build worker's checkout step: shell out to
//! the real `git` binary via `tokio::process::Command` rather than
//! reimplementing the protocol, using `tokio::process` rather than blocking
//! `std::process` since this runs inside the async worker runtime.

use std::path::Path;

use dockyard_types::Error;
use tokio::process::Command;

/// Shallow-clone `clone_url` at `branch` into `dest`, which must not yet
/// exist.
pub async fn shallow_clone(clone_url: &str, branch: &str, dest: &Path) -> Result<(), Error> {
    run(Command::new("git").args([
        "clone",
        "--depth",
        "1",
        "--branch",
        branch,
        clone_url,
        dest.to_string_lossy().as_ref(),
    ]))
    .await
}

/// Fetch `commit_sha` directly. Failure is tolerated here — on a push
/// webhook the head commit of a freshly cloned branch is already present,
/// so this step only matters for a commit the shallow clone didn't reach.
pub async fn fetch_commit(repo_dir: &Path, commit_sha: &str) {
    let _ = run(Command::new("git")
        .args(["fetch", "--depth", "1", "origin", commit_sha])
        .current_dir(repo_dir))
    .await;
}

pub async fn checkout(repo_dir: &Path, commit_sha: &str) -> Result<(), Error> {
    run(Command::new("git").args(["checkout", commit_sha]).current_dir(repo_dir)).await
}

async fn run(command: &mut Command) -> Result<(), Error> {
    let output = command
        .output()
        .await
        .map_err(|e| Error::Upstream(format!("failed to spawn git: {e}")))?;
    if !output.status.success() {
        return Err(Error::Upstream(format!(
            "git command failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}
