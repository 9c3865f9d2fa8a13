//! Embeds build metadata shown by `rpflow doctor`.
//!
//! - `RPFLOW_BUILD_TIMESTAMP`: UTC build time
//! - `RPFLOW_GIT_COMMIT`: short commit hash, `-dirty` when the tree has local
//!   changes, "unknown" outside a checkout. Packagers building from a tarball
//!   can set `RPFLOW_GIT_COMMIT` in the environment instead.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=RPFLOW_GIT_COMMIT");

    let built_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    println!("cargo:rustc-env=RPFLOW_BUILD_TIMESTAMP={}", built_at);

    let commit = std::env::var("RPFLOW_GIT_COMMIT")
        .ok()
        .filter(|c| !c.is_empty())
        .or_else(commit_from_git)
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=RPFLOW_GIT_COMMIT={}", commit);
}

fn commit_from_git() -> Option<String> {
    let hash = git(&["rev-parse", "--short", "HEAD"])?;
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8(output.stdout).ok()?.trim().to_string())
}
