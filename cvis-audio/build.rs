//! Stamps the cvis-audio binary with build identity.
//!
//! The startup log line reports these so a field unit's firmware can be traced
//! back to a commit and a cross-compile target.

use std::env;
use std::process::Command;

fn main() {
    let commit = git_commit().unwrap_or_else(|| "unknown".to_string());
    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    for (key, value) in [
        ("GIT_HASH", commit),
        ("BUILD_TIMESTAMP", built_at),
        ("BUILD_TARGET", target),
        ("BUILD_PROFILE", profile),
    ] {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

/// Short commit hash, with a `-dirty` suffix for uncommitted changes
fn git_commit() -> Option<String> {
    let run = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|out| out.status.success())
            .and_then(|out| String::from_utf8(out.stdout).ok())
    };

    let hash = run(&["rev-parse", "--short=8", "HEAD"])?.trim().to_string();
    let dirty = run(&["status", "--porcelain", "--untracked-files=no"])
        .map(|status| !status.trim().is_empty())
        .unwrap_or(false);

    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}
