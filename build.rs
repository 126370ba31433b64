//! Embeds the git commit and build time used by `pilot --version`.
//!
//! Missing git or `date` tooling degrades to "unknown" markers instead of
//! failing the build.

use std::env;
use std::fs;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    watch_head_ref();
    println!("cargo:rerun-if-env-changed=PILOT_BUILD_GIT_HASH");
    println!("cargo:rerun-if-env-changed=PILOT_BUILD_TIMESTAMP");

    let git_hash = env::var("PILOT_BUILD_GIT_HASH").unwrap_or_else(|_| git_short_hash());
    let built_at = env::var("PILOT_BUILD_TIMESTAMP").unwrap_or_else(|_| utc_timestamp());

    println!("cargo:rustc-env=PILOT_BUILD_GIT_HASH={git_hash}");
    println!("cargo:rustc-env=PILOT_BUILD_TIMESTAMP={built_at}");
}

fn watch_head_ref() {
    let Ok(head) = fs::read_to_string(".git/HEAD") else {
        return;
    };
    if let Some(reference) = head.trim().strip_prefix("ref: ") {
        println!("cargo:rerun-if-changed=.git/{reference}");
    }
}

fn git_short_hash() -> String {
    command_output("git", &["rev-parse", "--short=12", "HEAD"])
        .unwrap_or_else(|| "unknown".to_string())
}

fn utc_timestamp() -> String {
    if let Some(stamp) = command_output("date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"]) {
        return stamp;
    }
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("unix:{secs}")
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
