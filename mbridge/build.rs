//! Embeds build identification for the `mbridge` startup banner
//!
//! Exported to the compiler environment:
//! - `MBRIDGE_GIT_REVISION`: `git describe` of the checkout, `unknown` outside git
//! - `MBRIDGE_BUILD_PROFILE`: cargo profile
//! - `MBRIDGE_BUILD_TIME`: UTC build time

use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=10"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    let revision = revision.trim();
    (!revision.is_empty()).then(|| revision.to_string())
}

fn main() {
    let revision = git_revision().unwrap_or_else(|| "unknown".to_string());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let built_at = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC");

    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-env=MBRIDGE_GIT_REVISION={}", revision);
    println!("cargo:rustc-env=MBRIDGE_BUILD_PROFILE={}", profile);
    println!("cargo:rustc-env=MBRIDGE_BUILD_TIME={}", built_at);
}
