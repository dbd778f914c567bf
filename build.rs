use std::env;
use std::process::Command;

fn main() {
    let version = Command::new("git")
        .args(["describe", "--tags"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| env::var("BUILD_VERSION").ok())
        .unwrap_or_else(|| env::var("CARGO_PKG_VERSION").unwrap_or_default());
    println!("cargo:rustc-env=BUILD_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=BUILD_VERSION");
}
