use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Result;

use crate::{cmd::check_profiles, repo};

const CARGO_STEPS: &[(&str, &[&str])] = &[
    ("cargo fetch", &["fetch"]),
    ("cargo check --workspace", &["check", "--workspace"]),
    ("cargo test --workspace", &["test", "--workspace"]),
    ("cargo fmt --all -- --check", &["fmt", "--all", "--", "--check"]),
    (
        "cargo clippy --workspace -- -D warnings",
        &["clippy", "--workspace", "--", "-D", "warnings"],
    ),
];

/// Local quality gate: cargo steps, shipped profiles, then a release build.
pub fn run() -> Result<()> {
    let root = repo::repo_root()?;
    for (label, args) in CARGO_STEPS {
        run_step(&root, label, args)?;
    }

    eprintln!("==> check-profiles");
    check_profiles::run(None)?;

    run_step(
        &root,
        "cargo build --release --bin tgi-launch",
        &["build", "--release", "--bin", "tgi-launch"],
    )
}

fn run_step(root: &Path, label: &str, args: &[&str]) -> Result<()> {
    eprintln!("==> {label}");
    let status = Command::new("cargo")
        .args(args)
        .current_dir(root)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        anyhow::bail!("{label} failed (status {status})");
    }
    Ok(())
}
