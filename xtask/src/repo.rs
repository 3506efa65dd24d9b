use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Nearest ancestor of the working directory holding the workspace manifest.
pub fn repo_root() -> anyhow::Result<PathBuf> {
    let mut dir = env::current_dir()?;
    loop {
        if looks_like_repo_root(&dir) {
            return Ok(dir);
        }
        if !dir.pop() {
            anyhow::bail!("failed to find repository root (no workspace Cargo.toml/.git found)");
        }
    }
}

fn looks_like_repo_root(dir: &Path) -> bool {
    if dir.join(".git").is_dir() {
        return true;
    }
    fs::read_to_string(dir.join("Cargo.toml"))
        .map(|manifest| manifest.contains("[workspace]"))
        .unwrap_or(false)
}

pub fn rel_from(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(p) => p.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}
