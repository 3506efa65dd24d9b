use std::path::PathBuf;

use anyhow::{bail, Result};
use tgi_launch::config::LaunchConfig;

use crate::{fs, repo};

/// Load every profile file and validate each profile it defines.
pub fn run(path: Option<PathBuf>) -> Result<()> {
    let root = repo::repo_root()?;
    let target = path.unwrap_or_else(|| root.join("profiles"));
    let files = if target.is_file() {
        vec![target.clone()]
    } else {
        fs::walk_files(&target, |_| false)?
            .into_iter()
            .filter(|path| fs::is_profile_file(path))
            .collect()
    };

    if files.is_empty() {
        bail!("no profile files found under {}", target.display());
    }

    let mut checked = 0usize;
    let mut failures = Vec::new();
    for file in files {
        let shown = repo::rel_from(&root, &file);
        let config = match LaunchConfig::load_from_path(file.clone()) {
            Ok(config) => config,
            Err(err) => {
                failures.push(format!("{}: {err}", shown.display()));
                continue;
            }
        };
        for (name, result) in config.validate_all() {
            checked += 1;
            if let Err(err) = result {
                failures.push(format!("{}: profile `{name}`: {err}", shown.display()));
            }
        }
    }

    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("{failure}");
        }
        bail!("{} profile check(s) failed", failures.len());
    }

    eprintln!("check-profiles: {checked} profile(s) valid");
    Ok(())
}
