//! `clawflow config`: show or initialize the configuration.

use std::path::Path;

use anyhow::{Context, bail};
use clawflow_config::AppConfig;

pub fn show(config: &AppConfig) {
    println!("{}", config.redacted_toml());
}

pub fn init(force: bool) -> anyhow::Result<()> {
    let path = AppConfig::config_dir().join("config.toml");
    write_default(&path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn write_default(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_default(&path, false).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.agent.max_steps, 30);

        assert!(write_default(&path, false).is_err());
        write_default(&path, true).unwrap();
    }
}
