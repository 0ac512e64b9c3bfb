//! Writing the job configurations to `.ci_support`.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use feedstock_ci_matrix::Config;
use miette::Diagnostic;
use thiserror::Error;

/// The directory of the emitted configs, relative to the feedstock root.
pub const CI_SUPPORT_DIR: &str = ".ci_support";

#[derive(Debug, Error, Diagnostic)]
pub enum EmitError {
    #[error("Could not write {}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("Could not serialize config {0}")]
    SerializeError(String, #[source] serde_yaml::Error),
}

/// The file a config is written to.
pub fn config_path(feedstock_dir: &Path, config: &Config) -> PathBuf {
    feedstock_dir
        .join(CI_SUPPORT_DIR)
        .join(format!("{}.yaml", config.config_name))
}

/// Remove the configs of a previous run. Only `*.yaml` files directly in
/// `.ci_support` are removed; the migrations below it stay.
pub fn clear_ci_support(feedstock_dir: &Path) -> Result<(), EmitError> {
    let dir = feedstock_dir.join(CI_SUPPORT_DIR);
    if !dir.is_dir() {
        return Ok(());
    }

    let entries = fs_err::read_dir(&dir).map_err(|e| EmitError::IoError(dir.clone(), e))?;
    for entry in entries {
        let path = entry.map_err(|e| EmitError::IoError(dir.clone(), e))?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "yaml") {
            continue;
        }
        match fs_err::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(EmitError::IoError(path, e)),
        }
    }
    Ok(())
}

/// Replace the configs in `.ci_support` with `configs`.
///
/// Returns the written files in the order of `configs`.
pub fn write_configs(
    feedstock_dir: &Path,
    configs: &[Config],
) -> Result<Vec<PathBuf>, EmitError> {
    let documents = configs
        .iter()
        .map(|config| {
            config
                .to_yaml_string()
                .map(|document| (config_path(feedstock_dir, config), document))
                .map_err(|e| EmitError::SerializeError(config.config_name.clone(), e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    clear_ci_support(feedstock_dir)?;

    let dir = feedstock_dir.join(CI_SUPPORT_DIR);
    fs_err::create_dir_all(&dir).map_err(|e| EmitError::IoError(dir.clone(), e))?;

    let mut written = Vec::with_capacity(documents.len());
    for (path, document) in documents {
        fs_err::write(&path, document).map_err(|e| EmitError::IoError(path.clone(), e))?;
        tracing::info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
