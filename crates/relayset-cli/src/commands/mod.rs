pub mod coefficients;
pub mod completions;
pub mod faults;
pub mod study;
pub mod telemetry;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use relayset_io::{import_network, load_study_config, ImportResult, StudyConfig};
use tracing::warn;

/// Import a network and log its diagnostics.
pub fn load_network(path: &Path) -> Result<ImportResult> {
    let imported = import_network(path)
        .with_context(|| format!("loading network '{}'", path.display()))?;
    for issue in imported.diagnostics.warnings() {
        warn!("{issue}");
    }
    Ok(imported)
}

pub fn load_config(path: Option<&Path>) -> Result<StudyConfig> {
    match path {
        Some(path) => load_study_config(path),
        None => Ok(StudyConfig::default()),
    }
}
