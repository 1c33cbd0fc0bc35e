use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use relayset_io::compute_sha256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One run of a `relayset` command, written as `run-<id>.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub run_id: String,
    pub command: String,
    pub version: String,
    pub timestamp: String,
    pub inputs: Vec<ManifestInput>,
    pub outputs: Vec<String>,
    pub params: Vec<Param>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestInput {
    pub path: String,
    /// SHA-256 of the file; absent when it could not be read
    pub hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Outcome of a run.
pub struct ManifestTelemetry {
    pub status: String,
    pub duration_ms: Option<u128>,
    pub error: Option<String>,
}

pub fn hash_inputs(inputs: &[&Path]) -> Vec<ManifestInput> {
    inputs
        .iter()
        .map(|path| ManifestInput {
            path: path.display().to_string(),
            hash: compute_sha256(path).ok(),
        })
        .collect()
}

/// Write a manifest into `dir` and return its path.
pub fn record_manifest(
    dir: &Path,
    command: &str,
    inputs: &[&Path],
    outputs: &[PathBuf],
    params: &[(&str, &str)],
    telemetry: ManifestTelemetry,
) -> Result<PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    fs::create_dir_all(dir)
        .with_context(|| format!("creating manifest directory '{}'", dir.display()))?;
    let manifest = ManifestEntry {
        run_id: run_id.clone(),
        command: command.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        inputs: hash_inputs(inputs),
        outputs: outputs.iter().map(|p| p.display().to_string()).collect(),
        params: params
            .iter()
            .map(|(k, v)| Param {
                name: k.to_string(),
                value: v.to_string(),
            })
            .collect(),
        status: telemetry.status,
        duration_ms: telemetry.duration_ms,
        error: telemetry.error,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let path = dir.join(format!("run-{}.json", run_id));
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("Recorded run manifest {}", path.display());
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<ManifestEntry> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let manifest = serde_json::from_str(&json)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    Ok(manifest)
}
