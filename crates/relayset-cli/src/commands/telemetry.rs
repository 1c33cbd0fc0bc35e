use relayset_cli::manifest::{record_manifest, ManifestTelemetry};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

/// What a command read and wrote, for its run manifest.
pub struct RunRecord<'a> {
    pub dir: &'a Path,
    pub command: &'a str,
    pub inputs: Vec<&'a Path>,
    pub outputs: Vec<PathBuf>,
    pub params: Vec<(&'a str, String)>,
}

pub fn record_run_timed<T>(record: &RunRecord<'_>, start: Instant, result: &anyhow::Result<T>) {
    let duration_ms = start.elapsed().as_millis();
    let (status, error) = match result {
        Ok(_) => ("success", None),
        Err(err) => ("failure", Some(format!("{err:#}"))),
    };
    let telemetry = ManifestTelemetry {
        status: status.to_string(),
        duration_ms: Some(duration_ms),
        error,
    };
    let params: Vec<(&str, &str)> = record
        .params
        .iter()
        .map(|(k, v)| (*k, v.as_str()))
        .collect();
    if let Err(err) = record_manifest(
        record.dir,
        record.command,
        &record.inputs,
        &record.outputs,
        &params,
        telemetry,
    ) {
        eprintln!("Failed to record run manifest: {err}");
    }
}
