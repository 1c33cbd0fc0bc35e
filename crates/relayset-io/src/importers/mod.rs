//! Network importers and format detection.

use std::path::Path;

use anyhow::{bail, Result};
use relayset_core::{Diagnostics, Network};
use serde::Serialize;
use tracing::info;

use crate::topology::load_topology_document;

pub mod pandapower;

pub use pandapower::{load_pandapower_network, parse_pandapower};

/// Result of an import operation
#[derive(Debug)]
pub struct ImportResult {
    pub network: Network,
    pub diagnostics: Diagnostics,
    /// Network name, when the source carries one
    pub name: Option<String>,
}

/// Supported network formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFormat {
    /// Native topology document (YAML or JSON)
    Topology,
    /// pandapower JSON
    Pandapower,
}

impl NetworkFormat {
    pub fn friendly_name(&self) -> &'static str {
        match self {
            NetworkFormat::Topology => "topology document",
            NetworkFormat::Pandapower => "pandapower JSON",
        }
    }

    /// Detect the format from the extension, sniffing JSON content.
    pub fn detect(path: &Path) -> Option<NetworkFormat> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(NetworkFormat::Topology),
            "json" => {
                // Read first ~4KB for sniffing
                let head: String = std::fs::read_to_string(path)
                    .map(|s| s.chars().take(4096).collect())
                    .unwrap_or_default();
                if head.contains("pandapowerNet") || head.contains("pandapower.auto_serialization")
                {
                    Some(NetworkFormat::Pandapower)
                } else {
                    Some(NetworkFormat::Topology)
                }
            }
            _ => None,
        }
    }
}

/// Import a network in any supported format and validate it.
pub fn import_network(path: &Path) -> Result<ImportResult> {
    let Some(format) = NetworkFormat::detect(path) else {
        bail!(
            "cannot tell the network format of '{}' (use .yaml, .yml or .json)",
            path.display()
        );
    };
    info!("importing {} from {}", format.friendly_name(), path.display());

    let mut result = match format {
        NetworkFormat::Topology => {
            let document = load_topology_document(path)?;
            let network = document.to_network()?;
            ImportResult {
                network,
                diagnostics: Diagnostics::new(),
                name: document.name,
            }
        }
        NetworkFormat::Pandapower => parse_pandapower(path)?,
    };
    result.network.validate_into(&mut result.diagnostics);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn detects_formats_by_extension_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("net.yaml");
        let pp = dir.path().join("pp.json");
        let doc = dir.path().join("doc.json");
        let raw = dir.path().join("case.raw");
        fs::write(&yaml, "buses: []").unwrap();
        fs::write(&pp, r#"{"_module": "pandapower.auto_serialization", "_class": "pandapowerNet"}"#)
            .unwrap();
        fs::write(&doc, r#"{"buses": []}"#).unwrap();
        fs::write(&raw, "").unwrap();

        assert_eq!(NetworkFormat::detect(&yaml), Some(NetworkFormat::Topology));
        assert_eq!(NetworkFormat::detect(&pp), Some(NetworkFormat::Pandapower));
        assert_eq!(NetworkFormat::detect(&doc), Some(NetworkFormat::Topology));
        assert_eq!(NetworkFormat::detect(&raw), None);
    }

    #[test]
    fn import_runs_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.yaml");
        fs::write(
            &path,
            "name: bare\nbuses:\n  - { name: A, vn_kv: 6.3 }\n",
        )
        .unwrap();

        let result = import_network(&path).unwrap();
        assert_eq!(result.name.as_deref(), Some("bare"));
        // No external grid
        assert!(result.diagnostics.has_errors());
    }
}
