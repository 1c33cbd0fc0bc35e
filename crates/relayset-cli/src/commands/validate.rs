use std::path::Path;

use anyhow::{bail, Result};
use relayset_io::import_network;
use tracing::info;

pub fn handle(network: &Path) -> Result<()> {
    let imported = import_network(network)?;
    let stats = imported.network.stats();
    let name = imported.name.as_deref().unwrap_or("unnamed network");

    println!("{} ({})", name, network.display());
    println!("  Buses         : {}", stats.num_buses);
    println!("  External grids: {}", stats.num_external_grids);
    println!("  Transformers  : {}", stats.num_transformers);
    println!("  Lines         : {}", stats.num_lines);
    println!("  Switches      : {}", stats.num_switches);
    println!("  Loads         : {} ({:.2} MW)", stats.num_loads, stats.total_load_mw);
    print!("{}", imported.diagnostics);

    if imported.diagnostics.has_errors() {
        bail!(
            "validation of '{}' found {}",
            network.display(),
            imported.diagnostics.summary()
        );
    }
    info!("validation passed");
    Ok(())
}
