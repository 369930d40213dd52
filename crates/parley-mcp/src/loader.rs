//! Machine definition file loading, shared between the CLI and the MCP
//! server.

use std::path::Path;

use anyhow::Context;
use parley_engine::MachineDefinition;

/// Load a machine definition from a JSON file.
pub fn load_machine(path: impl AsRef<Path>) -> anyhow::Result<MachineDefinition> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read machine file: {}", path.display()))?;
    let machine: MachineDefinition = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse machine file: {}", path.display()))?;
    Ok(machine)
}
