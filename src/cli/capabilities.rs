//! Capabilities command implementation

use crate::cli::output::{format_capabilities_json, format_capabilities_table, CapabilityRow};
use crate::cli::providers::provider_rows;
use crate::cli::CapabilitiesArgs;
use crate::config::ConduitConfig;
use crate::registry::CapabilityDefinition;

/// Handle `conduit capabilities` command
pub fn handle_capabilities(
    args: &CapabilitiesArgs,
    config: &ConduitConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut rows: Vec<CapabilityRow> = config
        .capabilities
        .iter()
        .map(|capability| {
            let definition =
                CapabilityDefinition::from_config(capability, config.cache.default_ttl_seconds);
            let providers = provider_rows(config, Some(&capability.name))
                .into_iter()
                .map(|row| row.id)
                .collect();
            CapabilityRow::new(&definition, providers)
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    if args.json {
        Ok(format_capabilities_json(&rows)?)
    } else if rows.is_empty() {
        Ok("No capabilities declared.".to_string())
    } else {
        Ok(format_capabilities_table(&rows))
    }
}
