//! Providers command implementation

use crate::cli::output::{format_providers_json, format_providers_table, ProviderRow};
use crate::cli::ProvidersArgs;
use crate::config::ConduitConfig;
use crate::registry::ProviderDescriptor;

/// Handle `conduit providers` command
///
/// Reads descriptors straight from configuration; no adapters are built, so
/// credentials do not need to be present.
pub fn handle_providers(
    args: &ProvidersArgs,
    config: &ConduitConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let rows = provider_rows(config, args.capability.as_deref());

    if args.json {
        Ok(format_providers_json(&rows)?)
    } else if rows.is_empty() {
        Ok("No providers configured.".to_string())
    } else {
        Ok(format_providers_table(&rows))
    }
}

/// Provider rows in registry order (priority, then id).
pub fn provider_rows(config: &ConduitConfig, capability: Option<&str>) -> Vec<ProviderRow> {
    let mut descriptors: Vec<ProviderDescriptor> = config
        .providers
        .iter()
        .map(ProviderDescriptor::from_config)
        .filter(|d| capability.map_or(true, |c| d.supports(c)))
        .collect();
    descriptors.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
    descriptors.iter().map(ProviderRow::from).collect()
}
