//! Output formatting helpers for CLI commands

use crate::dispatch::{AttemptOutcome, AttemptRecord};
use crate::registry::{CapabilityDefinition, CostModel, ProviderDescriptor};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for provider display
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderRow {
    pub id: String,
    pub adapter: String,
    pub capabilities: Vec<String>,
    pub cost_model: CostModel,
    pub declared_latency_ms: u64,
    pub languages: Vec<String>,
    pub priority: i32,
}

impl From<&ProviderDescriptor> for ProviderRow {
    fn from(descriptor: &ProviderDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            adapter: descriptor.adapter.clone(),
            capabilities: descriptor.capabilities.clone(),
            cost_model: descriptor.cost_model,
            declared_latency_ms: descriptor.declared_latency_ms,
            languages: descriptor.languages.clone(),
            priority: descriptor.priority,
        }
    }
}

/// View model for capability display
#[derive(Debug, Clone, serde::Serialize)]
pub struct CapabilityRow {
    pub name: String,
    pub cacheable: bool,
    pub cache_ttl_seconds: Option<u64>,
    pub providers: Vec<String>,
}

impl CapabilityRow {
    pub fn new(definition: &CapabilityDefinition, providers: Vec<String>) -> Self {
        Self {
            name: definition.name.clone(),
            cacheable: definition.cacheable,
            cache_ttl_seconds: definition.cacheable.then_some(definition.cache_ttl_seconds),
            providers,
        }
    }
}

/// Short human form of a cost model, e.g. `0.002/KB`.
pub fn cost_label(model: &CostModel) -> String {
    match model {
        CostModel::PerCall { price } => format!("{}/call", price),
        CostModel::PerKilobyte { price } => format!("{}/KB", price),
        CostModel::PerThousandChars { price } => format!("{}/1k chars", price),
    }
}

/// Format providers as a table
pub fn format_providers_table(providers: &[ProviderRow]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID",
        "Adapter",
        "Capabilities",
        "Cost",
        "Latency",
        "Languages",
        "Priority",
    ]);

    for p in providers {
        let languages = if p.languages.is_empty() {
            "any".dimmed().to_string()
        } else {
            p.languages.join(", ")
        };

        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(&p.adapter),
            Cell::new(p.capabilities.join(", ")),
            Cell::new(cost_label(&p.cost_model)),
            Cell::new(format!("{}ms", p.declared_latency_ms)),
            Cell::new(languages),
            Cell::new(p.priority),
        ]);
    }

    table.to_string()
}

/// Format providers as JSON
pub fn format_providers_json(providers: &[ProviderRow]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "providers": providers }))
}

/// Format capabilities as a table
pub fn format_capabilities_table(capabilities: &[CapabilityRow]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Capability", "Cacheable", "TTL", "Providers"]);

    for c in capabilities {
        let (cacheable, ttl) = match c.cache_ttl_seconds {
            Some(ttl) if c.cacheable => ("yes".green().to_string(), format!("{}s", ttl)),
            _ => ("no".dimmed().to_string(), "-".to_string()),
        };
        let providers = if c.providers.is_empty() {
            "none".red().to_string()
        } else {
            c.providers.join(", ")
        };

        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(cacheable),
            Cell::new(ttl),
            Cell::new(providers),
        ]);
    }

    table.to_string()
}

/// Format capabilities as JSON
pub fn format_capabilities_json(capabilities: &[CapabilityRow]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "capabilities": capabilities }))
}

/// Format a dispatch attempt log as a table
pub fn format_attempts_table(attempts: &[AttemptRecord]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Provider", "Outcome", "Duration", "Message"]);

    for (i, a) in attempts.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&a.provider_id),
            Cell::new(outcome_label(a.outcome)),
            Cell::new(format!("{}ms", a.duration_ms)),
            Cell::new(a.message.as_deref().unwrap_or("")),
        ]);
    }

    table.to_string()
}

/// Colored label for an attempt outcome
pub fn outcome_label(outcome: AttemptOutcome) -> String {
    let label = outcome.as_str();
    match outcome {
        AttemptOutcome::Success => label.green().to_string(),
        AttemptOutcome::Timeout => label.yellow().to_string(),
        AttemptOutcome::Failed => label.red().to_string(),
        AttemptOutcome::Rejected => label.magenta().to_string(),
        AttemptOutcome::Cancelled => label.cyan().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn provider_row() -> ProviderRow {
        ProviderRow {
            id: "whisper-cloud".to_string(),
            adapter: "openai".to_string(),
            capabilities: vec!["speech_to_text".to_string()],
            cost_model: CostModel::PerKilobyte { price: 0.002 },
            declared_latency_ms: 1200,
            languages: vec!["en".to_string(), "de".to_string()],
            priority: 10,
        }
    }

    #[test]
    fn test_format_providers_table_empty() {
        let output = format_providers_table(&[]);
        assert!(output.contains("Adapter")); // Header present
    }

    #[test]
    fn test_format_providers_table_with_data() {
        colored::control::set_override(false);
        let output = format_providers_table(&[provider_row()]);
        assert!(output.contains("whisper-cloud"));
        assert!(output.contains("0.002/KB"));
        assert!(output.contains("1200ms"));
        assert!(output.contains("en, de"));
    }

    #[test]
    fn test_format_providers_json_valid() {
        let output = format_providers_json(&[provider_row()]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["providers"][0]["id"], "whisper-cloud");
        assert_eq!(parsed["providers"][0]["cost_model"]["model"], "per_kilobyte");
    }

    #[test]
    fn test_capability_row_hides_ttl_when_not_cacheable() {
        let definition = CapabilityDefinition::new("send_notification");
        let row = CapabilityRow::new(&definition, vec!["sms".to_string()]);
        assert!(row.cache_ttl_seconds.is_none());

        let definition = CapabilityDefinition::new("summarization")
            .cacheable(std::time::Duration::from_secs(300));
        let row = CapabilityRow::new(&definition, vec![]);
        assert_eq!(row.cache_ttl_seconds, Some(300));
    }

    #[test]
    fn test_format_capabilities_table() {
        colored::control::set_override(false);
        let definition = CapabilityDefinition::new("summarization")
            .cacheable(std::time::Duration::from_secs(300));
        let output =
            format_capabilities_table(&[CapabilityRow::new(&definition, vec!["a".to_string()])]);
        assert!(output.contains("summarization"));
        assert!(output.contains("300s"));
    }

    #[test]
    fn test_format_attempts_table() {
        colored::control::set_override(false);
        let attempts = vec![
            AttemptRecord {
                provider_id: "p1".to_string(),
                started_at: Utc::now(),
                duration_ms: 100,
                outcome: AttemptOutcome::Timeout,
                message: Some("attempt timed out".to_string()),
            },
            AttemptRecord {
                provider_id: "p2".to_string(),
                started_at: Utc::now(),
                duration_ms: 40,
                outcome: AttemptOutcome::Success,
                message: None,
            },
        ];
        let output = format_attempts_table(&attempts);
        assert!(output.contains("timeout"));
        assert!(output.contains("success"));
        assert!(output.contains("p2"));
    }

    #[test]
    fn test_cost_label() {
        assert_eq!(cost_label(&CostModel::PerCall { price: 0.5 }), "0.5/call");
        assert_eq!(
            cost_label(&CostModel::PerThousandChars { price: 0.4 }),
            "0.4/1k chars"
        );
    }
}
