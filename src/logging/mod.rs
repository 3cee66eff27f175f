//! Structured logging helpers
//!
//! Filter directive construction, request id propagation and payload
//! previews for the `tracing` based logging stack.

pub mod fields;
pub mod middleware;

pub use fields::{extract_status, payload_preview};
pub use middleware::{generate_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level
/// and any component-specific log levels configured in the LoggingConfig.
///
/// # Examples
///
/// ```
/// use conduit::config::logging::{LogFormat, LoggingConfig};
/// use conduit::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("dispatch".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
///     enable_content_logging: false,
/// };
///
/// assert_eq!(build_filter_directives(&config), "info,conduit::dispatch=debug");
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        // Sorted so the directive string is stable across runs
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",conduit::{}={}", component, level));
        }
    }

    filter_str
}
