//! Adapter factory for creating ProviderAdapter trait objects from configuration.

use super::{AdapterError, HttpAdapter, OpenAIAdapter, ProviderAdapter, StaticAdapter};
use crate::config::ProviderConfig;
use crate::registry::RegistryError;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor for one adapter type.
pub type AdapterConstructor = Arc<
    dyn Fn(&ProviderConfig, Arc<Client>) -> Result<Arc<dyn ProviderAdapter>, AdapterError>
        + Send
        + Sync,
>;

/// Maps adapter type names to constructors.
///
/// Ships with `http`, `openai` and `static`; library users can add their own
/// types with [`AdapterFactory::register_kind`] before building the registry.
///
/// # Examples
///
/// ```
/// use conduit::adapter::AdapterFactory;
/// use conduit::config::ProviderConfig;
///
/// let factory = AdapterFactory::with_builtins(reqwest::Client::new());
/// let config: ProviderConfig = toml::from_str(r#"
///     id = "local"
///     adapter = "static"
///     capabilities = ["text_classification"]
/// "#).unwrap();
///
/// let adapter = factory.create(&config).unwrap();
/// assert_eq!(adapter.id(), "local");
/// assert_eq!(adapter.kind(), "static");
/// ```
pub struct AdapterFactory {
    client: Arc<Client>,
    constructors: HashMap<String, AdapterConstructor>,
}

impl AdapterFactory {
    /// Factory with no adapter types registered.
    pub fn empty(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            constructors: HashMap::new(),
        }
    }

    /// Factory with the built-in adapter types registered.
    pub fn with_builtins(client: Client) -> Self {
        let mut factory = Self::empty(client);
        factory.register_kind("http", |config, client| {
            Ok(Arc::new(HttpAdapter::from_config(config, client)?))
        });
        factory.register_kind("openai", |config, client| {
            Ok(Arc::new(OpenAIAdapter::from_config(config, client)?))
        });
        factory.register_kind("static", |config, _client| {
            Ok(Arc::new(StaticAdapter::from_config(config)?))
        });
        factory
    }

    /// Register (or replace) the constructor for an adapter type.
    pub fn register_kind<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&ProviderConfig, Arc<Client>) -> Result<Arc<dyn ProviderAdapter>, AdapterError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(kind.into().to_ascii_lowercase(), Arc::new(constructor));
    }

    pub fn supports(&self, kind: &str) -> bool {
        self.constructors.contains_key(&kind.to_ascii_lowercase())
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Create the adapter for one provider.
    ///
    /// # Errors
    ///
    /// `RegistryError::UnsupportedAdapter` for an unknown type,
    /// `RegistryError::AdapterSetup` when the constructor rejects the config.
    pub fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, RegistryError> {
        let constructor = self
            .constructors
            .get(&config.adapter.to_ascii_lowercase())
            .ok_or_else(|| RegistryError::UnsupportedAdapter {
                provider: config.id.clone(),
                adapter: config.adapter.clone(),
            })?;

        constructor(config, Arc::clone(&self.client)).map_err(|source| {
            RegistryError::AdapterSetup {
                provider: config.id.clone(),
                source,
            }
        })
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::with_builtins(Client::new())
    }
}

/// Read the provider credential named by `api_key_env`, if any.
pub fn resolve_api_key(config: &ProviderConfig) -> Result<Option<String>, AdapterError> {
    match &config.api_key_env {
        Some(var) => std::env::var(var).map(Some).map_err(|e| {
            AdapterError::Configuration(format!(
                "Failed to read API key from env var '{}': {}",
                var, e
            ))
        }),
        None => Ok(None),
    }
}
