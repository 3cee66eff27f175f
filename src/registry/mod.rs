//! Capability Registry module.
//!
//! Maps capability names to the providers that serve them. The registry is
//! assembled once at startup and is read-only afterwards, so request traffic
//! never takes a lock on it.

mod descriptor;
mod error;

pub use descriptor::*;
pub use error::*;

use crate::adapter::{AdapterFactory, ProviderAdapter};
use crate::config::ConduitConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// A provider descriptor paired with the adapter that talks to it.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("descriptor", &self.descriptor)
            .field("adapter", &self.adapter.kind())
            .finish()
    }
}

/// The Capability Registry stores declared capabilities and registered providers.
///
/// # Examples
///
/// ```
/// use conduit::adapter::StaticAdapter;
/// use conduit::registry::{CapabilityDefinition, CostModel, ProviderDescriptor, Registry};
/// use std::sync::Arc;
///
/// let mut registry = Registry::new();
/// registry
///     .declare_capability(CapabilityDefinition::new("text_classification"))
///     .unwrap();
///
/// let descriptor = ProviderDescriptor::new("local", "static", CostModel::PerCall { price: 1.0 })
///     .with_capability("text_classification");
/// let adapter = Arc::new(StaticAdapter::new("local", descriptor.cost_model));
/// registry.register(descriptor, adapter).unwrap();
///
/// assert!(registry.validate().is_ok());
/// assert_eq!(registry.resolve("text_classification").len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    capabilities: HashMap<String, CapabilityDefinition>,
    providers: HashMap<String, RegisteredProvider>,
    capability_index: HashMap<String, Vec<String>>,
}

impl Registry {
    /// Create a new empty Registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a validated registry from configuration.
    ///
    /// Every provider is constructed through `factory`; an adapter type the
    /// factory does not know is a fatal error.
    pub fn from_config(
        config: &ConduitConfig,
        factory: &AdapterFactory,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        for capability in &config.capabilities {
            registry.declare_capability(CapabilityDefinition::from_config(
                capability,
                config.cache.default_ttl_seconds,
            ))?;
        }

        for provider in &config.providers {
            let descriptor = ProviderDescriptor::from_config(provider);
            let adapter = factory.create(provider)?;
            registry.register(descriptor, adapter)?;
        }

        registry.validate()?;

        tracing::info!(
            providers = registry.provider_count(),
            capabilities = registry.capability_count(),
            "Registry built"
        );

        Ok(registry)
    }

    /// Declare a capability that providers may serve.
    pub fn declare_capability(
        &mut self,
        definition: CapabilityDefinition,
    ) -> Result<(), RegistryError> {
        if self.capabilities.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateCapability(definition.name));
        }
        self.capabilities
            .insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Register a provider and its adapter.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateProvider` if the id is taken,
    /// `RegistryError::UndeclaredCapability` if the descriptor names a
    /// capability that was not declared first.
    pub fn register(
        &mut self,
        descriptor: ProviderDescriptor,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(), RegistryError> {
        let id = descriptor.id.clone();

        if self.providers.contains_key(&id) {
            return Err(RegistryError::DuplicateProvider(id));
        }
        if adapter.id() != id {
            return Err(RegistryError::AdapterMismatch {
                provider: id,
                adapter: adapter.id().to_string(),
            });
        }
        if let Err(message) = descriptor.cost_model.validate() {
            return Err(RegistryError::InvalidCostModel {
                provider: id,
                message,
            });
        }
        if let Some(capability) = descriptor
            .capabilities
            .iter()
            .find(|c| !self.capabilities.contains_key(*c))
        {
            return Err(RegistryError::UndeclaredCapability {
                provider: id,
                capability: capability.clone(),
            });
        }

        for capability in &descriptor.capabilities {
            self.capability_index
                .entry(capability.clone())
                .or_default()
                .push(id.clone());
        }

        tracing::debug!(
            provider_id = %id,
            adapter = %descriptor.adapter,
            capabilities = ?descriptor.capabilities,
            "Registered provider"
        );

        self.providers
            .insert(id, RegisteredProvider { descriptor, adapter });
        Ok(())
    }

    /// Check that every declared capability is served by at least one provider.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut names: Vec<&String> = self.capabilities.keys().collect();
        names.sort();
        for name in names {
            let served = self
                .capability_index
                .get(name)
                .is_some_and(|ids| !ids.is_empty());
            if !served {
                return Err(RegistryError::OrphanCapability(name.clone()));
            }
        }
        Ok(())
    }

    /// Providers serving `capability`, ordered by priority then id.
    ///
    /// Returns an empty list for unknown capabilities.
    pub fn resolve(&self, capability: &str) -> Vec<ProviderDescriptor> {
        let Some(ids) = self.capability_index.get(capability) else {
            return Vec::new();
        };

        let mut descriptors: Vec<ProviderDescriptor> = ids
            .iter()
            .filter_map(|id| self.providers.get(id))
            .map(|p| p.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        descriptors
    }

    pub fn capability(&self, name: &str) -> Option<&CapabilityDefinition> {
        self.capabilities.get(name)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// All declared capabilities sorted by name.
    pub fn capabilities(&self) -> Vec<&CapabilityDefinition> {
        let mut capabilities: Vec<_> = self.capabilities.values().collect();
        capabilities.sort_by(|a, b| a.name.cmp(&b.name));
        capabilities
    }

    pub fn provider(&self, id: &str) -> Option<&RegisteredProvider> {
        self.providers.get(id)
    }

    pub fn descriptor(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers.get(id).map(|p| &p.descriptor)
    }

    pub fn adapter(&self, id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(id).map(|p| Arc::clone(&p.adapter))
    }

    /// All provider descriptors ordered by priority then id.
    pub fn descriptors(&self) -> Vec<&ProviderDescriptor> {
        let mut descriptors: Vec<_> = self.providers.values().map(|p| &p.descriptor).collect();
        descriptors.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        descriptors
    }

    /// Provider ids serving `capability`, in resolve order.
    pub fn provider_ids_for(&self, capability: &str) -> Vec<String> {
        self.resolve(capability).into_iter().map(|d| d.id).collect()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn capability_count(&self) -> usize {
        self.capabilities.len()
    }
}
