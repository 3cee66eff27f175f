use crate::adapter::AdapterError;

/// Errors that can occur while building the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("provider already exists: {0}")]
    DuplicateProvider(String),

    #[error("capability already declared: {0}")]
    DuplicateCapability(String),

    #[error("provider '{provider}' uses unsupported adapter type '{adapter}'")]
    UnsupportedAdapter { provider: String, adapter: String },

    #[error("adapter for '{provider}' could not be created: {source}")]
    AdapterSetup {
        provider: String,
        #[source]
        source: AdapterError,
    },

    #[error("adapter id '{adapter}' does not match provider '{provider}'")]
    AdapterMismatch { provider: String, adapter: String },

    #[error("provider '{provider}' references undeclared capability '{capability}'")]
    UndeclaredCapability {
        provider: String,
        capability: String,
    },

    #[error("capability '{0}' has no provider serving it")]
    OrphanCapability(String),

    #[error("invalid cost model for '{provider}': {message}")]
    InvalidCostModel { provider: String, message: String },
}
