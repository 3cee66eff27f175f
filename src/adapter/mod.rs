//! Provider adapter abstraction layer.
//!
//! This module provides the `ProviderAdapter` trait and the adapters that ship
//! with the crate. An adapter owns the provider-specific protocol and nothing
//! else: health, budgets and retries live in the orchestrator.

use async_trait::async_trait;

pub mod error;
pub mod factory;
pub mod http;
pub mod openai;
pub mod static_response;
pub mod types;

pub use error::AdapterError;
pub use factory::{AdapterConstructor, AdapterFactory};
pub use http::HttpAdapter;
pub use openai::OpenAIAdapter;
pub use static_response::StaticAdapter;
pub use types::{AdapterOutput, InvocationContext};

use crate::registry::CostModel;
use crate::request::Payload;

/// Uniform interface for third-party AI providers.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn ProviderAdapter>`.
///
/// # Cancellation Safety
///
/// `invoke` must return promptly once `ctx.cancel` fires, and dropping the
/// future must abort any in-flight provider call.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// Provider id this adapter was built for.
    fn id(&self) -> &str;

    /// Adapter type name (e.g. "http").
    fn kind(&self) -> &'static str;

    /// Billing model used for estimates.
    fn cost_model(&self) -> CostModel;

    /// Expected cost of invoking with `payload`, before any call is made.
    fn estimate_cost(&self, payload: &Payload) -> f64 {
        self.cost_model().estimate(payload)
    }

    /// Execute the capability named in `ctx` against the provider.
    ///
    /// # Returns
    ///
    /// - `Ok(AdapterOutput)` with the result and the cost actually incurred
    /// - `Err(AdapterError::InvalidInput)` if the provider rejected the payload
    /// - `Err(AdapterError::Timeout)` / `Network` / `Upstream` for transient failures
    /// - `Err(AdapterError::Cancelled)` if `ctx.cancel` fired first
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        payload: &Payload,
    ) -> Result<AdapterOutput, AdapterError>;
}
