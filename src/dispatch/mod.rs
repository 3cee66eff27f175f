//! Request dispatcher
//!
//! Drives one capability request from validation to a terminal outcome:
//! cache lookup, candidate selection, then sequential attempts against the
//! ranked providers until one succeeds or the retry state machine runs out.
//! Requests carrying an idempotency key are coalesced onto a single call.

pub mod attempt;
mod coalesce;
pub mod error;
pub mod state;


pub use attempt::{AttemptOutcome, AttemptRecord, ProviderFailure, SubmitResponse};
pub use error::DispatchError;
pub use state::{Bounds, DispatchEvent, DispatchState};

use crate::adapter::{AdapterError, AdapterOutput, InvocationContext};
use crate::budget::{BudgetGovernor, Reservation};
use crate::cache::{CacheKey, CachedResult, ResultCache};
use crate::clock::SharedClock;
use crate::config::{ConduitConfig, DispatchConfig};
use crate::health::HealthTracker;
use crate::registry::{CapabilityDefinition, Registry};
use crate::request::CapabilityRequest;
use crate::selection::{Candidate, ScoringWeights, SelectionEngine};
use coalesce::{Coalescer, Joined};
use futures::FutureExt;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Caller-side context for one submit.
#[derive(Debug, Clone, Default)]
pub struct SubmitContext {
    /// Cancelling aborts the in-flight attempt; never retried
    pub cancel: CancellationToken,
    /// Correlation id propagated to adapters and logs
    pub request_id: Option<String>,
}

impl SubmitContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

struct Inner {
    registry: Arc<Registry>,
    selection: SelectionEngine,
    health: Arc<HealthTracker>,
    budget: Arc<BudgetGovernor>,
    cache: Arc<ResultCache>,
    config: DispatchConfig,
    clock: SharedClock,
    coalescer: Coalescer<SubmitResponse, DispatchError>,
    content_logging: bool,
}

impl Inner {
    fn new(
        registry: Arc<Registry>,
        health: Arc<HealthTracker>,
        budget: Arc<BudgetGovernor>,
        cache: Arc<ResultCache>,
        weights: ScoringWeights,
        config: DispatchConfig,
        clock: SharedClock,
    ) -> Self {
        let selection = SelectionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&health),
            Arc::clone(&budget),
            weights,
        );
        let coalescer = Coalescer::new(config.idempotency_ttl(), Arc::clone(&clock));
        Self {
            registry,
            selection,
            health,
            budget,
            cache,
            config,
            clock,
            coalescer,
            content_logging: false,
        }
    }
}

/// Orchestrates capability requests across registered providers.
///
/// Cheap to clone; clones share health, budget, cache and coalescing state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Assemble a dispatcher from already-built components.
    pub fn new(
        registry: Arc<Registry>,
        health: Arc<HealthTracker>,
        budget: Arc<BudgetGovernor>,
        cache: Arc<ResultCache>,
        weights: ScoringWeights,
        config: DispatchConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            inner: Arc::new(Inner::new(
                registry, health, budget, cache, weights, config, clock,
            )),
        }
    }

    /// Build health, budget and cache state for `registry` from configuration.
    pub fn from_config(config: &ConduitConfig, registry: Arc<Registry>, clock: SharedClock) -> Self {
        let health = HealthTracker::new(config.circuit_breaker.clone(), Arc::clone(&clock))
            .with_providers(registry.descriptors().iter().map(|d| d.id.clone()));
        let budget = BudgetGovernor::new(&config.budget, Arc::clone(&clock));
        for descriptor in registry.descriptors() {
            budget.configure_provider(descriptor);
        }
        let cache = ResultCache::new(&config.cache, Arc::clone(&clock));

        let mut inner = Inner::new(
            registry,
            Arc::new(health),
            Arc::new(budget),
            Arc::new(cache),
            config.selection.weights.clone().into(),
            config.dispatch.clone(),
            clock,
        );
        inner.content_logging = config.logging.enable_content_logging;
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.inner.health
    }

    pub fn budget(&self) -> &Arc<BudgetGovernor> {
        &self.inner.budget
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.inner.cache
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.inner.selection
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Submit a request and wait for its terminal outcome.
    pub async fn submit(
        &self,
        request: CapabilityRequest,
    ) -> Result<SubmitResponse, DispatchError> {
        self.submit_with_context(request, SubmitContext::default())
            .await
    }

    /// Submit a request that the caller may cancel.
    pub async fn submit_with_cancel(
        &self,
        request: CapabilityRequest,
        cancel: CancellationToken,
    ) -> Result<SubmitResponse, DispatchError> {
        self.submit_with_context(request, SubmitContext::new(cancel))
            .await
    }

    pub async fn submit_with_context(
        &self,
        request: CapabilityRequest,
        context: SubmitContext,
    ) -> Result<SubmitResponse, DispatchError> {
        let capability = crate::metrics::sanitize_label(&request.capability);
        let span = tracing::info_span!(
            "dispatch",
            capability = %request.capability,
            request_id = context.request_id.as_deref().unwrap_or("-"),
        );

        let result = self.admit_request(request, context).instrument(span).await;

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.code(),
        };
        metrics::counter!(
            "conduit_requests_total",
            "capability" => capability,
            "status" => status
        )
        .increment(1);
        result
    }

    async fn admit_request(
        &self,
        request: CapabilityRequest,
        context: SubmitContext,
    ) -> Result<SubmitResponse, DispatchError> {
        request.validate().map_err(DispatchError::invalid_request)?;
        if !self.inner.registry.has_capability(&request.capability) {
            return Err(DispatchError::invalid_request(format!(
                "unknown capability '{}'",
                request.capability
            )));
        }

        if self.inner.content_logging {
            tracing::debug!(
                content_type = %request.payload.content_type,
                preview = %crate::logging::payload_preview(&request.payload, 200),
                "Request payload"
            );
        }

        match request.constraints.idempotency_key.clone() {
            Some(key) => self.coalesced(key, request, context).await,
            None => self.run(request, context).await,
        }
    }

    async fn coalesced(
        &self,
        key: String,
        request: CapabilityRequest,
        context: SubmitContext,
    ) -> Result<SubmitResponse, DispatchError> {
        let slot = format!("{}\u{0}{}", request.capability, key);
        let capability = crate::metrics::sanitize_label(&request.capability);
        let cancel = context.cancel.clone();
        let this = self.clone();

        let joined = self.inner.coalescer.join_or_lead(&slot, move || {
            async move { this.run(request, context).await }.boxed()
        });

        match joined {
            Joined::Lead(shared) => shared.await,
            Joined::Join(shared) => {
                tracing::debug!(idempotency_key = %key, "Joining in-flight request");
                metrics::counter!("conduit_coalesced_total", "capability" => capability)
                    .increment(1);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(DispatchError::Cancelled { attempts: Vec::new() }),
                    outcome = shared => outcome.map(as_joiner),
                }
            }
            Joined::Replay(response) => {
                tracing::debug!(idempotency_key = %key, "Replaying completed request");
                metrics::counter!("conduit_coalesced_total", "capability" => capability)
                    .increment(1);
                Ok(as_joiner(response))
            }
        }
    }

    async fn run(
        &self,
        request: CapabilityRequest,
        context: SubmitContext,
    ) -> Result<SubmitResponse, DispatchError> {
        let definition = self
            .inner
            .registry
            .capability(&request.capability)
            .cloned()
            .ok_or_else(|| {
                DispatchError::invalid_request(format!(
                    "unknown capability '{}'",
                    request.capability
                ))
            })?;
        let cache_key = definition
            .cacheable
            .then(|| CacheKey::for_request(&request));

        let deadline_budget = request
            .constraints
            .deadline
            .unwrap_or_else(|| self.inner.config.request_deadline());

        let mut run = Run {
            inner: &self.inner,
            request: &request,
            definition: &definition,
            cache_key,
            context: &context,
            deadline: Instant::now() + deadline_budget,
            deadline_ms: deadline_budget.as_millis() as u64,
            attempts: Vec::new(),
            failures: Vec::new(),
            budget_refusals: 0,
        };

        if let Some(response) = run.cached() {
            return Ok(response);
        }

        let selection = self.inner.selection.candidates(&request)?;
        let bounds = Bounds {
            candidates: selection.candidates.len(),
            max_attempts: self.inner.config.max_attempts as usize,
        };

        let mut state = DispatchState::Pending;
        loop {
            state = state.on(
                DispatchEvent::Next {
                    attempts_made: run.attempts.len(),
                },
                &bounds,
            );
            let DispatchState::Trying { candidate } = state else {
                break;
            };

            let step = run.attempt(&selection.candidates[candidate]).await;
            state = state.on(step.event(), &bounds);
            tracing::trace!(?state, "Dispatch state");
            match step {
                Step::Succeeded(response) => return Ok(response),
                Step::Aborted(error) => return Err(error),
                Step::Failed => {}
            }
        }

        Err(run.exhausted())
    }
}

/// Mark a shared response as received by a joiner.
fn as_joiner(mut response: SubmitResponse) -> SubmitResponse {
    response.coalesced = true;
    response.cost = 0.0;
    response
}

enum Step {
    Succeeded(SubmitResponse),
    Failed,
    Aborted(DispatchError),
}

impl Step {
    fn event(&self) -> DispatchEvent {
        match self {
            Step::Succeeded(_) => DispatchEvent::Succeeded,
            Step::Failed => DispatchEvent::Failed,
            Step::Aborted(_) => DispatchEvent::Aborted,
        }
    }
}

enum Invocation {
    Completed(AdapterOutput),
    Errored(AdapterError),
    TimedOut,
    Cancelled,
}

/// A provider's attempt slot and budget reservation for one attempt.
///
/// Dropping an unsettled lease releases both, which covers callers that
/// drop the submit future mid-attempt.
struct AttemptLease<'a> {
    health: &'a HealthTracker,
    budget: &'a BudgetGovernor,
    provider_id: &'a str,
    reservation: Option<Reservation>,
}

impl AttemptLease<'_> {
    fn succeed(mut self, latency: std::time::Duration, cost: f64) {
        if let Some(reservation) = self.reservation.take() {
            self.health.record_success(self.provider_id, latency);
            self.budget.commit(&reservation, cost);
        }
    }

    fn fail(mut self) {
        if let Some(reservation) = self.reservation.take() {
            self.health.record_failure(self.provider_id);
            self.budget.release(&reservation);
        }
    }

    fn release(mut self) {
        if let Some(reservation) = self.reservation.take() {
            self.health.release(self.provider_id);
            self.budget.release(&reservation);
        }
    }
}

impl Drop for AttemptLease<'_> {
    fn drop(&mut self) {
        if let Some(reservation) = self.reservation.take() {
            tracing::debug!(provider_id = %self.provider_id, "Attempt abandoned");
            self.health.release(self.provider_id);
            self.budget.release(&reservation);
        }
    }
}

/// Per-request bookkeeping while walking the candidate list.
struct Run<'a> {
    inner: &'a Inner,
    request: &'a CapabilityRequest,
    definition: &'a CapabilityDefinition,
    cache_key: Option<CacheKey>,
    context: &'a SubmitContext,
    deadline: Instant,
    deadline_ms: u64,
    attempts: Vec<AttemptRecord>,
    failures: Vec<ProviderFailure>,
    budget_refusals: usize,
}

impl Run<'_> {
    fn cached(&self) -> Option<SubmitResponse> {
        let key = self.cache_key.as_ref()?;
        let hit = self.inner.cache.get(key)?;
        tracing::debug!(provider_id = %hit.provider_id, "Served from cache");
        metrics::counter!(
            "conduit_cache_hits_total",
            "capability" => crate::metrics::sanitize_label(&self.request.capability)
        )
        .increment(1);
        Some(SubmitResponse {
            result: hit.result,
            provider_used: hit.provider_id,
            attempts: self.attempts.clone(),
            cached: true,
            coalesced: false,
            cost: 0.0,
        })
    }

    fn skip(&mut self, provider_id: &str, reason: impl Into<String>) -> Step {
        let reason = reason.into();
        tracing::debug!(provider_id = %provider_id, reason = %reason, "Candidate skipped");
        self.failures.push(ProviderFailure {
            provider_id: provider_id.to_string(),
            reason,
        });
        Step::Failed
    }

    async fn attempt(&mut self, candidate: &Candidate) -> Step {
        let inner = self.inner;
        if let Some(response) = self.cached() {
            return Step::Succeeded(response);
        }
        if self.context.cancel.is_cancelled() {
            return Step::Aborted(DispatchError::Cancelled {
                attempts: self.attempts.clone(),
            });
        }
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Step::Aborted(self.deadline_exceeded());
        }

        let provider_id = candidate.provider_id.as_str();
        let Some(provider) = inner.registry.provider(provider_id) else {
            return self.skip(provider_id, "provider not registered");
        };

        if !inner.health.try_begin_attempt(provider_id) {
            return self.skip(provider_id, "circuit not accepting attempts");
        }
        let lease = match inner
            .budget
            .try_reserve(provider_id, candidate.estimated_cost)
        {
            Ok(reservation) => AttemptLease {
                health: &inner.health,
                budget: &inner.budget,
                provider_id,
                reservation: Some(reservation),
            },
            Err(refused) => {
                inner.health.release(provider_id);
                self.budget_refusals += 1;
                return self.skip(provider_id, refused.as_str());
            }
        };

        let timeout = [
            Some(remaining),
            self.request.constraints.max_latency,
            Some(
                provider
                    .descriptor
                    .timeout()
                    .unwrap_or_else(|| inner.config.default_attempt_timeout()),
            ),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(remaining);

        let attempt_cancel = self.context.cancel.child_token();
        let ctx = InvocationContext::new(&self.request.capability, timeout)
            .with_language(self.request.constraints.required_language.clone())
            .with_cancel(attempt_cancel.clone())
            .with_request_id(self.context.request_id.clone());

        let attempt_number = self.attempts.len() + 1;
        tracing::debug!(
            provider_id = %provider_id,
            attempt = attempt_number,
            timeout_ms = ctx.timeout_ms(),
            "Dispatching attempt"
        );

        let started_at = inner.clock.now();
        let started = Instant::now();
        let invocation = tokio::select! {
            biased;
            _ = self.context.cancel.cancelled() => Invocation::Cancelled,
            result = tokio::time::timeout(timeout, provider.adapter.invoke(&ctx, &self.request.payload)) => {
                match result {
                    Ok(Ok(output)) => Invocation::Completed(output),
                    Ok(Err(error)) => Invocation::Errored(error),
                    Err(_) => Invocation::TimedOut,
                }
            }
        };
        attempt_cancel.cancel();
        let elapsed = started.elapsed();

        let provider_label = crate::metrics::sanitize_label(provider_id);
        metrics::histogram!(
            "conduit_attempt_duration_seconds",
            "provider" => provider_label.clone()
        )
        .record(elapsed.as_secs_f64());

        let (outcome, message, step) = match invocation {
            Invocation::Completed(output) => {
                lease.succeed(elapsed, output.cost);
                metrics::histogram!("conduit_spend_units", "provider" => provider_label.clone())
                    .record(output.cost);
                if let Some(key) = self.cache_key.clone() {
                    inner.cache.put(
                        key,
                        CachedResult {
                            result: output.result.clone(),
                            provider_id: provider_id.to_string(),
                        },
                        self.definition.cache_ttl(),
                    );
                }
                tracing::info!(
                    provider_id = %provider_id,
                    attempt = attempt_number,
                    duration_ms = elapsed.as_millis() as u64,
                    cost = output.cost,
                    "Attempt succeeded"
                );
                (AttemptOutcome::Success, None, Ok(output))
            }
            Invocation::TimedOut | Invocation::Errored(AdapterError::Timeout(_)) => {
                lease.fail();
                let message = format!("timed out after {}ms", timeout.as_millis());
                (AttemptOutcome::Timeout, Some(message), Err(None))
            }
            Invocation::Cancelled | Invocation::Errored(AdapterError::Cancelled) => {
                lease.release();
                (
                    AttemptOutcome::Cancelled,
                    None,
                    Err(Some(DispatchError::Cancelled {
                        attempts: Vec::new(),
                    })),
                )
            }
            Invocation::Errored(error) if !error.is_retryable() => {
                lease.release();
                let message = error.to_string();
                (
                    AttemptOutcome::Rejected,
                    Some(message.clone()),
                    Err(Some(DispatchError::InvalidInput {
                        provider_id: provider_id.to_string(),
                        message,
                        attempts: Vec::new(),
                    })),
                )
            }
            Invocation::Errored(error) => {
                if error.counts_against_provider() {
                    lease.fail();
                } else {
                    lease.release();
                }
                (AttemptOutcome::Failed, Some(error.to_string()), Err(None))
            }
        };

        metrics::counter!(
            "conduit_attempts_total",
            "provider" => provider_label,
            "outcome" => outcome.as_str()
        )
        .increment(1);

        self.attempts.push(AttemptRecord {
            provider_id: provider_id.to_string(),
            started_at,
            duration_ms: elapsed.as_millis() as u64,
            outcome,
            message: message.clone(),
        });

        match step {
            Ok(output) => Step::Succeeded(SubmitResponse {
                result: output.result,
                provider_used: provider_id.to_string(),
                attempts: std::mem::take(&mut self.attempts),
                cached: false,
                coalesced: false,
                cost: output.cost,
            }),
            Err(Some(error)) => Step::Aborted(self.with_attempts(error)),
            Err(None) => {
                let reason = message.unwrap_or_else(|| outcome.as_str().to_string());
                tracing::warn!(
                    provider_id = %provider_id,
                    attempt = attempt_number,
                    outcome = outcome.as_str(),
                    reason = %reason,
                    "Attempt failed"
                );
                self.failures.push(ProviderFailure {
                    provider_id: provider_id.to_string(),
                    reason,
                });
                if Instant::now() >= self.deadline {
                    Step::Aborted(self.deadline_exceeded())
                } else {
                    Step::Failed
                }
            }
        }
    }

    fn with_attempts(&self, error: DispatchError) -> DispatchError {
        let attempts = self.attempts.clone();
        match error {
            DispatchError::Cancelled { .. } => DispatchError::Cancelled { attempts },
            DispatchError::InvalidInput {
                provider_id,
                message,
                ..
            } => DispatchError::InvalidInput {
                provider_id,
                message,
                attempts,
            },
            other => other,
        }
    }

    fn deadline_exceeded(&self) -> DispatchError {
        tracing::warn!(
            deadline_ms = self.deadline_ms,
            attempts = self.attempts.len(),
            "Request deadline exceeded"
        );
        DispatchError::DeadlineExceeded {
            deadline_ms: self.deadline_ms,
            attempts: self.attempts.clone(),
        }
    }

    fn exhausted(self) -> DispatchError {
        let capability = self.request.capability.clone();
        let budget_only = self.attempts.is_empty()
            && self.budget_refusals > 0
            && self.budget_refusals == self.failures.len();

        tracing::warn!(
            attempts = self.attempts.len(),
            failures = self.failures.len(),
            budget_only,
            "Candidates exhausted"
        );

        if budget_only {
            DispatchError::BudgetExceeded {
                capability,
                failures: self.failures,
                attempts: self.attempts,
            }
        } else {
            DispatchError::AllProvidersExhausted {
                capability,
                failures: self.failures,
                attempts: self.attempts,
            }
        }
    }
}
