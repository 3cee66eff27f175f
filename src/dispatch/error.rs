//! Terminal dispatch errors.

use super::attempt::{AttemptRecord, ProviderFailure};
use crate::selection::{Exclusion, SelectionError};
use thiserror::Error;

/// The only errors that cross the dispatcher boundary.
///
/// Every variant raised after selection carries the attempt log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// Malformed request, rejected before selection
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("No eligible provider for capability '{capability}'")]
    NoEligibleProvider {
        capability: String,
        exclusions: Vec<Exclusion>,
    },

    #[error("Budget exceeded for capability '{capability}'")]
    BudgetExceeded {
        capability: String,
        failures: Vec<ProviderFailure>,
        attempts: Vec<AttemptRecord>,
    },

    #[error("All providers exhausted for capability '{capability}'")]
    AllProvidersExhausted {
        capability: String,
        failures: Vec<ProviderFailure>,
        attempts: Vec<AttemptRecord>,
    },

    /// A provider rejected the caller's input; not retried
    #[error("Input rejected by provider '{provider_id}': {message}")]
    InvalidInput {
        provider_id: String,
        message: String,
        attempts: Vec<AttemptRecord>,
    },

    #[error("Request deadline of {deadline_ms}ms exceeded")]
    DeadlineExceeded {
        deadline_ms: u64,
        attempts: Vec<AttemptRecord>,
    },

    #[error("Request cancelled")]
    Cancelled { attempts: Vec<AttemptRecord> },
}

impl DispatchError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::InvalidRequest { .. } => "invalid_request",
            DispatchError::NoEligibleProvider { .. } => "no_eligible_provider",
            DispatchError::BudgetExceeded { .. } => "budget_exceeded",
            DispatchError::AllProvidersExhausted { .. } => "all_providers_exhausted",
            DispatchError::InvalidInput { .. } => "invalid_input",
            DispatchError::DeadlineExceeded { .. } => "deadline_exceeded",
            DispatchError::Cancelled { .. } => "cancelled",
        }
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            DispatchError::InvalidRequest { .. } | DispatchError::NoEligibleProvider { .. } => &[],
            DispatchError::BudgetExceeded { attempts, .. }
            | DispatchError::AllProvidersExhausted { attempts, .. }
            | DispatchError::InvalidInput { attempts, .. }
            | DispatchError::DeadlineExceeded { attempts, .. }
            | DispatchError::Cancelled { attempts } => attempts,
        }
    }

    /// Per-provider reasons, for callers that want to explain the failure.
    pub fn provider_failures(&self) -> Vec<ProviderFailure> {
        match self {
            DispatchError::NoEligibleProvider { exclusions, .. } => exclusions
                .iter()
                .map(|e| ProviderFailure {
                    provider_id: e.provider_id.clone(),
                    reason: e.reason.to_string(),
                })
                .collect(),
            DispatchError::BudgetExceeded { failures, .. }
            | DispatchError::AllProvidersExhausted { failures, .. } => failures.clone(),
            DispatchError::InvalidInput {
                provider_id,
                message,
                ..
            } => vec![ProviderFailure {
                provider_id: provider_id.clone(),
                reason: message.clone(),
            }],
            _ => Vec::new(),
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        DispatchError::InvalidRequest {
            message: message.into(),
        }
    }
}

impl From<SelectionError> for DispatchError {
    fn from(error: SelectionError) -> Self {
        match error {
            SelectionError::UnknownCapability(name) => {
                DispatchError::invalid_request(format!("unknown capability '{}'", name))
            }
            SelectionError::NoEligibleProvider {
                capability,
                exclusions,
            } => DispatchError::NoEligibleProvider {
                capability,
                exclusions,
            },
            SelectionError::BudgetExceeded {
                capability,
                exclusions,
            } => DispatchError::BudgetExceeded {
                capability,
                failures: exclusions
                    .into_iter()
                    .map(|e| ProviderFailure {
                        provider_id: e.provider_id,
                        reason: e.reason.to_string(),
                    })
                    .collect(),
                attempts: Vec::new(),
            },
        }
    }
}
