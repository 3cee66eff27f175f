//! Error types for candidate selection

use super::Exclusion;
use thiserror::Error;

/// Errors that can occur during candidate selection
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    /// The capability is not declared in the registry
    #[error("Capability '{0}' is not registered")]
    UnknownCapability(String),

    /// Every provider was excluded, at least one for a non-budget reason
    #[error("No eligible provider for capability '{capability}'")]
    NoEligibleProvider {
        capability: String,
        exclusions: Vec<Exclusion>,
    },

    /// Every provider was excluded for budget reasons only
    #[error("Budget exceeded for every provider of capability '{capability}'")]
    BudgetExceeded {
        capability: String,
        exclusions: Vec<Exclusion>,
    },
}

impl SelectionError {
    pub fn exclusions(&self) -> &[Exclusion] {
        match self {
            SelectionError::UnknownCapability(_) => &[],
            SelectionError::NoEligibleProvider { exclusions, .. }
            | SelectionError::BudgetExceeded { exclusions, .. } => exclusions,
        }
    }
}
