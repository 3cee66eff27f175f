//! Conduit - multi-provider AI capability orchestrator
//!
//! This library routes abstract capability requests (speech-to-text, text
//! classification, recommendations, ...) to interchangeable third-party AI
//! providers, choosing by cost and latency, falling back on failure and
//! enforcing per-provider budgets.

pub mod adapter;
pub mod api;
pub mod budget;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod request;
pub mod selection;
