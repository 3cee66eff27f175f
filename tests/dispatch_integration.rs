//! End-to-end dispatch scenarios against scripted providers.

mod common;

use common::{harness, MockAdapter, Step, TWO_PROVIDERS};
use conduit::dispatch::{AttemptOutcome, DispatchError};
use conduit::health::CircuitState;
use conduit::registry::CostModel;
use conduit::request::{CapabilityRequest, Constraints, Payload};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn classify(text: &str) -> CapabilityRequest {
    CapabilityRequest::new("text_classification", Payload::text(text))
}

/// Cost is the only ranking signal, so the order never drifts with samples.
fn cost_only(config: &str) -> String {
    format!(
        "[selection.weights]\ncost = 1.0\nlatency = 0.0\nsuccess = 0.0\n{}",
        config
    )
}

#[tokio::test]
async fn test_cheapest_provider_serves_request() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::healthy("cheap", 0.1),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    let response = h.dispatcher.submit(classify("refund")).await.unwrap();

    assert_eq!(response.provider_used, "cheap");
    assert_eq!(response.result.as_text(), Some("cheap ok"));
    assert_eq!(response.cost, 0.1);
    assert_eq!(response.attempts.len(), 1);
    assert_eq!(response.attempts[0].outcome, AttemptOutcome::Success);
    assert_eq!(h.adapter("premium").calls(), 0);
}

#[tokio::test]
async fn test_primary_failure_falls_back() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::healthy("cheap", 0.1).with_script([Step::Fail]),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    let response = h.dispatcher.submit(classify("refund")).await.unwrap();

    assert_eq!(response.provider_used, "premium");
    let outcomes: Vec<_> = response.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(outcomes, vec![AttemptOutcome::Failed, AttemptOutcome::Success]);
    assert_eq!(response.attempts[0].provider_id, "cheap");

    // Only the successful provider is billed
    assert_eq!(h.dispatcher.budget().snapshot("cheap").spend_accumulated, 0.0);
    assert_eq!(h.dispatcher.budget().snapshot("premium").spend_accumulated, 1.0);
    assert_eq!(h.dispatcher.budget().snapshot("cheap").reserved, 0.0);
}

#[tokio::test]
async fn test_circuit_opens_then_recovers_through_probe() {
    let h = harness(
        &cost_only(TWO_PROVIDERS),
        vec![
            MockAdapter::healthy("cheap", 0.1).with_script([Step::Fail, Step::Fail, Step::Fail]),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    for _ in 0..3 {
        let response = h.dispatcher.submit(classify("refund")).await.unwrap();
        assert_eq!(response.provider_used, "premium");
    }
    assert_eq!(h.dispatcher.health().circuit_state("cheap"), CircuitState::Open);

    // Open circuit: cheap is skipped entirely
    let response = h.dispatcher.submit(classify("refund")).await.unwrap();
    assert_eq!(response.provider_used, "premium");
    assert_eq!(response.attempts.len(), 1);
    assert_eq!(h.adapter("cheap").calls(), 3);

    // After the cooldown one probe is let through and closes the circuit
    h.clock.advance(chrono::Duration::seconds(31));
    let response = h.dispatcher.submit(classify("refund")).await.unwrap();
    assert_eq!(response.provider_used, "cheap");
    assert_eq!(h.adapter("cheap").calls(), 4);
    assert_eq!(
        h.dispatcher.health().circuit_state("cheap"),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn test_spend_cap_diverts_until_window_rolls_over() {
    let config = TWO_PROVIDERS.replace(
        "latency_ms = 300\nlanguages = [\"en\"]",
        "latency_ms = 300\nlanguages = [\"en\"]\nspend_cap = 0.25",
    );
    let h = harness(
        &cost_only(&config),
        vec![
            MockAdapter::healthy("cheap", 0.1),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    for _ in 0..2 {
        let response = h.dispatcher.submit(classify("refund")).await.unwrap();
        assert_eq!(response.provider_used, "cheap");
    }

    // 0.2 spent; another 0.1 would cross the 0.25 cap
    let response = h.dispatcher.submit(classify("refund")).await.unwrap();
    assert_eq!(response.provider_used, "premium");
    assert!(h.dispatcher.budget().snapshot("cheap").spend_accumulated <= 0.25);

    h.clock.advance(chrono::Duration::seconds(3600));
    let response = h.dispatcher.submit(classify("refund")).await.unwrap();
    assert_eq!(response.provider_used, "cheap");
}

#[tokio::test]
async fn test_request_rate_limit_diverts_traffic() {
    let config = TWO_PROVIDERS.replace(
        "latency_ms = 300\nlanguages = [\"en\"]",
        "latency_ms = 300\nlanguages = [\"en\"]\nmax_requests_per_window = 2",
    );
    let h = harness(
        &cost_only(&config),
        vec![
            MockAdapter::healthy("cheap", 0.1),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    let mut used = Vec::new();
    for _ in 0..3 {
        used.push(h.dispatcher.submit(classify("refund")).await.unwrap().provider_used);
    }
    assert_eq!(used, vec!["cheap", "cheap", "premium"]);
}

#[tokio::test]
async fn test_max_cost_excludes_fallback() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::healthy("cheap", 0.1).with_script([Step::Fail]),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    let request = classify("refund").with_constraints(Constraints::default().with_max_cost(0.5));
    let err = h.dispatcher.submit(request).await.unwrap_err();

    assert_eq!(err.code(), "all_providers_exhausted");
    assert_eq!(err.attempts().len(), 1);
    assert_eq!(h.adapter("premium").calls(), 0);
}

#[tokio::test]
async fn test_language_filters_candidates() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::healthy("cheap", 0.1),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    let request = classify("Rückerstattung").with_constraints(Constraints::default().with_language("de"));
    let response = h.dispatcher.submit(request).await.unwrap();
    assert_eq!(response.provider_used, "premium");
    assert_eq!(
        h.adapter("premium").languages_seen(),
        vec![Some("de".to_string())]
    );

    let request = classify("remboursement").with_constraints(Constraints::default().with_language("fr"));
    let err = h.dispatcher.submit(request).await.unwrap_err();
    match err {
        DispatchError::NoEligibleProvider { exclusions, .. } => assert_eq!(exclusions.len(), 2),
        other => panic!("expected no_eligible_provider, got {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_idempotent_requests_share_one_call() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::healthy("cheap", 0.1).with_delay(Duration::from_millis(50)),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    let request = classify("refund")
        .with_constraints(Constraints::default().with_idempotency_key("order-42"));
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let dispatcher = h.dispatcher.clone();
            let request = request.clone();
            tokio::spawn(async move { dispatcher.submit(request).await })
        })
        .collect();

    let mut coalesced = 0;
    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.provider_used, "cheap");
        if response.coalesced {
            coalesced += 1;
            assert_eq!(response.cost, 0.0);
        }
    }

    assert_eq!(h.adapter("cheap").calls(), 1);
    assert_eq!(coalesced, 4);
    assert_eq!(h.dispatcher.budget().snapshot("cheap").spend_accumulated, 0.1);
}

#[tokio::test]
async fn test_cacheable_capability_served_from_cache_until_ttl() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::healthy("cheap", 0.1),
            MockAdapter::healthy("premium", 1.0),
        ],
    );
    let request = CapabilityRequest::new("summarization", Payload::text("long document"));

    let first = h.dispatcher.submit(request.clone()).await.unwrap();
    assert!(!first.cached);

    let second = h.dispatcher.submit(request.clone()).await.unwrap();
    assert!(second.cached);
    assert!(second.attempts.is_empty());
    assert_eq!(second.provider_used, "cheap");
    assert_eq!(second.result, first.result);
    assert_eq!(h.adapter("cheap").calls(), 1);

    h.clock.advance(chrono::Duration::seconds(61));
    let third = h.dispatcher.submit(request).await.unwrap();
    assert!(!third.cached);
    assert_eq!(h.adapter("cheap").calls(), 2);
}

#[tokio::test]
async fn test_rejected_input_is_not_retried() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::healthy("cheap", 0.1).with_script([Step::Reject]),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    let err = h.dispatcher.submit(classify("???")).await.unwrap_err();

    assert_eq!(err.code(), "invalid_input");
    assert_eq!(err.attempts()[0].outcome, AttemptOutcome::Rejected);
    assert_eq!(h.adapter("premium").calls(), 0);
    // Bad input is not the provider's fault
    assert_eq!(h.dispatcher.health().snapshot("cheap").consecutive_failures, 0);
}

#[tokio::test]
async fn test_every_provider_timing_out_exhausts_request() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::new("cheap", CostModel::PerCall { price: 0.1 }, Step::Hang),
            MockAdapter::new("premium", CostModel::PerCall { price: 1.0 }, Step::Hang),
        ],
    );

    let err = h.dispatcher.submit(classify("refund")).await.unwrap_err();

    assert_eq!(err.code(), "all_providers_exhausted");
    assert!(err
        .attempts()
        .iter()
        .all(|a| a.outcome == AttemptOutcome::Timeout));
    assert_eq!(err.provider_failures().len(), 2);
    assert_eq!(h.dispatcher.budget().snapshot("cheap").reserved, 0.0);
    assert_eq!(h.dispatcher.budget().snapshot("premium").reserved, 0.0);
}

#[tokio::test]
async fn test_cancellation_releases_reservation_without_penalty() {
    let h = harness(
        TWO_PROVIDERS,
        vec![
            MockAdapter::healthy("cheap", 0.1).with_delay(Duration::from_millis(150)),
            MockAdapter::healthy("premium", 1.0),
        ],
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let err = h
        .dispatcher
        .submit_with_cancel(classify("refund"), cancel)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "cancelled");
    assert_eq!(h.adapter("premium").calls(), 0);
    assert_eq!(h.dispatcher.budget().snapshot("cheap").reserved, 0.0);
    assert_eq!(h.dispatcher.budget().snapshot("cheap").spend_accumulated, 0.0);
    assert_eq!(h.dispatcher.health().snapshot("cheap").consecutive_failures, 0);
}
