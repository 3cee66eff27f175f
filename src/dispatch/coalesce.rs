//! Idempotency-key coalescing.
//!
//! The first request for a key becomes the leader and owns the provider
//! call; later requests with the same key await the leader's shared future.
//! A successful outcome stays replayable until the TTL lapses. Failures are
//! forgotten as soon as they resolve so the next request starts fresh.
//! Expired and abandoned slots are swept at most once per TTL.

use crate::clock::SharedClock;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outcome future shared between a leader and its joiners.
pub type SharedOutcome<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// How a request was attached to a key.
pub enum Joined<T: Clone, E: Clone> {
    /// This request started the call
    Lead(SharedOutcome<T, E>),
    /// Another request's call is in flight
    Join(SharedOutcome<T, E>),
    /// A recent call for this key already succeeded
    Replay(T),
}

enum Slot<T: Clone, E: Clone> {
    InFlight {
        generation: u64,
        future: WeakShared<BoxFuture<'static, Result<T, E>>>,
    },
    Done {
        value: T,
        completed_at: DateTime<Utc>,
    },
}

pub struct Coalescer<T: Clone, E: Clone> {
    slots: Arc<DashMap<String, Slot<T, E>>>,
    generation: AtomicU64,
    ttl: chrono::Duration,
    clock: SharedClock,
    last_sweep: Mutex<DateTime<Utc>>,
}

impl<T, E> Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: chrono::Duration, clock: SharedClock) -> Self {
        let last_sweep = Mutex::new(clock.now());
        Self {
            slots: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
            clock,
            last_sweep,
        }
    }

    /// Attach to the call for `key`, starting one with `start` if none is live.
    ///
    /// The lookup and insert happen under the key's shard lock, so two
    /// concurrent requests can never both become leader.
    pub fn join_or_lead<F>(&self, key: &str, start: F) -> Joined<T, E>
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, E>>,
    {
        let now = self.clock.now();
        self.sweep(now);
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let live = match occupied.get() {
                    Slot::Done {
                        value,
                        completed_at,
                    } if now - *completed_at < self.ttl => Some(Joined::Replay(value.clone())),
                    Slot::InFlight { future, .. } => future.upgrade().map(Joined::Join),
                    Slot::Done { .. } => None,
                };
                if let Some(joined) = live {
                    return joined;
                }
                let (slot, shared) = self.lead(key, start);
                match slot {
                    Some(slot) => {
                        occupied.insert(slot);
                    }
                    None => {
                        occupied.remove();
                    }
                }
                Joined::Lead(shared)
            }
            Entry::Vacant(vacant) => {
                let (slot, shared) = self.lead(key, start);
                if let Some(slot) = slot {
                    vacant.insert(slot);
                }
                Joined::Lead(shared)
            }
        }
    }

    fn lead<F>(&self, key: &str, start: F) -> (Option<Slot<T, E>>, SharedOutcome<T, E>)
    where
        F: FnOnce() -> BoxFuture<'static, Result<T, E>>,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let slots = Arc::clone(&self.slots);
        let clock = Arc::clone(&self.clock);
        let key = key.to_string();
        let call = start();

        let tracked: BoxFuture<'static, Result<T, E>> = async move {
            let outcome = call.await;
            let settled = match &outcome {
                Ok(value) => Some(value.clone()),
                Err(_) => None,
            };
            if let Entry::Occupied(mut occupied) = slots.entry(key) {
                let current = matches!(
                    occupied.get(),
                    Slot::InFlight { generation: g, .. } if *g == generation
                );
                if current {
                    match settled {
                        Some(value) => {
                            occupied.insert(Slot::Done {
                                value,
                                completed_at: clock.now(),
                            });
                        }
                        None => {
                            occupied.remove();
                        }
                    }
                }
            }
            outcome
        }
        .boxed();

        let shared = tracked.shared();
        let slot = shared
            .downgrade()
            .map(|future| Slot::InFlight { generation, future });
        (slot, shared)
    }

    /// Drop replay slots past their TTL and in-flight slots nobody awaits.
    ///
    /// Runs before the key's entry is taken; `retain` locks every shard.
    fn sweep(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_sweep.lock();
            if now - *last < self.ttl {
                return;
            }
            *last = now;
        }
        let before = self.slots.len();
        self.slots.retain(|_, slot| match slot {
            Slot::Done { completed_at, .. } => now - *completed_at < self.ttl,
            Slot::InFlight { future, .. } => future.upgrade().is_some(),
        });
        let swept = before.saturating_sub(self.slots.len());
        if swept > 0 {
            tracing::debug!(swept, "Swept idempotency slots");
        }
    }

    /// Number of keys currently tracked (in flight or replayable).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn coalescer(clock: Arc<ManualClock>) -> Coalescer<String, String> {
        Coalescer::new(chrono::Duration::seconds(60), clock)
    }

    fn counted(
        calls: &Arc<AtomicUsize>,
        outcome: Result<String, String>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, String>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                outcome
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_call() {
        let clock = Arc::new(ManualClock::new());
        let coalescer = coalescer(clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = coalescer.join_or_lead("k", counted(&calls, Ok("done".into())));
        let second = coalescer.join_or_lead("k", counted(&calls, Ok("other".into())));

        let (Joined::Lead(lead), Joined::Join(join)) = (first, second) else {
            panic!("expected one leader and one joiner");
        };
        let (a, b) = tokio::join!(lead, join);
        assert_eq!(a, Ok("done".to_string()));
        assert_eq!(b, Ok("done".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_is_replayed_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let coalescer = coalescer(Arc::clone(&clock));
        let calls = Arc::new(AtomicUsize::new(0));

        let Joined::Lead(lead) = coalescer.join_or_lead("k", counted(&calls, Ok("v1".into())))
        else {
            panic!("expected leader");
        };
        assert_eq!(lead.await, Ok("v1".to_string()));

        clock.advance(chrono::Duration::seconds(30));
        match coalescer.join_or_lead("k", counted(&calls, Ok("v2".into()))) {
            Joined::Replay(value) => assert_eq!(value, "v1"),
            _ => panic!("expected replay"),
        }

        clock.advance(chrono::Duration::seconds(31));
        assert!(matches!(
            coalescer.join_or_lead("k", counted(&calls, Ok("v2".into()))),
            Joined::Lead(_)
        ));
    }

    #[tokio::test]
    async fn test_failure_is_not_replayed() {
        let clock = Arc::new(ManualClock::new());
        let coalescer = coalescer(clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let Joined::Lead(lead) = coalescer.join_or_lead("k", counted(&calls, Err("boom".into())))
        else {
            panic!("expected leader");
        };
        assert_eq!(lead.await, Err("boom".to_string()));
        assert!(coalescer.is_empty());

        assert!(matches!(
            coalescer.join_or_lead("k", counted(&calls, Ok("v".into()))),
            Joined::Lead(_)
        ));
    }

    #[tokio::test]
    async fn test_abandoned_call_is_replaced() {
        let clock = Arc::new(ManualClock::new());
        let coalescer = coalescer(clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = coalescer.join_or_lead("k", counted(&calls, Ok("v".into())));
        drop(first);

        assert!(matches!(
            coalescer.join_or_lead("k", counted(&calls, Ok("v".into()))),
            Joined::Lead(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_slots_are_swept() {
        let clock = Arc::new(ManualClock::new());
        let coalescer = coalescer(Arc::clone(&clock));
        let calls = Arc::new(AtomicUsize::new(0));

        for i in 0..50 {
            let Joined::Lead(lead) =
                coalescer.join_or_lead(&format!("key-{i}"), counted(&calls, Ok("v".into())))
            else {
                panic!("expected leader");
            };
            lead.await.unwrap();
        }
        assert_eq!(coalescer.len(), 50);

        clock.advance(chrono::Duration::days(365));
        let next = coalescer.join_or_lead("fresh", counted(&calls, Ok("v".into())));
        assert_eq!(coalescer.len(), 1);
        drop(next);
    }

    #[tokio::test]
    async fn test_live_replay_survives_sweep() {
        let clock = Arc::new(ManualClock::new());
        let coalescer = coalescer(Arc::clone(&clock));
        let calls = Arc::new(AtomicUsize::new(0));

        let Joined::Lead(old) = coalescer.join_or_lead("old", counted(&calls, Ok("v".into())))
        else {
            panic!("expected leader");
        };
        old.await.unwrap();
        clock.advance(chrono::Duration::seconds(45));
        let Joined::Lead(recent) =
            coalescer.join_or_lead("recent", counted(&calls, Ok("v".into())))
        else {
            panic!("expected leader");
        };
        recent.await.unwrap();

        clock.advance(chrono::Duration::seconds(30));
        let _ = coalescer.join_or_lead("other", counted(&calls, Ok("v".into())));
        assert!(matches!(
            coalescer.join_or_lead("recent", counted(&calls, Ok("v".into()))),
            Joined::Replay(_)
        ));
        assert!(matches!(
            coalescer.join_or_lead("old", counted(&calls, Ok("v".into()))),
            Joined::Lead(_)
        ));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let clock = Arc::new(ManualClock::new());
        let coalescer = coalescer(clock);
        let calls = Arc::new(AtomicUsize::new(0));

        assert!(matches!(
            coalescer.join_or_lead("a", counted(&calls, Ok("v".into()))),
            Joined::Lead(_)
        ));
        assert!(matches!(
            coalescer.join_or_lead("b", counted(&calls, Ok("v".into()))),
            Joined::Lead(_)
        ));
        assert_eq!(coalescer.len(), 2);
    }
}
