use core::time::Duration;
use std::{collections::HashSet, sync::Arc, thread::scope};

use crate::{
    Error, GeneratorConfig, IdSource, Identity, LeaseGenerator, LeaseSnowflakeId, ManualClock,
    MemoryRegistry, MonotonicClock, Poll, RegistryError, SnowflakeId, Status,
};

type TestRegistry = Arc<MemoryRegistry<ManualClock>>;
type TestGenerator = LeaseGenerator<TestRegistry, ManualClock>;

const SECOND: Duration = Duration::from_secs(1);

fn config(max_workers: u64) -> GeneratorConfig {
    GeneratorConfig::default()
        .with_max_workers(max_workers)
        .with_acquire_attempts(1)
}

fn registry(clock: &ManualClock) -> TestRegistry {
    Arc::new(MemoryRegistry::new(clock.clone()))
}

async fn start(
    registry: &TestRegistry,
    clock: &ManualClock,
    identity: impl Into<Identity>,
    config: GeneratorConfig,
) -> crate::Result<TestGenerator> {
    LeaseGenerator::with_clock(config, registry.clone(), identity.into(), clock.clone()).await
}

#[tokio::test]
async fn ids_are_distinct_and_increasing() {
    let clock = ManualClock::new(1_000);
    let registry = registry(&clock);
    let generator = start(&registry, &clock, "a", config(4)).await.unwrap();

    let mut last = None;
    for n in 0..5_000 {
        if n % 1_000 == 0 {
            clock.advance(Duration::from_millis(1));
        }
        let id = generator.next_id().unwrap();
        if let Some(last) = last {
            assert!(id > last, "{id} did not increase past {last}");
        }
        last = Some(id);
    }
}

#[tokio::test]
async fn decoded_ids_recover_their_fields() {
    let clock = ManualClock::new(7_777);
    let registry = registry(&clock);
    let _first = start(&registry, &clock, "a", config(4)).await.unwrap();
    let generator = start(&registry, &clock, "b", config(4)).await.unwrap();

    let a = generator.next_id().unwrap();
    let b = generator.next_id().unwrap();
    let components = b.components();
    assert_eq!(components.timestamp, 7_777);
    assert_eq!(components.machine_id, 1);
    assert_eq!(components.sequence, a.sequence() + 1);
    assert_eq!(
        LeaseSnowflakeId::from_components(
            components.timestamp,
            components.machine_id,
            components.sequence
        ),
        b
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_callers_never_collide() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 10_000;

    let registry = Arc::new(MemoryRegistry::new(ManualClock::new(0)));
    let generator = LeaseGenerator::with_clock(
        config(4),
        registry,
        Identity::random(),
        MonotonicClock::default(),
    )
    .await
    .unwrap();

    let seen = std::sync::Mutex::new(HashSet::with_capacity(THREADS * PER_THREAD));
    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let ids: Vec<_> = (0..PER_THREAD)
                    .map(|_| generator.next_id().unwrap())
                    .collect();
                let mut seen = seen.lock().unwrap();
                for id in ids {
                    assert!(seen.insert(id), "duplicate id {id}");
                }
            });
        }
    });
    assert_eq!(seen.lock().unwrap().len(), THREADS * PER_THREAD);
}

#[tokio::test]
async fn one_more_generator_than_slots_gets_no_worker_id() {
    const N: u64 = 4;
    let clock = ManualClock::new(0);
    let registry = registry(&clock);

    let results = futures::future::join_all(
        (0..=N).map(|n| start(&registry, &clock, format!("p{n}"), config(N))),
    )
    .await;

    let mut slots: Vec<u64> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter_map(|g| g.worker_id())
        .collect();
    slots.sort_unstable();
    assert_eq!(slots, [0, 1, 2, 3]);

    let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(failures, [&Error::NoAvailableWorkerId { max_workers: N }]);
}

#[tokio::test]
async fn ordered_starts_fill_the_first_free_slot() {
    let clock = ManualClock::new(0);
    let registry = registry(&clock);

    let g0 = start(&registry, &clock, "g0", config(4)).await.unwrap();
    let g1 = start(&registry, &clock, "g1", config(4)).await.unwrap();
    let g2 = start(&registry, &clock, "g2", config(4)).await.unwrap();
    let g3 = start(&registry, &clock, "g3", config(4)).await.unwrap();

    assert_eq!(g0.worker_id(), Some(0));
    assert_eq!(g1.worker_id(), Some(1));
    assert_eq!(g2.worker_id(), Some(2));
    assert_eq!(g3.worker_id(), Some(3));
    assert_eq!(registry.holder("/snowflake/worker/2").as_deref(), Some("g2"));
}

#[tokio::test]
async fn construction_fails_when_every_slot_is_held() {
    let clock = ManualClock::new(0);
    let registry = registry(&clock);
    let _a = start(&registry, &clock, "a", config(2)).await.unwrap();
    let _b = start(&registry, &clock, "b", config(2)).await.unwrap();

    assert_eq!(
        start(&registry, &clock, "c", config(2)).await.unwrap_err(),
        Error::NoAvailableWorkerId { max_workers: 2 }
    );
}

#[tokio::test(start_paused = true)]
async fn construction_retries_until_a_slot_frees() {
    let clock = ManualClock::new(0);
    let registry = registry(&clock);
    let _holder = start(&registry, &clock, "a", config(1)).await.unwrap();

    let retrying = config(1)
        .with_acquire_attempts(3)
        .with_acquire_backoff(Duration::from_millis(100));
    let pending = tokio::spawn({
        let (registry, clock) = (registry.clone(), clock.clone());
        async move { start(&registry, &clock, "b", retrying).await }
    });

    // The first attempt has failed and the task is in its backoff.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(registry.evict("/snowflake/worker/0"));

    let generator = pending.await.unwrap().unwrap();
    assert_eq!(generator.worker_id(), Some(0));
    assert_eq!(generator.last_error(), None);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_touching_the_registry() {
    let clock = ManualClock::new(0);
    let registry = registry(&clock);

    for config in [
        config(0),
        config(LeaseSnowflakeId::max_workers() + 1),
        config(4).with_safety_margin(Duration::from_secs(12)),
        config(4).with_registry_timeout(3 * SECOND),
    ] {
        assert!(matches!(
            start(&registry, &clock, "a", config).await,
            Err(Error::InvalidConfig { .. })
        ));
    }
    assert_eq!(registry.live_leases(), 0);
}

#[tokio::test]
async fn clock_rollback_is_surfaced_to_the_caller() {
    let clock = ManualClock::new(1_000);
    let registry = registry(&clock);
    let generator = start(&registry, &clock, "a", config(4)).await.unwrap();

    generator.next_id().unwrap();
    clock.rewind(Duration::from_millis(5));
    assert_eq!(
        generator.next_id(),
        Err(Error::ClockRollback {
            last_millis: 1_000,
            now_millis: 995
        })
    );
    // Rollback is the caller's problem; the lease is untouched.
    assert_eq!(generator.status(), Status::Running);

    clock.advance(Duration::from_millis(6));
    assert_eq!(generator.next_id().unwrap().timestamp(), 1_001);
}

#[tokio::test]
async fn lapsed_lease_is_never_held_by_two_generators() {
    let clock = ManualClock::new(0);
    let registry = registry(&clock);
    let a = start(&registry, &clock, "a", config(1)).await.unwrap();

    // 11s without a renewal: the lease is still live, so nobody else may
    // take the slot.
    clock.advance(11 * SECOND);
    assert_eq!(
        start(&registry, &clock, "b", config(1)).await.unwrap_err(),
        Error::NoAvailableWorkerId { max_workers: 1 }
    );
    assert_eq!(a.worker_id(), Some(0));
    a.next_id().unwrap();

    // At 12s the registry forgets the lease and `a` stops on its own.
    clock.advance(SECOND);
    let b = start(&registry, &clock, "b", config(1)).await.unwrap();
    assert_eq!(b.worker_id(), Some(0));
    assert_eq!(a.worker_id(), None);
    assert_eq!(a.status(), Status::Stopped);
    assert_eq!(a.next_id(), Err(Error::NotRunning));
}

#[tokio::test]
async fn lease_deadline_stops_generation() {
    let clock = ManualClock::new(0);
    let registry = registry(&clock);
    let generator = start(&registry, &clock, "a", config(2)).await.unwrap();

    clock.advance(12 * SECOND);
    assert_eq!(generator.next_id(), Err(Error::NotRunning));
    assert_eq!(
        generator.last_error(),
        Some(Error::LeaseExpired { worker_id: 0 })
    );

    // The next tick starts over with a fresh acquisition.
    generator.tick().await.unwrap();
    assert_eq!(generator.status(), Status::Running);
    assert_eq!(generator.worker_id(), Some(0));
    assert_eq!(generator.last_error(), None);
    generator.next_id().unwrap();
}

#[tokio::test]
async fn takeover_is_detected_on_renewal() {
    let clock = ManualClock::new(0);
    let registry = registry(&clock);
    let a = start(&registry, &clock, "a", config(1)).await.unwrap();

    // A store-side eviction lets `b` in while `a` still believes it holds
    // the slot.
    registry.evict("/snowflake/worker/0");
    let _b = start(&registry, &clock, "b", config(1)).await.unwrap();

    assert_eq!(
        a.tick().await,
        Err(Error::LeaseLost {
            key: "/snowflake/worker/0".into(),
            holder: Some("b".into()),
        })
    );
    assert_eq!(a.status(), Status::Stopped);
    assert_eq!(a.next_id(), Err(Error::NotRunning));

    // Every slot is taken, so retrying keeps it stopped.
    assert_eq!(
        a.tick().await,
        Err(Error::NoAvailableWorkerId { max_workers: 1 })
    );
    assert_eq!(
        a.last_error(),
        Some(Error::NoAvailableWorkerId { max_workers: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn unreachable_registry_stops_then_recovers() {
    let clock = ManualClock::new(1_000);
    let registry = registry(&clock);
    let generator = start(&registry, &clock, "a", config(4)).await.unwrap();
    let period = generator.keepalive_period();
    let keepalive = generator.spawn_keepalive();

    registry.set_available(false);
    tokio::time::sleep(period + Duration::from_millis(1)).await;
    assert_eq!(generator.status(), Status::Stopped);
    assert_eq!(generator.next_id(), Err(Error::NotRunning));
    assert!(matches!(
        generator.last_error(),
        Some(Error::RegistryUnavailable(RegistryError::Unavailable { .. }))
    ));

    registry.set_available(true);
    tokio::time::sleep(period).await;
    assert_eq!(generator.status(), Status::Running);
    // The lease never lapsed in the registry, so the old slot is resumed.
    assert_eq!(generator.worker_id(), Some(0));
    assert_eq!(registry.live_leases(), 1);
    generator.next_id().unwrap();

    keepalive.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_registry_counts_as_unavailable() {
    let clock = ManualClock::new(0);
    let registry = registry(&clock);
    let generator = start(&registry, &clock, "a", config(4)).await.unwrap();

    registry.set_latency(5 * SECOND);
    assert_eq!(
        generator.tick().await,
        Err(Error::RegistryUnavailable(RegistryError::Timeout { after: SECOND }))
    );
    assert_eq!(generator.status(), Status::Stopped);
}

#[tokio::test(start_paused = true)]
async fn renewal_returning_after_the_deadline_does_not_resume() {
    // The registry keeps its own clock so the lease stays live there while
    // the local clock jumps a full TTL during the call.
    let clock = ManualClock::new(0);
    let registry = registry(&ManualClock::new(0));
    let generator = start(&registry, &clock, "a", config(4)).await.unwrap();

    registry.set_latency(Duration::from_millis(500));
    let (outcome, ()) = tokio::join!(generator.tick(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        clock.advance(12 * SECOND);
    });
    assert_eq!(outcome, Err(Error::LeaseExpired { worker_id: 0 }));
    assert_eq!(generator.status(), Status::Stopped);
    assert_eq!(generator.next_id(), Err(Error::NotRunning));

    // A timely call resumes the same slot.
    registry.set_latency(Duration::ZERO);
    generator.tick().await.unwrap();
    assert_eq!(generator.status(), Status::Running);
    assert_eq!(generator.worker_id(), Some(0));
    assert_eq!(generator.last_error(), None);
}

#[tokio::test]
async fn poll_and_async_apis_share_state() {
    let clock = ManualClock::new(500);
    let registry = registry(&clock);
    let generator = start(&registry, &clock, "a", config(4)).await.unwrap();

    let first = match generator.try_poll_id().unwrap() {
        Poll::Ready { id } => id,
        Poll::Pending { yield_for } => panic!("unexpected pending ({yield_for})"),
    };
    let second = generator.next_id_async().await.unwrap();
    assert_eq!(second.sequence(), first.sequence() + 1);
}

#[tokio::test]
async fn clones_and_trait_objects_share_the_lease() {
    let clock = ManualClock::new(500);
    let registry = registry(&clock);
    let generator = start(&registry, &clock, "a", config(4)).await.unwrap();
    let source: Arc<dyn IdSource> = Arc::new(generator.clone());

    let raw = source.next_raw_id().unwrap();
    let id = generator.next_id().unwrap();
    assert_eq!(LeaseSnowflakeId::from_raw(raw).sequence() + 1, id.sequence());
    assert_eq!(source.status(), Status::Running);
    assert_eq!(source.worker_id(), Some(0));
    assert_eq!(source.last_error(), None);
}
