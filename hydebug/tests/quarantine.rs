use hydebug::{
    DHandle, DebugConfig, DebugSession, SessionCreateInfo, ViolationKind,
    handle,
    magic::FIRST_GENERATION,
    tests_utils::MockApi,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn session_with_quarantine(max: usize) -> DebugSession<MockApi> {
    DebugSession::create(
        MockApi::new(),
        SessionCreateInfo {
            config: DebugConfig {
                closed_handles_queue_max_size: max,
                ..DebugConfig::default()
            },
            on_invalid_handle: None,
        },
    )
    .unwrap()
}

#[test]
fn overflow_evicts_the_oldest_closed_handle() {
    let mut session = session_with_quarantine(1);

    let h1 = session.long_from_i64(1).unwrap();
    assert_eq!(h1.generation(), FIRST_GENERATION);
    session.close(h1).unwrap();
    assert_eq!(session.closed_handles_count(), 1);
    assert_eq!(session.closed_handles()[0].handle, h1);

    let h2 = session.long_from_i64(2).unwrap();
    assert_eq!(h2.generation(), FIRST_GENERATION);
    session.close(h2).unwrap();

    let quarantine = session.closed_handles();
    assert_eq!(quarantine.len(), 1);
    assert_eq!(quarantine[0].handle, h2);
    assert!(quarantine[0].is_closed);
    assert_eq!(session.stats().evicted, 1);
    assert_eq!(session.stats().freed, 1);
    session.sanity_check().unwrap();

    let err = handle::unwrap(&mut session, h1).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
}

#[test]
fn evicted_handle_is_still_a_stale_use_when_closed_again() {
    let mut session = session_with_quarantine(1);
    let h1 = session.long_from_i64(1).unwrap();
    session.close(h1).unwrap();
    let h2 = session.long_from_i64(2).unwrap();
    session.close(h2).unwrap();

    // The wrapper is gone, so this can no longer be told apart from any freed handle.
    let err = session.close(h1).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
}

#[test]
fn quarantine_keeps_fifo_order() {
    let mut session = session_with_quarantine(3);
    let handles: Vec<DHandle> = (0..5)
        .map(|value| session.long_from_i64(value).unwrap())
        .collect();
    for &dh in &handles {
        session.close(dh).unwrap();
    }

    let quarantined: Vec<DHandle> = session
        .closed_handles()
        .into_iter()
        .map(|info| info.handle)
        .collect();
    assert_eq!(quarantined, handles[2..].to_vec());
    assert_eq!(session.stats().evicted, 2);
}

#[test]
fn zero_sized_quarantine_frees_on_close() {
    let mut session = session_with_quarantine(0);
    let dh = session.long_from_i64(1).unwrap();
    session.close(dh).unwrap();
    assert_eq!(session.closed_handles_count(), 0);
    assert_eq!(session.stats().freed, 1);
    assert_eq!(session.stats().evicted, 0);
    session.sanity_check().unwrap();
}

#[test]
fn random_sequences_keep_the_queues_consistent() {
    for seed in 0..8u64 {
        let mut rng = ChaCha20Rng::seed_from_u64(0x42 + seed);
        let max = rng.random_range(0..=8);
        let mut session = session_with_quarantine(max);

        let mut open: Vec<DHandle> = Vec::new();
        let mut closed: Vec<DHandle> = Vec::new();

        for step in 0..400 {
            match rng.random_range(0..10) {
                0..=4 => open.push(session.long_from_i64(step).unwrap()),
                5..=7 if !open.is_empty() => {
                    let dh = open.swap_remove(rng.random_range(0..open.len()));
                    session.close(dh).unwrap();
                    closed.push(dh);
                }
                8 if !closed.is_empty() => {
                    // Only free what is still quarantined.
                    let quarantined: Vec<DHandle> = session
                        .closed_handles()
                        .into_iter()
                        .map(|info| info.handle)
                        .collect();
                    if !quarantined.is_empty() {
                        let dh = quarantined[rng.random_range(0..quarantined.len())];
                        handle::free(&mut session, dh).unwrap();
                    }
                }
                9 if rng.random_bool(0.5) => {
                    session.new_generation();
                }
                _ => {}
            }

            assert!(session.closed_handles_count() <= max);
            session.sanity_check().unwrap();
        }

        let stats = session.stats();
        assert_eq!(stats.closed as usize, closed.len());
        assert_eq!(
            stats.closed - stats.freed,
            session.closed_handles_count() as u64
        );
        assert!(stats.evicted <= stats.freed);
        assert_eq!(session.open_handles(FIRST_GENERATION).len(), open.len());
        assert_eq!(session.api().open_handle_count(), open.len());

        for &dh in &open {
            let uh = handle::unwrap(&mut session, dh).unwrap();
            assert!(session.api().is_open(uh));
        }
    }
}

#[test]
fn leak_check_is_scoped_by_generation() {
    let mut session = session_with_quarantine(16);
    let before = session.long_from_i64(1).unwrap();
    let since = session.new_generation();
    let during = session.long_from_i64(2).unwrap();
    let closed = session.long_from_i64(3).unwrap();
    session.close(closed).unwrap();

    let leaks = session.open_handles(since);
    assert_eq!(leaks.len(), 1);
    assert_eq!(leaks[0].handle, during);
    assert!(session.check_leaks(since).is_err());

    session.close(during).unwrap();
    session.check_leaks(since).unwrap();
    assert_eq!(session.open_handles(FIRST_GENERATION)[0].handle, before);
}
