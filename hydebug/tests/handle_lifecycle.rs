use hydebug::{
    AnyHandle, Constant, DHandle, DebugConfig, DebugError, DebugSession, SessionCreateInfo,
    UHandle, UniversalApi, ViolationKind,
    handle::{self, expect_raw, expect_wrapped, unwrap_any},
    magic::FIRST_GENERATION,
    tests_utils::MockApi,
};

fn session() -> DebugSession<MockApi> {
    DebugSession::create(MockApi::new(), SessionCreateInfo::default()).unwrap()
}

#[test]
fn unwrap_is_idempotent_while_open() {
    let mut session = session();
    let dh = session.long_from_i64(7).unwrap();
    let first = handle::unwrap(&mut session, dh).unwrap();
    for _ in 0..10 {
        assert_eq!(handle::unwrap(&mut session, dh).unwrap(), first);
    }
    assert!(session.api().is_open(first));
    assert_eq!(dh.generation(), FIRST_GENERATION);
}

#[test]
fn unwrap_after_close_is_stale() {
    let mut session = session();
    let dh = session.unicode_from_str("late").unwrap();
    session.close(dh).unwrap();

    let err = handle::unwrap(&mut session, dh).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
    assert!(err.is_fatal());
    let violation = err.violation().unwrap();
    assert_eq!(violation.generation(), Some(FIRST_GENERATION));
    assert_eq!(violation.subject(), dh.to_string());
}

#[test]
fn forwarding_a_closed_handle_never_reaches_the_api() {
    let mut session = session();
    let a = session.long_from_i64(1).unwrap();
    let b = session.long_from_i64(2).unwrap();
    session.close(a).unwrap();

    // The mock panics on closed handles; the session must stop the call first.
    let err = session.add(a, b).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
}

#[test]
fn second_close_is_a_double_close() {
    let mut session = session();
    let dh = session.float_from_f64(1.5).unwrap();
    session.close(dh).unwrap();
    let closes = session.api().close_count();

    let err = session.close(dh).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::DoubleClose));
    assert_eq!(session.api().close_count(), closes);
}

#[test]
fn handles_do_not_cross_sessions() {
    let mut first = session();
    let mut second = session();
    let dh = first.long_from_i64(3).unwrap();

    let err = handle::unwrap(&mut second, dh).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::SessionMismatch));
    assert_eq!(handle::unwrap(&mut first, dh).map(|uh| uh.is_null()).ok(), Some(false));
}

#[test]
fn null_handles_pass_through() {
    let mut session = session();
    let opened = session.stats().opened;
    assert_eq!(handle::open(&mut session, UHandle::NULL).unwrap(), DHandle::NULL);
    assert_eq!(handle::unwrap(&mut session, DHandle::NULL).unwrap(), UHandle::NULL);
    session.close(DHandle::NULL).unwrap();
    handle::free(&mut session, DHandle::NULL).unwrap();
    assert_eq!(session.stats().opened, opened);
}

#[test]
fn free_requires_a_closed_handle() {
    let mut session = session();
    let dh = session.long_from_i64(9).unwrap();
    let err = handle::free(&mut session, dh).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
}

#[test]
fn explicit_free_leaves_the_quarantine() {
    let mut session = session();
    let dh = session.long_from_i64(9).unwrap();
    session.close(dh).unwrap();
    assert_eq!(session.closed_handles_count(), 1);

    handle::free(&mut session, dh).unwrap();
    assert_eq!(session.closed_handles_count(), 0);
    assert_eq!(session.stats().freed, 1);
    session.sanity_check().unwrap();

    let err = handle::free(&mut session, dh).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
}

#[test]
fn freed_slot_reuse_does_not_revive_stale_handles() {
    let mut session = DebugSession::create(
        MockApi::new(),
        SessionCreateInfo {
            config: DebugConfig {
                closed_handles_queue_max_size: 0,
                ..DebugConfig::default()
            },
            on_invalid_handle: None,
        },
    )
    .unwrap();

    let old = session.long_from_i64(1).unwrap();
    session.close(old).unwrap();
    assert_eq!(session.stats().freed, 1);

    // Likely lands in the slot `old` used to name.
    let new = session.long_from_i64(2).unwrap();
    assert_ne!(old, new);
    let err = handle::unwrap(&mut session, old).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
}

#[test]
fn generations_are_non_decreasing() {
    let mut session = session();
    let mut last = 0;
    for round in 0..5 {
        for value in 0..4 {
            let dh = session.long_from_i64(round * 10 + value).unwrap();
            assert!(dh.generation() >= last);
            last = dh.generation();
        }
        session.new_generation();
    }
    assert_eq!(last, FIRST_GENERATION + 4);
}

#[test]
fn tagged_handles_are_checked() {
    let mut session = session();
    let dh = session.long_from_i64(5).unwrap();
    let uh = handle::unwrap(&mut session, dh).unwrap();

    assert_eq!(expect_wrapped(&mut session, AnyHandle::from(dh)).unwrap(), dh);
    assert_eq!(unwrap_any(&mut session, dh.into()).unwrap(), uh);
    assert_eq!(expect_raw(&mut session, uh.into()).unwrap(), uh);
    assert_eq!(
        expect_wrapped(&mut session, UHandle::NULL.into()).unwrap(),
        DHandle::NULL
    );

    let err = expect_wrapped(&mut session, uh.into()).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::NotAWrappedHandle));
    assert_eq!(err.violation().unwrap().generation(), None);
}

#[test]
fn wrapped_handle_where_raw_expected() {
    let mut session = session();
    let dh = session.long_from_i64(5).unwrap();
    let err = expect_raw(&mut session, AnyHandle::Wrapped(dh)).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::NotARawHandle));
}

#[test]
fn session_is_poisoned_after_a_violation() {
    let mut session = session();
    let dh = session.long_from_i64(1).unwrap();
    session.close(dh).unwrap();
    session.close(dh).unwrap_err();

    assert!(matches!(
        session.long_from_i64(2),
        Err(DebugError::Poisoned(ViolationKind::DoubleClose))
    ));
    assert!(matches!(
        session.err_occurred(),
        Err(DebugError::Poisoned(ViolationKind::DoubleClose))
    ));
}

#[test]
fn constants_survive_the_whole_session() {
    let mut session = session();
    let none = session.constant(Constant::None);
    for value in 0..100 {
        let dh = session.long_from_i64(value).unwrap();
        session.close(dh).unwrap();
    }
    let uh = handle::unwrap(&mut session, none).unwrap();
    assert_eq!(uh, session.api().constant(Constant::None));
    assert!(session.dump(none).unwrap().contains("None"));
}

#[test]
fn closing_a_constant_keeps_it_open() {
    let mut session = session();
    let none = session.constant(Constant::None);
    let closes = session.api().close_count();

    // The mock panics if a constant reaches its close.
    session.close(none).unwrap();
    handle::close(&mut session, none).unwrap();
    assert_eq!(session.api().close_count(), closes);
    assert_eq!(session.closed_handles_count(), 0);

    let uh = handle::unwrap(&mut session, none).unwrap();
    assert_eq!(uh, session.api().constant(Constant::None));
    assert_eq!(session.constant(Constant::None), none);
    session.sanity_check().unwrap();
}

#[test]
fn dup_of_a_constant_is_an_ordinary_handle() {
    let mut session = session();
    let none = session.constant(Constant::None);
    let copy = session.dup(none).unwrap();
    assert_eq!(copy.generation(), FIRST_GENERATION);

    session.close(copy).unwrap();
    let err = handle::unwrap(&mut session, copy).unwrap_err();
    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
}
