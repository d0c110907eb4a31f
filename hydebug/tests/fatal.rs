use std::{cell::RefCell, rc::Rc};

use hydebug::{
    DebugConfig, DebugError, DebugResult, DebugSession, SessionCreateInfo, Violation,
    ViolationKind, magic::FIRST_GENERATION, tests_utils::MockApi,
};

#[test]
#[should_panic(expected = "fatal error: Invalid usage of handle")]
fn run_terminates_on_violation() {
    let mut session = DebugSession::create(MockApi::new(), SessionCreateInfo::default()).unwrap();
    let _ = session.run(|session| {
        let dh = session.long_from_i64(1)?;
        session.close(dh)?;
        session.close(dh)
    });
}

#[test]
#[should_panic(expected = "generation 1")]
fn termination_message_names_the_generation() {
    let mut session = DebugSession::create(MockApi::new(), SessionCreateInfo::default()).unwrap();
    let dh = session.long_from_i64(1).unwrap();
    session.close(dh).unwrap();
    let err = session.long_as_i64(dh).unwrap_err();
    session.terminate(err);
}

#[test]
fn run_returns_recoverable_errors() {
    let mut session = DebugSession::create(
        MockApi::new(),
        SessionCreateInfo {
            config: DebugConfig {
                max_open_handles: Some(30),
                ..DebugConfig::default()
            },
            on_invalid_handle: None,
        },
    )
    .unwrap();

    let result = session.run(|session| -> DebugResult<()> {
        loop {
            session.long_from_i64(0)?;
        }
    });
    assert!(matches!(result, Err(DebugError::ResourceExhaustion(_))));
    assert_eq!(session.poisoned(), None);
    assert_eq!(session.open_handles_count(), 30);

    // The refused handle was closed in the underlying api as well.
    assert_eq!(
        session.api().open_handle_count(),
        session.open_handles(FIRST_GENERATION).len()
    );
}

#[test]
fn run_passes_success_through() {
    let mut session = DebugSession::create(MockApi::new(), SessionCreateInfo::default()).unwrap();
    let value = session
        .run(|session| {
            let dh = session.long_from_i64(41)?;
            let one = session.long_from_i64(1)?;
            let sum = session.add(dh, one)?;
            session.long_as_i64(sum)
        })
        .unwrap();
    assert_eq!(value, 42);
}

#[test]
fn callback_sees_the_violation_first() {
    let seen: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let mut session = DebugSession::create(
        MockApi::new(),
        SessionCreateInfo {
            config: DebugConfig::default(),
            on_invalid_handle: Some(Box::new(move |violation: &Violation| {
                sink.borrow_mut().push(violation.to_string())
            })),
        },
    )
    .unwrap();

    let dh = session.unicode_from_str("x").unwrap();
    session.close(dh).unwrap();
    let err = session.repr(dh).unwrap_err();

    assert_eq!(err.violation_kind(), Some(ViolationKind::StaleHandleUse));
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains(ViolationKind::StaleHandleUse.invariant()));
}
