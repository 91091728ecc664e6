//! Event tests for qp-core
//! These tests run on x86 host with std for testing, but verify no_std compatible code

use qp_core::{QError, QEvt, QSignal, ENTRY_EVT, EXIT_EVT, INIT_EVT};

static TIMEOUT: QEvt = QEvt::new(QSignal::new(10));

#[test]
fn test_static_event_in_static_storage() {
    assert_eq!(TIMEOUT.sig(), QSignal::new(10));
    assert!(!TIMEOUT.is_dynamic());
}

#[test]
fn test_reserved_signals() {
    assert_eq!(ENTRY_EVT.sig(), QSignal::ENTRY);
    assert_eq!(EXIT_EVT.sig(), QSignal::EXIT);
    assert_eq!(INIT_EVT.sig(), QSignal::INIT);
    assert!(QSignal::INIT.is_reserved());
    assert!(!QSignal::USER.is_reserved());
}

#[test]
fn test_user_signal_numbering() {
    assert_eq!(QSignal::user(0), Ok(QSignal::USER));
    assert_eq!(QSignal::user(3), Ok(QSignal::new(7)));
    assert_eq!(QSignal::user(u16::MAX), Err(QError::InvalidSignal));
}

#[test]
fn test_signal_equality() {
    let sig1 = QSignal::new(42);
    let sig2 = QSignal::new(42);
    assert_eq!(sig1, sig2);
    assert_ne!(sig1, QSignal::new(43));
}
