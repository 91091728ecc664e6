//! Time event tests for qp-qf

mod common;

use common::*;
use qp_core::{QPriority, QSignal};
use qp_qf::{ActiveObject, QActive, QFramework, QTicker, QTimeEvt};

fn time_evt(owner: &'static ActiveObject<Recorder>, tick_rate: u8) -> &'static QTimeEvt {
    let te: &'static QTimeEvt = Box::leak(Box::new(QTimeEvt::unbound(SIG_TIMEOUT, tick_rate)));
    te.bind(owner);
    te
}

/// Tick `n` times, running every posted event in between
fn ticks(qf: &QFramework, n: usize) {
    for _ in 0..n {
        qf.tick(0);
        run_all(qf);
    }
}

fn timeouts(ao: &ActiveObject<Recorder>) -> usize {
    seen(ao).iter().filter(|s| **s == SIG_TIMEOUT.raw()).count()
}

#[test]
fn test_one_shot_expires_once() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);
    assert!(qf.no_time_evts_active(0));

    te.arm(3, 0);
    assert_eq!(te.ctr(), 3);
    assert!(!qf.no_time_evts_active(0));

    ticks(qf, 2);
    assert_eq!(timeouts(ao), 0);
    assert_eq!(te.ctr(), 1);

    ticks(qf, 1);
    assert_eq!(timeouts(ao), 1);
    assert_eq!(te.ctr(), 0);
    assert!(qf.no_time_evts_active(0));

    ticks(qf, 5);
    assert_eq!(timeouts(ao), 1);
    assert_eq!(qf.tick_count(0), 8);
}

#[test]
fn test_periodic_reloads_interval() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);

    te.arm(5, 5);
    ticks(qf, 20);
    assert_eq!(timeouts(ao), 4);
    assert_eq!(te.ctr(), 5);
    assert!(!qf.no_time_evts_active(0));
}

#[test]
fn test_first_expiry_and_interval_differ() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);

    te.arm(2, 4);
    ticks(qf, 2);
    assert_eq!(timeouts(ao), 1);
    ticks(qf, 3);
    assert_eq!(timeouts(ao), 1);
    ticks(qf, 1);
    assert_eq!(timeouts(ao), 2);
}

#[test]
fn test_disarm_before_expiry() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);

    te.arm(4, 0);
    ticks(qf, 2);
    assert!(te.disarm());
    assert!(te.was_disarmed());
    assert_eq!(te.ctr(), 0);

    // still linked until the next tick unlinks it
    assert!(!qf.no_time_evts_active(0));
    ticks(qf, 5);
    assert!(qf.no_time_evts_active(0));
    assert_eq!(timeouts(ao), 0);
}

#[test]
fn test_disarm_after_expiry_reports_the_race() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);

    te.arm(1, 0);
    qf.tick(0);
    // posted but not processed yet
    assert!(!te.disarm());
    assert!(!te.was_disarmed());
    assert!(te.was_disarmed());

    run_all(qf);
    assert_eq!(timeouts(ao), 1);
}

#[test]
fn test_rearm_adjusts_phase() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);

    te.arm(3, 6);
    ticks(qf, 2);
    assert!(te.rearm(4));
    ticks(qf, 3);
    assert_eq!(timeouts(ao), 0);
    ticks(qf, 1);
    assert_eq!(timeouts(ao), 1);
    // the interval survives the rearm
    assert_eq!(te.ctr(), 6);
}

#[test]
fn test_rearm_of_idle_event_arms_it() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);

    assert!(!te.rearm(2));
    ticks(qf, 2);
    assert_eq!(timeouts(ao), 1);
    assert!(qf.no_time_evts_active(0));
}

#[test]
fn test_rearm_while_still_linked() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);

    te.arm(5, 0);
    qf.tick(0);
    te.disarm();
    // disarmed but still in the list: arming again must not link twice
    te.arm(2, 0);
    ticks(qf, 2);
    assert_eq!(timeouts(ao), 1);
    ticks(qf, 4);
    assert_eq!(timeouts(ao), 1);
}

#[test]
fn test_many_events_one_rate() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 8, &[]);
    let fast = time_evt(ao, 0);
    let slow = time_evt(ao, 0);
    let once = time_evt(ao, 0);

    fast.arm(1, 1);
    slow.arm(3, 3);
    once.arm(2, 0);
    ticks(qf, 6);
    assert_eq!(timeouts(ao), 6 + 2 + 1);

    fast.disarm();
    slow.disarm();
    ticks(qf, 1);
    assert!(qf.no_time_evts_active(0));
}

#[test]
fn test_tick_rates_are_independent() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 1);

    te.arm(1, 0);
    ticks(qf, 3);
    assert_eq!(timeouts(ao), 0);
    assert!(qf.no_time_evts_active(0));
    assert!(!qf.no_time_evts_active(1));

    qf.tick(1);
    run_all(qf);
    assert_eq!(timeouts(ao), 1);
}

#[test]
fn test_ticker_runs_counted_ticks() {
    let qf = framework();
    let ticker: &'static QTicker = Box::leak(Box::new(QTicker::new(1)));
    ticker.start(qf, QPriority::new(1).unwrap());
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 1);
    te.arm(2, 0);

    // as if from the tick interrupt, three times before the ticker runs
    assert!(ticker.post(&EVT_A));
    assert!(ticker.post(&EVT_A));
    assert!(ticker.post(&EVT_A));
    assert!(qf.ready_set().has_element(1));

    assert_eq!(run_all(qf), 2);
    assert_eq!(qf.tick_count(1), 3);
    assert_eq!(timeouts(ao), 1);
    assert!(ticker.is_empty());
}

#[test]
#[should_panic(expected = "qf_time:400")]
fn test_arm_twice() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te = time_evt(ao, 0);
    te.arm(3, 0);
    te.arm(3, 0);
}

#[test]
#[should_panic(expected = "qf_time:400")]
fn test_arm_without_owner() {
    let te: &'static QTimeEvt = Box::leak(Box::new(QTimeEvt::unbound(SIG_TIMEOUT, 0)));
    te.arm(3, 0);
}

#[test]
#[should_panic(expected = "qf_time:400")]
fn test_arm_for_zero_ticks() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    time_evt(ao, 0).arm(0, 5);
}

#[test]
#[should_panic(expected = "qf_time:300")]
fn test_reserved_signal_time_event() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    let te: &'static QTimeEvt = Box::leak(Box::new(QTimeEvt::new(ao, QSignal::EXIT, 0)));
    te.arm(3, 0);
}

#[test]
#[should_panic(expected = "qf_time:300")]
fn test_tick_rate_out_of_range_time_event() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    time_evt(ao, 7).rearm(3);
}

#[test]
#[should_panic(expected = "qf_time:600")]
fn test_rearm_for_zero_ticks() {
    let qf = framework();
    let ao = start_recorder(qf, 2, 4, &[]);
    time_evt(ao, 0).rearm(0);
}

#[test]
#[should_panic(expected = "qf_time:100")]
fn test_tick_of_unknown_rate() {
    framework().tick(5);
}

#[test]
#[should_panic(expected = "qf_actq:900")]
fn test_ticker_refuses_lifo() {
    let qf = framework();
    let ticker: &'static QTicker = Box::leak(Box::new(QTicker::new(0)));
    ticker.start(qf, QPriority::new(1).unwrap());
    ticker.post_lifo(&EVT_A);
}

#[test]
#[should_panic(expected = "qf_actq:130")]
fn test_ticker_cannot_fall_too_far_behind() {
    let qf = framework();
    let ticker: &'static QTicker = Box::leak(Box::new(QTicker::new(0)));
    ticker.start(qf, QPriority::new(1).unwrap());
    for _ in 0..u16::MAX {
        ticker.post(&EVT_A);
    }
    ticker.post(&EVT_A);
}
