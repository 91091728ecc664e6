//! Active object tests for qp-qf

mod common;

use core::mem::size_of;

use common::*;
use qp_core::{QEvt, QPriority, QSignal, QF_NO_MARGIN};
use qp_qep::QStateMachine;
use qp_qf::{QActive, QEQueue};

const EVT_SIZE: usize = size_of::<QEvt>() + 2 * size_of::<usize>();

#[test]
fn test_start_registers_and_runs_initial() {
    let qf = framework();
    let ao = start_recorder(qf, 5, 4, &[]);

    assert_eq!(ao.prio(), 5);
    assert!(qf.active(5).is_some());
    assert!(qf.active(4).is_none());
    assert_eq!(ao.inspect(|r| r.state()), Some(RecSt::Running));
    assert!(qf.ready_set().is_empty());
    assert!(ao.is_empty());
}

#[test]
fn test_posted_events_arrive_in_fifo_order() {
    let qf = framework();
    let ao = start_recorder(qf, 3, 4, &[]);

    assert!(ao.post(&EVT_A));
    assert!(ao.post(&EVT_B));
    assert!(ao.post(&EVT_C));
    assert!(qf.ready_set().has_element(3));

    assert_eq!(run_all(qf), 3);
    assert_eq!(seen(ao), vec![4, 5, 6]);
    assert!(qf.ready_set().is_empty());
}

#[test]
fn test_lifo_post_jumps_the_queue() {
    let qf = framework();
    let ao = start_recorder(qf, 3, 4, &[]);

    ao.post(&EVT_A);
    ao.post(&EVT_B);
    ao.post_lifo(&EVT_C);

    run_all(qf);
    assert_eq!(seen(ao), vec![6, 4, 5]);
}

#[test]
fn test_highest_priority_is_serviced_first() {
    let qf = framework();
    let low = start_recorder(qf, 3, 4, &[]);
    let high = start_recorder(qf, 7, 4, &[]);

    low.post(&EVT_A);
    high.post(&EVT_B);
    high.post(&EVT_C);

    assert_eq!(run_one(qf), Some(7));
    assert_eq!(run_one(qf), Some(7));
    assert_eq!(run_one(qf), Some(3));
    assert_eq!(run_one(qf), None);
    assert_eq!(seen(high), vec![5, 6]);
    assert_eq!(seen(low), vec![4]);
}

#[test]
fn test_pooled_event_with_payload_is_delivered_and_recycled() {
    let qf = framework_with_pool(4, EVT_SIZE);
    let ao = start_recorder(qf, 2, 4, &[]);
    let pool = qf.pools().pool(1).unwrap();

    let e = qf.new_evt_with(SIG_A, 1234u32, QF_NO_MARGIN).unwrap();
    assert!(ao.post(e));
    assert_eq!(e.ref_ctr(), 1);
    assert_eq!(pool.n_free(), 3);

    run_all(qf);
    assert_eq!(ao.inspect(|r| r.values.clone()), vec![1234]);
    assert_eq!(pool.n_free(), 4);
}

#[test]
fn test_refused_post_recycles_unreferenced_event() {
    let qf = framework_with_pool(2, EVT_SIZE);
    let ao = start_recorder(qf, 2, 1, &[]);
    let pool = qf.pools().pool(1).unwrap();

    ao.post(&EVT_A);
    let e = qf.new_evt(SIG_B, QF_NO_MARGIN).unwrap();
    assert_eq!(pool.n_free(), 1);

    // one slot left, margin one
    assert!(!ao.post_x(e, 1));
    assert_eq!(pool.n_free(), 2);

    run_all(qf);
    assert_eq!(seen(ao), vec![4]);
}

#[test]
fn test_pool_max_block_size() {
    assert_eq!(framework().pool_max_block_size(), 0);
    let qf = framework_with_pool(2, EVT_SIZE);
    assert_eq!(qf.pool_max_block_size(), EVT_SIZE);
    assert_eq!(qf.pool_max_block_size(), qf.pools().pool(1).unwrap().block_size());
}

#[test]
fn test_queue_min_tracks_the_high_water_mark() {
    let qf = framework();
    let ao = start_recorder(qf, 9, 3, &[]);
    assert_eq!(qf.queue_min(9), 4);

    ao.post(&EVT_A);
    ao.post(&EVT_B);
    ao.post(&EVT_C);
    run_all(qf);
    ao.post(&EVT_A);
    run_all(qf);

    assert_eq!(qf.queue_min(9), 1);
    assert_eq!(ao.queue_min(), 1);
}

#[test]
fn test_stop_frees_the_priority() {
    let qf = framework();
    qf.ps_init(subscriber_table(8));
    let ao = start_recorder(qf, 4, 2, &[SIG_A, SIG_B]);
    assert!(qf.is_subscribed(4, SIG_A));

    ao.post(&EVT_C);
    ao.stop();
    assert!(qf.active(4).is_none());
    assert!(!qf.ready_set().has_element(4));
    assert!(!qf.is_subscribed(4, SIG_A));
    assert!(!qf.is_subscribed(4, SIG_B));

    let next = start_recorder(qf, 4, 2, &[]);
    next.post(&EVT_A);
    run_all(qf);
    assert_eq!(seen(next), vec![4]);
}

#[test]
fn test_defer_and_recall() {
    let qf = framework_with_pool(4, EVT_SIZE);
    let ao = start_recorder(qf, 6, 4, &[]);
    let ctx = context(ao);
    let pool = qf.pools().pool(1).unwrap();
    let deferred = QEQueue::new();
    deferred.init(queue_storage(2));

    let e = qf.new_evt(SIG_B, QF_NO_MARGIN).unwrap();
    assert!(ctx.defer(&deferred, e));
    assert!(ctx.defer(&deferred, &EVT_C));
    assert_eq!(e.ref_ctr(), 1);

    ao.post(&EVT_A);
    assert!(ctx.recall(&deferred));
    // the deferred queue's reference moved to the active object's queue
    assert_eq!(e.ref_ctr(), 1);

    run_all(qf);
    assert_eq!(seen(ao), vec![5, 4]);
    assert_eq!(pool.n_free(), 4);

    assert!(ctx.recall(&deferred));
    assert!(!ctx.recall(&deferred));
    run_all(qf);
    assert_eq!(seen(ao), vec![5, 4, 6]);
}

#[test]
fn test_flush_deferred_recycles_everything() {
    let qf = framework_with_pool(4, EVT_SIZE);
    let ao = start_recorder(qf, 6, 4, &[]);
    let ctx = context(ao);
    let pool = qf.pools().pool(1).unwrap();
    let deferred = QEQueue::new();
    deferred.init(queue_storage(3));

    for _ in 0..3 {
        let e = qf.new_evt(SIG_A, QF_NO_MARGIN).unwrap();
        assert!(ctx.defer(&deferred, e));
    }
    assert_eq!(pool.n_free(), 1);

    assert_eq!(ctx.flush_deferred(&deferred), 3);
    assert_eq!(pool.n_free(), 4);
    assert!(deferred.is_empty());
}

#[test]
fn test_defer_refuses_when_side_queue_is_full() {
    let qf = framework();
    let ao = start_recorder(qf, 6, 4, &[]);
    let ctx = context(ao);
    let deferred = QEQueue::new();
    deferred.init(queue_storage(1));

    assert!(ctx.defer(&deferred, &EVT_A));
    assert!(ctx.defer(&deferred, &EVT_B));
    assert!(!ctx.defer(&deferred, &EVT_C));
}

#[test]
#[should_panic(expected = "qf_act:100")]
fn test_duplicate_priority() {
    let qf = framework();
    start_recorder(qf, 5, 2, &[]);
    start_recorder(qf, 5, 2, &[]);
}

#[test]
#[should_panic(expected = "qf_act:100")]
fn test_priority_zero_is_rejected() {
    let qf = framework();
    let ao = recorder(&[]);
    ao.start(qf, QPriority::new_unchecked(0), queue_storage(2), None);
}

#[test]
#[should_panic(expected = "qf_actq:100")]
fn test_post_to_unstarted_object() {
    let ao = recorder(&[]);
    ao.post(&EVT_A);
}

#[test]
#[should_panic(expected = "qf_actq:110")]
fn test_guaranteed_post_overflow() {
    let qf = framework();
    let ao = start_recorder(qf, 5, 1, &[]);
    ao.post(&EVT_A);
    ao.post(&EVT_B);
    ao.post(&EVT_C);
}

#[test]
#[should_panic(expected = "qf_actq:120")]
fn test_post_of_event_with_saturated_ref_counter() {
    let qf = framework_with_pool(2, EVT_SIZE);
    let ao = start_recorder(qf, 5, 4, &[]);
    let e = qf.new_evt(SIG_A, QF_NO_MARGIN).unwrap();
    critical_section::with(|cs| {
        for _ in 0..u8::MAX {
            e.inc_ref(cs);
        }
    });
    ao.post(e);
}

#[test]
#[should_panic(expected = "qf_actq:120")]
fn test_lifo_post_of_event_with_saturated_ref_counter() {
    let qf = framework_with_pool(2, EVT_SIZE);
    let ao = start_recorder(qf, 5, 4, &[]);
    let e = qf.new_evt(SIG_A, QF_NO_MARGIN).unwrap();
    critical_section::with(|cs| {
        for _ in 0..u8::MAX {
            e.inc_ref(cs);
        }
    });
    ao.post_lifo(e);
}

#[test]
#[should_panic(expected = "qf_actq:210")]
fn test_lifo_without_room() {
    let qf = framework();
    let ao = start_recorder(qf, 5, 0, &[]);
    ao.post(&EVT_A);
    ao.post_lifo(&EVT_B);
}

#[test]
#[should_panic(expected = "qf_actq:310")]
fn test_get_from_empty_object() {
    let qf = framework();
    let ao = start_recorder(qf, 5, 1, &[]);
    ao.get();
}

#[test]
#[should_panic(expected = "qf_actq:400")]
fn test_queue_min_of_unknown_priority() {
    let qf = framework();
    qf.queue_min(12);
}

#[test]
#[should_panic(expected = "qf_defer:210")]
fn test_recall_of_unreferenced_pooled_event() {
    let qf = framework_with_pool(2, EVT_SIZE);
    let ao = start_recorder(qf, 6, 4, &[]);
    let ctx = context(ao);
    let deferred = QEQueue::new();
    deferred.init(queue_storage(1));

    let e = qf.new_evt(QSignal::new(9), QF_NO_MARGIN).unwrap();
    ctx.defer(&deferred, e);
    // drop the deferred queue's reference behind its back
    qf.gc(e);
    qf.new_evt(QSignal::new(9), QF_NO_MARGIN).unwrap();
    ctx.recall(&deferred);
}
