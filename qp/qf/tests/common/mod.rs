//! Shared fixtures for the qp-qf integration tests
#![allow(dead_code)]

use core::mem::size_of;

use qp_core::{QEvt, QEvtSlot, QPSet, QPriority, QSignal, QStateId, QStateReturn};
use qp_qep::{QHsm, QStateMachine};
use qp_qf::{ActiveBehavior, ActiveContext, ActiveObject, QFramework};

pub const SIG_A: QSignal = QSignal::new(4);
pub const SIG_B: QSignal = QSignal::new(5);
pub const SIG_C: QSignal = QSignal::new(6);
pub const SIG_TIMEOUT: QSignal = QSignal::new(7);

pub static EVT_A: QEvt = QEvt::new(SIG_A);
pub static EVT_B: QEvt = QEvt::new(SIG_B);
pub static EVT_C: QEvt = QEvt::new(SIG_C);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecSt {
    Running,
}

impl QStateId for RecSt {
    fn superstate(self) -> Option<Self> {
        None
    }
}

/// Behavior that records every user event it gets
pub struct Recorder {
    hsm: QHsm<RecSt>,
    pub ctx: Option<ActiveContext>,
    pub subscriptions: &'static [QSignal],
    pub seen: Vec<u16>,
    pub values: Vec<u32>,
}

impl Recorder {
    pub fn new(subscriptions: &'static [QSignal]) -> Self {
        Self {
            hsm: QHsm::new(),
            ctx: None,
            subscriptions,
            seen: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl QStateMachine for Recorder {
    type State = RecSt;

    fn hsm(&self) -> &QHsm<RecSt> {
        &self.hsm
    }

    fn hsm_mut(&mut self) -> &mut QHsm<RecSt> {
        &mut self.hsm
    }

    fn initial(&mut self, _par: Option<&QEvt>) -> QStateReturn<RecSt> {
        if let Some(ctx) = self.ctx {
            for sig in self.subscriptions {
                ctx.subscribe(*sig);
            }
        }
        QStateReturn::Transition(RecSt::Running)
    }

    fn handle(&mut self, _state: RecSt, e: &QEvt) -> QStateReturn<RecSt> {
        if e.sig().is_reserved() {
            return QStateReturn::Super;
        }
        self.seen.push(e.sig().raw());
        if let Some(v) = e.payload::<u32>() {
            self.values.push(*v);
        }
        QStateReturn::Handled
    }
}

impl ActiveBehavior for Recorder {
    fn on_start(&mut self, ctx: ActiveContext) {
        self.ctx = Some(ctx);
    }
}

pub fn framework() -> &'static QFramework {
    Box::leak(Box::new(QFramework::new()))
}

/// Framework with one event pool of `blocks` events of `evt_size` bytes
pub fn framework_with_pool(blocks: usize, evt_size: usize) -> &'static QFramework {
    let qf = framework();
    let words = blocks * evt_size.div_ceil(size_of::<usize>());
    qf.pool_init(Box::leak(vec![0usize; words].into_boxed_slice()), evt_size);
    qf
}

pub fn queue_storage(len: usize) -> &'static mut [QEvtSlot] {
    Box::leak(vec![None; len].into_boxed_slice())
}

pub fn subscriber_table(signals: usize) -> &'static mut [QPSet] {
    Box::leak(vec![QPSet::EMPTY; signals].into_boxed_slice())
}

pub fn recorder(subscriptions: &'static [QSignal]) -> &'static ActiveObject<Recorder> {
    Box::leak(Box::new(ActiveObject::new(Recorder::new(subscriptions))))
}

/// Start a recorder at `prio` with a queue of `q_len + 1` events
pub fn start_recorder(
    qf: &'static QFramework,
    prio: u8,
    q_len: usize,
    subscriptions: &'static [QSignal],
) -> &'static ActiveObject<Recorder> {
    let ao = recorder(subscriptions);
    ao.start(qf, QPriority::new(prio).unwrap(), queue_storage(q_len), None);
    ao
}

/// Process one event of the highest-priority ready object
pub fn run_one(qf: &QFramework) -> Option<u8> {
    let p = qf.ready_set().find_max()?;
    let act = qf.active(p).unwrap();
    let e = act.get();
    act.dispatch(e);
    qf.gc(e);
    Some(p)
}

/// Process events until nothing is ready; returns how many were processed
pub fn run_all(qf: &QFramework) -> usize {
    let mut n = 0;
    while run_one(qf).is_some() {
        n += 1;
    }
    n
}

pub fn seen(ao: &ActiveObject<Recorder>) -> Vec<u16> {
    ao.inspect(|r| r.seen.clone())
}

pub fn context(ao: &ActiveObject<Recorder>) -> ActiveContext {
    ao.inspect(|r| r.ctx.unwrap())
}
