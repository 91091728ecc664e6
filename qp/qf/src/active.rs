//! Active objects
//!
//! An active object couples a hierarchical state machine with its own event
//! queue and a priority. Producers, interrupts included, only ever touch the
//! queue; the state machine runs in the scheduler context, one event at a
//! time and always to completion.

use core::cell::Cell;

use critical_section::Mutex;
use qp_core::{QEQueueCtr, QEvt, QEvtRef, QEvtSlot, QPriority, QSignal, QF_NO_MARGIN};
use qp_qep::QStateMachine;

use crate::queue::{GetStatus, PostStatus, QEQueue};
use crate::QFramework;

qp_core::q_define_this_module!("qf_actq");

/// What the framework and the schedulers need from an active object.
///
/// Every method takes `&self`: posting happens from any context, while
/// [`QActive::dispatch`] is only ever called by the scheduler.
pub trait QActive: Sync {
    /// Priority the object was started at, 0 while not started
    fn prio(&self) -> u8;

    /// Framework the object was started in
    fn framework(&self) -> Option<&'static QFramework>;

    /// Post `e` at the back of the queue, keeping at least `margin` slots
    /// free. [`QF_NO_MARGIN`] turns a full queue into a contract violation.
    fn post_x(&self, e: QEvtRef, margin: u16) -> bool;

    /// Post with guaranteed delivery
    fn post(&self, e: QEvtRef) -> bool {
        self.post_x(e, QF_NO_MARGIN)
    }

    /// Post `e` in front of everything queued
    fn post_lifo(&self, e: QEvtRef);

    /// Take the next event. Only valid while the object is ready.
    fn get(&self) -> QEvtRef;

    /// Run one event through the state machine
    fn dispatch(&self, e: &QEvt);

    fn is_empty(&self) -> bool;

    /// Lowest number of free queue slots ever observed
    fn queue_min(&self) -> QEQueueCtr;
}

/// Where an object lives in the framework
#[derive(Clone, Copy)]
pub(crate) struct Binding {
    pub(crate) qf: Option<&'static QFramework>,
    pub(crate) prio: u8,
}

impl Binding {
    pub(crate) const UNBOUND: Self = Self { qf: None, prio: 0 };
}

/// Application side of an active object: a state machine that may want to
/// keep a handle to its runtime context.
pub trait ActiveBehavior: QStateMachine + Send + 'static {
    /// Called by [`ActiveObject::start`] right before the initial transition
    fn on_start(&mut self, _ctx: ActiveContext) {}
}

/// Active object hosting the state machine `B`.
///
/// Meant to live in a `static` (or be leaked) so the framework can keep a
/// `&'static dyn QActive` to it.
pub struct ActiveObject<B> {
    queue: QEQueue,
    binding: Mutex<Cell<Binding>>,
    behavior: spin::Mutex<B>,
}

impl<B: ActiveBehavior> ActiveObject<B> {
    pub const fn new(behavior: B) -> Self {
        Self {
            queue: QEQueue::new(),
            binding: Mutex::new(Cell::new(Binding::UNBOUND)),
            behavior: spin::Mutex::new(behavior),
        }
    }

    /// Register the object at `prio`, bind its queue storage and run the
    /// initial transition with `par`.
    pub fn start(
        &'static self,
        qf: &'static QFramework,
        prio: QPriority,
        q_sto: &'static mut [QEvtSlot],
        par: Option<&QEvt>,
    ) {
        critical_section::with(|cs| {
            self.binding.borrow(cs).set(Binding {
                qf: Some(qf),
                prio: prio.raw(),
            });
        });
        self.queue.init(q_sto);
        qf.add(self);

        let mut behavior = self.lock();
        behavior.on_start(ActiveContext { qf, me: self });
        behavior.init(par);
        log::debug!("active object started at priority {}", prio);
    }

    /// Unsubscribe from everything and leave the framework.
    ///
    /// Events still queued are not recycled.
    pub fn stop(&'static self) {
        let binding = self.binding();
        let Some(qf) = binding.qf else {
            qp_core::q_error!(100)
        };
        qf.unsubscribe_all(self);
        qf.remove(self);
        critical_section::with(|cs| self.binding.borrow(cs).set(Binding::UNBOUND));
        log::warn!("active object at priority {} stopped", binding.prio);
    }

    /// Look at the state machine between run-to-completion steps
    pub fn inspect<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        f(&self.lock())
    }

    fn binding(&self) -> Binding {
        critical_section::with(|cs| self.binding.borrow(cs).get())
    }

    fn lock(&self) -> spin::MutexGuard<'_, B> {
        let Some(behavior) = self.behavior.try_lock() else {
            qp_core::q_error!(500)
        };
        behavior
    }
}

impl<B: ActiveBehavior> QActive for ActiveObject<B> {
    fn prio(&self) -> u8 {
        self.binding().prio
    }

    fn framework(&self) -> Option<&'static QFramework> {
        self.binding().qf
    }

    fn post_x(&self, e: QEvtRef, margin: u16) -> bool {
        let outcome = critical_section::with(|cs| {
            let b = self.binding.borrow(cs).get();
            let qf = b.qf?;
            let status = self.queue.post_in(cs, e, margin);
            if status == PostStatus::Posted {
                qf.ready_insert_in(cs, b.prio);
            }
            Some((qf, status))
        });

        match outcome {
            None => qp_core::q_error!(100),
            Some((_, PostStatus::Posted)) => true,
            Some((qf, PostStatus::Refused)) => {
                log::debug!("priority {} refused {}, margin {}", self.prio(), e.sig(), margin);
                if e.ref_ctr() == 0 {
                    qf.gc(e);
                }
                false
            }
            Some((_, PostStatus::Overflow)) => qp_core::q_error!(110),
            Some((_, PostStatus::Saturated)) => qp_core::q_error!(120),
        }
    }

    fn post_lifo(&self, e: QEvtRef) {
        let status = critical_section::with(|cs| {
            let b = self.binding.borrow(cs).get();
            let qf = b.qf?;
            let status = self.queue.post_lifo_in(cs, e);
            if status == PostStatus::Posted {
                qf.ready_insert_in(cs, b.prio);
            }
            Some(status)
        });
        match status {
            None => qp_core::q_error!(100),
            Some(PostStatus::Posted) => {}
            Some(PostStatus::Saturated) => qp_core::q_error!(120),
            Some(PostStatus::Refused | PostStatus::Overflow) => qp_core::q_error!(210),
        }
    }

    fn get(&self) -> QEvtRef {
        let status = critical_section::with(|cs| {
            let b = self.binding.borrow(cs).get();
            let status = self.queue.get_in(cs);
            if let Some(qf) = b.qf {
                if self.queue.is_empty_in(cs) {
                    qf.ready_remove_in(cs, b.prio);
                }
            }
            status
        });
        match status {
            GetStatus::Evt(e) => e,
            GetStatus::Empty | GetStatus::Corrupt => qp_core::q_error!(310),
        }
    }

    fn dispatch(&self, e: &QEvt) {
        self.lock().dispatch(e);
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn queue_min(&self) -> QEQueueCtr {
        self.queue.n_min()
    }
}

/// Handle an active object's behavior uses to reach the framework it runs
/// in: publishing, subscriptions, event allocation and deferral.
#[derive(Clone, Copy)]
pub struct ActiveContext {
    pub(crate) qf: &'static QFramework,
    pub(crate) me: &'static dyn QActive,
}

impl ActiveContext {
    /// The active object itself, e.g. as the owner of its time events
    pub fn me(&self) -> &'static dyn QActive {
        self.me
    }

    pub fn framework(&self) -> &'static QFramework {
        self.qf
    }

    pub fn prio(&self) -> u8 {
        self.me.prio()
    }

    pub fn publish(&self, e: QEvtRef) {
        self.qf.publish(e);
    }

    pub fn subscribe(&self, sig: QSignal) {
        self.qf.subscribe(self.me, sig);
    }

    pub fn unsubscribe(&self, sig: QSignal) {
        self.qf.unsubscribe(self.me, sig);
    }

    pub fn unsubscribe_all(&self) {
        self.qf.unsubscribe_all(self.me);
    }

    pub fn new_evt(&self, sig: QSignal, margin: u16) -> Option<QEvtRef> {
        self.qf.new_evt(sig, margin)
    }

    pub fn new_evt_with<T>(&self, sig: QSignal, payload: T, margin: u16) -> Option<QEvtRef>
    where
        T: Copy + Send + Sync + 'static,
    {
        self.qf.new_evt_with(sig, payload, margin)
    }
}

impl QFramework {
    /// Lowest number of free queue slots the object at `prio` ever had
    pub fn queue_min(&self, prio: u8) -> QEQueueCtr {
        let Some(act) = self.active(prio) else {
            qp_core::q_error!(400)
        };
        act.queue_min()
    }
}
