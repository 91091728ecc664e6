//! Tick processing in task context

use core::cell::Cell;

use critical_section::Mutex;
use qp_core::{QEQueueCtr, QEvt, QEvtRef, QEvtSlot, QPriority, QSignal};

use crate::active::Binding;
use crate::{QActive, QFramework};

qp_core::q_define_this_module!("qf_actq");

/// What the scheduler gets from a ticker, whatever was posted
static TICK_EVT: QEvt = QEvt::new(QSignal::EMPTY);

#[derive(Clone, Copy)]
struct Pending {
    front: QEvtSlot,
    ticks: u16,
}

/// Active object that runs [`QFramework::tick`] for one tick rate.
///
/// The tick interrupt posts any event to it instead of walking the time
/// event list itself. Posts only count, so the ticker never holds a
/// reference to the posted event; each dispatch then catches up on all ticks
/// counted so far. Falling `u16::MAX` ticks behind is a contract violation.
pub struct QTicker {
    tick_rate: u8,
    binding: Mutex<Cell<Binding>>,
    pending: Mutex<Cell<Pending>>,
}

impl QTicker {
    pub const fn new(tick_rate: u8) -> Self {
        Self {
            tick_rate,
            binding: Mutex::new(Cell::new(Binding::UNBOUND)),
            pending: Mutex::new(Cell::new(Pending {
                front: None,
                ticks: 0,
            })),
        }
    }

    /// Register the ticker at `prio`
    pub fn start(&'static self, qf: &'static QFramework, prio: QPriority) {
        critical_section::with(|cs| {
            self.binding.borrow(cs).set(Binding {
                qf: Some(qf),
                prio: prio.raw(),
            });
        });
        qf.add(self);
        log::debug!("ticker for rate {} at priority {}", self.tick_rate, prio);
    }

    pub fn tick_rate(&self) -> u8 {
        self.tick_rate
    }

    fn binding(&self) -> Binding {
        critical_section::with(|cs| self.binding.borrow(cs).get())
    }
}

impl QActive for QTicker {
    fn prio(&self) -> u8 {
        self.binding().prio
    }

    fn framework(&self) -> Option<&'static QFramework> {
        self.binding().qf
    }

    fn post_x(&self, _e: QEvtRef, _margin: u16) -> bool {
        let counted = critical_section::with(|cs| {
            let b = self.binding.borrow(cs).get();
            let qf = b.qf?;
            let cell = self.pending.borrow(cs);
            let mut pending = cell.get();
            let Some(ticks) = pending.ticks.checked_add(1) else {
                return Some(false);
            };
            pending.ticks = ticks;
            if pending.front.is_none() {
                pending.front = Some(&TICK_EVT);
                qf.ready_insert_in(cs, b.prio);
            }
            cell.set(pending);
            Some(true)
        });
        let Some(counted) = counted else {
            qp_core::q_error!(100)
        };
        // more ticks pending than the ticker can count
        qp_core::q_assert!(130, counted);
        true
    }

    fn post_lifo(&self, _e: QEvtRef) {
        qp_core::q_error!(900)
    }

    fn get(&self) -> QEvtRef {
        let front = critical_section::with(|cs| {
            let b = self.binding.borrow(cs).get();
            let cell = self.pending.borrow(cs);
            let mut pending = cell.get();
            let front = pending.front.take();
            cell.set(pending);
            if let Some(qf) = b.qf {
                qf.ready_remove_in(cs, b.prio);
            }
            front
        });
        let Some(e) = front else {
            qp_core::q_error!(310)
        };
        e
    }

    fn dispatch(&self, _e: &QEvt) {
        let ticks = critical_section::with(|cs| {
            let cell = self.pending.borrow(cs);
            let mut pending = cell.get();
            let ticks = pending.ticks;
            pending.ticks = 0;
            cell.set(pending);
            ticks
        });
        if let Some(qf) = self.framework() {
            for _ in 0..ticks {
                qf.tick(self.tick_rate);
            }
        }
    }

    fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).get().front.is_none())
    }

    fn queue_min(&self) -> QEQueueCtr {
        0
    }
}
