//! Time events and the system clock tick
//!
//! Every tick rate keeps a singly linked list of armed time events, threaded
//! through the events themselves. Arming only ever pushes onto a separate
//! list of newly armed events; [`QFramework::tick`] is the one place that
//! changes the main list, splicing the new ones in as it reaches the end.

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use qp_core::{QEvt, QSignal, QTimeEvtCtr, QF_MAX_TICK_RATE};

use crate::{QActive, QFramework};

qp_core::q_define_this_module!("qf_time");

/// List heads of one tick rate
#[derive(Clone, Copy)]
pub(crate) struct TimeHead {
    next: Option<&'static QTimeEvt>,
    act: Option<&'static QTimeEvt>,
    ctr: QTimeEvtCtr,
}

impl TimeHead {
    pub(crate) const EMPTY: Self = Self {
        next: None,
        act: None,
        ctr: 0,
    };
}

struct TimeEvtState {
    owner: Option<&'static dyn QActive>,
    next: Option<&'static QTimeEvt>,
    ctr: QTimeEvtCtr,
    interval: QTimeEvtCtr,
    linked: bool,
    was_disarmed: bool,
}

/// An event the framework posts to its owner after a number of ticks,
/// once or periodically.
///
/// The embedded [`QEvt`] is static, so posting it costs no allocation. The
/// owner receives it with the signal given at construction.
pub struct QTimeEvt {
    evt: QEvt,
    tick_rate: u8,
    state: Mutex<RefCell<TimeEvtState>>,
}

impl QTimeEvt {
    /// Time event for `owner`, driven by tick rate `tick_rate`.
    ///
    /// `sig` must be a user signal and `tick_rate` below
    /// [`QF_MAX_TICK_RATE`]; both are checked when the event is armed.
    pub const fn new(owner: &'static dyn QActive, sig: QSignal, tick_rate: u8) -> Self {
        Self::with_owner(Some(owner), sig, tick_rate)
    }

    /// Time event whose owner is set later with [`QTimeEvt::bind`]
    pub const fn unbound(sig: QSignal, tick_rate: u8) -> Self {
        Self::with_owner(None, sig, tick_rate)
    }

    const fn with_owner(owner: Option<&'static dyn QActive>, sig: QSignal, tick_rate: u8) -> Self {
        Self {
            evt: QEvt::new(sig),
            tick_rate,
            state: Mutex::new(RefCell::new(TimeEvtState {
                owner,
                next: None,
                ctr: 0,
                interval: 0,
                linked: false,
                was_disarmed: false,
            })),
        }
    }

    /// Set the object that receives the event
    pub fn bind(&self, owner: &'static dyn QActive) {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).owner = Some(owner));
    }

    pub fn owner(&self) -> Option<&'static dyn QActive> {
        critical_section::with(|cs| self.state.borrow_ref(cs).owner)
    }

    /// The event delivered on expiry
    pub fn evt(&self) -> &QEvt {
        &self.evt
    }

    pub fn tick_rate(&self) -> u8 {
        self.tick_rate
    }

    /// Expire after `n_ticks` and then every `interval` ticks; an interval
    /// of 0 makes a one-shot.
    ///
    /// The owner must be started and the event must not be armed already.
    pub fn arm(&'static self, n_ticks: QTimeEvtCtr, interval: QTimeEvtCtr) {
        self.check_ctor();

        let qf = self.owner().and_then(|owner| owner.framework());
        let armed = critical_section::with(|cs| {
            let Some(qf) = qf else {
                return false;
            };
            let mut te = self.state.borrow_ref_mut(cs);
            if te.ctr != 0 || n_ticks == 0 {
                return false;
            }
            te.ctr = n_ticks;
            te.interval = interval;
            self.link_in(cs, qf, &mut te);
            true
        });
        qp_core::q_require!(400, armed);
        log::debug!("arm {} in {} ticks, interval {}", self.evt.sig(), n_ticks, interval);
    }

    /// Stop the countdown.
    ///
    /// Returns `true` if the event was armed. `false` means it already
    /// expired and was posted, so the owner still gets it.
    pub fn disarm(&self) -> bool {
        let was_armed = critical_section::with(|cs| {
            let mut te = self.state.borrow_ref_mut(cs);
            if te.ctr != 0 {
                te.ctr = 0;
                te.was_disarmed = true;
                true
            } else {
                te.was_disarmed = false;
                false
            }
        });
        log::debug!("disarm {}: {}", self.evt.sig(), was_armed);
        was_armed
    }

    /// Restart the countdown at `n_ticks`, keeping the interval.
    ///
    /// Returns whether the event was armed before. An event that was not
    /// gets armed exactly as by [`QTimeEvt::arm`].
    pub fn rearm(&'static self, n_ticks: QTimeEvtCtr) -> bool {
        self.check_ctor();

        let qf = self.owner().and_then(|owner| owner.framework());
        let outcome = critical_section::with(|cs| {
            let qf = qf.filter(|_| n_ticks != 0)?;
            let mut te = self.state.borrow_ref_mut(cs);
            let was_armed = te.ctr != 0;
            if !was_armed {
                self.link_in(cs, qf, &mut te);
            }
            te.ctr = n_ticks;
            Some(was_armed)
        });
        let Some(was_armed) = outcome else {
            qp_core::q_error!(600)
        };
        log::debug!("rearm {} in {} ticks", self.evt.sig(), n_ticks);
        was_armed
    }

    /// Whether the last [`QTimeEvt::disarm`] stopped an armed event.
    ///
    /// Reading sets the flag again, so only the first call after a
    /// `disarm` that found the event expired returns `false`.
    pub fn was_disarmed(&self) -> bool {
        critical_section::with(|cs| {
            let mut te = self.state.borrow_ref_mut(cs);
            let was = te.was_disarmed;
            te.was_disarmed = true;
            was
        })
    }

    /// Ticks left until expiry, 0 when not armed
    pub fn ctr(&self) -> QTimeEvtCtr {
        critical_section::with(|cs| self.state.borrow_ref(cs).ctr)
    }

    fn check_ctor(&self) {
        qp_core::q_require!(
            300,
            !self.evt.sig().is_reserved() && usize::from(self.tick_rate) < QF_MAX_TICK_RATE
        );
    }

    /// Push onto the newly armed list unless still in the main list
    fn link_in(&'static self, cs: CriticalSection<'_>, qf: &QFramework, te: &mut TimeEvtState) {
        if te.linked {
            return;
        }
        te.linked = true;
        let mut heads = qf.time_heads.borrow_ref_mut(cs);
        let head = &mut heads[usize::from(self.tick_rate)];
        te.next = head.act;
        head.act = Some(self);
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QTimeEvt {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QTimeEvt{{ sig: {}, ctr: {} }}", self.evt.sig(), self.ctr());
    }
}

enum TickStep {
    Next,
    Expired(&'static dyn QActive, &'static QTimeEvt),
    Done,
}

impl QFramework {
    /// Advance every time event of `tick_rate` by one tick and post the
    /// ones that expire.
    ///
    /// Call once per tick of that rate, from the tick interrupt or from a
    /// [`QTicker`](crate::QTicker). Posting happens outside the critical
    /// section; a full owner queue is a contract violation.
    pub fn tick(&self, tick_rate: u8) {
        let rate = usize::from(tick_rate);
        qp_core::q_require!(100, rate < QF_MAX_TICK_RATE);

        critical_section::with(|cs| {
            let mut heads = self.time_heads.borrow_ref_mut(cs);
            heads[rate].ctr = heads[rate].ctr.wrapping_add(1);
        });

        // None stands for the list head
        let mut prev: Option<&'static QTimeEvt> = None;
        loop {
            match critical_section::with(|cs| self.tick_step(cs, rate, &mut prev)) {
                TickStep::Next => {}
                TickStep::Expired(owner, t) => {
                    log::trace!("time event {} expired", t.evt.sig());
                    owner.post(&t.evt);
                }
                TickStep::Done => break,
            }
        }
    }

    fn tick_step(
        &self,
        cs: CriticalSection<'_>,
        rate: usize,
        prev: &mut Option<&'static QTimeEvt>,
    ) -> TickStep {
        let mut heads = self.time_heads.borrow_ref_mut(cs);
        let head = &mut heads[rate];

        let next = match *prev {
            None => head.next,
            Some(p) => p.state.borrow_ref(cs).next,
        };
        let t = match next {
            Some(t) => t,
            None => match head.act.take() {
                Some(act) => {
                    link_after(cs, head, *prev, Some(act));
                    act
                }
                None => return TickStep::Done,
            },
        };

        let mut te = t.state.borrow_ref_mut(cs);
        if te.ctr == 0 {
            // disarmed since the last tick
            link_after(cs, head, *prev, te.next);
            te.linked = false;
            return TickStep::Next;
        }

        te.ctr -= 1;
        if te.ctr != 0 {
            *prev = Some(t);
            return TickStep::Next;
        }

        let owner = te.owner;
        if te.interval != 0 {
            te.ctr = te.interval;
            *prev = Some(t);
        } else {
            link_after(cs, head, *prev, te.next);
            te.linked = false;
        }
        match owner {
            Some(owner) => TickStep::Expired(owner, t),
            None => TickStep::Next,
        }
    }

    /// True if no time event of `tick_rate` is armed or waiting to be
    /// spliced into the list
    pub fn no_time_evts_active(&self, tick_rate: u8) -> bool {
        let rate = usize::from(tick_rate);
        qp_core::q_require!(100, rate < QF_MAX_TICK_RATE);
        critical_section::with(|cs| {
            let heads = self.time_heads.borrow_ref(cs);
            heads[rate].next.is_none() && heads[rate].act.is_none()
        })
    }

    /// Ticks processed at `tick_rate` so far, wrapping
    pub fn tick_count(&self, tick_rate: u8) -> QTimeEvtCtr {
        let rate = usize::from(tick_rate);
        qp_core::q_require!(100, rate < QF_MAX_TICK_RATE);
        critical_section::with(|cs| self.time_heads.borrow_ref(cs)[rate].ctr)
    }
}

fn link_after(
    cs: CriticalSection<'_>,
    head: &mut TimeHead,
    prev: Option<&'static QTimeEvt>,
    next: Option<&'static QTimeEvt>,
) {
    match prev {
        None => head.next = next,
        Some(p) => p.state.borrow_ref_mut(cs).next = next,
    }
}
