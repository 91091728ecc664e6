//! Publish-subscribe
//!
//! One [`QPSet`] per signal records the priorities of the subscribers.
//! Publishing posts the event to each of them, highest priority first.

use qp_core::{QEvtRef, QPSet, QSignal};

use crate::{QActive, QFramework};

qp_core::q_define_this_module!("qf_ps");

impl QFramework {
    /// Bind the subscriber table. Signals below `sto.len()` can be published.
    pub fn ps_init(&self, sto: &'static mut [QPSet]) {
        sto.fill(QPSet::EMPTY);
        let max_signal = sto.len();
        critical_section::with(|cs| *self.subscribers.borrow_ref_mut(cs) = sto);
        log::debug!("publish-subscribe for {} signals", max_signal);
    }

    /// Deliver `e` to every subscriber of its signal.
    ///
    /// A pooled event gets one extra reference for the duration of the
    /// fan-out, so it is recycled here if nobody subscribed and otherwise by
    /// whichever subscriber processes it last.
    pub fn publish(&self, e: QEvtRef) {
        let sig = usize::from(e.sig().raw());
        let snapshot = critical_section::with(|cs| {
            let set = self.subscribers.borrow_ref(cs).get(sig).copied()?;
            if !e.is_dynamic() {
                return Some((set, true));
            }
            if e.ref_saturated_in(cs) {
                return Some((set, false));
            }
            e.inc_ref(cs);
            Some((set, true))
        });
        let Some((subscribers, referenced)) = snapshot else {
            qp_core::q_error!(200)
        };
        qp_core::q_assert!(220, referenced);

        // scheduler lock is a no-op under QV
        log::debug!("publish {} to {:#x}", e.sig(), subscribers.bits());
        for p in subscribers.iter_desc() {
            let Some(act) = self.active(p) else {
                qp_core::q_error!(210)
            };
            act.post(e);
        }

        self.gc(e);
    }

    /// Add `act` to the subscribers of `sig`
    pub fn subscribe(&self, act: &dyn QActive, sig: QSignal) {
        let done = self.update_subscribers(act, sig, QPSet::insert);
        qp_core::q_require!(300, done);
    }

    /// Remove `act` from the subscribers of `sig`
    pub fn unsubscribe(&self, act: &dyn QActive, sig: QSignal) {
        let done = self.update_subscribers(act, sig, QPSet::remove);
        qp_core::q_require!(400, done);
    }

    /// Remove `act` from the subscribers of every signal
    pub fn unsubscribe_all(&self, act: &dyn QActive) {
        let p = act.prio();
        let done = critical_section::with(|cs| {
            if !self.is_registered_in(cs, act) {
                return false;
            }
            let mut table = self.subscribers.borrow_ref_mut(cs);
            for set in table.iter_mut().skip(usize::from(QSignal::USER.raw())) {
                set.remove(p);
            }
            true
        });
        qp_core::q_require!(500, done);
    }

    /// Number of signals the subscriber table covers
    pub fn max_pub_signal(&self) -> usize {
        critical_section::with(|cs| self.subscribers.borrow_ref(cs).len())
    }

    /// True if the object at `prio` subscribes to `sig`
    pub fn is_subscribed(&self, prio: u8, sig: QSignal) -> bool {
        critical_section::with(|cs| {
            self.subscribers
                .borrow_ref(cs)
                .get(usize::from(sig.raw()))
                .is_some_and(|set| set.has_element(prio))
        })
    }

    fn update_subscribers(&self, act: &dyn QActive, sig: QSignal, op: fn(&mut QPSet, u8)) -> bool {
        let p = act.prio();
        critical_section::with(|cs| {
            if sig.is_reserved() || !self.is_registered_in(cs, act) {
                return false;
            }
            let mut table = self.subscribers.borrow_ref_mut(cs);
            match table.get_mut(usize::from(sig.raw())) {
                Some(set) => {
                    op(set, p);
                    true
                }
                None => false,
            }
        })
    }
}
