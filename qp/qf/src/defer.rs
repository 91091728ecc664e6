//! Deferring events an active object cannot handle yet

use qp_core::QEvtRef;

use crate::{ActiveContext, QEQueue};

qp_core::q_define_this_module!("qf_defer");

impl ActiveContext {
    /// Park `e` in the side queue `eq`.
    ///
    /// Returns `false` when `eq` is full; the event is then not kept.
    pub fn defer(&self, eq: &QEQueue, e: QEvtRef) -> bool {
        eq.post(e, 0)
    }

    /// Move the oldest event of `eq` to the front of this object's queue.
    ///
    /// Returns `false` if nothing was deferred.
    pub fn recall(&self, eq: &QEQueue) -> bool {
        let Some(e) = eq.get() else {
            return false;
        };
        self.me.post_lifo(e);

        // the reference `eq` held moves over to the object's queue
        let held = critical_section::with(|cs| {
            if !e.is_dynamic() {
                return true;
            }
            let held = e.ref_ctr_in(cs) >= 2;
            if held {
                e.dec_ref(cs);
            }
            held
        });
        qp_core::q_assert!(210, held);

        log::debug!("priority {} recalled {}", self.prio(), e.sig());
        true
    }

    /// Drop everything deferred in `eq`. Returns how many events went.
    pub fn flush_deferred(&self, eq: &QEQueue) -> usize {
        let mut n = 0;
        while let Some(e) = eq.get() {
            self.qf.gc(e);
            n += 1;
        }
        n
    }
}
