//! Active object registry and ready set

use core::ptr;

use critical_section::CriticalSection;
use qp_core::{QPSet, QF_MAX_ACTIVE};

use crate::{QActive, QFramework};

qp_core::q_define_this_module!("qf_act");

/// True if both handles refer to the same active object
pub(crate) fn same_active(a: &dyn QActive, b: &dyn QActive) -> bool {
    ptr::addr_eq(a as *const dyn QActive, b as *const dyn QActive)
}

impl QFramework {
    /// Register `act` at its priority. The priority must be free.
    pub fn add(&self, act: &'static dyn QActive) {
        let p = usize::from(act.prio());
        let added = critical_section::with(|cs| {
            let mut registry = self.registry.borrow_ref_mut(cs);
            match registry.get_mut(p) {
                Some(slot) if p > 0 && slot.is_none() => {
                    *slot = Some(act);
                    true
                }
                _ => false,
            }
        });
        qp_core::q_require!(100, added);
        log::debug!("active object registered at priority {}", p);
    }

    /// Remove `act` from the registry and the ready set
    pub fn remove(&self, act: &'static dyn QActive) {
        let p = act.prio();
        let removed = critical_section::with(|cs| {
            let mut registry = self.registry.borrow_ref_mut(cs);
            match registry.get_mut(usize::from(p)) {
                Some(slot) if p > 0 && slot.is_some_and(|r| same_active(r, act)) => {
                    *slot = None;
                    self.ready_remove_in(cs, p);
                    true
                }
                _ => false,
            }
        });
        qp_core::q_require!(200, removed);
        log::debug!("active object removed from priority {}", p);
    }

    /// Active object registered at `prio`
    pub fn active(&self, prio: u8) -> Option<&'static dyn QActive> {
        critical_section::with(|cs| self.active_in(cs, prio))
    }

    pub(crate) fn active_in(&self, cs: CriticalSection<'_>, prio: u8) -> Option<&'static dyn QActive> {
        self.registry
            .borrow_ref(cs)
            .get(usize::from(prio))
            .copied()
            .flatten()
    }

    /// True if `act` is the object registered at its priority
    pub(crate) fn is_registered_in(&self, cs: CriticalSection<'_>, act: &dyn QActive) -> bool {
        let p = act.prio();
        p > 0
            && usize::from(p) <= QF_MAX_ACTIVE
            && self
                .active_in(cs, p)
                .is_some_and(|r| same_active(r, act))
    }

    pub(crate) fn ready_insert_in(&self, cs: CriticalSection<'_>, prio: u8) {
        let ready = self.ready.borrow(cs);
        let mut set = ready.get();
        set.insert(prio);
        ready.set(set);
    }

    pub(crate) fn ready_remove_in(&self, cs: CriticalSection<'_>, prio: u8) {
        let ready = self.ready.borrow(cs);
        let mut set = ready.get();
        set.remove(prio);
        ready.set(set);
    }

    /// Priorities of the active objects with events waiting.
    ///
    /// For kernels that need to decide on idling atomically with new events
    /// arriving.
    pub fn ready_in(&self, cs: CriticalSection<'_>) -> QPSet {
        self.ready.borrow(cs).get()
    }

    /// Snapshot of the ready set
    pub fn ready_set(&self) -> QPSet {
        critical_section::with(|cs| self.ready_in(cs))
    }
}
