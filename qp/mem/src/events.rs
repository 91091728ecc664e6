//! Dynamic events: allocation from event pools, reference counting and
//! garbage collection.

use core::mem::{align_of, size_of};
use core::ptr::{addr_of_mut, NonNull};

use qp_core::{QEvt, QEvtRef, QMPoolCtr, QSignal, QF_MAX_ACTIVE, QF_MAX_EPOOL, QF_NO_MARGIN};
use spin::Once;

use crate::QMPool;

qp_core::q_define_this_module!("qf_dyn");

/// Layout of a pooled event carrying a payload
#[repr(C)]
struct PooledEvt<T> {
    hdr: QEvt,
    payload: T,
}

/// The set of event pools, registered in ascending block-size order.
///
/// Pools are write-once: each slot is filled during startup and never
/// replaced, so lookups need no critical section.
pub struct QEvtPools {
    pools: [Once<QMPool>; QF_MAX_EPOOL],
}

impl QEvtPools {
    #[allow(clippy::declare_interior_mutable_const)]
    const UNSET: Once<QMPool> = Once::new();

    /// Create an empty pool set
    pub const fn new() -> Self {
        Self {
            pools: [Self::UNSET; QF_MAX_EPOOL],
        }
    }

    fn registered(&self) -> impl Iterator<Item = &QMPool> {
        self.pools.iter().map_while(Once::get)
    }

    /// Register the next event pool.
    ///
    /// Pools must be registered smallest first; the order is checked, never
    /// fixed up.
    pub fn pool_init(&self, sto: &'static mut [usize], evt_size: usize) {
        let n = self.n_pools();
        qp_core::q_require!(200, n < QF_MAX_EPOOL);
        if let Some(prev) = n.checked_sub(1).and_then(|i| self.pools[i].get()) {
            qp_core::q_require!(201, prev.block_size() < evt_size);
        }

        let pool = self.pools[n].call_once(|| QMPool::new(sto, evt_size));
        log::debug!(
            "event pool {} ready: {} blocks x {} bytes",
            n + 1,
            pool.n_tot(),
            pool.block_size()
        );
    }

    /// Number of registered pools
    pub fn n_pools(&self) -> usize {
        self.registered().count()
    }

    /// Pool with the 1-based id stored in event headers
    pub fn pool(&self, pool_id: u8) -> Option<&QMPool> {
        let idx = usize::from(pool_id).checked_sub(1)?;
        self.pools.get(idx).and_then(Once::get)
    }

    fn alloc(&self, size: usize, margin: u16) -> Option<(u8, NonNull<u8>)> {
        let found = self
            .registered()
            .enumerate()
            .find(|(_, pool)| pool.block_size() >= size);
        let Some((idx, pool)) = found else {
            qp_core::q_error!(310)
        };

        let block = if margin == QF_NO_MARGIN {
            let block = pool.get(0);
            qp_core::q_assert!(320, block.is_some());
            block
        } else {
            pool.get(margin)
        };
        if block.is_none() {
            log::debug!("event pool {} below margin {}", idx + 1, margin);
        }
        block.map(|b| ((idx + 1) as u8, b))
    }

    /// Allocate an event carrying only a signal.
    ///
    /// Takes a block from the smallest pool that fits. With
    /// [`QF_NO_MARGIN`] the allocation cannot fail; otherwise `None` is
    /// returned when fewer than `margin` blocks would remain.
    pub fn new_evt(&self, sig: QSignal, margin: u16) -> Option<QEvtRef> {
        let (pool_id, block) = self.alloc(size_of::<QEvt>(), margin)?;
        let evt = block.cast::<QEvt>().as_ptr();
        // SAFETY: the block is word aligned, at least as large as a header
        // and was just taken off the free list, so nothing else refers to it.
        // Pool storage is `'static`.
        unsafe {
            evt.write(QEvt::pooled(sig, pool_id));
            Some(&*evt)
        }
    }

    /// Allocate an event with a payload stored in the same block.
    ///
    /// The payload is read back with [`QEvt::payload`]. It must not need a
    /// stricter alignment than a pointer.
    pub fn new_evt_with<T>(&self, sig: QSignal, payload: T, margin: u16) -> Option<QEvtRef>
    where
        T: Copy + Send + Sync + 'static,
    {
        qp_core::q_require!(300, align_of::<T>() <= align_of::<usize>());

        let (pool_id, block) = self.alloc(size_of::<PooledEvt<T>>(), margin)?;
        let evt = block.cast::<PooledEvt<T>>().as_ptr();
        // SAFETY: same as `new_evt`; the block holds a whole `PooledEvt<T>`
        // and its alignment was checked above. The payload reference handed
        // to the header lives as long as the event does, and `T: Copy` means
        // nothing needs dropping when the block is recycled.
        unsafe {
            let data = addr_of_mut!((*evt).payload);
            data.write(payload);
            let hdr = addr_of_mut!((*evt).hdr);
            hdr.write(QEvt::pooled_with(sig, pool_id, &*data));
            Some(&*hdr)
        }
    }

    /// Drop one reference to `e`, recycling it once nothing else holds it.
    ///
    /// Static events are left alone.
    pub fn gc(&self, e: &QEvt) {
        if !e.is_dynamic() {
            return;
        }

        let last = critical_section::with(|cs| {
            if e.ref_ctr_in(cs) > 1 {
                e.dec_ref(cs);
                false
            } else {
                true
            }
        });
        if !last {
            return;
        }

        let Some(pool) = self.pool(e.pool_id()) else {
            qp_core::q_error!(410)
        };
        pool.put(NonNull::from(e).cast());
    }

    /// Keep a dynamic event alive past the current run-to-completion step.
    ///
    /// Every extra reference must eventually go through [`Self::delete_ref`].
    pub fn new_ref(&self, e: QEvtRef) -> QEvtRef {
        let taken = critical_section::with(|cs| {
            let ok = e.is_dynamic() && usize::from(e.ref_ctr_in(cs)) < 2 * QF_MAX_ACTIVE;
            if ok {
                e.inc_ref(cs);
            }
            ok
        });
        qp_core::q_require!(500, taken);
        e
    }

    /// Release a reference taken with [`Self::new_ref`]
    pub fn delete_ref(&self, e: QEvtRef) {
        self.gc(e);
    }

    /// Lowest number of free blocks pool `pool_id` ever had
    pub fn pool_min(&self, pool_id: u8) -> QMPoolCtr {
        let Some(pool) = self.pool(pool_id) else {
            qp_core::q_error!(400)
        };
        pool.n_min()
    }

    /// Block size of the largest pool, 0 before any pool is registered
    pub fn max_block_size(&self) -> usize {
        self.registered().last().map_or(0, QMPool::block_size)
    }
}

impl Default for QEvtPools {
    fn default() -> Self {
        Self::new()
    }
}
