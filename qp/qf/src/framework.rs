//! The framework runtime context

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use qp_core::{QEvtRef, QMPoolCtr, QPSet, QSignal, QF_MAX_ACTIVE, QF_MAX_TICK_RATE};
use qp_mem::QEvtPools;

use crate::time::TimeHead;
use crate::QActive;

/// Everything the active objects of one application share: the registry
/// of active objects by priority, the ready set, the event pools, the
/// subscriber table and the time event lists of every tick rate.
///
/// Typically a single `static`. Independent instances do not interact, which
/// is what host tests rely on.
pub struct QFramework {
    pub(crate) registry: Mutex<RefCell<[Option<&'static dyn QActive>; QF_MAX_ACTIVE + 1]>>,
    pub(crate) ready: Mutex<Cell<QPSet>>,
    pub(crate) subscribers: Mutex<RefCell<&'static mut [QPSet]>>,
    pub(crate) time_heads: Mutex<RefCell<[TimeHead; QF_MAX_TICK_RATE]>>,
    pools: QEvtPools,
}

impl QFramework {
    /// Create an empty framework
    pub const fn new() -> Self {
        Self {
            registry: Mutex::new(RefCell::new([None; QF_MAX_ACTIVE + 1])),
            ready: Mutex::new(Cell::new(QPSet::EMPTY)),
            subscribers: Mutex::new(RefCell::new(&mut [])),
            time_heads: Mutex::new(RefCell::new([TimeHead::EMPTY; QF_MAX_TICK_RATE])),
            pools: QEvtPools::new(),
        }
    }

    /// Register the next event pool. Pools go smallest block size first.
    pub fn pool_init(&self, sto: &'static mut [usize], evt_size: usize) {
        self.pools.pool_init(sto, evt_size);
    }

    /// Allocate a pooled event carrying only a signal.
    ///
    /// See [`QEvtPools::new_evt`] for the margin rules.
    pub fn new_evt(&self, sig: QSignal, margin: u16) -> Option<QEvtRef> {
        self.pools.new_evt(sig, margin)
    }

    /// Allocate a pooled event with `payload`
    pub fn new_evt_with<T>(&self, sig: QSignal, payload: T, margin: u16) -> Option<QEvtRef>
    where
        T: Copy + Send + Sync + 'static,
    {
        self.pools.new_evt_with(sig, payload, margin)
    }

    /// Drop one reference to `e`, recycling it when it was the last
    pub fn gc(&self, e: QEvtRef) {
        self.pools.gc(e);
    }

    /// Keep `e` alive past the current run-to-completion step
    pub fn new_ref(&self, e: QEvtRef) -> QEvtRef {
        self.pools.new_ref(e)
    }

    /// Release a reference taken with [`QFramework::new_ref`]
    pub fn delete_ref(&self, e: QEvtRef) {
        self.pools.delete_ref(e);
    }

    /// Lowest number of free blocks the pool ever had
    pub fn pool_min(&self, pool_id: u8) -> QMPoolCtr {
        self.pools.pool_min(pool_id)
    }

    /// Largest event the pools can hold, in bytes
    pub fn pool_max_block_size(&self) -> usize {
        self.pools.max_block_size()
    }

    /// Event pools, for inspection
    pub fn pools(&self) -> &QEvtPools {
        &self.pools
    }
}

impl Default for QFramework {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QFramework {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QFramework{{ ready: {} }}", self.ready_set());
    }
}
