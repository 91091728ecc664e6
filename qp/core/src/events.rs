//! Event types and signal definitions for the QP framework

use core::any::Any;
use core::cell::Cell;
use core::fmt;

use critical_section::{CriticalSection, Mutex};

use crate::{QError, QResult};

/// Type-safe event signal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QSignal(pub u16);

impl QSignal {
    /// Never delivered; marks an unused signal slot
    pub const EMPTY: QSignal = QSignal(0);
    /// Reserved signal for state entry actions
    pub const ENTRY: QSignal = QSignal(1);
    /// Reserved signal for state exit actions
    pub const EXIT: QSignal = QSignal(2);
    /// Reserved signal for nested initial transitions
    pub const INIT: QSignal = QSignal(3);

    /// First user-defined signal
    pub const USER: QSignal = QSignal(4);

    /// Create a new signal from a raw value
    pub const fn new(signal: u16) -> Self {
        QSignal(signal)
    }

    /// The `offset`-th application signal, counted from [`QSignal::USER`]
    pub fn user(offset: u16) -> QResult<Self> {
        Self::USER
            .0
            .checked_add(offset)
            .map(QSignal)
            .ok_or(QError::InvalidSignal)
    }

    /// Get the raw signal value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// True for the signals the state machine engine sends by itself
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::USER.0
    }
}

impl fmt::Display for QSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QSignal({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QSignal {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QSignal({})", self.0);
    }
}

/// Payload of a pooled event, type-erased
pub type QPayload = &'static (dyn Any + Send + Sync);

/// Event header shared by every event in the system.
///
/// Static events (`pool_id == 0`) are plain values in static or stack
/// storage. Pooled events live inside a memory pool block and are reclaimed
/// by the garbage collector once their reference count drops to zero; only
/// the memory layer creates them.
///
/// A `QEvt` is neither `Clone` nor `Copy`: every handle to an event refers to
/// the one header that owns its reference count. Signal, pool id and payload
/// are fixed when the event is created; the reference count is the only
/// field that changes and it is only touched inside critical sections.
#[repr(C)]
pub struct QEvt {
    sig: QSignal,
    pool_id: u8,
    ref_ctr: Mutex<Cell<u8>>,
    payload: Option<QPayload>,
}

impl QEvt {
    /// Create a static event carrying only a signal
    pub const fn new(sig: QSignal) -> Self {
        Self::pooled(sig, 0)
    }

    /// Header of a pooled event without payload.
    #[doc(hidden)]
    pub const fn pooled(sig: QSignal, pool_id: u8) -> Self {
        Self {
            sig,
            pool_id,
            ref_ctr: Mutex::new(Cell::new(0)),
            payload: None,
        }
    }

    /// Header of a pooled event whose payload sits next to it in the block.
    #[doc(hidden)]
    pub fn pooled_with<T: Send + Sync + 'static>(
        sig: QSignal,
        pool_id: u8,
        payload: &'static T,
    ) -> Self {
        Self {
            sig,
            pool_id,
            ref_ctr: Mutex::new(Cell::new(0)),
            payload: Some(payload as QPayload),
        }
    }

    /// Signal of the event
    pub fn sig(&self) -> QSignal {
        self.sig
    }

    /// 0 for static events, otherwise the 1-based index of the owning pool
    pub fn pool_id(&self) -> u8 {
        self.pool_id
    }

    /// True if the event came from an event pool
    pub fn is_dynamic(&self) -> bool {
        self.pool_id != 0
    }

    /// Current number of references held on a pooled event
    pub fn ref_ctr(&self) -> u8 {
        critical_section::with(|cs| self.ref_ctr_in(cs))
    }

    /// Reference count read under a critical section the caller already holds
    pub fn ref_ctr_in(&self, cs: CriticalSection<'_>) -> u8 {
        self.ref_ctr.borrow(cs).get()
    }

    /// True when one more reference would not fit the counter
    pub fn ref_saturated_in(&self, cs: CriticalSection<'_>) -> bool {
        self.ref_ctr_in(cs) == u8::MAX
    }

    /// Add one reference. The token proves the caller holds a critical section.
    pub fn inc_ref(&self, cs: CriticalSection<'_>) {
        let ctr = self.ref_ctr.borrow(cs);
        ctr.set(ctr.get().wrapping_add(1));
    }

    /// Drop one reference. The token proves the caller holds a critical section.
    pub fn dec_ref(&self, cs: CriticalSection<'_>) {
        let ctr = self.ref_ctr.borrow(cs);
        ctr.set(ctr.get().wrapping_sub(1));
    }

    /// Typed access to the parameters carried by a pooled event.
    ///
    /// Returns `None` for events without payload or when `T` is not the type
    /// the event was created with.
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload?.downcast_ref::<T>()
    }
}

impl fmt::Debug for QEvt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QEvt")
            .field("sig", &self.sig())
            .field("pool_id", &self.pool_id())
            .field("ref_ctr", &self.ref_ctr())
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QEvt {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "QEvt{{ sig: {}, pool: {}, refs: {} }}",
            self.sig().0,
            self.pool_id(),
            self.ref_ctr()
        );
    }
}

/// Handle to an event as it travels through queues and the scheduler
pub type QEvtRef = &'static QEvt;

/// Ring buffer slot holding a queued event handle
pub type QEvtSlot = Option<QEvtRef>;

/// Events the state machine engine sends to handlers
pub static ENTRY_EVT: QEvt = QEvt::new(QSignal::ENTRY);
/// Exit action trigger
pub static EXIT_EVT: QEvt = QEvt::new(QSignal::EXIT);
/// Nested initial transition trigger
pub static INIT_EVT: QEvt = QEvt::new(QSignal::INIT);
