//! Interrupt-safe event queue
//!
//! A ring buffer of event handles over caller-supplied storage plus a
//! separate front slot. With at most one event queued the ring is not
//! touched at all. Used directly for deferred events and as the queue of
//! every active object.

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use qp_core::{QEQueueCtr, QEvtRef, QEvtSlot, QF_NO_MARGIN};

qp_core::q_define_this_module!("qf_qeq");

/// Result of an insertion attempted under a critical section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PostStatus {
    Posted,
    /// Not enough free slots for the requested margin
    Refused,
    /// Queue full while no margin was allowed
    Overflow,
    /// The event's reference counter cannot take another reference
    Saturated,
}

/// Result of a removal attempted under a critical section
#[derive(Clone, Copy)]
pub(crate) enum GetStatus {
    Evt(QEvtRef),
    Empty,
    /// Counters disagree with the slots
    Corrupt,
}

struct QueueState {
    front: QEvtSlot,
    ring: &'static mut [QEvtSlot],
    head: QEQueueCtr,
    tail: QEQueueCtr,
    end: QEQueueCtr,
    n_free: QEQueueCtr,
    n_min: QEQueueCtr,
}

/// Event queue with FIFO and LIFO insertion.
///
/// Posting a pooled event adds a reference on behalf of the queue; whoever
/// takes the event out owns that reference and hands it to the garbage
/// collector when done.
pub struct QEQueue {
    state: Mutex<RefCell<QueueState>>,
}

impl QEQueue {
    /// Queue without storage. Holds only the front slot until [`QEQueue::init`].
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(QueueState {
                front: None,
                ring: &mut [],
                head: 0,
                tail: 0,
                end: 0,
                n_free: 1,
                n_min: 1,
            })),
        }
    }

    /// Bind the ring storage. Capacity is `sto.len() + 1` events.
    ///
    /// Discards whatever the queue held before; meant for startup.
    pub fn init(&self, sto: &'static mut [QEvtSlot]) {
        qp_core::q_require!(100, sto.len() < QEQueueCtr::MAX as usize);

        let end = sto.len() as QEQueueCtr;
        critical_section::with(|cs| {
            *self.state.borrow_ref_mut(cs) = QueueState {
                front: None,
                ring: sto,
                head: 0,
                tail: 0,
                end,
                n_free: end + 1,
                n_min: end + 1,
            };
        });
    }

    pub(crate) fn post_in(&self, cs: CriticalSection<'_>, e: QEvtRef, margin: u16) -> PostStatus {
        let mut q = self.state.borrow_ref_mut(cs);
        let n_free = q.n_free;
        if margin == QF_NO_MARGIN {
            if n_free == 0 {
                return PostStatus::Overflow;
            }
        } else if n_free <= margin {
            return PostStatus::Refused;
        }

        if e.is_dynamic() {
            if e.ref_saturated_in(cs) {
                return PostStatus::Saturated;
            }
            e.inc_ref(cs);
        }
        q.n_free = n_free - 1;
        if q.n_min > q.n_free {
            q.n_min = q.n_free;
        }

        if q.front.is_none() {
            q.front = Some(e);
        } else {
            let head = usize::from(q.head);
            q.ring[head] = Some(e);
            if q.head == 0 {
                q.head = q.end;
            }
            q.head -= 1;
        }
        PostStatus::Posted
    }

    /// Reports `Overflow` when the queue has no room
    pub(crate) fn post_lifo_in(&self, cs: CriticalSection<'_>, e: QEvtRef) -> PostStatus {
        let mut q = self.state.borrow_ref_mut(cs);
        if q.n_free == 0 {
            return PostStatus::Overflow;
        }

        if e.is_dynamic() {
            if e.ref_saturated_in(cs) {
                return PostStatus::Saturated;
            }
            e.inc_ref(cs);
        }
        q.n_free -= 1;
        if q.n_min > q.n_free {
            q.n_min = q.n_free;
        }

        if let Some(prev) = q.front.replace(e) {
            q.tail += 1;
            if q.tail == q.end {
                q.tail = 0;
            }
            let tail = usize::from(q.tail);
            q.ring[tail] = Some(prev);
        }
        PostStatus::Posted
    }

    pub(crate) fn get_in(&self, cs: CriticalSection<'_>) -> GetStatus {
        let mut q = self.state.borrow_ref_mut(cs);
        let Some(e) = q.front else {
            return GetStatus::Empty;
        };

        let n_free = q.n_free + 1;
        q.n_free = n_free;
        if n_free <= q.end {
            let tail = usize::from(q.tail);
            q.front = q.ring[tail].take();
            if q.tail == 0 {
                q.tail = q.end;
            }
            q.tail -= 1;
            if q.front.is_none() {
                return GetStatus::Corrupt;
            }
        } else {
            q.front = None;
            if n_free != q.end + 1 {
                return GetStatus::Corrupt;
            }
        }
        GetStatus::Evt(e)
    }

    pub(crate) fn is_empty_in(&self, cs: CriticalSection<'_>) -> bool {
        self.state.borrow_ref(cs).front.is_none()
    }

    /// Append `e`, provided more than `margin` slots are free.
    ///
    /// Returns `false` if the margin cannot be honored. With
    /// [`QF_NO_MARGIN`] a full queue is a contract violation instead.
    pub fn post(&self, e: QEvtRef, margin: u16) -> bool {
        let status = critical_section::with(|cs| self.post_in(cs, e, margin));
        match status {
            PostStatus::Posted => true,
            PostStatus::Refused => {
                log::debug!("queue refused {}, margin {}", e.sig(), margin);
                false
            }
            PostStatus::Overflow => qp_core::q_error!(210),
            PostStatus::Saturated => qp_core::q_error!(200),
        }
    }

    /// Put `e` in front of everything else. The queue must have room.
    pub fn post_lifo(&self, e: QEvtRef) {
        match critical_section::with(|cs| self.post_lifo_in(cs, e)) {
            PostStatus::Posted => {}
            PostStatus::Saturated => qp_core::q_error!(200),
            PostStatus::Refused | PostStatus::Overflow => qp_core::q_error!(300),
        }
    }

    /// Take the front event, if any. Never blocks.
    pub fn get(&self) -> Option<QEvtRef> {
        match critical_section::with(|cs| self.get_in(cs)) {
            GetStatus::Evt(e) => Some(e),
            GetStatus::Empty => None,
            GetStatus::Corrupt => qp_core::q_error!(410),
        }
    }

    /// Currently free slots, the front slot included
    pub fn n_free(&self) -> QEQueueCtr {
        critical_section::with(|cs| self.state.borrow_ref(cs).n_free)
    }

    /// Lowest number of free slots ever observed
    pub fn n_min(&self) -> QEQueueCtr {
        critical_section::with(|cs| self.state.borrow_ref(cs).n_min)
    }

    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.is_empty_in(cs))
    }
}

impl Default for QEQueue {
    fn default() -> Self {
        Self::new()
    }
}
