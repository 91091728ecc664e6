//! Fixed block-size memory pool

use core::cell::RefCell;
use core::mem::size_of;
use core::ptr::NonNull;

use critical_section::Mutex;
use qp_core::{QMPoolCtr, QMPoolSize, QF_NO_MARGIN};

use crate::QPoolStats;

qp_core::q_define_this_module!("qf_mem");

/// Free-list link stored in the first word of every free block
#[repr(C)]
struct QFreeBlock {
    next: Option<NonNull<QFreeBlock>>,
}

struct PoolState {
    start: NonNull<usize>,
    end: NonNull<usize>,
    block_size: usize,
    free_head: Option<NonNull<QFreeBlock>>,
    n_free: QMPoolCtr,
    n_min: QMPoolCtr,
}

// SAFETY: the pointers refer to the pool's own `'static` storage, which is
// only touched through this state while holding a critical section.
unsafe impl Send for PoolState {}

enum Acquire {
    Block(NonNull<u8>),
    Refused,
    Corrupt(u16),
}

/// Fixed block-size free-list allocator over caller-supplied storage.
///
/// The storage is a slice of words so every block is aligned to the
/// platform pointer size. Blocks are handed out as raw pointers; giving a
/// block back twice, or giving back a block that came from elsewhere, corrupts
/// the free list. The address range check on [`QMPool::put`] only exists in
/// debug builds.
pub struct QMPool {
    state: Mutex<RefCell<PoolState>>,
    block_size: QMPoolSize,
    n_tot: QMPoolCtr,
}

impl QMPool {
    /// Slice `sto` into blocks of at least `block_size` bytes and link them all
    /// into the free list.
    ///
    /// The block size is rounded up to a multiple of the pointer size. Meant
    /// for single-threaded startup.
    pub fn new(sto: &'static mut [usize], block_size: usize) -> Self {
        const WORD: usize = size_of::<usize>();

        let words = block_size.div_ceil(WORD).max(1);
        qp_core::q_require!(
            100,
            !sto.is_empty() && words * WORD <= QMPoolSize::MAX as usize
        );

        let n_tot = sto.len() / words;
        qp_core::q_assert!(110, n_tot >= 1 && n_tot < QMPoolCtr::MAX as usize);

        let base = NonNull::from(sto).cast::<usize>();
        let block_at = |i: usize| -> NonNull<usize> {
            // SAFETY: `i < n_tot`, so the block lies within `sto`.
            unsafe { base.add(i * words) }
        };
        for i in 0..n_tot {
            let next = if i + 1 < n_tot {
                Some(block_at(i + 1).cast::<QFreeBlock>())
            } else {
                None
            };
            // SAFETY: the block is inside `sto`, word aligned and at least
            // one word long; nobody else can reach it yet.
            unsafe {
                block_at(i)
                    .cast::<QFreeBlock>()
                    .as_ptr()
                    .write(QFreeBlock { next });
            }
        }

        let n_tot = n_tot as QMPoolCtr;
        log::debug!("pool of {} blocks x {} bytes", n_tot, words * WORD);

        Self {
            state: Mutex::new(RefCell::new(PoolState {
                start: base,
                end: block_at(n_tot as usize - 1),
                block_size: words * WORD,
                free_head: Some(base.cast()),
                n_free: n_tot,
                n_min: n_tot,
            })),
            block_size: (words * WORD) as QMPoolSize,
            n_tot,
        }
    }

    /// Take one block, provided more than `margin` blocks are free.
    ///
    /// Returns `None` when the margin cannot be honored. With
    /// [`QF_NO_MARGIN`] an exhausted pool is a contract violation instead.
    pub fn get(&self, margin: u16) -> Option<NonNull<u8>> {
        let required = if margin == QF_NO_MARGIN { 0 } else { margin };

        let outcome = critical_section::with(|cs| {
            let mut pool = self.state.borrow_ref_mut(cs);
            if pool.n_free <= required {
                return Acquire::Refused;
            }
            let Some(fb) = pool.free_head else {
                return Acquire::Corrupt(310);
            };
            // SAFETY: blocks on the free list belong to the pool and start
            // with a link written by `new` or `put`.
            let next = unsafe { fb.as_ptr().read().next };
            let n_free = pool.n_free - 1;
            if n_free == 0 {
                if next.is_some() {
                    return Acquire::Corrupt(320);
                }
                pool.n_min = 0;
            } else {
                match next {
                    Some(n) if pool.contains(n.cast()) => {}
                    _ => return Acquire::Corrupt(330),
                }
                if pool.n_min > n_free {
                    pool.n_min = n_free;
                }
            }
            pool.n_free = n_free;
            pool.free_head = next;
            Acquire::Block(fb.cast())
        });

        match outcome {
            Acquire::Block(block) => Some(block),
            Acquire::Refused => {
                qp_core::q_assert!(300, margin != QF_NO_MARGIN);
                log::debug!("pool refused block, margin {}", margin);
                None
            }
            Acquire::Corrupt(location) => qp_core::on_error(THIS_MODULE, location),
        }
    }

    /// Give a block back to the pool
    pub fn put(&self, block: NonNull<u8>) {
        let (in_range, accepted) = critical_section::with(|cs| {
            let mut pool = self.state.borrow_ref_mut(cs);
            let in_range = pool.contains(block);
            if pool.n_free >= self.n_tot || (cfg!(debug_assertions) && !in_range) {
                return (in_range, false);
            }
            let offset = block.as_ptr() as usize - pool.start.as_ptr() as usize;
            // Rebuild the pointer from the pool's own storage.
            let fb = pool
                .start
                .cast::<u8>()
                .as_ptr()
                .wrapping_add(offset)
                .cast::<QFreeBlock>();
            // SAFETY: the block belongs to this pool and the caller gave up
            // every use of it.
            unsafe { fb.write(QFreeBlock { next: pool.free_head }) };
            pool.free_head = NonNull::new(fb);
            pool.n_free += 1;
            (in_range, true)
        });
        qp_core::q_require_dbg!(200, in_range);
        qp_core::q_require!(200, accepted);
    }

    /// Usable size of each block in bytes
    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    /// Total number of blocks
    pub fn n_tot(&self) -> QMPoolCtr {
        self.n_tot
    }

    /// Blocks currently free
    pub fn n_free(&self) -> QMPoolCtr {
        critical_section::with(|cs| self.state.borrow_ref(cs).n_free)
    }

    /// Lowest number of free blocks ever observed
    pub fn n_min(&self) -> QMPoolCtr {
        critical_section::with(|cs| self.state.borrow_ref(cs).n_min)
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> QPoolStats {
        critical_section::with(|cs| {
            let pool = self.state.borrow_ref(cs);
            QPoolStats {
                total_blocks: self.n_tot as usize,
                free_blocks: pool.n_free as usize,
                used_blocks: (self.n_tot - pool.n_free) as usize,
                min_free_blocks: pool.n_min as usize,
            }
        })
    }
}

impl PoolState {
    /// True if `p` is the start of one of the pool's blocks
    fn contains(&self, p: NonNull<u8>) -> bool {
        let start = self.start.as_ptr() as usize;
        let end = self.end.as_ptr() as usize;
        let addr = p.as_ptr() as usize;
        addr >= start && addr <= end && (addr - start) % self.block_size == 0
    }
}
