#![no_std]
#![allow(unsafe_code)] // Memory pools hand out raw blocks of caller-supplied storage

//! # QP Memory Management
//!
//! Fixed block-size memory pools and the lifecycle of pooled (dynamic)
//! events: allocation from the smallest fitting pool, reference counting and
//! garbage collection. Provides deterministic memory management suitable for
//! real-time embedded systems; there is no general-purpose heap.

#[cfg(test)]
extern crate std;

pub mod events;
pub mod pools;

pub use events::*;
pub use pools::*;

/// Memory pool statistics for debugging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QPoolStats {
    /// Total number of blocks in the pool
    pub total_blocks: usize,
    /// Number of free blocks currently available
    pub free_blocks: usize,
    /// Number of blocks currently in use
    pub used_blocks: usize,
    /// Minimum number of free blocks ever reached
    pub min_free_blocks: usize,
}

impl QPoolStats {
    /// Check if every block is handed out
    pub const fn is_exhausted(&self) -> bool {
        self.free_blocks == 0
    }

    /// Check if no block is handed out
    pub const fn is_idle(&self) -> bool {
        self.used_blocks == 0
    }

    /// Get utilization as a percentage (0-100)
    pub fn utilization(&self) -> u8 {
        if self.total_blocks == 0 {
            0
        } else {
            ((self.used_blocks * 100) / self.total_blocks) as u8
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QPoolStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "QPoolStats{{ total: {}, free: {}, used: {}, min_free: {} }}",
            self.total_blocks,
            self.free_blocks,
            self.used_blocks,
            self.min_free_blocks
        );
    }
}
