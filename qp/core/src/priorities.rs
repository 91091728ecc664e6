//! Priority management for active objects

use core::fmt;
use crate::{QError, QResult, QF_MAX_ACTIVE};

/// Type-safe priority level for active objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QPriority(u8);

impl QPriority {
    /// Minimum priority level (lowest priority)
    pub const MIN: QPriority = QPriority(1);

    /// Maximum priority level (highest priority)
    pub const MAX: QPriority = QPriority(QF_MAX_ACTIVE as u8);

    /// Invalid priority (used for idle)
    pub const INVALID: QPriority = QPriority(0);

    /// Create a new priority level
    pub fn new(priority: u8) -> QResult<Self> {
        if priority == 0 || priority > Self::MAX.0 {
            Err(QError::InvalidPriority)
        } else {
            Ok(QPriority(priority))
        }
    }

    /// Create priority without validation (const fn)
    pub const fn new_unchecked(priority: u8) -> Self {
        QPriority(priority)
    }

    /// Get the raw priority value
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Check if this priority is valid
    pub const fn is_valid(self) -> bool {
        self.0 > 0 && self.0 <= Self::MAX.0
    }
}

impl fmt::Display for QPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QPriority {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Priority({})", self.0);
    }
}

/// Set of up to 64 priorities (bit `p - 1` stands for priority `p`).
///
/// Backs the scheduler's ready set and every subscriber list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QPSet(u64);

impl QPSet {
    /// Empty set
    pub const EMPTY: Self = Self(0);

    /// Create a new empty set
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Add priority `p` (1-based)
    pub fn insert(&mut self, p: u8) {
        debug_assert!(p >= 1 && p <= 64);
        self.0 |= 1u64 << (p - 1);
    }

    /// Remove priority `p`
    pub fn remove(&mut self, p: u8) {
        debug_assert!(p >= 1 && p <= 64);
        self.0 &= !(1u64 << (p - 1));
    }

    /// Check if priority `p` is in the set
    pub const fn has_element(&self, p: u8) -> bool {
        p >= 1 && p <= 64 && (self.0 & (1u64 << (p - 1))) != 0
    }

    /// Check if the set is empty
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check if the set has at least one element
    pub const fn not_empty(&self) -> bool {
        self.0 != 0
    }

    /// Highest priority in the set
    pub const fn find_max(&self) -> Option<u8> {
        if self.0 == 0 {
            None
        } else {
            Some((64 - self.0.leading_zeros()) as u8)
        }
    }

    /// Raw bit pattern
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Elements from highest to lowest priority
    pub fn iter_desc(&self) -> impl Iterator<Item = u8> {
        let mut rest = *self;
        core::iter::from_fn(move || {
            let p = rest.find_max()?;
            rest.remove(p);
            Some(p)
        })
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QPSet {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QPSet({=u64:b})", self.0);
    }
}

/// Macro to create compile-time priority constants
#[macro_export]
macro_rules! priority {
    ($value:literal) => {
        $crate::QPriority::new_unchecked($value)
    };
}
