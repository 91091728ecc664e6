#![no_std]
#![forbid(unsafe_code)]

//! # QP Core
//!
//! Core types, traits, and abstractions for the QP real-time embedded framework.
//! This crate provides the foundation shared by the memory, state machine,
//! framework and kernel layers: signals and event headers, the state-handler
//! return vocabulary, priority sets, the compile-time configuration and the
//! assertion hook every contract check is routed through.

#[cfg(feature = "std")]
extern crate std;

use core::fmt;

pub mod config;
pub mod events;
pub mod priorities;
pub mod qassert;
pub mod states;

pub use config::*;
pub use events::*;
pub use priorities::*;
pub use qassert::*;
pub use states::*;

/// QP framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used for recoverable validation throughout the QP framework
pub type QResult<T> = Result<T, QError>;

/// Error types for recoverable QP framework operations
///
/// Broken invariants never show up here; they go through [`on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QError {
    /// Priority outside `1..=QF_MAX_ACTIVE`
    InvalidPriority,
    /// Signal number does not fit the signal width
    InvalidSignal,
}

impl fmt::Display for QError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QError::InvalidPriority => write!(f, "Invalid priority level"),
            QError::InvalidSignal => write!(f, "Invalid signal number"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for QError {}

#[cfg(feature = "defmt")]
impl defmt::Format for QError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            QError::InvalidPriority => defmt::write!(fmt, "InvalidPriority"),
            QError::InvalidSignal => defmt::write!(fmt, "InvalidSignal"),
        }
    }
}
