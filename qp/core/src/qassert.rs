//! Embedded-style contract checks
//!
//! Every broken invariant in the framework ends up in [`on_error`] with a
//! stable `(module, location)` pair. Each framework module names itself once
//! with [`q_define_this_module!`] and then uses the checking macros:
//!
//! ```ignore
//! qp_core::q_define_this_module!("qf_mem");
//!
//! fn put(&self, n_free: u16, n_tot: u16) {
//!     qp_core::q_require!(200, n_free < n_tot);
//! }
//! ```
//!
//! Checks run outside critical sections: callers compute the condition while
//! holding one and assert after leaving it.

use core::cell::Cell;
use critical_section::Mutex;

/// Assertion handler installed by the application.
///
/// Receives the module identifier and location code and must not return;
/// typical handlers log, then halt or reset the MCU.
pub type QAssertHandler = fn(module: &'static str, location: u16) -> !;

static ON_ERROR: Mutex<Cell<Option<QAssertHandler>>> = Mutex::new(Cell::new(None));

/// Install the application's assertion handler.
///
/// Meant to be called once during startup, before any active object runs.
pub fn set_on_error(handler: QAssertHandler) {
    critical_section::with(|cs| ON_ERROR.borrow(cs).set(Some(handler)));
}

/// Report a contract violation. Never returns.
///
/// Without an installed handler this panics with `"<module>:<location>"`,
/// which hands control to the target's panic handler.
#[cold]
#[inline(never)]
pub fn on_error(module: &'static str, location: u16) -> ! {
    log::error!("assertion failed at {}:{}", module, location);
    let handler = critical_section::with(|cs| ON_ERROR.borrow(cs).get());
    match handler {
        Some(handler) => handler(module, location),
        None => panic!("assertion failed at {}:{}", module, location),
    }
}

/// Names the module used in assertion reports from the enclosing file.
#[macro_export]
macro_rules! q_define_this_module {
    ($name:literal) => {
        #[allow(dead_code)]
        const THIS_MODULE: &str = $name;
    };
}

/// Precondition check.
#[macro_export]
macro_rules! q_require {
    ($loc:literal, $cond:expr) => {
        if !($cond) {
            $crate::on_error(THIS_MODULE, $loc)
        }
    };
}

/// Postcondition check.
#[macro_export]
macro_rules! q_ensure {
    ($loc:literal, $cond:expr) => {
        if !($cond) {
            $crate::on_error(THIS_MODULE, $loc)
        }
    };
}

/// Internal invariant check.
#[macro_export]
macro_rules! q_assert {
    ($loc:literal, $cond:expr) => {
        if !($cond) {
            $crate::on_error(THIS_MODULE, $loc)
        }
    };
}

/// Precondition checked in debug builds only.
#[macro_export]
macro_rules! q_require_dbg {
    ($loc:literal, $cond:expr) => {
        if cfg!(debug_assertions) && !($cond) {
            $crate::on_error(THIS_MODULE, $loc)
        }
    };
}

/// Unconditional failure, for paths that must never be reached.
#[macro_export]
macro_rules! q_error {
    ($loc:literal) => {
        $crate::on_error(THIS_MODULE, $loc)
    };
}
