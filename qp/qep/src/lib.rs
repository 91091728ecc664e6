#![no_std]
#![forbid(unsafe_code)]

//! # QP Event Processor (QEP)
//!
//! Hierarchical state machine engine implementing UML statecharts.
//! Provides the core state machine execution engine with:
//! - Entry and exit actions
//! - Nested initial transitions
//! - Hierarchical state nesting with bubble-up of unhandled events
//! - Transitions sequenced through the least common ancestor
//! - History support via [`QStateMachine::child_state`]

#[cfg(test)]
extern crate std;

use qp_core::{QEvt, QStateId, QStateReturn};

pub mod hsm;
pub mod transition;


/// Bookkeeping of a hierarchical state machine.
///
/// `None` stands for the implicit top state, so a machine that has not run
/// its initial transition yet sits in top. Outside of [`QStateMachine::init`]
/// and [`QStateMachine::dispatch`] both fields are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QHsm<S> {
    pub(crate) state: Option<S>,
    pub(crate) temp: Option<S>,
}

impl<S: QStateId> QHsm<S> {
    /// Create a machine that still has to be initialized
    pub const fn new() -> Self {
        Self {
            state: None,
            temp: None,
        }
    }

    /// Current active (leaf) state
    pub fn state(&self) -> Option<S> {
        self.state
    }

    /// True when no transition is in progress
    pub fn is_stable(&self) -> bool {
        self.state == self.temp
    }
}

impl<S: QStateId> Default for QHsm<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl<S> defmt::Format for QHsm<S> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QHsm");
    }
}

/// A hierarchical state machine.
///
/// Implementors own a [`QHsm`] and provide two things: the top-level initial
/// transition and one handler that receives `(state, event)`. The handler
/// answers [`QStateReturn::Super`] for everything a state does not handle,
/// including entry, exit and init events it has no action for.
///
/// ```ignore
/// fn handle(&mut self, state: Light, e: &QEvt) -> QStateReturn<Light> {
///     match (state, e.sig()) {
///         (Light::Off, QSignal::ENTRY) => { self.led.set_low(); QStateReturn::Entry }
///         (Light::Off, TOGGLE) => QStateReturn::Transition(Light::On),
///         _ => QStateReturn::Super,
///     }
/// }
/// ```
pub trait QStateMachine {
    /// State identity of this machine
    type State: QStateId;

    fn hsm(&self) -> &QHsm<Self::State>;

    fn hsm_mut(&mut self) -> &mut QHsm<Self::State>;

    /// Initial pseudostate: must return a transition to the first state
    fn initial(&mut self, par: Option<&QEvt>) -> QStateReturn<Self::State>;

    /// Handle `e` in `state`
    fn handle(&mut self, state: Self::State, e: &QEvt) -> QStateReturn<Self::State>;

    /// Run the top-level initial transition. Allowed exactly once.
    fn init(&mut self, par: Option<&QEvt>) {
        hsm::init(self, par);
    }

    /// Process one event to completion
    fn dispatch(&mut self, e: &QEvt) {
        hsm::dispatch(self, e);
    }

    /// True if the machine is in `state` or in one of its substates
    fn is_in(&self, state: Self::State) -> bool {
        hsm::is_in(self, state)
    }

    /// Direct child of `parent` on the way to the active state.
    ///
    /// Used to record shallow history, typically in `parent`'s exit action.
    /// `parent` must be a proper ancestor of the active state.
    fn child_state(&self, parent: Self::State) -> Self::State {
        hsm::child_state(self, parent)
    }

    /// Current active (leaf) state
    fn state(&self) -> Option<Self::State> {
        self.hsm().state
    }
}
