//! State identities and the state-handler return vocabulary

use core::fmt;

/// Identity of one state in a hierarchical state machine.
///
/// Typically a fieldless `enum` listing the states of one machine. Equality
/// is the only comparison the engine needs; the hierarchy is described by
/// [`QStateId::superstate`], where `None` stands for the implicit top state.
pub trait QStateId: Copy + PartialEq + fmt::Debug {
    /// The enclosing state, or `None` when directly nested in top
    fn superstate(self) -> Option<Self>;
}

/// What a state handler did with an event.
///
/// Variants are listed in the order of [`QRetCode`]; everything up to
/// `Unhandled` makes the engine try the superstate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QStateReturn<S> {
    /// Event not handled here, delegate to the superstate
    Super,
    /// Guard evaluated to false, delegate to the superstate
    Unhandled,
    /// Handled internally, no transition
    Handled,
    /// Ignored by the top state
    Ignored,
    /// Entry action executed
    Entry,
    /// Exit action executed
    Exit,
    /// Regular transition to the target
    Transition(S),
    /// Initial transition to the target
    Initial(S),
    /// Transition to a history state recorded by the application
    History(S),
}

/// Ordered numeric form of [`QStateReturn`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QRetCode {
    Super = 0,
    Unhandled = 1,
    Handled = 2,
    Ignored = 3,
    Entry = 4,
    Exit = 5,
    Tran = 6,
    TranInit = 7,
    TranHist = 8,
}

impl<S: Copy> QStateReturn<S> {
    /// Numeric code, ordered so that delegation < terminal < transition
    pub fn code(&self) -> QRetCode {
        match self {
            QStateReturn::Super => QRetCode::Super,
            QStateReturn::Unhandled => QRetCode::Unhandled,
            QStateReturn::Handled => QRetCode::Handled,
            QStateReturn::Ignored => QRetCode::Ignored,
            QStateReturn::Entry => QRetCode::Entry,
            QStateReturn::Exit => QRetCode::Exit,
            QStateReturn::Transition(_) => QRetCode::Tran,
            QStateReturn::Initial(_) => QRetCode::TranInit,
            QStateReturn::History(_) => QRetCode::TranHist,
        }
    }

    /// True if the engine has to look at the superstate
    pub fn delegates(&self) -> bool {
        self.code() <= QRetCode::Unhandled
    }

    /// Check if this is a transition
    pub fn is_transition(&self) -> bool {
        self.code() >= QRetCode::Tran
    }

    /// Target state of a transition
    pub fn target(&self) -> Option<S> {
        match *self {
            QStateReturn::Transition(s) | QStateReturn::Initial(s) | QStateReturn::History(s) => {
                Some(s)
            }
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl<S> defmt::Format for QStateReturn<S> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            QStateReturn::Super => defmt::write!(fmt, "Super"),
            QStateReturn::Unhandled => defmt::write!(fmt, "Unhandled"),
            QStateReturn::Handled => defmt::write!(fmt, "Handled"),
            QStateReturn::Ignored => defmt::write!(fmt, "Ignored"),
            QStateReturn::Entry => defmt::write!(fmt, "Entry"),
            QStateReturn::Exit => defmt::write!(fmt, "Exit"),
            QStateReturn::Transition(_) => defmt::write!(fmt, "Transition"),
            QStateReturn::Initial(_) => defmt::write!(fmt, "Initial"),
            QStateReturn::History(_) => defmt::write!(fmt, "History"),
        }
    }
}
