#![no_std]
#![forbid(unsafe_code)]

//! # QP Framework (QF)
//!
//! The Framework layer provides active objects, event queues, time events
//! and publish-subscribe on top of the state machine engine.
//!
//! Active objects are encapsulated, event-driven concurrent objects that communicate
//! through asynchronous message passing. Each active object has its own event queue
//! and runs its state machine to completion for one event at a time. All of the
//! shared bookkeeping lives in a [`QFramework`], usually one `static` per
//! application.

#[cfg(test)]
extern crate std;

pub mod active;
pub mod defer;
pub mod framework;
pub mod ps;
pub mod queue;
pub mod registry;
pub mod ticker;
pub mod time;

pub use active::{ActiveBehavior, ActiveContext, ActiveObject, QActive};
pub use framework::QFramework;
pub use queue::QEQueue;
pub use ticker::QTicker;
pub use time::QTimeEvt;

pub use qp_core::*;
pub use qp_qep::{QHsm, QStateMachine};
