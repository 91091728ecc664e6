//! Build-time configuration of the framework
//!
//! All sizes are fixed when the firmware is built; nothing here is meant to be
//! changed at runtime.

/// Maximum number of active objects (priorities `1..=QF_MAX_ACTIVE`)
pub const QF_MAX_ACTIVE: usize = 32;

/// Number of independent clock tick rates
pub const QF_MAX_TICK_RATE: usize = 2;

/// Maximum number of event pools
pub const QF_MAX_EPOOL: usize = 3;

/// Deepest state nesting the HSM engine can record in a transition path
pub const QHSM_MAX_NEST_DEPTH: usize = 6;

/// Event queue counter width
pub type QEQueueCtr = u16;

/// Memory pool block counter width
pub type QMPoolCtr = u16;

/// Memory pool block size width
pub type QMPoolSize = u16;

/// Time event countdown width
pub type QTimeEvtCtr = u32;

/// Margin value meaning "delivery is guaranteed".
///
/// Running out of queue slots or pool blocks under this margin is a contract
/// violation instead of a `false`/`None` result.
pub const QF_NO_MARGIN: u16 = 0xFFFF;

const _: () = assert!(QF_MAX_ACTIVE >= 1 && QF_MAX_ACTIVE <= 64);
const _: () = assert!(QF_MAX_TICK_RATE >= 1 && QF_MAX_TICK_RATE <= 15);
const _: () = assert!(QF_MAX_EPOOL >= 1 && QF_MAX_EPOOL <= 255);
const _: () = assert!(QHSM_MAX_NEST_DEPTH >= 3);
