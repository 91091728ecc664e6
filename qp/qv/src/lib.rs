#![no_std]
#![forbid(unsafe_code)]

//! # QV Cooperative Kernel
//!
//! The vanilla (cooperative) kernel providing run-to-completion semantics
//! with priority-based event dispatching. No preemption occurs between events:
//! the highest-priority ready active object gets its next event, processes it
//! to completion, and only then is the next one selected. With nothing ready
//! the kernel calls the idle hook with interrupts disabled, so new work cannot
//! slip in between the check and going to sleep.

use core::fmt;

use critical_section::CriticalSection;
use qp_core::{QEvt, QEvtSlot, QPriority};
use qp_qf::{ActiveBehavior, ActiveObject, QActive, QFramework};

qp_core::q_define_this_module!("qv");

/// Handed to the idle hook while interrupts are disabled.
///
/// Interrupts are enabled again once the hook returns. A hook that puts the
/// CPU to sleep should use an instruction that wakes up on a pending
/// interrupt even while they are masked, such as `wfi` on Cortex-M.
pub struct QvIdle<'cs> {
    cs: CriticalSection<'cs>,
}

impl<'cs> QvIdle<'cs> {
    /// The critical section the idle hook runs in
    pub fn cs(&self) -> CriticalSection<'cs> {
        self.cs
    }
}

/// Wait for an interrupt on bare-metal ARM, spin once elsewhere
pub fn default_idle(_idle: QvIdle<'_>) {
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    cortex_m::asm::wfi();

    #[cfg(not(all(target_arch = "arm", target_os = "none")))]
    core::hint::spin_loop();
}

/// Application hooks of the kernel
#[derive(Clone, Copy)]
pub struct QvConfig {
    /// Name of the kernel instance, for logs
    pub name: &'static str,
    /// Runs once when [`QV::run`] starts, typically to start the tick source
    pub on_startup: Option<fn()>,
    /// Runs whenever no active object is ready
    pub on_idle: fn(QvIdle<'_>),
    /// Runs on [`QV::stop`]
    pub on_cleanup: Option<fn()>,
}

impl QvConfig {
    pub fn builder() -> QvConfigBuilder {
        QvConfigBuilder::default()
    }
}

impl Default for QvConfig {
    fn default() -> Self {
        Self {
            name: "qv",
            on_startup: None,
            on_idle: default_idle,
            on_cleanup: None,
        }
    }
}

impl fmt::Debug for QvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QvConfig")
            .field("name", &self.name)
            .field("on_startup", &self.on_startup.is_some())
            .field("on_cleanup", &self.on_cleanup.is_some())
            .finish()
    }
}

/// Builder for ergonomic kernel configuration construction.
#[derive(Debug, Clone, Default)]
pub struct QvConfigBuilder {
    config: QvConfig,
}

impl QvConfigBuilder {
    /// Sets the kernel name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the hook run once before the scheduling loop.
    pub fn on_startup(mut self, hook: fn()) -> Self {
        self.config.on_startup = Some(hook);
        self
    }

    /// Sets the idle hook.
    pub fn on_idle(mut self, hook: fn(QvIdle<'_>)) -> Self {
        self.config.on_idle = hook;
        self
    }

    /// Sets the hook run when the kernel stops.
    pub fn on_cleanup(mut self, hook: fn()) -> Self {
        self.config.on_cleanup = Some(hook);
        self
    }

    pub fn build(self) -> QvConfig {
        self.config
    }
}

/// QV kernel - cooperative scheduler over one [`QFramework`]
pub struct QV {
    qf: &'static QFramework,
    config: QvConfig,
}

impl QV {
    pub fn new(qf: &'static QFramework, config: QvConfig) -> Self {
        Self { qf, config }
    }

    pub fn framework(&self) -> &'static QFramework {
        self.qf
    }

    pub fn config(&self) -> &QvConfig {
        &self.config
    }

    /// Start `ao` at `prio`.
    ///
    /// All active objects share the one stack under this kernel, so `stk`
    /// must be `None`.
    pub fn start<B: ActiveBehavior>(
        &self,
        ao: &'static ActiveObject<B>,
        prio: QPriority,
        q_sto: &'static mut [QEvtSlot],
        stk: Option<&'static mut [u8]>,
        par: Option<&QEvt>,
    ) {
        qp_core::q_require!(500, prio.is_valid() && stk.is_none());
        ao.start(self.qf, prio, q_sto, par);
    }

    /// One pass of the scheduling loop.
    ///
    /// Dispatches one event to the highest-priority ready object and returns
    /// `true`, or runs the idle hook and returns `false`.
    pub fn schedule(&self) -> bool {
        let next = critical_section::with(|cs| {
            let next = self.qf.ready_in(cs).find_max();
            if next.is_none() {
                (self.config.on_idle)(QvIdle { cs });
            }
            next
        });
        match next {
            Some(p) => {
                self.dispatch(p);
                true
            }
            None => false,
        }
    }

    /// Dispatch until no object is ready, without idling.
    ///
    /// Returns the number of events processed.
    pub fn run_until_idle(&self) -> usize {
        let mut n = 0;
        while let Some(p) = self.qf.ready_set().find_max() {
            self.dispatch(p);
            n += 1;
        }
        n
    }

    /// Run the startup hook, then schedule forever
    pub fn run(&self) -> ! {
        if let Some(on_startup) = self.config.on_startup {
            on_startup();
        }
        log::debug!("{} running", self.config.name);
        loop {
            self.schedule();
        }
    }

    /// Run the cleanup hook
    pub fn stop(&self) {
        if let Some(on_cleanup) = self.config.on_cleanup {
            on_cleanup();
        }
        log::warn!("{} stopped", self.config.name);
    }

    fn dispatch(&self, p: u8) {
        let Some(act) = self.qf.active(p) else {
            qp_core::q_error!(310)
        };
        log::trace!("dispatch at priority {}", p);
        let e = act.get();
        act.dispatch(e);
        self.qf.gc(e);
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QV {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QV{{ name: {=str}, ready: {} }}", self.config.name, self.qf.ready_set());
    }
}
