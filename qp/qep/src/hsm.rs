//! Hierarchical state machine engine: initial transition, dispatch with
//! bubble-up and the state queries.

use qp_core::{QEvt, QStateId, QStateReturn, ENTRY_EVT, EXIT_EVT, INIT_EVT};

use crate::transition::{tran, QPath};
use crate::QStateMachine;

qp_core::q_define_this_module!("qep_hsm");

pub(crate) fn enter<M>(me: &mut M, state: M::State)
where
    M: QStateMachine + ?Sized,
{
    if me.handle(state, &ENTRY_EVT) == QStateReturn::Entry {
        log::trace!("entry {:?}", state);
    }
}

pub(crate) fn exit<M>(me: &mut M, state: M::State)
where
    M: QStateMachine + ?Sized,
{
    if me.handle(state, &EXIT_EVT) == QStateReturn::Exit {
        log::trace!("exit {:?}", state);
    }
}

/// Enter every state from below `from` down to `to`, outermost first.
/// Overflowing the nesting depth fails at `location`.
fn enter_from<M>(me: &mut M, from: Option<M::State>, to: M::State, location: u16)
where
    M: QStateMachine + ?Sized,
{
    let mut path = QPath::new();
    let mut cur = Some(to);
    while cur != from {
        let Some(state) = cur else {
            qp_core::on_error(THIS_MODULE, location)
        };
        if path.push(cur).is_err() {
            qp_core::on_error(THIS_MODULE, location);
        }
        cur = state.superstate();
    }
    for state in path.iter().rev().flatten() {
        enter(me, *state);
    }
}

/// Follow nested initial transitions starting at `state`; returns the
/// resulting leaf.
fn drill<M>(me: &mut M, mut state: M::State, location: u16) -> M::State
where
    M: QStateMachine + ?Sized,
{
    while let Some(next) = me.handle(state, &INIT_EVT).target() {
        log::trace!("init {:?} -> {:?}", state, next);
        me.hsm_mut().temp = Some(next);
        enter_from(me, Some(state), next, location);
        state = next;
    }
    state
}

pub(crate) fn init<M>(me: &mut M, par: Option<&QEvt>)
where
    M: QStateMachine + ?Sized,
{
    qp_core::q_require!(200, me.hsm().state.is_none());

    let r = me.initial(par);
    let Some(target) = r.target() else {
        qp_core::q_error!(210)
    };
    log::trace!("initial -> {:?}", target);

    me.hsm_mut().temp = Some(target);
    enter_from(me, None, target, 220);
    let leaf = drill(me, target, 220);

    let hsm = me.hsm_mut();
    hsm.state = Some(leaf);
    hsm.temp = Some(leaf);
}

pub(crate) fn dispatch<M>(me: &mut M, e: &QEvt)
where
    M: QStateMachine + ?Sized,
{
    let hsm = me.hsm();
    let leaf = match hsm.state {
        Some(leaf) if hsm.is_stable() => leaf,
        _ => qp_core::q_error!(400),
    };

    // bubble up until some state takes the event; top ignores everything
    let mut source = Some(leaf);
    let mut r = QStateReturn::Ignored;
    while let Some(state) = source {
        r = me.handle(state, e);
        if !r.delegates() {
            break;
        }
        source = state.superstate();
    }

    let (Some(source), Some(target)) = (source, r.target()) else {
        if source.is_none() {
            log::trace!("{} ignored in {:?}", e.sig(), leaf);
        }
        return;
    };
    log::trace!("{} in {:?}: {:?} -> {:?}", e.sig(), leaf, source, target);

    me.hsm_mut().temp = Some(target);

    let mut cur = leaf;
    while cur != source {
        exit(me, cur);
        match cur.superstate() {
            Some(parent) => cur = parent,
            None => break,
        }
    }

    let path = tran(me, source, target);
    for state in path.iter().rev().flatten() {
        enter(me, *state);
    }
    let leaf = drill(me, target, 410);

    let hsm = me.hsm_mut();
    hsm.state = Some(leaf);
    hsm.temp = Some(leaf);
}

pub(crate) fn is_in<M>(me: &M, state: M::State) -> bool
where
    M: QStateMachine + ?Sized,
{
    let hsm = me.hsm();
    qp_core::q_require!(600, hsm.is_stable());

    let mut cur = hsm.state;
    while let Some(s) = cur {
        if s == state {
            return true;
        }
        cur = s.superstate();
    }
    false
}

pub(crate) fn child_state<M>(me: &M, parent: M::State) -> M::State
where
    M: QStateMachine + ?Sized,
{
    let Some(mut child) = me.hsm().state else {
        qp_core::q_error!(810)
    };
    loop {
        match child.superstate() {
            Some(s) if s == parent => return child,
            Some(s) => child = s,
            None => qp_core::q_error!(810),
        }
    }
}
