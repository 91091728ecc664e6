//! Transition sequencing through the least common ancestor

use qp_core::{QStateId, QHSM_MAX_NEST_DEPTH};

use crate::hsm::exit;
use crate::QStateMachine;

qp_core::q_define_this_module!("qep_hsm");

/// Fixed-capacity record of states along one branch of the hierarchy.
/// `None` is the top state.
pub type QPath<S> = heapless::Vec<Option<S>, QHSM_MAX_NEST_DEPTH>;

/// Exit up to the least common ancestor of `source` and `target` and return
/// the states still to be entered, innermost first (`target` at index 0).
///
/// The caller has already exited everything below `source`. The cheap cases
/// are tried first; only transitions between unrelated branches walk both
/// ancestor chains.
pub(crate) fn tran<M>(me: &mut M, source: M::State, target: M::State) -> QPath<M::State>
where
    M: QStateMachine + ?Sized,
{
    let mut path = QPath::new();
    push(&mut path, Some(target));

    // (a) self-transition
    if source == target {
        exit(me, source);
        return path;
    }

    // (b) target is a direct child of source
    let t_super = target.superstate();
    if t_super == Some(source) {
        return path;
    }

    // (c) siblings
    let s_super = source.superstate();
    if s_super == t_super {
        exit(me, source);
        return path;
    }

    // (d) target is the direct parent of source
    if s_super == Some(target) {
        exit(me, source);
        path.clear();
        return path;
    }

    // (e) source is an ancestor of target further up
    push(&mut path, t_super);
    let mut cur = t_super;
    while let Some(state) = cur {
        cur = state.superstate();
        if cur == Some(source) {
            return path;
        }
        push(&mut path, cur);
    }

    // (f) one of source's ancestors is on the target path, (g) walk source
    // upward until it meets the target path. The path ends in top, so the
    // walk always terminates there at the latest.
    exit(me, source);
    let mut cur = s_super;
    loop {
        if let Some(lca) = path.iter().rposition(|s| *s == cur) {
            path.truncate(lca);
            return path;
        }
        match cur {
            Some(state) => {
                exit(me, state);
                cur = state.superstate();
            }
            None => qp_core::q_error!(520),
        }
    }
}

fn push<S>(path: &mut QPath<S>, state: Option<S>) {
    if path.push(state).is_err() {
        qp_core::q_error!(510);
    }
}
