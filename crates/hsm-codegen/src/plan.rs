//! Transition planning: least common ancestors and ordered exit/entry
//! sequences.
//!
//! A [`TransitionPlan`] is a purely structural description of what a
//! transition does: which states leave (bottom-up) and which states enter
//! (top-down). The generator lowers plans to target code; nothing here knows
//! about syntax.
//!
//! The planner fixes two semantic points that the model leaves open:
//!
//! * An explicit self-transition fully exits and re-enters its state rather
//!   than being a no-op.
//! * When the least common ancestor is an orthogonal state (a cross-limb
//!   transition), the source's region exits first, then every other region in
//!   declaration order, and *all* regions re-enter — the target's region
//!   through the explicit entry chain, the rest through their defaults.

use hsm_model::Machine;
use hsm_model::StateId;
use hsm_model::StateKind;
use tracing::trace;

/// Computes the least (deepest) common ancestor of two states.
pub fn lca(machine: &Machine, a: StateId, b: StateId) -> StateId {
    let pa = machine.path_ids(a);
    let pb = machine.path_ids(b);
    let mut result = machine.root();
    for (x, y) in pa.iter().zip(pb.iter()) {
        if x != y {
            break;
        }
        result = *x;
    }
    result
}

/// The entry half of a transition plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPlan {
    /// Enter the listed states top-down; the final state is entered through
    /// its `_start` so the runtime extends the chain to a leaf.
    ///
    /// An empty chain means the LCA's own subtree restarts through its
    /// defaults (the target *was* the LCA).
    Chain(Vec<StateId>),
    /// Enter an orthogonal state, then each of its regions.
    Fork {
        /// Explicit entries from below the LCA down to the orthogonal state,
        /// inclusive; empty when the LCA is the orthogonal state itself.
        path: Vec<StateId>,
        /// The orthogonal state being entered.
        and_state: StateId,
        /// Explicit entry chains, each starting at a distinct region;
        /// regions without a chain enter through their defaults.
        limbs: Vec<Vec<StateId>>,
    },
    /// Terminate the machine: no entries, and the root's active slots are
    /// cleared.
    Terminate,
}

/// A planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// The least common ancestor of source and target.
    pub lca: StateId,
    /// The states to exit, in order (each exit tears down its own live
    /// subtree first, so the sequence is bottom-up overall).
    pub exits: Vec<StateId>,
    /// Whether the LCA's live subtree must be dynamically torn down before
    /// the entries run (the source *was* the LCA, so no listed exit covers
    /// its descendants).
    pub exit_subtree: bool,
    /// The entry half of the plan.
    pub entry: EntryPlan,
}

/// Drops exit-chain members that their own parent's exit already covers.
///
/// An orthogonal state's `_exit` tears down every region statically, so a
/// region listed alongside its parent would exit twice. (Members under an OR
/// parent stay: their exits deregister, and the parent's dynamic teardown is
/// null-checked.)
fn prune_covered_exits(machine: &Machine, exits: Vec<StateId>) -> Vec<StateId> {
    exits
        .iter()
        .enumerate()
        .filter(|(i, id)| {
            let Some(parent) = machine.state(**id).parent else {
                return true;
            };
            machine.state(parent).kind != StateKind::CompositeAnd
                || !exits[i + 1..].contains(&parent)
        })
        .map(|(_, id)| *id)
        .collect()
}

/// Builds the chain from `from` up to (excluding) `ancestor`, bottom-up.
fn chain_up(machine: &Machine, from: StateId, ancestor: StateId) -> Vec<StateId> {
    let mut chain = Vec::new();
    let mut current = from;
    while current != ancestor {
        chain.push(current);
        current = machine
            .state(current)
            .parent
            .expect("ancestor is on the path to the root");
    }
    chain
}

/// Builds the chain from below `ancestor` down to `to`, top-down.
fn chain_down(machine: &Machine, ancestor: StateId, to: StateId) -> Vec<StateId> {
    let ids = machine.path_ids(to);
    let pos = ids
        .iter()
        .position(|id| *id == ancestor)
        .expect("ancestor is on the path to the root");
    ids[pos + 1..].to_vec()
}

/// Plans the exits when the LCA is an orthogonal state.
///
/// The source's own region (if the source is below the LCA) exits first,
/// followed by every other region in declaration order.
fn orthogonal_exits(machine: &Machine, source: StateId, and_state: StateId) -> Vec<StateId> {
    let mut exits = Vec::new();
    let src_region = if source == and_state {
        None
    } else {
        let region = machine
            .child_toward(and_state, source)
            .expect("source lies below the orthogonal LCA");
        exits.extend(chain_up(machine, source, region));
        exits.push(region);
        Some(region)
    };

    for region in machine.state(and_state).children.values() {
        if Some(*region) != src_region {
            exits.push(*region);
        }
    }

    exits
}

/// Plans a transition to a single target state.
pub fn plan_single(machine: &Machine, source: StateId, target: StateId) -> TransitionPlan {
    // An explicit self-transition is a full exit and re-entry.
    if source == target {
        return TransitionPlan {
            lca: source,
            exits: vec![source],
            exit_subtree: false,
            entry: EntryPlan::Chain(vec![source]),
        };
    }

    let lca = lca(machine, source, target);
    trace!(
        source = machine.path(source),
        target = machine.path(target),
        lca = machine.path(lca),
        "planning transition"
    );

    if machine.state(lca).kind == StateKind::CompositeAnd {
        let exits = prune_covered_exits(machine, orthogonal_exits(machine, source, lca));
        let entry = if target == lca {
            EntryPlan::Chain(Vec::new())
        } else {
            let region = machine
                .child_toward(lca, target)
                .expect("target lies below the orthogonal LCA");
            let mut limb = vec![region];
            limb.extend(chain_down(machine, region, target));
            EntryPlan::Fork {
                path: Vec::new(),
                and_state: lca,
                limbs: vec![limb],
            }
        };
        return TransitionPlan {
            lca,
            exits,
            exit_subtree: false,
            entry,
        };
    }

    let exits = if source == lca {
        Vec::new()
    } else {
        prune_covered_exits(machine, chain_up(machine, source, lca))
    };
    let entry = if target == lca {
        EntryPlan::Chain(Vec::new())
    } else {
        EntryPlan::Chain(chain_down(machine, lca, target))
    };

    TransitionPlan {
        lca,
        exits,
        // The source is the LCA, so its live descendants are not covered by
        // any listed exit.
        exit_subtree: source == lca,
        entry,
    }
}

/// Plans a fork transition into the regions of an orthogonal state.
pub fn plan_fork(
    machine: &Machine,
    source: StateId,
    and_state: StateId,
    limb_targets: &[StateId],
) -> TransitionPlan {
    let lca = lca(machine, source, and_state);

    let limbs: Vec<Vec<StateId>> = limb_targets
        .iter()
        .map(|target| {
            let region = machine
                .child_toward(and_state, *target)
                .expect("limb targets lie below the orthogonal state");
            let mut limb = vec![region];
            limb.extend(chain_down(machine, region, *target));
            limb
        })
        .collect();

    if machine.state(lca).kind == StateKind::CompositeAnd {
        let exits = prune_covered_exits(machine, orthogonal_exits(machine, source, lca));
        let path = if and_state == lca {
            Vec::new()
        } else {
            chain_down(machine, lca, and_state)
        };
        return TransitionPlan {
            lca,
            exits,
            exit_subtree: false,
            entry: EntryPlan::Fork {
                path,
                and_state,
                limbs,
            },
        };
    }

    let exits = if source == lca {
        Vec::new()
    } else {
        prune_covered_exits(machine, chain_up(machine, source, lca))
    };

    TransitionPlan {
        lca,
        exits,
        exit_subtree: source == lca,
        entry: EntryPlan::Fork {
            path: chain_down(machine, lca, and_state),
            and_state,
            limbs,
        },
    }
}

/// Plans a terminating transition: exit everything from the source up through
/// the root, then clear the root's active slots.
pub fn plan_termination(machine: &Machine, source: StateId) -> TransitionPlan {
    let mut exits = machine.path_ids(source);
    exits.reverse();

    TransitionPlan {
        lca: machine.root(),
        exits: prune_covered_exits(machine, exits),
        exit_subtree: false,
        entry: EntryPlan::Terminate,
    }
}
