//! Validation of fork limb distinctness.

use std::collections::HashSet;

use crate::Diagnostic;
use crate::Machine;
use crate::StateId;
use crate::TargetExpr;
use crate::Transition;
use crate::Visitor;
use crate::validation::Diagnostics;

/// Checks that the limbs of a fork name distinct regions.
///
/// Whether each limb actually starts at a region of an orthogonal state is a
/// resolution question handled by the targets rule; distinctness is purely
/// syntactic and therefore also holds for decision arms regardless of the
/// referencing state.
fn check_limbs(state: &mut Diagnostics, target: &TargetExpr, path: String) {
    let TargetExpr::Fork { limbs, .. } = target else {
        return;
    };

    let mut seen = HashSet::new();
    for limb in limbs {
        if !seen.insert(limb[0].as_str()) {
            state.add(
                Diagnostic::validation(format!(
                    "malformed fork target `{target}`: region `{region}` appears in more than \
                     one limb",
                    region = limb[0],
                ))
                .with_rule("malformed-fork")
                .with_path(path.clone()),
            );
        }
    }
}

/// A visitor for ensuring that fork targets enter each region at most once.
#[derive(Default, Debug)]
pub struct ForksVisitor;

impl Visitor for ForksVisitor {
    type State = Diagnostics;

    fn transition(
        &mut self,
        state: &mut Self::State,
        machine: &Machine,
        source: StateId,
        transition: &Transition,
    ) {
        check_limbs(state, &transition.target, machine.path(source));
    }

    fn decision(
        &mut self,
        state: &mut Self::State,
        _machine: &Machine,
        name: &str,
        arms: &[Transition],
    ) {
        for arm in arms {
            check_limbs(state, &arm.target, format!("@{name}"));
        }
    }
}
