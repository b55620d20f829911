//! Validation of decision reference closure.

use crate::Diagnostic;
use crate::Machine;
use crate::StateId;
use crate::TargetExpr;
use crate::Transition;
use crate::Visitor;
use crate::validation::Diagnostics;

/// A visitor for ensuring that every `@name` reference — whether written on a
/// state's transition or on another decision's arm — names an entry of the
/// flattened decisions dictionary.
#[derive(Default, Debug)]
pub struct DecisionsVisitor;

impl DecisionsVisitor {
    /// Reports an unknown decision reference.
    fn check(&self, state: &mut Diagnostics, machine: &Machine, target: &TargetExpr, path: String) {
        if let TargetExpr::Decision(name) = target {
            if !machine.decisions().contains_key(name) {
                state.add(
                    Diagnostic::validation(format!("unknown decision `@{name}`"))
                        .with_rule("unknown-decision")
                        .with_path(path),
                );
            }
        }
    }
}

impl Visitor for DecisionsVisitor {
    type State = Diagnostics;

    fn transition(
        &mut self,
        state: &mut Self::State,
        machine: &Machine,
        source: StateId,
        transition: &Transition,
    ) {
        self.check(state, machine, &transition.target, machine.path(source));
    }

    fn decision(
        &mut self,
        state: &mut Self::State,
        machine: &Machine,
        name: &str,
        arms: &[Transition],
    ) {
        for arm in arms {
            self.check(state, machine, &arm.target, format!("@{name}"));
        }
    }
}
