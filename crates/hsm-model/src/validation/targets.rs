//! Validation of transition target resolution.

use std::collections::HashSet;

use crate::Diagnostic;
use crate::Machine;
use crate::PathError;
use crate::StateId;
use crate::TargetExpr;
use crate::Transition;
use crate::Visitor;
use crate::validation::Diagnostics;

/// Creates the diagnostic for a target that failed to resolve.
///
/// Fork-shape failures get the `malformed-fork` rule; everything else is a
/// dangling target.
fn unresolved(target: &TargetExpr, error: &PathError, path: String) -> Diagnostic {
    match error {
        PathError::NotOrthogonal { .. } | PathError::NotARegion { .. } => {
            Diagnostic::validation(format!("malformed fork target `{target}`: {error}"))
                .with_rule("malformed-fork")
                .with_path(path)
        }
        _ => Diagnostic::validation(format!(
            "cannot resolve transition target `{target}`: {error}"
        ))
        .with_rule("dangling-transition-target")
        .with_path(path),
    }
}

/// A visitor for ensuring that every transition target resolves against its
/// source state.
///
/// Targets reached only through decisions are checked against each state that
/// references the decision, following decision-to-decision references
/// transitively.
#[derive(Default, Debug)]
pub struct TargetsVisitor;

impl TargetsVisitor {
    /// Checks one target expression against a source state.
    fn check(
        &self,
        state: &mut Diagnostics,
        machine: &Machine,
        source: StateId,
        target: &TargetExpr,
    ) {
        match target {
            TargetExpr::Decision(name) => {
                let mut visited = HashSet::new();
                self.check_decision(state, machine, source, name, &mut visited);
            }
            _ => {
                if let Err(e) = target.resolve(machine, source) {
                    state.add(unresolved(target, &e, machine.path(source)));
                }
            }
        }
    }

    /// Checks every arm of a referenced decision against the referencing
    /// state.
    fn check_decision(
        &self,
        state: &mut Diagnostics,
        machine: &Machine,
        source: StateId,
        name: &str,
        visited: &mut HashSet<String>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }

        // An unknown decision name is reported by the decisions rule.
        let Some(arms) = machine.decisions().get(name) else {
            return;
        };

        for arm in arms {
            match &arm.target {
                TargetExpr::Decision(next) => {
                    self.check_decision(state, machine, source, next, visited);
                }
                target => {
                    if let Err(e) = target.resolve(machine, source) {
                        state.add(unresolved(target, &e, machine.path(source)));
                    }
                }
            }
        }
    }
}

impl Visitor for TargetsVisitor {
    type State = Diagnostics;

    fn transition(
        &mut self,
        state: &mut Self::State,
        machine: &Machine,
        source: StateId,
        transition: &Transition,
    ) {
        self.check(state, machine, source, &transition.target);
    }
}
