//! Validation of `initial` child declarations.

use crate::Diagnostic;
use crate::Machine;
use crate::StateId;
use crate::StateKind;
use crate::VisitReason;
use crate::Visitor;
use crate::validation::Diagnostics;

/// A visitor for ensuring that every composite-OR state has a resolvable
/// default child.
///
/// Orthogonal regions are themselves composite-OR states, so their defaults
/// are checked by the same rule.
#[derive(Default, Debug)]
pub struct InitialsVisitor;

impl Visitor for InitialsVisitor {
    type State = Diagnostics;

    fn state(
        &mut self,
        state: &mut Self::State,
        reason: VisitReason,
        machine: &Machine,
        id: StateId,
    ) {
        if reason == VisitReason::Exit {
            return;
        }

        let node = machine.state(id);
        if node.kind != StateKind::CompositeOr {
            return;
        }

        match &node.initial {
            None => state.add(
                Diagnostic::validation("composite state does not declare an `initial` child")
                    .with_rule("missing-initial")
                    .with_path(machine.path(id)),
            ),
            Some(name) if machine.child(id, name).is_none() => state.add(
                Diagnostic::validation(format!("unknown initial child `{name}`"))
                    .with_rule("unknown-initial-child")
                    .with_path(machine.path(id)),
            ),
            Some(_) => {}
        }
    }
}
