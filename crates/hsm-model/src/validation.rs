//! Validator for state machine models.

use crate::Diagnostic;
use crate::Machine;
use crate::Visitor;

mod decisions;
mod forks;
mod initials;
mod targets;

/// Represents a collection of validation diagnostics.
///
/// Validation visitors receive a diagnostics collection during visitation of
/// the model.
#[allow(missing_debug_implementations)]
#[derive(Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Adds a diagnostic to the collection.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }
}

/// Implements a model validator.
///
/// A validator operates on a set of model visitors, providing a collection of
/// diagnostics as the visitation state. Visitation is total: every state,
/// transition, and flattened decision is checked, including nodes nested
/// inside orthogonal regions.
///
/// See the [validate](Self::validate) method to perform the validation.
#[allow(missing_debug_implementations)]
pub struct Validator {
    /// The set of validation visitors.
    visitors: Vec<Box<dyn Visitor<State = Diagnostics>>>,
}

impl Validator {
    /// Creates a validator with an empty visitors set.
    pub const fn empty() -> Self {
        Self {
            visitors: Vec::new(),
        }
    }

    /// Adds a visitor to the validator.
    pub fn add_visitor<V: Visitor<State = Diagnostics> + 'static>(&mut self, visitor: V) {
        self.visitors.push(Box::new(visitor));
    }

    /// Validates the given machine and returns the validation errors upon
    /// failure.
    ///
    /// All diagnostics are collected before failing so that a single compile
    /// reports every violation; the diagnostics are sorted by the offending
    /// node's path.
    pub fn validate(&mut self, machine: &Machine) -> Result<(), Vec<Diagnostic>> {
        let mut diagnostics = Diagnostics::default();
        machine.visit(&mut diagnostics, self);

        if diagnostics.0.is_empty() {
            Ok(())
        } else {
            diagnostics.0.sort();
            Err(diagnostics.0)
        }
    }
}

impl Default for Validator {
    /// Creates a validator with the default validation visitors.
    fn default() -> Self {
        Self {
            visitors: vec![
                Box::<initials::InitialsVisitor>::default(),
                Box::<targets::TargetsVisitor>::default(),
                Box::<forks::ForksVisitor>::default(),
                Box::<decisions::DecisionsVisitor>::default(),
            ],
        }
    }
}

impl Visitor for Validator {
    type State = Diagnostics;

    fn machine(
        &mut self,
        state: &mut Self::State,
        reason: crate::VisitReason,
        machine: &Machine,
    ) {
        for visitor in self.visitors.iter_mut() {
            visitor.machine(state, reason, machine);
        }
    }

    fn state(
        &mut self,
        state: &mut Self::State,
        reason: crate::VisitReason,
        machine: &Machine,
        id: crate::StateId,
    ) {
        for visitor in self.visitors.iter_mut() {
            visitor.state(state, reason, machine, id);
        }
    }

    fn transition(
        &mut self,
        state: &mut Self::State,
        machine: &Machine,
        source: crate::StateId,
        transition: &crate::Transition,
    ) {
        for visitor in self.visitors.iter_mut() {
            visitor.transition(state, machine, source, transition);
        }
    }

    fn decision(
        &mut self,
        state: &mut Self::State,
        machine: &Machine,
        name: &str,
        arms: &[crate::Transition],
    ) {
        for visitor in self.visitors.iter_mut() {
            visitor.decision(state, machine, name, arms);
        }
    }
}
