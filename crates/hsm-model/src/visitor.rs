//! Implementation for model visitation.
//!
//! A visitor is called while a [`Machine`] is being walked (see
//! [`Machine::visit`]); callbacks correspond to the nodes of the model tree.
//! Every state — including states nested inside orthogonal regions — receives
//! a matching pair of [`VisitReason::Enter`] and [`VisitReason::Exit`] calls,
//! and every transition and flattened decision is visited exactly once, so a
//! visitor-based check is total over the model.

use crate::Machine;
use crate::StateId;
use crate::Transition;

/// The reason for a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitReason {
    /// The walk is entering the node.
    Enter,
    /// The walk is leaving the node.
    Exit,
}

/// A trait used to implement a model visitor.
#[allow(unused_variables)]
pub trait Visitor {
    /// Represents the external visitation state.
    type State;

    /// Visits the machine itself, before and after everything else.
    fn machine(&mut self, state: &mut Self::State, reason: VisitReason, machine: &Machine) {}

    /// Visits a state node.
    fn state(&mut self, state: &mut Self::State, reason: VisitReason, machine: &Machine, id: StateId) {
    }

    /// Visits a transition of a state.
    fn transition(
        &mut self,
        state: &mut Self::State,
        machine: &Machine,
        source: StateId,
        transition: &Transition,
    ) {
    }

    /// Visits a flattened decision and its arms.
    fn decision(
        &mut self,
        state: &mut Self::State,
        machine: &Machine,
        name: &str,
        arms: &[Transition],
    ) {
    }
}

impl Machine {
    /// Walks the machine with a visitor.
    pub fn visit<V: Visitor>(&self, state: &mut V::State, visitor: &mut V) {
        visitor.machine(state, VisitReason::Enter, self);
        self.visit_state(state, visitor, self.root());
        for (name, arms) in self.decisions() {
            visitor.decision(state, self, name, arms);
        }
        visitor.machine(state, VisitReason::Exit, self);
    }

    /// Walks one state subtree.
    fn visit_state<V: Visitor>(&self, state: &mut V::State, visitor: &mut V, id: StateId) {
        visitor.state(state, VisitReason::Enter, self, id);
        for transition in &self.state(id).transitions {
            visitor.transition(state, self, id, transition);
        }
        for child in self.state(id).children.values() {
            self.visit_state(state, visitor, *child);
        }
        visitor.state(state, VisitReason::Exit, self, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts visited nodes.
    #[derive(Default)]
    struct Counter {
        /// `Enter` calls for states.
        states: usize,
        /// Transition calls.
        transitions: usize,
        /// Decision calls.
        decisions: usize,
    }

    impl Visitor for Counter {
        type State = ();

        fn state(&mut self, _: &mut (), reason: VisitReason, _: &Machine, _: StateId) {
            if reason == VisitReason::Enter {
                self.states += 1;
            }
        }

        fn transition(&mut self, _: &mut (), _: &Machine, _: StateId, _: &Transition) {
            self.transitions += 1;
        }

        fn decision(&mut self, _: &mut (), _: &Machine, _: &str, _: &[Transition]) {
            self.decisions += 1;
        }
    }

    #[test]
    fn visitation_is_total() {
        let machine = Machine::parse(
            r#"
initial: a
states:
  a:
    transitions:
      - to: b
  b:
    orthogonal: true
    states:
      r1:
        initial: p
        states:
          p:
            transitions:
              - to: "@pick"
      r2:
        initial: u
        states: {u: {}}
    decisions:
      pick:
        - to: /a
"#,
        )
        .expect("machine should load");

        let mut counter = Counter::default();
        machine.visit(&mut (), &mut counter);

        // root, a, b, r1, p, r2, u
        assert_eq!(counter.states, 7);
        assert_eq!(counter.transitions, 2);
        assert_eq!(counter.decisions, 1);
    }
}
