//! The arena-backed state machine model.
//!
//! [`Machine`] owns every [`State`] in a single vector; tree edges are
//! [`StateId`] indices in both directions, so upward `parent` references never
//! own their target. The model is built once from a [`Document`], validated,
//! and treated as immutable by everything downstream.

use indexmap::IndexMap;
use tracing::debug;

use crate::Diagnostic;
use crate::Document;
use crate::Lang;
use crate::RawState;
use crate::RawTransition;
use crate::TargetExpr;

/// The name of the implicit root state.
pub const ROOT_NAME: &str = "root";

/// An identifier of a state in a [`Machine`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(usize);

/// The kind of a state.
///
/// The set is closed; the emitter switches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// A state without children.
    Leaf,
    /// A composite with exactly one active child at a time.
    CompositeOr,
    /// A composite whose children are concurrently active regions.
    CompositeAnd,
}

/// A transition with a parsed target.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The optional guard expression; absent means always true.
    pub guard: Option<String>,
    /// The optional action code.
    pub action: Option<String>,
    /// The parsed target expression.
    pub target: TargetExpr,
}

/// A state node in the machine tree.
#[derive(Debug, Clone)]
pub struct State {
    /// The state name, unique among its siblings.
    pub name: String,
    /// The kind of the state.
    pub kind: StateKind,
    /// Code run on entry.
    pub entry: Option<String>,
    /// Code run on exit.
    pub exit: Option<String>,
    /// Code run on every dispatch cycle while active.
    pub do_code: Option<String>,
    /// The name of the default child, for composite-OR states.
    pub initial: Option<String>,
    /// Whether this composite records shallow history.
    pub history: bool,
    /// The outgoing transitions, in declaration order.
    pub transitions: Vec<Transition>,
    /// The children, in declaration order, keyed by name.
    pub children: IndexMap<String, StateId>,
    /// The parent state; `None` only for the root.
    pub parent: Option<StateId>,
}

/// The global hook code strings.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    /// Injected before every state's own entry code.
    pub entry: Option<String>,
    /// Injected after every state's own exit code.
    pub exit: Option<String>,
    /// Injected before every state's own do code.
    pub do_code: Option<String>,
    /// Injected when any transition fires.
    pub transition: Option<String>,
}

/// A user context field.
#[derive(Debug, Clone)]
pub struct ContextField {
    /// The field name.
    pub name: String,
    /// The field type, as target-language text.
    pub ty: Option<String>,
}

/// A loaded state machine model.
#[derive(Debug, Clone)]
pub struct Machine {
    /// The state arena; index 0 is the root.
    states: Vec<State>,
    /// The flattened decisions dictionary, in declaration order.
    decisions: IndexMap<String, Vec<Transition>>,
    /// The global hooks.
    hooks: Hooks,
    /// The user context fields, in declaration order.
    context: Vec<ContextField>,
    /// Code run after zero-initialization of the context.
    context_init: Option<String>,
    /// Verbatim prelude text.
    includes: Option<String>,
    /// The target languages named by the document.
    langs: Vec<Lang>,
}

impl Machine {
    /// Parses and loads a machine from YAML source text.
    pub fn parse(source: &str) -> Result<Self, Diagnostic> {
        Self::from_document(Document::parse(source)?)
    }

    /// Builds the machine from a deserialized document.
    ///
    /// This constructs the arena, assigns parent back-references, parses
    /// every transition target, and flattens the decision dictionaries. The
    /// first structural failure (an unparsable target, a duplicate decision
    /// name, an empty document) is returned as a diagnostic; everything that
    /// loads is then subject to [`Validator`][crate::Validator].
    pub fn from_document(doc: Document) -> Result<Self, Diagnostic> {
        let states = doc.states.unwrap_or_default();
        if states.is_empty() {
            return Err(Diagnostic::validation("document defines no states")
                .with_rule("missing-states")
                .with_path(format!("/{ROOT_NAME}")));
        }

        let mut machine = Self {
            states: vec![State {
                name: ROOT_NAME.to_string(),
                kind: StateKind::CompositeOr,
                entry: None,
                exit: None,
                do_code: None,
                initial: doc.initial,
                history: false,
                transitions: Vec::new(),
                children: IndexMap::new(),
                parent: None,
            }],
            decisions: IndexMap::new(),
            hooks: doc
                .hooks
                .map(|h| Hooks {
                    entry: h.entry,
                    exit: h.exit,
                    do_code: h.do_code,
                    transition: h.transition,
                })
                .unwrap_or_default(),
            context: doc
                .context
                .into_iter()
                .map(|f| ContextField {
                    name: f.name,
                    ty: f.ty,
                })
                .collect(),
            context_init: doc.context_init,
            includes: doc.includes,
            langs: Vec::new(),
        };

        let root = StateId(0);
        let root_path = machine.path(root);
        machine.states[0].transitions = parse_transitions(&doc.transitions, &root_path)?;
        if let Some(decisions) = doc.decisions {
            machine.add_decisions(decisions, &root_path)?;
        }
        for (name, raw) in states {
            machine.add_state(name, raw, root)?;
        }

        for name in doc.lang.iter().flat_map(|l| l.names()) {
            machine.langs.push(name.parse()?);
        }

        debug!(
            states = machine.states.len(),
            decisions = machine.decisions.len(),
            "loaded state machine model"
        );

        Ok(machine)
    }

    /// Adds a state (and its descendants) under the given parent.
    fn add_state(
        &mut self,
        name: String,
        raw: RawState,
        parent: StateId,
    ) -> Result<StateId, Diagnostic> {
        let path = format!("{parent}/{name}", parent = self.path(parent));
        let kind = match &raw.states {
            Some(children) if !children.is_empty() => {
                if raw.orthogonal {
                    StateKind::CompositeAnd
                } else {
                    StateKind::CompositeOr
                }
            }
            _ => StateKind::Leaf,
        };

        let id = StateId(self.states.len());
        self.states.push(State {
            name: name.clone(),
            kind,
            entry: raw.entry,
            exit: raw.exit,
            do_code: raw.do_code,
            initial: raw.initial,
            history: raw.history,
            transitions: parse_transitions(&raw.transitions, &path)?,
            children: IndexMap::new(),
            parent: Some(parent),
        });
        self.states[parent.0].children.insert(name, id);

        if let Some(decisions) = raw.decisions {
            self.add_decisions(decisions, &path)?;
        }
        if let Some(children) = raw.states {
            for (child_name, child_raw) in children {
                self.add_state(child_name, child_raw, id)?;
            }
        }

        Ok(id)
    }

    /// Flattens a `decisions:` mapping into the global dictionary.
    fn add_decisions(
        &mut self,
        decisions: IndexMap<String, Vec<RawTransition>>,
        path: &str,
    ) -> Result<(), Diagnostic> {
        for (name, arms) in decisions {
            if self.decisions.contains_key(&name) {
                return Err(Diagnostic::validation(format!(
                    "decision `{name}` is defined more than once"
                ))
                .with_rule("duplicate-decision-name")
                .with_path(path));
            }
            let arms = parse_transitions(&arms, path)?;
            self.decisions.insert(name, arms);
        }
        Ok(())
    }

    /// Gets the root state identifier.
    pub fn root(&self) -> StateId {
        StateId(0)
    }

    /// Gets a state by identifier.
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    /// Iterates every state with its identifier, in arena order.
    ///
    /// Arena order is a preorder walk of the tree: parents precede children
    /// and siblings keep declaration order.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.states.iter().enumerate().map(|(i, s)| (StateId(i), s))
    }

    /// Looks up a direct child of a state by name.
    pub fn child(&self, id: StateId, name: &str) -> Option<StateId> {
        self.state(id).children.get(name).copied()
    }

    /// Gets the absolute path of a state, e.g. `/root/heater/on`.
    pub fn path(&self, id: StateId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let state = self.state(id);
            segments.push(state.name.as_str());
            current = state.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Gets the chain of identifiers from the root down to a state,
    /// inclusive at both ends.
    pub fn path_ids(&self, id: StateId) -> Vec<StateId> {
        let mut ids = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            ids.push(id);
            current = self.state(id).parent;
        }
        ids.reverse();
        ids
    }

    /// Determines whether `ancestor` is `descendant` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: StateId, descendant: StateId) -> bool {
        let mut current = Some(descendant);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.state(id).parent;
        }
        false
    }

    /// Gets the child of `ancestor` that lies on the path down to
    /// `descendant`, if `descendant` is strictly below `ancestor`.
    pub fn child_toward(&self, ancestor: StateId, descendant: StateId) -> Option<StateId> {
        let mut current = descendant;
        loop {
            let parent = self.state(current).parent?;
            if parent == ancestor {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Gets the flattened decisions dictionary.
    pub fn decisions(&self) -> &IndexMap<String, Vec<Transition>> {
        &self.decisions
    }

    /// Gets the global hooks.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Gets the user context fields.
    pub fn context(&self) -> &[ContextField] {
        &self.context
    }

    /// Gets the context initialization code, if any.
    pub fn context_init(&self) -> Option<&str> {
        self.context_init.as_deref()
    }

    /// Gets the verbatim prelude text, if any.
    pub fn includes(&self) -> Option<&str> {
        self.includes.as_deref()
    }

    /// Gets the target languages named by the document.
    pub fn langs(&self) -> &[Lang] {
        &self.langs
    }
}

/// Parses the raw transitions of a state or decision.
fn parse_transitions(raw: &[RawTransition], path: &str) -> Result<Vec<Transition>, Diagnostic> {
    raw.iter()
        .map(|t| {
            let target = TargetExpr::parse(t.to.as_deref()).map_err(|e| {
                Diagnostic::validation(e.to_string())
                    .with_rule("malformed-path")
                    .with_path(path)
            })?;
            Ok(Transition {
                guard: t.guard.clone(),
                action: t.action.clone(),
                target,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn builds_the_tree_with_parents() {
        let machine = Machine::parse(
            r#"
initial: a
states:
  a:
    initial: x
    states: {x: {}, y: {}}
  b: {}
"#,
        )
        .expect("machine should load");

        let root = machine.root();
        assert_eq!(machine.state(root).name, "root");
        assert_eq!(machine.state(root).kind, StateKind::CompositeOr);
        assert_eq!(machine.state(root).children.len(), 2);

        let a = machine.child(root, "a").expect("a should exist");
        let x = machine.child(a, "x").expect("x should exist");
        assert_eq!(machine.state(a).kind, StateKind::CompositeOr);
        assert_eq!(machine.state(x).kind, StateKind::Leaf);
        assert_eq!(machine.state(x).parent, Some(a));
        assert_eq!(machine.path(x), "/root/a/x");
        assert_eq!(machine.path_ids(x), vec![root, a, x]);
    }

    #[test]
    fn orthogonal_states_are_composite_and() {
        let machine = Machine::parse(
            r#"
initial: par
states:
  par:
    orthogonal: true
    states:
      r1: {initial: p, states: {p: {}}}
      r2: {initial: u, states: {u: {}}}
"#,
        )
        .expect("machine should load");

        let par = machine.child(machine.root(), "par").unwrap();
        assert_eq!(machine.state(par).kind, StateKind::CompositeAnd);
    }

    #[test]
    fn decisions_flatten_into_one_dictionary() {
        let machine = Machine::parse(
            r#"
initial: a
decisions:
  top:
    - to: a
states:
  a:
    decisions:
      pick:
        - guard: ctx.x
          to: b
        - to: a
  b: {}
"#,
        )
        .expect("machine should load");

        assert_eq!(
            machine.decisions().keys().collect::<Vec<_>>(),
            ["top", "pick"]
        );
        assert_eq!(machine.decisions()["pick"].len(), 2);
    }

    #[test]
    fn duplicate_decision_names_fail_to_load() {
        let err = Machine::parse(
            r#"
initial: a
decisions:
  pick:
    - to: a
states:
  a:
    decisions:
      pick:
        - to: b
  b: {}
"#,
        )
        .expect_err("load should fail");

        assert_eq!(err.rule(), Some("duplicate-decision-name"));
        assert_eq!(err.path(), Some("/root/a"));
    }

    #[test]
    fn empty_documents_fail_to_load() {
        let err = Machine::parse("initial: a").expect_err("load should fail");
        assert_eq!(err.rule(), Some("missing-states"));
    }

    #[test]
    fn child_toward_finds_the_branch() {
        let machine = Machine::parse(
            r#"
initial: a
states:
  a:
    initial: x
    states: {x: {}}
  b: {}
"#,
        )
        .expect("machine should load");

        let root = machine.root();
        let a = machine.child(root, "a").unwrap();
        let x = machine.child(a, "x").unwrap();
        assert_eq!(machine.child_toward(root, x), Some(a));
        assert_eq!(machine.child_toward(a, x), Some(x));
        assert_eq!(machine.child_toward(x, a), None);
        assert!(machine.is_ancestor_or_self(root, x));
        assert!(machine.is_ancestor_or_self(x, x));
        assert!(!machine.is_ancestor_or_self(x, root));
    }
}
