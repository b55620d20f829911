//! The Graphviz DOT emitter.
//!
//! Composite states render as `cluster` subgraphs (regions of an orthogonal
//! state with a dashed style), transitions as edges labeled by guard and
//! action, decisions as diamonds, forks as point nodes inside the orthogonal
//! cluster, and termination as an edge to a final double-circle node.
//! Cluster-to-cluster edges anchor on a representative leaf and use
//! `ltail`/`lhead` (with `compound=true`) so the arrows attach to the boxes.

use hsm_model::Machine;
use hsm_model::Resolved;
use hsm_model::StateId;
use hsm_model::StateKind;
use hsm_model::TargetExpr;
use indexmap::IndexSet;

use crate::writer::SourceWriter;

/// The maximum rendered length of a guard or action label fragment.
const LABEL_LIMIT: usize = 32;

/// Turns a name into an identifier fragment.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Gets the DOT node (or cluster stem) identifier of a state.
fn node_id(machine: &Machine, id: StateId) -> String {
    machine
        .path_ids(id)
        .iter()
        .map(|i| sanitize(&machine.state(*i).name))
        .collect::<Vec<_>>()
        .join("_")
}

/// Escapes text for a DOT double-quoted string.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Truncates a label fragment.
fn truncate(text: &str) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() <= LABEL_LIMIT {
        text
    } else {
        let mut out: String = text.chars().take(LABEL_LIMIT).collect();
        out.push_str("...");
        out
    }
}

/// Builds the edge label of a transition or decision arm.
fn edge_label(guard: Option<&str>, action: Option<&str>) -> String {
    let mut label = String::new();
    if let Some(guard) = guard {
        label.push('[');
        label.push_str(&truncate(guard));
        label.push(']');
    }
    if let Some(action) = action {
        if !label.is_empty() {
            label.push(' ');
        }
        label.push_str("/ ");
        label.push_str(&truncate(action));
    }
    label
}

/// Picks a representative leaf to anchor edges of a composite state.
fn anchor(machine: &Machine, id: StateId) -> StateId {
    let state = machine.state(id);
    match state.kind {
        StateKind::Leaf => id,
        StateKind::CompositeOr => {
            let child = state
                .initial
                .as_deref()
                .and_then(|name| machine.child(id, name))
                .or_else(|| state.children.values().next().copied())
                .expect("composite states have children");
            anchor(machine, child)
        }
        StateKind::CompositeAnd => {
            let region = state
                .children
                .values()
                .next()
                .copied()
                .expect("orthogonal states have regions");
            anchor(machine, region)
        }
    }
}

/// A pending fork point node, declared inside its orthogonal cluster.
struct ForkPoint {
    /// The point node identifier.
    name: String,
    /// The orthogonal state the fork enters.
    and_state: StateId,
}

/// Renders the machine as Graphviz DOT source.
pub fn render(machine: &Machine) -> String {
    let mut w = SourceWriter::new();
    let mut edges: IndexSet<String> = IndexSet::new();
    let mut needs_final = false;

    // Fork points must be declared inside their cluster, so collect them
    // before walking the tree.
    let mut forks = Vec::new();
    for (id, state) in machine.states() {
        for transition in &state.transitions {
            if let Ok(Resolved::Fork { state: and_state, .. }) =
                transition.target.resolve(machine, id)
            {
                forks.push(ForkPoint {
                    name: format!("fork_{n}", n = forks.len()),
                    and_state,
                });
            }
        }
    }

    w.line("digraph statemachine {");
    w.indent();
    w.line("compound=true;");
    w.line("rankdir=TB;");
    w.line("node [shape=box, style=rounded];");
    w.blank();

    emit_state(&mut w, machine, machine.root(), &forks);

    for (name, _) in machine.decisions() {
        w.line(&format!(
            "decide_{id} [shape=diamond, label=\"{label}\"];",
            id = sanitize(name),
            label = escape(name)
        ));
    }

    // Transition edges.
    let mut fork_index = 0;
    for (id, state) in machine.states() {
        for transition in &state.transitions {
            collect_edges(
                machine,
                id,
                transition.guard.as_deref(),
                transition.action.as_deref(),
                &transition.target,
                &mut fork_index,
                &mut edges,
                &mut needs_final,
            );
        }
    }

    if needs_final {
        w.line("sm_final [shape=doublecircle, label=\"\", width=0.2];");
    }
    w.blank();
    for edge in edges {
        w.line(&edge);
    }

    w.dedent();
    w.line("}");
    w.finish()
}

/// Emits a state subtree: a node for a leaf, a cluster for a composite.
fn emit_state(w: &mut SourceWriter, machine: &Machine, id: StateId, forks: &[ForkPoint]) {
    let state = machine.state(id);
    let node = node_id(machine, id);

    if state.kind == StateKind::Leaf {
        w.line(&format!(
            "{node} [label=\"{label}\"];",
            label = escape(&state.name)
        ));
        return;
    }

    w.line(&format!("subgraph cluster_{node} {{"));
    w.indent();
    w.line(&format!("label=\"{label}\";", label = escape(&state.name)));
    let region = state
        .parent
        .is_some_and(|p| machine.state(p).kind == StateKind::CompositeAnd);
    if region {
        w.line("style=dashed;");
    }
    for child in state.children.values() {
        emit_state(w, machine, *child, forks);
    }
    for fork in forks.iter().filter(|f| f.and_state == id) {
        w.line(&format!("{name} [shape=point];", name = fork.name));
    }
    w.dedent();
    w.line("}");
}

/// Builds the attribute list of an edge between two states.
fn state_edge(machine: &Machine, from: StateId, to: StateId, label: &str) -> String {
    let mut attrs = Vec::new();
    if !label.is_empty() {
        attrs.push(format!("label=\"{label}\"", label = escape(label)));
    }
    if machine.state(from).kind != StateKind::Leaf {
        attrs.push(format!("ltail=cluster_{id}", id = node_id(machine, from)));
    }
    if machine.state(to).kind != StateKind::Leaf {
        attrs.push(format!("lhead=cluster_{id}", id = node_id(machine, to)));
    }

    let tail = node_id(machine, anchor(machine, from));
    let head = node_id(machine, anchor(machine, to));
    if attrs.is_empty() {
        format!("{tail} -> {head};")
    } else {
        format!("{tail} -> {head} [{attrs}];", attrs = attrs.join(", "))
    }
}

/// Collects the edges of one transition (or decision arm).
#[allow(clippy::too_many_arguments)]
fn collect_edges(
    machine: &Machine,
    source: StateId,
    guard: Option<&str>,
    action: Option<&str>,
    target: &TargetExpr,
    fork_index: &mut usize,
    edges: &mut IndexSet<String>,
    needs_final: &mut bool,
) {
    let label = edge_label(guard, action);
    let tail = node_id(machine, anchor(machine, source));
    let mut tail_attrs = vec![];
    if machine.state(source).kind != StateKind::Leaf {
        tail_attrs.push(format!("ltail=cluster_{id}", id = node_id(machine, source)));
    }

    let Ok(resolved) = target.resolve(machine, source) else {
        // Unresolvable targets were reported by validation; the diagram
        // simply omits them.
        return;
    };

    match resolved {
        Resolved::Single(to) => {
            edges.insert(state_edge(machine, source, to, &label));
        }
        Resolved::Termination => {
            *needs_final = true;
            let mut attrs = tail_attrs;
            if !label.is_empty() {
                attrs.insert(0, format!("label=\"{label}\"", label = escape(&label)));
            }
            edges.insert(if attrs.is_empty() {
                format!("{tail} -> sm_final;")
            } else {
                format!("{tail} -> sm_final [{attrs}];", attrs = attrs.join(", "))
            });
        }
        Resolved::Decision(name) => {
            let diamond = format!("decide_{id}", id = sanitize(&name));
            let mut attrs = tail_attrs;
            if !label.is_empty() {
                attrs.insert(0, format!("label=\"{label}\"", label = escape(&label)));
            }
            edges.insert(if attrs.is_empty() {
                format!("{tail} -> {diamond};")
            } else {
                format!("{tail} -> {diamond} [{attrs}];", attrs = attrs.join(", "))
            });

            // Arm edges fan out of the diamond, resolved against this
            // referencing state.
            if let Some(arms) = machine.decisions().get(&name) {
                for arm in arms {
                    collect_decision_edges(machine, source, &diamond, arm, edges, needs_final);
                }
            }
        }
        Resolved::Fork { state: and_state, limbs } => {
            let fork = format!("fork_{n}", n = *fork_index);
            *fork_index += 1;
            let mut attrs = tail_attrs;
            if !label.is_empty() {
                attrs.insert(0, format!("label=\"{label}\"", label = escape(&label)));
            }
            attrs.push(format!("lhead=cluster_{id}", id = node_id(machine, and_state)));
            edges.insert(format!(
                "{tail} -> {fork} [{attrs}];",
                attrs = attrs.join(", ")
            ));
            for limb in limbs {
                edges.insert(state_edge_from_node(machine, &fork, limb));
            }
        }
    }
}

/// Collects the edges of one decision arm.
fn collect_decision_edges(
    machine: &Machine,
    source: StateId,
    diamond: &str,
    arm: &hsm_model::Transition,
    edges: &mut IndexSet<String>,
    needs_final: &mut bool,
) {
    let label = edge_label(arm.guard.as_deref(), arm.action.as_deref());
    let label_attr = if label.is_empty() {
        String::new()
    } else {
        format!(" [label=\"{label}\"]", label = escape(&label))
    };

    match arm.target.resolve(machine, source) {
        Ok(Resolved::Single(to)) => {
            let head = node_id(machine, anchor(machine, to));
            edges.insert(format!("{diamond} -> {head}{label_attr};"));
        }
        Ok(Resolved::Termination) => {
            *needs_final = true;
            edges.insert(format!("{diamond} -> sm_final{label_attr};"));
        }
        Ok(Resolved::Decision(next)) => {
            edges.insert(format!(
                "{diamond} -> decide_{id}{label_attr};",
                id = sanitize(&next)
            ));
        }
        Ok(Resolved::Fork { limbs, .. }) => {
            for limb in limbs {
                let head = node_id(machine, anchor(machine, limb));
                edges.insert(format!("{diamond} -> {head}{label_attr};"));
            }
        }
        Err(_) => {}
    }
}

/// Builds an edge from a synthetic node (a fork point) to a state.
fn state_edge_from_node(machine: &Machine, from: &str, to: StateId) -> String {
    let head = node_id(machine, anchor(machine, to));
    if machine.state(to).kind != StateKind::Leaf {
        format!(
            "{from} -> {head} [lhead=cluster_{id}];",
            id = node_id(machine, to)
        )
    } else {
        format!("{from} -> {head};")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clusters_nest_and_regions_are_dashed() {
        let machine = Machine::parse(
            r#"
initial: par
states:
  par:
    orthogonal: true
    states:
      r1:
        initial: p
        states: {p: {}, q: {}}
      r2:
        initial: u
        states: {u: {}}
"#,
        )
        .expect("machine should load");

        let dot = render(&machine);
        assert!(dot.starts_with("digraph statemachine {"));
        assert!(dot.contains("subgraph cluster_root {"));
        assert!(dot.contains("subgraph cluster_root_par {"));
        assert!(dot.contains("subgraph cluster_root_par_r1 {"));
        assert!(dot.contains("style=dashed;"));
        assert!(dot.contains("root_par_r1_p [label=\"p\"];"));
    }

    #[test]
    fn transitions_render_labeled_edges() {
        let machine = Machine::parse(
            r#"
initial: a
states:
  a:
    transitions:
      - guard: ctx.counter == 3
        action: ctx.hits += 1
        to: b
  b:
    transitions:
      - to: null
"#,
        )
        .expect("machine should load");

        let dot = render(&machine);
        assert!(dot.contains("root_a -> root_b [label=\"[ctx.counter == 3] / ctx.hits += 1\"];"));
        assert!(dot.contains("sm_final [shape=doublecircle"));
        assert!(dot.contains("root_b -> sm_final;"));
    }

    #[test]
    fn decisions_render_diamonds_with_arm_edges() {
        let machine = Machine::parse(
            r#"
initial: a
decisions:
  pick:
    - guard: ctx.x
      to: b
    - to: a
states:
  a:
    transitions:
      - guard: ctx.ready
        to: "@pick"
  b: {}
"#,
        )
        .expect("machine should load");

        let dot = render(&machine);
        assert!(dot.contains("decide_pick [shape=diamond, label=\"pick\"];"));
        assert!(dot.contains("root_a -> decide_pick [label=\"[ctx.ready]\"];"));
        assert!(dot.contains("decide_pick -> root_b [label=\"[ctx.x]\"];"));
        assert!(dot.contains("decide_pick -> root_a;"));
    }

    #[test]
    fn forks_render_a_point_with_fan_out() {
        let machine = Machine::parse(
            r#"
initial: a
states:
  a:
    transitions:
      - guard: ctx.go
        to: "par/[r1/q, r2/v]"
  par:
    orthogonal: true
    states:
      r1:
        initial: p
        states: {p: {}, q: {}}
      r2:
        initial: u
        states: {u: {}, v: {}}
"#,
        )
        .expect("machine should load");

        let dot = render(&machine);
        assert!(dot.contains("fork_0 [shape=point];"));
        assert!(dot.contains("root_a -> fork_0 [label=\"[ctx.go]\", lhead=cluster_root_par];"));
        assert!(dot.contains("fork_0 -> root_par_r1_q;"));
        assert!(dot.contains("fork_0 -> root_par_r2_v;"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let machine = Machine::parse(
            "initial: a\nstates:\n  a:\n    transitions:\n      - to: b\n  b: {}",
        )
        .expect("machine should load");
        assert_eq!(render(&machine), render(&machine));
    }
}
