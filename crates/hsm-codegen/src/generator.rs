//! The shared emission engine.
//!
//! [`Generator`] walks the validated machine once and produces, per state,
//! the four lifecycle procedures plus (for composites) an inspector helper,
//! then a dispatcher per referenced decision. All syntax is delegated to the
//! [`Backend`]; all sequencing comes from the [`plan`](crate::plan) module.
//!
//! The generated runtime works through per-composite slots in the context:
//!
//! * `<p>_active_do` / `<p>_active_exit` — function pointers to the active
//!   child's dispatch and exit procedures; the root's `_do` slot doubles as
//!   the liveness flag.
//! * `<p>_active_name` — the active child's name, for the inspector and for
//!   `IN_STATE` predicates.
//! * `<p>_hist_start` — the last active child's `_start`, kept across exits,
//!   for composites with shallow history.
//!
//! A state's `_start` registers it in its parent's slots, runs `_entry`, and
//! descends through defaults (or history); its `_exit` tears down the live
//! subtree first, runs the exit code, and deregisters itself. Orthogonal
//! regions have no slots of their own — they are always active while their
//! parent is — so their `_do`/`_exit` are called directly.

use hsm_model::Machine;
use hsm_model::Resolved;
use hsm_model::StateId;
use hsm_model::StateKind;
use hsm_model::TargetExpr;
use hsm_model::Transition;
use indexmap::IndexSet;
use regex::Regex;
use tracing::debug;

use crate::EmissionError;
use crate::backend::Artifact;
use crate::backend::Backend;
use crate::backend::GeneratedModule;
use crate::backend::Slot;
use crate::backend::SlotKind;
use crate::plan;
use crate::plan::EntryPlan;
use crate::plan::TransitionPlan;
use crate::writer::SourceWriter;
use crate::writer::emit_reindented;

/// Turns a state or decision name into an identifier fragment.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// The shared code generator, parameterized by a language backend.
#[allow(missing_debug_implementations)]
pub struct Generator<'a> {
    /// The validated machine being emitted.
    machine: &'a Machine,
    /// The language backend supplying syntax and assembly.
    backend: &'a dyn Backend,
    /// The `IN_STATE(...)` macro pattern.
    in_state: Regex,
}

impl<'a> Generator<'a> {
    /// Creates a generator for a machine and backend.
    pub fn new(machine: &'a Machine, backend: &'a dyn Backend) -> Self {
        Self {
            machine,
            backend,
            in_state: Regex::new(r"IN_STATE\(\s*([^)\s][^)]*?)\s*\)")
                .expect("the IN_STATE pattern is valid"),
        }
    }

    /// Generates the output artifacts for the machine.
    pub fn generate(&self, base_name: &str) -> Result<Vec<Artifact>, EmissionError> {
        debug!(lang = %self.backend.lang(), base = base_name, "generating target source");
        let module = self.module()?;
        self.backend.assemble(self.machine, &module, base_name)
    }

    /// Walks the machine and produces every procedure plus the context
    /// layout.
    fn module(&self) -> Result<GeneratedModule, EmissionError> {
        let mut w = SourceWriter::new();
        let mut lifecycle_procs = Vec::new();
        let mut inspector_procs = Vec::new();

        for (id, state) in self.machine.states() {
            w.line(
                &self
                    .backend
                    .comment(&format!("state {path}", path = self.machine.path(id))),
            );
            self.emit_start(&mut w, id)?;
            lifecycle_procs.push(self.proc_name(id, "start"));
            w.blank();

            self.emit_entry(&mut w, id)?;
            lifecycle_procs.push(self.proc_name(id, "entry"));
            w.blank();

            self.emit_exit(&mut w, id)?;
            lifecycle_procs.push(self.proc_name(id, "exit"));
            w.blank();

            self.emit_do(&mut w, id)?;
            lifecycle_procs.push(self.proc_name(id, "do"));
            w.blank();

            if state.kind != StateKind::Leaf {
                self.emit_inspector(&mut w, id);
                inspector_procs.push(self.proc_name(id, "state_str"));
                w.blank();
            }
        }

        for (source, name) in self.dispatchers() {
            w.line(&self.backend.comment(&format!(
                "decision `{name}` referenced from {path}",
                path = self.machine.path(source)
            )));
            self.emit_dispatcher(&mut w, source, &name)?;
            lifecycle_procs.push(self.dispatcher_name(source, &name));
            w.blank();
        }

        let mut slots = Vec::new();
        for (id, state) in self.machine.states() {
            if state.kind != StateKind::CompositeOr {
                continue;
            }
            let m = self.mangle(id);
            slots.push(Slot {
                name: format!("{m}_active_do"),
                kind: SlotKind::Fn,
            });
            slots.push(Slot {
                name: format!("{m}_active_exit"),
                kind: SlotKind::Fn,
            });
            slots.push(Slot {
                name: format!("{m}_active_name"),
                kind: SlotKind::Name,
            });
            if state.history {
                slots.push(Slot {
                    name: format!("{m}_hist_start"),
                    kind: SlotKind::Fn,
                });
            }
        }

        let context_init = self
            .machine
            .context_init()
            .map(|code| self.expand(code, self.machine.root()))
            .transpose()?;

        Ok(GeneratedModule {
            procs: w.finish(),
            lifecycle_procs,
            inspector_procs,
            slots,
            context_init,
        })
    }

    /// Gets the mangled identifier of a state path.
    fn mangle(&self, id: StateId) -> String {
        self.machine
            .path_ids(id)
            .iter()
            .map(|i| sanitize(&self.machine.state(*i).name))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Gets the name of a lifecycle procedure.
    fn proc_name(&self, id: StateId, suffix: &str) -> String {
        format!("{m}_{suffix}", m = self.mangle(id))
    }

    /// Gets the name of a per-call-site decision dispatcher.
    fn dispatcher_name(&self, source: StateId, decision: &str) -> String {
        format!(
            "{m}_decide_{d}",
            m = self.mangle(source),
            d = sanitize(decision)
        )
    }

    /// Opens a block and returns the mark used to detect empty bodies.
    fn open(&self, w: &mut SourceWriter, header: String) -> usize {
        w.line(&header);
        w.indent();
        w.line_count()
    }

    /// Closes a block opened with [`open`](Self::open).
    fn close(&self, w: &mut SourceWriter, mark: usize) {
        if w.line_count() == mark {
            if let Some(pass) = self.backend.pass_stmt() {
                w.line(pass);
            }
        }
        w.dedent();
        if let Some(close) = self.backend.block_close() {
            w.line(close);
        }
    }

    /// Expands `IN_STATE(...)` macros in user code.
    fn expand(&self, code: &str, scope: StateId) -> Result<String, EmissionError> {
        let mut out = String::new();
        let mut last = 0;
        for caps in self.in_state.captures_iter(code) {
            let all = caps.get(0).expect("match has a full capture");
            let path = caps
                .get(1)
                .expect("the IN_STATE pattern has one group")
                .as_str();
            out.push_str(&code[last..all.start()]);
            out.push('(');
            out.push_str(&self.in_state_expr(path, scope)?);
            out.push(')');
            last = all.end();
        }
        out.push_str(&code[last..]);
        Ok(out)
    }

    /// Builds the active-state predicate for one `IN_STATE` path.
    fn in_state_expr(&self, path: &str, scope: StateId) -> Result<String, EmissionError> {
        let in_state_error = |message: String| EmissionError::InState {
            path: path.to_string(),
            scope: self.machine.path(scope),
            message,
        };

        let target = match TargetExpr::parse(Some(path))
            .and_then(|expr| expr.resolve(self.machine, scope))
        {
            Ok(Resolved::Single(id)) => id,
            Ok(_) => return Err(in_state_error("the path must name a single state".to_string())),
            Err(e) => return Err(in_state_error(e.to_string())),
        };

        let ids = self.machine.path_ids(target);
        let mut checks = Vec::new();
        for pair in ids.windows(2) {
            let (parent, child) = (pair[0], pair[1]);
            // Regions of an orthogonal parent are active whenever the parent
            // is, so only OR levels contribute a comparison.
            if self.machine.state(parent).kind == StateKind::CompositeOr {
                checks.push((
                    format!("{m}_active_name", m = self.mangle(parent)),
                    self.machine.state(child).name.clone(),
                ));
            }
        }

        Ok(self.backend.in_state_check(&checks))
    }

    /// Emits a block of user code with macros expanded.
    fn emit_code(&self, w: &mut SourceWriter, code: &str, scope: StateId) -> Result<(), EmissionError> {
        let expanded = self.expand(code, scope)?;
        emit_reindented(w, expanded.trim_end());
        Ok(())
    }

    /// Builds a one-line guard expression with macros expanded.
    fn guard_expr(&self, guard: &str, scope: StateId) -> Result<String, EmissionError> {
        Ok(self.expand(guard, scope)?.replace('\n', " ").trim().to_string())
    }

    /// Emits the assignments registering a state in its parent's slots.
    ///
    /// Does nothing for the root and for regions of an orthogonal parent,
    /// neither of which is slot-tracked.
    fn emit_register(&self, w: &mut SourceWriter, id: StateId) {
        let Some(parent) = self.machine.state(id).parent else {
            return;
        };
        if self.machine.state(parent).kind != StateKind::CompositeOr {
            return;
        }

        let pm = self.mangle(parent);
        w.line(
            &self
                .backend
                .assign_fn(&format!("{pm}_active_do"), &self.proc_name(id, "do")),
        );
        w.line(
            &self
                .backend
                .assign_fn(&format!("{pm}_active_exit"), &self.proc_name(id, "exit")),
        );
        w.line(
            &self
                .backend
                .assign_name(&format!("{pm}_active_name"), &self.machine.state(id).name),
        );
        if self.machine.state(parent).history {
            w.line(
                &self
                    .backend
                    .assign_fn(&format!("{pm}_hist_start"), &self.proc_name(id, "start")),
            );
        }
    }

    /// Emits the default descent below a state: history or `initial` for an
    /// OR composite, every region for an AND composite.
    fn emit_descend(&self, w: &mut SourceWriter, id: StateId) -> Result<(), EmissionError> {
        let state = self.machine.state(id);
        match state.kind {
            StateKind::Leaf => {}
            StateKind::CompositeOr => {
                let initial = state
                    .initial
                    .as_deref()
                    .and_then(|name| self.machine.child(id, name))
                    .ok_or_else(|| EmissionError::MissingInitial {
                        path: self.machine.path(id),
                    })?;
                let start = self.backend.call(&self.proc_name(initial, "start"));
                if state.history {
                    self.backend.guarded_slot_call(
                        w,
                        &format!("{m}_hist_start", m = self.mangle(id)),
                        Some(start.as_str()),
                    );
                } else {
                    w.line(&start);
                }
            }
            StateKind::CompositeAnd => {
                for region in state.children.values() {
                    w.line(&self.backend.call(&self.proc_name(*region, "start")));
                }
            }
        }
        Ok(())
    }

    /// Emits `<p>_start`: register, enter, descend.
    fn emit_start(&self, w: &mut SourceWriter, id: StateId) -> Result<(), EmissionError> {
        let mark = self.open(w, self.backend.proc_open(&self.proc_name(id, "start")));
        self.emit_register(w, id);
        w.line(&self.backend.call(&self.proc_name(id, "entry")));
        self.emit_descend(w, id)?;
        self.close(w, mark);
        Ok(())
    }

    /// Emits `<p>_entry`: entry hook, then the state's own entry code.
    fn emit_entry(&self, w: &mut SourceWriter, id: StateId) -> Result<(), EmissionError> {
        let mark = self.open(w, self.backend.proc_open(&self.proc_name(id, "entry")));
        if let Some(hook) = &self.machine.hooks().entry {
            self.emit_code(w, hook, id)?;
        }
        if let Some(code) = &self.machine.state(id).entry {
            self.emit_code(w, code, id)?;
        }
        self.close(w, mark);
        Ok(())
    }

    /// Emits `<p>_exit`: tear down the live subtree, run the state's own
    /// exit code and the exit hook, deregister from the parent.
    fn emit_exit(&self, w: &mut SourceWriter, id: StateId) -> Result<(), EmissionError> {
        let state = self.machine.state(id);
        let mark = self.open(w, self.backend.proc_open(&self.proc_name(id, "exit")));

        match state.kind {
            StateKind::Leaf => {}
            StateKind::CompositeOr => {
                self.backend.guarded_slot_call(
                    w,
                    &format!("{m}_active_exit", m = self.mangle(id)),
                    None,
                );
            }
            StateKind::CompositeAnd => {
                for region in state.children.values() {
                    w.line(&self.backend.call(&self.proc_name(*region, "exit")));
                }
            }
        }

        if let Some(code) = &state.exit {
            self.emit_code(w, code, id)?;
        }
        if let Some(hook) = &self.machine.hooks().exit {
            self.emit_code(w, hook, id)?;
        }

        if let Some(parent) = state.parent {
            if self.machine.state(parent).kind == StateKind::CompositeOr {
                let pm = self.mangle(parent);
                w.line(&self.backend.clear_slot(&format!("{pm}_active_do")));
                w.line(&self.backend.clear_slot(&format!("{pm}_active_exit")));
                w.line(&self.backend.clear_slot(&format!("{pm}_active_name")));
            }
        }

        self.close(w, mark);
        Ok(())
    }

    /// Emits `<p>_do`: do hook, own do code, the transition-selection block,
    /// then dispatch into the active subtree.
    fn emit_do(&self, w: &mut SourceWriter, id: StateId) -> Result<(), EmissionError> {
        let state = self.machine.state(id);
        let mark = self.open(w, self.backend.proc_open(&self.proc_name(id, "do")));

        if let Some(hook) = &self.machine.hooks().do_code {
            self.emit_code(w, hook, id)?;
        }
        if let Some(code) = &state.do_code {
            self.emit_code(w, code, id)?;
        }
        for transition in &state.transitions {
            self.emit_transition(w, id, transition)?;
        }

        match state.kind {
            StateKind::Leaf => {}
            StateKind::CompositeOr => {
                let slot = format!("{m}_active_do", m = self.mangle(id));
                if state.transitions.is_empty() {
                    self.backend.guarded_slot_call(w, &slot, None);
                } else {
                    let inner = self.open(w, self.backend.if_open(&self.backend.not_fired()));
                    self.backend.guarded_slot_call(w, &slot, None);
                    self.close(w, inner);
                }
            }
            StateKind::CompositeAnd => {
                // Regions are serialized within a tick; the fired flag resets
                // between them so each region may fire its own transition.
                if state.transitions.is_empty() {
                    self.emit_region_dispatch(w, id);
                } else {
                    let inner = self.open(w, self.backend.if_open(&self.backend.not_fired()));
                    self.emit_region_dispatch(w, id);
                    self.close(w, inner);
                }
            }
        }

        self.close(w, mark);
        Ok(())
    }

    /// Emits the serialized region dispatch of an AND composite.
    fn emit_region_dispatch(&self, w: &mut SourceWriter, id: StateId) {
        for region in self.machine.state(id).children.values() {
            w.line(&self.backend.set_fired(false));
            w.line(&self.backend.call(&self.proc_name(*region, "do")));
        }
    }

    /// Emits one transition candidate inside a `_do` body.
    fn emit_transition(
        &self,
        w: &mut SourceWriter,
        source: StateId,
        transition: &Transition,
    ) -> Result<(), EmissionError> {
        let cond = match &transition.guard {
            Some(guard) => format!(
                "{not_fired} {and} ({guard})",
                not_fired = self.backend.not_fired(),
                and = self.backend.and_op(),
                guard = self.guard_expr(guard, source)?,
            ),
            None => self.backend.not_fired(),
        };

        let mark = self.open(w, self.backend.if_open(&cond));
        if let Some(hook) = &self.machine.hooks().transition {
            self.emit_code(w, hook, source)?;
        }
        w.line(&self.backend.set_fired(true));
        if let Some(action) = &transition.action {
            self.emit_code(w, action, source)?;
        }
        self.emit_target(w, source, &transition.target)?;
        self.close(w, mark);
        Ok(())
    }

    /// Emits the movement of a transition (or decision arm): the exit
    /// sequence and entry sequence of its plan, a dispatcher call, or the
    /// termination teardown.
    fn emit_target(
        &self,
        w: &mut SourceWriter,
        source: StateId,
        target: &TargetExpr,
    ) -> Result<(), EmissionError> {
        let resolved = target.resolve(self.machine, source).map_err(|e| {
            EmissionError::UnresolvedTarget {
                target: target.to_string(),
                source_path: self.machine.path(source),
                message: e.to_string(),
            }
        })?;

        match resolved {
            Resolved::Decision(name) => {
                if !self.machine.decisions().contains_key(&name) {
                    return Err(EmissionError::UnresolvedTarget {
                        target: target.to_string(),
                        source_path: self.machine.path(source),
                        message: format!("unknown decision `@{name}`"),
                    });
                }
                w.line(&self.backend.call(&self.dispatcher_name(source, &name)));
                Ok(())
            }
            Resolved::Termination => {
                self.emit_plan(w, &plan::plan_termination(self.machine, source))
            }
            Resolved::Single(target) => {
                self.emit_plan(w, &plan::plan_single(self.machine, source, target))
            }
            Resolved::Fork { state, limbs } => {
                self.emit_plan(w, &plan::plan_fork(self.machine, source, state, &limbs))
            }
        }
    }

    /// Lowers a transition plan to exit calls and entry statements.
    fn emit_plan(&self, w: &mut SourceWriter, plan: &TransitionPlan) -> Result<(), EmissionError> {
        for id in &plan.exits {
            w.line(&self.backend.call(&self.proc_name(*id, "exit")));
        }
        if plan.exit_subtree {
            self.backend.guarded_slot_call(
                w,
                &format!("{m}_active_exit", m = self.mangle(plan.lca)),
                None,
            );
        }

        match &plan.entry {
            EntryPlan::Chain(path) if path.is_empty() => self.emit_descend(w, plan.lca)?,
            EntryPlan::Chain(path) => self.emit_entry_chain(w, path),
            EntryPlan::Fork {
                path,
                and_state,
                limbs,
            } => {
                for id in path {
                    self.emit_register(w, *id);
                    w.line(&self.backend.call(&self.proc_name(*id, "entry")));
                }
                for region in self.machine.state(*and_state).children.values() {
                    match limbs.iter().find(|limb| limb[0] == *region) {
                        Some(limb) => self.emit_entry_chain(w, limb),
                        None => {
                            w.line(&self.backend.call(&self.proc_name(*region, "start")));
                        }
                    }
                }
            }
            EntryPlan::Terminate => {
                let root = self.mangle(self.machine.root());
                w.line(&self.backend.clear_slot(&format!("{root}_active_do")));
                w.line(&self.backend.clear_slot(&format!("{root}_active_exit")));
                w.line(&self.backend.clear_slot(&format!("{root}_active_name")));
            }
        }
        Ok(())
    }

    /// Emits an explicit entry chain: interior states register and enter,
    /// the final state starts (extending the chain to a leaf at runtime).
    ///
    /// When the chain dives through an orthogonal state into one of its
    /// regions, the sibling regions start through their defaults so that the
    /// full orthogonal configuration becomes active.
    fn emit_entry_chain(&self, w: &mut SourceWriter, path: &[StateId]) {
        let first = path[0];
        if path.len() == 1 {
            w.line(&self.backend.call(&self.proc_name(first, "start")));
            return;
        }

        self.emit_register(w, first);
        w.line(&self.backend.call(&self.proc_name(first, "entry")));

        if self.machine.state(first).kind == StateKind::CompositeAnd {
            let next = path[1];
            for region in self.machine.state(first).children.values() {
                if *region == next {
                    self.emit_entry_chain(w, &path[1..]);
                } else {
                    w.line(&self.backend.call(&self.proc_name(*region, "start")));
                }
            }
        } else {
            self.emit_entry_chain(w, &path[1..]);
        }
    }

    /// Collects every (referencing state, decision) pair, following
    /// decision-to-decision references.
    fn dispatchers(&self) -> IndexSet<(StateId, String)> {
        let mut set = IndexSet::new();
        for (id, state) in self.machine.states() {
            for transition in &state.transitions {
                if let TargetExpr::Decision(name) = &transition.target {
                    self.collect_dispatchers(id, name, &mut set);
                }
            }
        }
        set
    }

    /// Adds one (state, decision) pair and the pairs its arms reference.
    fn collect_dispatchers(
        &self,
        source: StateId,
        name: &str,
        set: &mut IndexSet<(StateId, String)>,
    ) {
        let Some(arms) = self.machine.decisions().get(name) else {
            return;
        };
        if !set.insert((source, name.to_string())) {
            return;
        }
        for arm in arms {
            if let TargetExpr::Decision(next) = &arm.target {
                self.collect_dispatchers(source, next, set);
            }
        }
    }

    /// Emits a decision dispatcher specialized for one referencing state.
    ///
    /// Arms form an if/else-if chain so that guards keep first-match
    /// semantics and later guards are not evaluated after a hit; an
    /// unguarded arm is the final alternative. A dispatcher whose arms all
    /// fail leaves the configuration unchanged.
    fn emit_dispatcher(
        &self,
        w: &mut SourceWriter,
        source: StateId,
        name: &str,
    ) -> Result<(), EmissionError> {
        let arms = self
            .machine
            .decisions()
            .get(name)
            .expect("dispatchers are only collected for existing decisions");

        let proc_mark = self.open(w, self.backend.proc_open(&self.dispatcher_name(source, name)));
        let mut chain_mark: Option<usize> = None;

        for arm in arms {
            match &arm.guard {
                Some(guard) => {
                    let cond = format!("({guard})", guard = self.guard_expr(guard, source)?);
                    match chain_mark {
                        None => chain_mark = Some(self.open(w, self.backend.if_open(&cond))),
                        Some(_) => {
                            w.dedent();
                            w.line(&self.backend.else_if_open(&cond));
                            w.indent();
                            chain_mark = Some(w.line_count());
                        }
                    }
                    self.emit_arm(w, source, arm)?;
                }
                None => {
                    // An unguarded arm always fires; later arms are dead.
                    match chain_mark {
                        None => {
                            self.emit_arm(w, source, arm)?;
                        }
                        Some(_) => {
                            w.dedent();
                            w.line(&self.backend.else_open());
                            w.indent();
                            chain_mark = Some(w.line_count());
                            self.emit_arm(w, source, arm)?;
                        }
                    }
                    break;
                }
            }
        }

        if let Some(mark) = chain_mark {
            self.close(w, mark);
        }
        self.close(w, proc_mark);
        Ok(())
    }

    /// Emits one decision arm body: its action, then its movement.
    ///
    /// The transition hook and the fired flag were already handled by the
    /// transition that invoked the dispatcher.
    fn emit_arm(
        &self,
        w: &mut SourceWriter,
        source: StateId,
        arm: &Transition,
    ) -> Result<(), EmissionError> {
        if let Some(action) = &arm.action {
            self.emit_code(w, action, source)?;
        }
        self.emit_target(w, source, &arm.target)
    }

    /// Emits the inspector helper of a composite state.
    ///
    /// The helper appends the subtree portion of the active path below the
    /// state; the caller has already appended the state's own name.
    fn emit_inspector(&self, w: &mut SourceWriter, id: StateId) {
        let state = self.machine.state(id);
        let mark = self.open(w, self.backend.str_proc_open(&self.proc_name(id, "state_str")));
        if let Some(prologue) = self.backend.str_proc_prologue() {
            w.line(prologue);
        }

        match state.kind {
            StateKind::Leaf => {}
            StateKind::CompositeOr => {
                let slot = format!("{m}_active_name", m = self.mangle(id));
                let inner = self.open(w, self.backend.if_open(&self.backend.slot_is_set(&slot)));
                w.line(&self.backend.append_lit("/"));
                w.line(&self.backend.append_slot(&slot));
                for child in state.children.values() {
                    if self.machine.state(*child).kind == StateKind::Leaf {
                        continue;
                    }
                    let nested = self.open(
                        w,
                        self.backend
                            .if_open(&self.backend.name_eq(&slot, &self.machine.state(*child).name)),
                    );
                    w.line(
                        &self
                            .backend
                            .call_str_proc(&self.proc_name(*child, "state_str")),
                    );
                    self.close(w, nested);
                }
                self.close(w, inner);
            }
            StateKind::CompositeAnd => {
                w.line(&self.backend.append_lit("/["));
                for (i, region) in state.children.values().enumerate() {
                    if i > 0 {
                        w.line(&self.backend.append_lit(" | "));
                    }
                    w.line(&self.backend.append_lit(&self.machine.state(*region).name));
                    if self.machine.state(*region).kind != StateKind::Leaf {
                        w.line(
                            &self
                                .backend
                                .call_str_proc(&self.proc_name(*region, "state_str")),
                        );
                    }
                }
                w.line(&self.backend.append_lit("]"));
            }
        }

        if let Some(epilogue) = self.backend.str_proc_epilogue() {
            w.line(epilogue);
        }
        self.close(w, mark);
    }
}

#[cfg(test)]
mod tests {
    use hsm_model::Lang;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend;

    /// Generates the sources for a document in the given language.
    fn emit(source: &str, lang: Lang) -> Vec<Artifact> {
        let machine = Machine::parse(source).expect("document should load");
        let backend = backend::for_lang(lang);
        Generator::new(&machine, backend.as_ref())
            .generate("statemachine")
            .expect("generation should succeed")
    }

    /// The toggle machine of the simple end-to-end scenario.
    const TOGGLE: &str = r#"
initial: a
context:
  - name: counter
    type: int
states:
  a:
    entry: trace(ctx, "enter a");
    transitions:
      - guard: ctx->counter == 3
        to: b
  b:
    transitions:
      - guard: ctx->counter == 6
        to: a
"#;

    #[test]
    fn c_backend_produces_header_and_source() {
        let artifacts = emit(TOGGLE, Lang::C);
        let names: Vec<&str> = artifacts.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, ["statemachine.h", "statemachine.c"]);

        let header = &artifacts[0].contents;
        assert!(header.contains("int counter;"));
        assert!(header.contains("sm_state_fn root_active_do;"));
        assert!(header.contains("const char *root_active_name;"));
        assert!(header.contains("void sm_tick(sm_context *ctx);"));

        let source = &artifacts[1].contents;
        assert!(source.contains("static void root_a_do(sm_context *ctx);"));
        assert!(source.contains("if (!ctx->transition_fired && (ctx->counter == 3)) {"));
    }

    #[test]
    fn exits_precede_entries_in_transition_bodies() {
        let artifacts = emit(TOGGLE, Lang::C);
        let source = &artifacts[1].contents;

        let body = source
            .split("static void root_a_do(sm_context *ctx) {")
            .nth(1)
            .expect("the a state has a do procedure");
        let exit = body.find("root_a_exit(ctx);").expect("a exits itself");
        let enter = body.find("root_b_start(ctx);").expect("b starts");
        assert!(exit < enter, "the exit sequence must precede the entry sequence");
    }

    #[test]
    fn generation_is_deterministic() {
        let first = emit(TOGGLE, Lang::Python);
        let second = emit(TOGGLE, Lang::Python);
        assert_eq!(first, second);
    }

    #[test]
    fn self_transitions_fully_exit_and_re_enter() {
        let artifacts = emit(
            r#"
initial: x
context:
  - name: n
    type: int
states:
  x:
    entry: on_enter(ctx);
    exit: on_exit(ctx);
    transitions:
      - guard: ctx->n == 2
        to: "."
"#,
            Lang::C,
        );
        let source = &artifacts[1].contents;
        let body = source
            .split("static void root_x_do(sm_context *ctx) {")
            .nth(1)
            .expect("the state has a do procedure");
        let exit = body.find("root_x_exit(ctx);").expect("the state exits itself");
        let start = body.find("root_x_start(ctx);").expect("the state re-starts");
        assert!(exit < start);
    }

    #[test]
    fn hooks_inject_into_every_site() {
        let artifacts = emit(
            r#"
initial: a
context:
  - name: n
    type: int
hooks:
  entry: log_entry(ctx);
  exit: log_exit(ctx);
  do: log_do(ctx);
  transition: log_transition(ctx);
states:
  a:
    transitions:
      - guard: ctx->n == 1
        to: b
  b: {}
"#,
            Lang::C,
        );
        let source = &artifacts[1].contents;
        // Every state's entry/exit/do procedure carries the hook; the
        // transition body calls the transition hook before the flag is set.
        assert!(source.contains("log_entry(ctx);"));
        assert!(source.contains("log_exit(ctx);"));
        assert!(source.contains("log_do(ctx);"));
        let body = source
            .split("static void root_a_do(sm_context *ctx) {")
            .nth(1)
            .expect("the source state has a do procedure");
        let hook = body
            .find("log_transition(ctx);")
            .expect("the transition hook is injected");
        let fired = body
            .find("ctx->transition_fired = true;")
            .expect("the fired flag is set");
        assert!(hook < fired);
    }

    #[test]
    fn rust_backend_uses_option_typed_slots() {
        let artifacts = emit(
            r#"
initial: a
context:
  - name: counter
    type: i32
states:
  a:
    transitions:
      - guard: ctx.counter == 3
        to: b
  b: {}
"#,
            Lang::Rust,
        );
        let source = &artifacts[0].contents;
        assert!(source.contains("pub root_active_do: Option<StateFn>,"));
        assert!(source.contains("if let Some(f) = ctx.root_active_do {"));
        assert!(source.contains("ctx.root_active_do = Some(root_a_do);"));
        assert!(source.contains("pub fn sm_get_state_str(ctx: &Context) -> String {"));
    }

    #[test]
    fn python_backend_indents_blocks_and_passes_empty_bodies() {
        let artifacts = emit(TOGGLE, Lang::Python);
        let source = &artifacts[0].contents;
        assert!(source.contains("def root_b_entry(ctx):\n    pass\n"));
        assert!(source.contains("if not ctx.transition_fired and (ctx->counter == 3):"));
    }

    #[test]
    fn missing_context_field_type_is_an_emission_error() {
        let machine = Machine::parse(
            "initial: a\ncontext:\n  - name: counter\nstates: {a: {}}",
        )
        .expect("document should load");
        let backend = backend::for_lang(Lang::C);
        let err = Generator::new(&machine, backend.as_ref())
            .generate("statemachine")
            .expect_err("generation should fail");
        assert!(matches!(err, EmissionError::MissingFieldType { .. }));

        // The Python backend tolerates untyped fields.
        let backend = backend::for_lang(Lang::Python);
        Generator::new(&machine, backend.as_ref())
            .generate("statemachine")
            .expect("python generation should succeed");
    }

    #[test]
    fn history_composites_get_a_history_slot() {
        let artifacts = emit(
            r#"
initial: m
states:
  m:
    history: true
    initial: a
    states:
      a:
        transitions:
          - guard: ctx->go
            to: b
      b: {}
  outside:
    transitions:
      - guard: ctx->back
        to: m
context:
  - name: go
    type: int
  - name: back
    type: int
"#,
            Lang::C,
        );
        let header = &artifacts[0].contents;
        assert!(header.contains("sm_state_fn root_m_hist_start;"));

        let source = &artifacts[1].contents;
        // Entering m restores history when recorded, else the initial child.
        assert!(source.contains("if (ctx->root_m_hist_start != NULL) {"));
        assert!(source.contains("} else {"));
        assert!(source.contains("root_m_a_start(ctx);"));
        // Registration under a history parent records the child's start.
        assert!(source.contains("ctx->root_m_hist_start = root_m_a_start;"));
    }

    #[test]
    fn decisions_become_per_state_dispatchers() {
        let artifacts = emit(
            r#"
initial: a
context:
  - name: x
    type: int
decisions:
  pick:
    - guard: ctx->x == 1
      to: b
    - to: c
states:
  a:
    transitions:
      - guard: ctx->x > 0
        to: "@pick"
  b: {}
  c: {}
"#,
            Lang::C,
        );
        let source = &artifacts[1].contents;
        assert!(source.contains("static void root_a_decide_pick(sm_context *ctx) {"));
        assert!(source.contains("root_a_decide_pick(ctx);"));
        // First-match: the second arm is the else of the first.
        let dispatcher = source
            .split("static void root_a_decide_pick(sm_context *ctx) {")
            .nth(1)
            .expect("dispatcher exists");
        assert!(dispatcher.contains("if ((ctx->x == 1)) {"));
        assert!(dispatcher.contains("} else {"));
    }

    #[test]
    fn in_state_macros_expand_to_name_checks() {
        let artifacts = emit(
            r#"
initial: a
states:
  a:
    initial: x
    states:
      x: {}
    transitions:
      - guard: IN_STATE(/a/x)
        to: b
  b: {}
"#,
            Lang::Python,
        );
        let source = &artifacts[0].contents;
        assert!(!source.contains("IN_STATE"));
        assert!(source.contains(
            "(ctx.root_active_name == \"a\" and ctx.root_a_active_name == \"x\")"
        ));
    }

    #[test]
    fn entering_one_region_starts_the_sibling_regions() {
        let artifacts = emit(
            r#"
initial: a
states:
  a:
    transitions:
      - guard: ctx.go
        to: "/par/r1/q"
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
            Lang::Python,
        );
        let source = &artifacts[0].contents;
        let body = source
            .split("def root_a_do(ctx):")
            .nth(1)
            .expect("the source state has a do procedure");
        let explicit = body
            .find("root_par_r1_q_start(ctx)")
            .expect("the explicit limb starts");
        let sibling = body
            .find("root_par_r2_start(ctx)")
            .expect("the sibling region default-starts");
        assert!(explicit < sibling, "regions enter in declaration order");
    }

    #[test]
    fn orthogonal_regions_dispatch_in_declaration_order() {
        let artifacts = emit(
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
        states: {u: {}, v: {}}
"#,
            Lang::Python,
        );
        let source = &artifacts[0].contents;
        let body = source
            .split("def root_par_do(ctx):")
            .nth(1)
            .expect("the orthogonal state has a do procedure");
        let r1 = body.find("root_par_r1_do(ctx)").expect("region 1 dispatches");
        let r2 = body.find("root_par_r2_do(ctx)").expect("region 2 dispatches");
        assert!(r1 < r2);
        // The inspector renders the bracketed region form.
        assert!(source.contains("out += \"/[\""));
        assert!(source.contains("out += \" | \""));
    }
}
