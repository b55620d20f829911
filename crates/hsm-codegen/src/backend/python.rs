//! The Python backend: first-class callables and indent-sensitive blocks.

use hsm_model::Lang;
use hsm_model::Machine;

use crate::EmissionError;
use crate::backend::Artifact;
use crate::backend::Backend;
use crate::backend::GeneratedModule;
use crate::backend::escape_str;
use crate::writer::SourceWriter;
use crate::writer::emit_reindented;

/// The Python language backend.
///
/// Emits `<base>.py`: a `Context` class whose slots hold module-level
/// function objects or `None`. Blocks are expressed purely through
/// indentation, which is why the shared walk never emits raw block text —
/// the writer's indent tracking carries the structure.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonBackend;

impl Backend for PythonBackend {
    fn lang(&self) -> Lang {
        Lang::Python
    }

    fn comment(&self, text: &str) -> String {
        format!("# {text}")
    }

    fn if_open(&self, cond: &str) -> String {
        format!("if {cond}:")
    }

    fn else_if_open(&self, cond: &str) -> String {
        format!("elif {cond}:")
    }

    fn else_open(&self) -> String {
        "else:".to_string()
    }

    fn block_close(&self) -> Option<&'static str> {
        None
    }

    fn pass_stmt(&self) -> Option<&'static str> {
        Some("pass")
    }

    fn proc_open(&self, name: &str) -> String {
        format!("def {name}(ctx):")
    }

    fn str_proc_open(&self, name: &str) -> String {
        format!("def {name}(ctx):")
    }

    fn str_proc_prologue(&self) -> Option<&'static str> {
        Some("out = \"\"")
    }

    fn str_proc_epilogue(&self) -> Option<&'static str> {
        Some("return out")
    }

    fn call(&self, name: &str) -> String {
        format!("{name}(ctx)")
    }

    fn call_str_proc(&self, name: &str) -> String {
        format!("out += {name}(ctx)")
    }

    fn append_lit(&self, text: &str) -> String {
        format!("out += \"{text}\"", text = escape_str(text))
    }

    fn append_slot(&self, slot: &str) -> String {
        format!("out += ctx.{slot}")
    }

    fn slot_is_set(&self, slot: &str) -> String {
        format!("ctx.{slot} is not None")
    }

    fn guarded_slot_call(&self, w: &mut SourceWriter, slot: &str, otherwise: Option<&str>) {
        w.line(&format!("if ctx.{slot} is not None:"));
        w.indent();
        w.line(&format!("ctx.{slot}(ctx)"));
        w.dedent();
        if let Some(stmt) = otherwise {
            w.line("else:");
            w.indent();
            w.line(stmt);
            w.dedent();
        }
    }

    fn assign_fn(&self, slot: &str, proc: &str) -> String {
        format!("ctx.{slot} = {proc}")
    }

    fn assign_name(&self, slot: &str, name: &str) -> String {
        format!("ctx.{slot} = \"{name}\"", name = escape_str(name))
    }

    fn clear_slot(&self, slot: &str) -> String {
        format!("ctx.{slot} = None")
    }

    fn set_fired(&self, value: bool) -> String {
        format!(
            "ctx.transition_fired = {value}",
            value = if value { "True" } else { "False" }
        )
    }

    fn not_fired(&self) -> String {
        "not ctx.transition_fired".to_string()
    }

    fn and_op(&self) -> &'static str {
        "and"
    }

    fn true_lit(&self) -> &'static str {
        "True"
    }

    fn name_eq(&self, slot: &str, name: &str) -> String {
        format!("ctx.{slot} == \"{name}\"", name = escape_str(name))
    }

    fn assemble(
        &self,
        machine: &Machine,
        module: &GeneratedModule,
        base_name: &str,
    ) -> Result<Vec<Artifact>, EmissionError> {
        let mut w = SourceWriter::new();
        w.line("# Generated by hsmc. Do not edit.");
        w.blank();
        if let Some(includes) = machine.includes() {
            emit_reindented(&mut w, includes.trim_end());
            w.blank();
        }
        w.blank();
        w.line("class Context:");
        w.indent();
        w.line("def __init__(self):");
        w.indent();
        for field in machine.context() {
            // Python type names are zero-value constructors (`int()` is 0),
            // which is the closest analog of zero-initialization; untyped
            // fields start as None.
            match field.ty.as_deref() {
                Some(ty) => w.line(&format!("self.{name} = {ty}()", name = field.name)),
                None => w.line(&format!("self.{name} = None", name = field.name)),
            }
        }
        w.line("self.transition_fired = False");
        for slot in &module.slots {
            w.line(&format!("self.{name} = None", name = slot.name));
        }
        w.dedent();
        w.dedent();
        w.blank();
        w.blank();
        w.line("def sm_init(ctx):");
        w.indent();
        w.line("ctx.__init__()");
        if let Some(init) = &module.context_init {
            emit_reindented(&mut w, init.trim_end());
        }
        w.line("root_start(ctx)");
        w.dedent();
        w.blank();
        w.blank();
        w.line("def sm_tick(ctx):");
        w.indent();
        w.line("if ctx.root_active_do is None:");
        w.indent();
        w.line("return");
        w.dedent();
        w.line("ctx.transition_fired = False");
        w.line("root_do(ctx)");
        w.dedent();
        w.blank();
        w.blank();
        w.line("def sm_is_running(ctx):");
        w.indent();
        w.line("return ctx.root_active_do is not None");
        w.dedent();
        w.blank();
        w.blank();
        w.line("def sm_get_state_str(ctx):");
        w.indent();
        w.line("return \"/root\" + root_state_str(ctx)");
        w.dedent();
        w.blank();
        w.blank();
        w.line(module.procs.trim_end());

        Ok(vec![Artifact {
            file_name: format!("{base_name}.py"),
            contents: w.finish(),
        }])
    }
}
