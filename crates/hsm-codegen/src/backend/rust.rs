//! The Rust backend: a single module with option-typed function pointers.

use hsm_model::Lang;
use hsm_model::Machine;

use crate::EmissionError;
use crate::backend::Artifact;
use crate::backend::Backend;
use crate::backend::GeneratedModule;
use crate::backend::SlotKind;
use crate::backend::escape_str;
use crate::writer::SourceWriter;
use crate::writer::emit_reindented;

/// The Rust language backend.
///
/// Emits `<base>.rs`: a `Context` struct whose slots are
/// `Option<fn(&mut Context)>`, free lifecycle functions, and the public
/// `sm_*` surface. The file is written to be used as a module
/// (`mod statemachine;`) by a driver crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl Backend for RustBackend {
    fn lang(&self) -> Lang {
        Lang::Rust
    }

    fn comment(&self, text: &str) -> String {
        format!("// {text}")
    }

    fn if_open(&self, cond: &str) -> String {
        format!("if {cond} {{")
    }

    fn else_if_open(&self, cond: &str) -> String {
        format!("}} else if {cond} {{")
    }

    fn else_open(&self) -> String {
        "} else {".to_string()
    }

    fn block_close(&self) -> Option<&'static str> {
        Some("}")
    }

    fn proc_open(&self, name: &str) -> String {
        format!("fn {name}(ctx: &mut Context) {{")
    }

    fn str_proc_open(&self, name: &str) -> String {
        format!("fn {name}(ctx: &Context, out: &mut String) {{")
    }

    fn call(&self, name: &str) -> String {
        format!("{name}(ctx);")
    }

    fn call_str_proc(&self, name: &str) -> String {
        format!("{name}(ctx, out);")
    }

    fn append_lit(&self, text: &str) -> String {
        format!("out.push_str(\"{text}\");", text = escape_str(text))
    }

    fn append_slot(&self, slot: &str) -> String {
        format!("out.push_str(ctx.{slot}.unwrap_or(\"\"));")
    }

    fn slot_is_set(&self, slot: &str) -> String {
        format!("ctx.{slot}.is_some()")
    }

    fn guarded_slot_call(&self, w: &mut SourceWriter, slot: &str, otherwise: Option<&str>) {
        w.line(&format!("if let Some(f) = ctx.{slot} {{"));
        w.indent();
        w.line("f(ctx);");
        w.dedent();
        match otherwise {
            Some(stmt) => {
                w.line("} else {");
                w.indent();
                w.line(stmt);
                w.dedent();
                w.line("}");
            }
            None => w.line("}"),
        }
    }

    fn assign_fn(&self, slot: &str, proc: &str) -> String {
        format!("ctx.{slot} = Some({proc});")
    }

    fn assign_name(&self, slot: &str, name: &str) -> String {
        format!("ctx.{slot} = Some(\"{name}\");", name = escape_str(name))
    }

    fn clear_slot(&self, slot: &str) -> String {
        format!("ctx.{slot} = None;")
    }

    fn set_fired(&self, value: bool) -> String {
        format!("ctx.transition_fired = {value};")
    }

    fn not_fired(&self) -> String {
        "!ctx.transition_fired".to_string()
    }

    fn and_op(&self) -> &'static str {
        "&&"
    }

    fn true_lit(&self) -> &'static str {
        "true"
    }

    fn name_eq(&self, slot: &str, name: &str) -> String {
        format!("ctx.{slot} == Some(\"{name}\")", name = escape_str(name))
    }

    fn assemble(
        &self,
        machine: &Machine,
        module: &GeneratedModule,
        base_name: &str,
    ) -> Result<Vec<Artifact>, EmissionError> {
        let mut w = SourceWriter::new();
        w.line("//! Generated by hsmc. Do not edit.");
        w.blank();
        w.line("#![allow(dead_code)]");
        w.line("#![allow(unused_variables)]");
        w.blank();
        if let Some(includes) = machine.includes() {
            emit_reindented(&mut w, includes.trim_end());
            w.blank();
        }
        w.line("/// A state lifecycle procedure.");
        w.line("pub type StateFn = fn(&mut Context);");
        w.blank();
        w.line("/// The state machine context.");
        w.line("#[derive(Default)]");
        w.line("pub struct Context {");
        w.indent();
        for field in machine.context() {
            let ty = field.ty.as_deref().ok_or_else(|| EmissionError::MissingFieldType {
                name: field.name.clone(),
                lang: self.lang().to_string(),
            })?;
            w.line(&format!("pub {name}: {ty},", name = field.name));
        }
        w.line("pub transition_fired: bool,");
        for slot in &module.slots {
            match slot.kind {
                SlotKind::Fn => w.line(&format!("pub {name}: Option<StateFn>,", name = slot.name)),
                SlotKind::Name => {
                    w.line(&format!("pub {name}: Option<&'static str>,", name = slot.name))
                }
            }
        }
        w.dedent();
        w.line("}");
        w.blank();
        w.line("/// Zero-initializes the context and enters the initial configuration.");
        w.line("pub fn sm_init(ctx: &mut Context) {");
        w.indent();
        w.line("*ctx = Context::default();");
        if let Some(init) = &module.context_init {
            emit_reindented(&mut w, init.trim_end());
        }
        w.line("root_start(ctx);");
        w.dedent();
        w.line("}");
        w.blank();
        w.line("/// Runs one dispatch cycle.");
        w.line("pub fn sm_tick(ctx: &mut Context) {");
        w.indent();
        w.line("if ctx.root_active_do.is_none() {");
        w.indent();
        w.line("return;");
        w.dedent();
        w.line("}");
        w.line("ctx.transition_fired = false;");
        w.line("root_do(ctx);");
        w.dedent();
        w.line("}");
        w.blank();
        w.line("/// Reports whether the machine has not terminated.");
        w.line("pub fn sm_is_running(ctx: &Context) -> bool {");
        w.indent();
        w.line("ctx.root_active_do.is_some()");
        w.dedent();
        w.line("}");
        w.blank();
        w.line("/// Serializes the currently active state path.");
        w.line("pub fn sm_get_state_str(ctx: &Context) -> String {");
        w.indent();
        w.line("let mut out = String::from(\"/root\");");
        w.line("root_state_str(ctx, &mut out);");
        w.line("out");
        w.dedent();
        w.line("}");
        w.blank();
        w.line(module.procs.trim_end());

        Ok(vec![Artifact {
            file_name: format!("{base_name}.rs"),
            contents: w.finish(),
        }])
    }
}
