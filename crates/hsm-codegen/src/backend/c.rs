//! The C backend: header/source split, raw function pointers, `NULL` tests.

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

/// The C language backend.
///
/// Emits `<base>.h` with the context struct and the public entry points, and
/// `<base>.c` with the (static) lifecycle procedures.
#[derive(Debug, Default, Clone, Copy)]
pub struct CBackend;

impl Backend for CBackend {
    fn lang(&self) -> Lang {
        Lang::C
    }

    fn comment(&self, text: &str) -> String {
        format!("/* {text} */")
    }

    fn if_open(&self, cond: &str) -> String {
        format!("if ({cond}) {{")
    }

    fn else_if_open(&self, cond: &str) -> String {
        format!("}} else if ({cond}) {{")
    }

    fn else_open(&self) -> String {
        "} else {".to_string()
    }

    fn block_close(&self) -> Option<&'static str> {
        Some("}")
    }

    fn proc_open(&self, name: &str) -> String {
        format!("static void {name}(sm_context *ctx) {{")
    }

    fn str_proc_open(&self, name: &str) -> String {
        format!("static void {name}(const sm_context *ctx, char *out) {{")
    }

    fn call(&self, name: &str) -> String {
        format!("{name}(ctx);")
    }

    fn call_str_proc(&self, name: &str) -> String {
        format!("{name}(ctx, out);")
    }

    fn append_lit(&self, text: &str) -> String {
        format!("strcat(out, \"{text}\");", text = escape_str(text))
    }

    fn append_slot(&self, slot: &str) -> String {
        format!("strcat(out, ctx->{slot});")
    }

    fn slot_is_set(&self, slot: &str) -> String {
        format!("ctx->{slot} != NULL")
    }

    fn guarded_slot_call(&self, w: &mut SourceWriter, slot: &str, otherwise: Option<&str>) {
        w.line(&format!("if (ctx->{slot} != NULL) {{"));
        w.indent();
        w.line(&format!("ctx->{slot}(ctx);"));
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
        format!("ctx->{slot} = {proc};")
    }

    fn assign_name(&self, slot: &str, name: &str) -> String {
        format!("ctx->{slot} = \"{name}\";", name = escape_str(name))
    }

    fn clear_slot(&self, slot: &str) -> String {
        format!("ctx->{slot} = NULL;")
    }

    fn set_fired(&self, value: bool) -> String {
        format!("ctx->transition_fired = {value};")
    }

    fn not_fired(&self) -> String {
        "!ctx->transition_fired".to_string()
    }

    fn and_op(&self) -> &'static str {
        "&&"
    }

    fn true_lit(&self) -> &'static str {
        "true"
    }

    fn name_eq(&self, slot: &str, name: &str) -> String {
        format!(
            "(ctx->{slot} != NULL && strcmp(ctx->{slot}, \"{name}\") == 0)",
            name = escape_str(name)
        )
    }

    fn assemble(
        &self,
        machine: &Machine,
        module: &GeneratedModule,
        base_name: &str,
    ) -> Result<Vec<Artifact>, EmissionError> {
        Ok(vec![
            self.header(machine, module, base_name)?,
            self.source(module, base_name),
        ])
    }
}

impl CBackend {
    /// Builds the `<base>.h` artifact.
    fn header(
        &self,
        machine: &Machine,
        module: &GeneratedModule,
        base_name: &str,
    ) -> Result<Artifact, EmissionError> {
        let guard: String = base_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();

        let mut w = SourceWriter::new();
        w.line("/* Generated by hsmc. Do not edit. */");
        w.line(&format!("#ifndef {guard}_H"));
        w.line(&format!("#define {guard}_H"));
        w.blank();
        w.line("#include <stdbool.h>");
        w.blank();
        if let Some(includes) = machine.includes() {
            emit_reindented(&mut w, includes.trim_end());
            w.blank();
        }
        w.line("typedef struct sm_context sm_context;");
        w.line("typedef void (*sm_state_fn)(sm_context *);");
        w.blank();
        w.line("struct sm_context {");
        w.indent();
        for field in machine.context() {
            let ty = field.ty.as_deref().ok_or_else(|| EmissionError::MissingFieldType {
                name: field.name.clone(),
                lang: self.lang().to_string(),
            })?;
            w.line(&format!("{ty} {name};", name = field.name));
        }
        w.line("bool transition_fired;");
        for slot in &module.slots {
            match slot.kind {
                SlotKind::Fn => w.line(&format!("sm_state_fn {name};", name = slot.name)),
                SlotKind::Name => w.line(&format!("const char *{name};", name = slot.name)),
            }
        }
        w.dedent();
        w.line("};");
        w.blank();
        w.line("void sm_init(sm_context *ctx);");
        w.line("void sm_tick(sm_context *ctx);");
        w.line("bool sm_is_running(const sm_context *ctx);");
        w.line("void sm_get_state_str(const sm_context *ctx, char *out);");
        w.blank();
        w.line(&format!("#endif /* {guard}_H */"));

        Ok(Artifact {
            file_name: format!("{base_name}.h"),
            contents: w.finish(),
        })
    }

    /// Builds the `<base>.c` artifact.
    fn source(&self, module: &GeneratedModule, base_name: &str) -> Artifact {
        let mut w = SourceWriter::new();
        w.line("/* Generated by hsmc. Do not edit. */");
        w.line(&format!("#include \"{base_name}.h\""));
        w.blank();
        w.line("#include <string.h>");
        w.blank();
        for name in &module.lifecycle_procs {
            w.line(&format!("static void {name}(sm_context *ctx);"));
        }
        for name in &module.inspector_procs {
            w.line(&format!("static void {name}(const sm_context *ctx, char *out);"));
        }
        w.blank();
        w.line(module.procs.trim_end());
        w.blank();
        w.line("void sm_init(sm_context *ctx) {");
        w.indent();
        w.line("memset(ctx, 0, sizeof(*ctx));");
        if let Some(init) = &module.context_init {
            emit_reindented(&mut w, init.trim_end());
        }
        w.line("root_start(ctx);");
        w.dedent();
        w.line("}");
        w.blank();
        w.line("void sm_tick(sm_context *ctx) {");
        w.indent();
        w.line("if (ctx->root_active_do == NULL) {");
        w.indent();
        w.line("return;");
        w.dedent();
        w.line("}");
        w.line("ctx->transition_fired = false;");
        w.line("root_do(ctx);");
        w.dedent();
        w.line("}");
        w.blank();
        w.line("bool sm_is_running(const sm_context *ctx) {");
        w.indent();
        w.line("return ctx->root_active_do != NULL;");
        w.dedent();
        w.line("}");
        w.blank();
        w.line("void sm_get_state_str(const sm_context *ctx, char *out) {");
        w.indent();
        w.line("out[0] = '\\0';");
        w.line("strcat(out, \"/root\");");
        w.line("root_state_str(ctx, out);");
        w.dedent();
        w.line("}");

        Artifact {
            file_name: format!("{base_name}.c"),
            contents: w.finish(),
        }
    }
}
