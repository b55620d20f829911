//! The language backend abstraction.
//!
//! The recursive tree walk, the transition lowering, and the inspector logic
//! live once in [`Generator`][crate::Generator]; a [`Backend`] contributes
//! only surface syntax (statement shapes, the null-check idiom, function
//! pointer assignment) and the final artifact assembly. Adding a target
//! language means implementing this trait — the walk and the planner are
//! never re-implemented.

use hsm_model::Lang;
use hsm_model::Machine;

use crate::EmissionError;
use crate::writer::SourceWriter;

mod c;
mod python;
mod rust;

pub use c::CBackend;
pub use python::PythonBackend;
pub use rust::RustBackend;

/// Gets the backend for a target language.
pub fn for_lang(lang: Lang) -> Box<dyn Backend> {
    match lang {
        Lang::C => Box::new(CBackend),
        Lang::Rust => Box::new(RustBackend),
        Lang::Python => Box::new(PythonBackend),
    }
}

/// A generated output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The file name, including extension.
    pub file_name: String,
    /// The file contents.
    pub contents: String,
}

/// The kind of a context slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// A state function pointer.
    Fn,
    /// An active-child name string.
    Name,
}

/// A context slot descriptor.
#[derive(Debug, Clone)]
pub struct Slot {
    /// The field name of the slot.
    pub name: String,
    /// The kind of the slot.
    pub kind: SlotKind,
}

/// Everything the shared walk produced for one machine, handed to a backend
/// for assembly into files.
#[derive(Debug, Clone)]
pub struct GeneratedModule {
    /// The concatenated procedure definitions, in backend syntax.
    pub procs: String,
    /// The names of procedures with the lifecycle signature.
    pub lifecycle_procs: Vec<String>,
    /// The names of procedures with the inspector signature.
    pub inspector_procs: Vec<String>,
    /// The context slots, in arena order.
    pub slots: Vec<Slot>,
    /// The `context_init` block with macros already expanded.
    pub context_init: Option<String>,
}

/// A trait implemented by language backends.
///
/// Statement-producing hooks return complete statements (terminator
/// included); expression hooks return bare expressions for the generator to
/// compose.
pub trait Backend {
    /// Gets the language this backend emits.
    fn lang(&self) -> Lang;

    /// Formats a one-line comment.
    fn comment(&self, text: &str) -> String;

    /// Opens an `if` block.
    fn if_open(&self, cond: &str) -> String;

    /// Continues an `if` chain with another condition.
    fn else_if_open(&self, cond: &str) -> String;

    /// Continues an `if` chain with the final alternative.
    fn else_open(&self) -> String;

    /// The text closing a block, if the language uses one.
    fn block_close(&self) -> Option<&'static str>;

    /// The statement for a block that received no statements, if the
    /// language needs one.
    fn pass_stmt(&self) -> Option<&'static str> {
        None
    }

    /// Opens a lifecycle procedure definition.
    fn proc_open(&self, name: &str) -> String;

    /// Opens an inspector procedure definition.
    fn str_proc_open(&self, name: &str) -> String;

    /// A statement starting an inspector body, if the language needs one.
    fn str_proc_prologue(&self) -> Option<&'static str> {
        None
    }

    /// A statement finishing an inspector body, if the language needs one.
    fn str_proc_epilogue(&self) -> Option<&'static str> {
        None
    }

    /// Calls a lifecycle procedure.
    fn call(&self, name: &str) -> String;

    /// Calls an inspector procedure.
    fn call_str_proc(&self, name: &str) -> String;

    /// Appends literal text to the inspector output.
    fn append_lit(&self, text: &str) -> String;

    /// Appends an active-name slot to the inspector output.
    fn append_slot(&self, slot: &str) -> String;

    /// Tests whether a slot holds a value.
    fn slot_is_set(&self, slot: &str) -> String;

    /// Emits a null-checked call through a function pointer slot, with an
    /// optional alternative statement.
    fn guarded_slot_call(&self, w: &mut SourceWriter, slot: &str, otherwise: Option<&str>);

    /// Assigns a procedure to a function pointer slot.
    fn assign_fn(&self, slot: &str, proc: &str) -> String;

    /// Assigns a state name to a name slot.
    fn assign_name(&self, slot: &str, name: &str) -> String;

    /// Clears a slot.
    fn clear_slot(&self, slot: &str) -> String;

    /// Sets the transition-fired flag.
    fn set_fired(&self, value: bool) -> String;

    /// The expression testing that no transition has fired.
    fn not_fired(&self) -> String;

    /// The boolean conjunction operator.
    fn and_op(&self) -> &'static str;

    /// The true literal.
    fn true_lit(&self) -> &'static str;

    /// Compares a name slot against a state name.
    ///
    /// The comparison must be safe when the slot is unset.
    fn name_eq(&self, slot: &str, name: &str) -> String;

    /// Builds the active-state predicate for an `IN_STATE` expansion from
    /// `(name slot, expected child name)` pairs along the target's path.
    fn in_state_check(&self, checks: &[(String, String)]) -> String {
        if checks.is_empty() {
            return self.true_lit().to_string();
        }
        checks
            .iter()
            .map(|(slot, name)| self.name_eq(slot, name))
            .collect::<Vec<_>>()
            .join(&format!(" {op} ", op = self.and_op()))
    }

    /// Assembles the final output files.
    fn assemble(
        &self,
        machine: &Machine,
        module: &GeneratedModule,
        base_name: &str,
    ) -> Result<Vec<Artifact>, EmissionError>;
}

/// Escapes text for inclusion in a double-quoted string literal.
///
/// The escape set is shared by all three targets.
pub(crate) fn escape_str(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
