//! Transition planning, diagram rendering, and source emission for
//! hierarchical state machines.
//!
//! The crate consumes a validated [`Machine`](hsm_model::Machine) and
//! produces two kinds of artifacts:
//!
//! * [`dot::render`] — a Graphviz diagram of the state tree and its
//!   transitions.
//! * [`Generator`] — executable source in a target language, driven by the
//!   shared tree walk with per-language [`Backend`]s supplying syntax.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

mod backend;
pub mod dot;
mod error;
mod generator;
pub mod plan;
mod writer;

pub use backend::Artifact;
pub use backend::Backend;
pub use backend::CBackend;
pub use backend::GeneratedModule;
pub use backend::PythonBackend;
pub use backend::RustBackend;
pub use backend::Slot;
pub use backend::SlotKind;
pub use backend::for_lang;
pub use error::EmissionError;
pub use generator::Generator;
pub use writer::SourceWriter;

use hsm_model::Lang;
use hsm_model::Machine;

/// Generates the source artifacts for one target language.
///
/// This is the convenience entry point the orchestrator uses: it looks up
/// the backend for `lang` and runs the shared generator against it.
pub fn emit(machine: &Machine, lang: Lang, base_name: &str) -> Result<Vec<Artifact>, EmissionError> {
    let backend = for_lang(lang);
    Generator::new(machine, backend.as_ref()).generate(base_name)
}
