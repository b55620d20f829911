//! Model representation, loading, and validation for hierarchical state
//! machine documents.
//!
//! The pipeline through this crate is:
//!
//! 1. [`Document::parse`] deserializes the YAML surface into raw structs.
//! 2. [`Machine::from_document`] builds the arena-backed tree, parses every
//!    transition target into a [`TargetExpr`], and flattens decisions.
//! 3. [`Validator::validate`] proves the model well-formed, producing
//!    path-addressed [`Diagnostic`]s otherwise.
//!
//! Everything downstream of validation treats the [`Machine`] as immutable.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

mod diagnostics;
mod document;
mod machine;
mod path;
mod validation;
mod visitor;

pub use diagnostics::Diagnostic;
pub use diagnostics::Kind;
pub use diagnostics::Severity;
pub use document::Document;
pub use document::Lang;
pub use document::LangSpec;
pub use document::RawField;
pub use document::RawHooks;
pub use document::RawState;
pub use document::RawTransition;
pub use machine::ContextField;
pub use machine::Hooks;
pub use machine::Machine;
pub use machine::ROOT_NAME;
pub use machine::State;
pub use machine::StateId;
pub use machine::StateKind;
pub use machine::Transition;
pub use path::PathError;
pub use path::Resolved;
pub use path::TargetExpr;
pub use validation::Diagnostics;
pub use validation::Validator;
pub use visitor::VisitReason;
pub use visitor::Visitor;
