//! The raw deserialized surface of a state machine document.
//!
//! These types mirror the YAML input one-to-one and perform no semantic
//! checks; [`Machine::from_document`][crate::Machine::from_document] turns a
//! [`Document`] into the arena-backed model. Unknown mapping keys are ignored
//! by deserialization, matching the permissive input contract.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::Diagnostic;

/// A target language for code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    /// C (header/source split, raw function pointers).
    C,
    /// Rust (option-typed function pointers).
    Rust,
    /// Python (first-class callables, indent-sensitive).
    Python,
}

impl Lang {
    /// Gets the file extension for sources in this language.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Rust => "rs",
            Self::Python => "py",
        }
    }
}

impl FromStr for Lang {
    type Err = Diagnostic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Self::C),
            "rust" => Ok(Self::Rust),
            "python" => Ok(Self::Python),
            _ => Err(Diagnostic::input(format!(
                "unsupported target language `{s}` (expected `c`, `rust`, or `python`)"
            ))),
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::C => write!(f, "c"),
            Self::Rust => write!(f, "rust"),
            Self::Python => write!(f, "python"),
        }
    }
}

/// The `lang:` key: a single language name or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LangSpec {
    /// A single target language.
    One(String),
    /// Several target languages (used by multi-target tests).
    Many(Vec<String>),
}

impl LangSpec {
    /// Gets the named languages in declaration order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::One(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// A transition as written in the document.
///
/// An absent or null `to` is the termination token; an absent `guard` is
/// always true.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransition {
    /// The optional guard expression (opaque target-language text).
    pub guard: Option<String>,
    /// The optional action code (opaque target-language text).
    pub action: Option<String>,
    /// The target path expression, or null for termination.
    #[serde(default)]
    pub to: Option<String>,
}

/// A state as written in the document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawState {
    /// The name of the default child, for composite states.
    pub initial: Option<String>,
    /// The child states, in declaration order.
    pub states: Option<IndexMap<String, RawState>>,
    /// Whether the children of this state are orthogonal regions.
    #[serde(default)]
    pub orthogonal: bool,
    /// Whether this composite records shallow history.
    #[serde(default)]
    pub history: bool,
    /// Code run on entry into the state.
    pub entry: Option<String>,
    /// Code run on exit from the state.
    pub exit: Option<String>,
    /// Code run on every dispatch cycle while the state is active.
    #[serde(rename = "do")]
    pub do_code: Option<String>,
    /// The outgoing transitions, in declaration order.
    #[serde(default)]
    pub transitions: Vec<RawTransition>,
    /// Decisions declared at this state (flattened into a global dictionary).
    pub decisions: Option<IndexMap<String, Vec<RawTransition>>>,
}

/// The global hooks mapping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHooks {
    /// Code injected before every state's own entry code.
    pub entry: Option<String>,
    /// Code injected after every state's own exit code.
    pub exit: Option<String>,
    /// Code injected before every state's own do code.
    #[serde(rename = "do")]
    pub do_code: Option<String>,
    /// Code injected when any transition fires.
    pub transition: Option<String>,
}

/// A user context field descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    /// The field name.
    pub name: String,
    /// The field type, as target-language text.
    #[serde(rename = "type")]
    pub ty: Option<String>,
}

/// A deserialized state machine document.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// The target language(s) to emit.
    pub lang: Option<LangSpec>,
    /// The name of the root's default child.
    pub initial: Option<String>,
    /// The top-level states, in declaration order.
    pub states: Option<IndexMap<String, RawState>>,
    /// Transitions attached to the root state.
    #[serde(default)]
    pub transitions: Vec<RawTransition>,
    /// Decisions declared at the root.
    pub decisions: Option<IndexMap<String, Vec<RawTransition>>>,
    /// The global hooks.
    pub hooks: Option<RawHooks>,
    /// The user context field descriptors, in declaration order.
    #[serde(default)]
    pub context: Vec<RawField>,
    /// Code run after zero-initialization of the context.
    pub context_init: Option<String>,
    /// Verbatim prelude text placed before the emitted context definition.
    pub includes: Option<String>,
}

impl Document {
    /// Parses a document from YAML source text.
    pub fn parse(source: &str) -> Result<Self, Diagnostic> {
        serde_yaml_ng::from_str(source)
            .map_err(|e| Diagnostic::input(format!("failed to parse document: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let doc = Document::parse(
            r#"
initial: a
states:
  a: {}
  b:
    entry: puts("b");
"#,
        )
        .expect("document should parse");

        assert_eq!(doc.initial.as_deref(), Some("a"));
        let states = doc.states.expect("states should be present");
        assert_eq!(states.len(), 2);
        assert_eq!(
            states["b"].entry.as_deref(),
            Some("puts(\"b\");"),
        );
    }

    #[test]
    fn null_target_is_termination() {
        let doc = Document::parse(
            r#"
initial: a
states:
  a:
    transitions:
      - guard: ctx.done
        to: null
      - to: b
  b: {}
"#,
        )
        .expect("document should parse");

        let a = &doc.states.expect("states should be present")["a"];
        assert_eq!(a.transitions.len(), 2);
        assert!(a.transitions[0].to.is_none());
        assert_eq!(a.transitions[1].to.as_deref(), Some("b"));
    }

    #[test]
    fn lang_accepts_single_and_list() {
        let one = Document::parse("initial: a\nstates: {a: {}}\nlang: c").unwrap();
        assert_eq!(one.lang.unwrap().names(), ["c"]);

        let many = Document::parse("initial: a\nstates: {a: {}}\nlang: [c, rust]").unwrap();
        assert_eq!(many.lang.unwrap().names(), ["c", "rust"]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        Document::parse("initial: a\nstates: {a: {}}\nfrobnicate: 3").expect("should parse");
    }
}
