//! Error type definitions.

/// Errors that can occur while emitting target source.
///
/// Emission errors are rare by construction — the validator proves the model
/// well-formed before any backend runs — but backends can still require data
/// the model legitimately omits (for example, a context field type that a
/// typed target cannot do without).
#[derive(Debug, thiserror::Error)]
pub enum EmissionError {
    /// A context field has no type and the target language needs one.
    #[error("context field `{name}` has no type, which the {lang} backend requires")]
    MissingFieldType {
        /// The name of the field.
        name: String,
        /// The backend that required the type.
        lang: String,
    },
    /// An `IN_STATE` macro argument failed to parse or resolve.
    #[error("cannot expand `IN_STATE({path})` in `{scope}`: {message}")]
    InState {
        /// The path text inside the macro.
        path: String,
        /// The path of the state whose code used the macro.
        scope: String,
        /// Why the expansion failed.
        message: String,
    },
    /// A transition target failed to resolve during emission.
    ///
    /// This indicates the model was not validated before generation.
    #[error("transition target `{target}` of `{source_path}` did not resolve: {message}")]
    UnresolvedTarget {
        /// The target expression text.
        target: String,
        /// The path of the source state.
        source_path: String,
        /// Why resolution failed.
        message: String,
    },
    /// A composite state reached emission without a usable default child.
    #[error("composite state `{path}` has no resolvable `initial` child")]
    MissingInitial {
        /// The path of the composite state.
        path: String,
    },
}
