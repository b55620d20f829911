//! Target path expressions and their resolution.
//!
//! A transition's `to:` field is parsed into a [`TargetExpr`] when the model
//! is loaded; the planner and validator only ever see the parsed form.
//! Resolution turns an expression into absolute state identities against a
//! source state and is purely structural: guards and history are unknown
//! here.

use std::fmt;

use crate::Machine;
use crate::StateId;
use crate::StateKind;

/// An error produced while parsing or resolving a target path expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The expression text could not be parsed.
    #[error("malformed path expression `{0}`")]
    Malformed(String),
    /// A path segment does not name a child of the state reached so far.
    #[error("`{segment}` is not a child of `{parent}`")]
    UnknownChild {
        /// The segment that failed to resolve.
        segment: String,
        /// The path of the state the segment was looked up in.
        parent: String,
    },
    /// A `../` chain climbed above the root state.
    #[error("path climbs above the root state")]
    AboveRoot,
    /// A fork was applied to a state without orthogonal regions.
    #[error("`{path}` is not an orthogonal state")]
    NotOrthogonal {
        /// The path of the fork prefix.
        path: String,
    },
    /// A fork limb does not start at a region of the orthogonal state.
    #[error("fork limb `{limb}` does not name a region of `{path}`")]
    NotARegion {
        /// The first segment of the offending limb.
        limb: String,
        /// The path of the orthogonal state.
        path: String,
    },
}

/// A parsed target path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetExpr {
    /// The termination token.
    Null,
    /// A reference to a named decision.
    Decision(String),
    /// The current state (explicit self-transition).
    Current,
    /// An absolute path from the root, e.g. `/heater/on`.
    Absolute(Vec<String>),
    /// A descent from the current state, e.g. `./cooling`.
    Descend(Vec<String>),
    /// An ascent of `levels` ancestors followed by a descent.
    Up {
        /// The number of `../` segments.
        levels: usize,
        /// The remaining descent, possibly empty.
        tail: Vec<String>,
    },
    /// A sibling of the current state, optionally descended into.
    Sibling(Vec<String>),
    /// A fork into the regions of an orthogonal state.
    Fork {
        /// The expression locating the orthogonal state.
        prefix: Box<TargetExpr>,
        /// One sub-path per bracketed limb, each starting at a region name.
        limbs: Vec<Vec<String>>,
    },
}

/// A resolved target: the absolute identities a transition moves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A single target state.
    Single(StateId),
    /// A fork into regions of an orthogonal state.
    Fork {
        /// The orthogonal state the fork enters.
        state: StateId,
        /// The target of each limb, in declaration order of the limbs.
        limbs: Vec<StateId>,
    },
    /// Termination of the state machine.
    Termination,
    /// Deferral to a named decision.
    Decision(String),
}

impl TargetExpr {
    /// Parses a target expression from the text of a `to:` field.
    ///
    /// `None` (a YAML null) and the literal text `null` are the termination
    /// token. The remaining forms are tried in the documented order: decision
    /// reference, fork, self, absolute, descent, ascent, sibling.
    pub fn parse(text: Option<&str>) -> Result<Self, PathError> {
        let Some(text) = text else {
            return Ok(Self::Null);
        };

        let text = text.trim();
        if text.is_empty() || text == "null" {
            return Ok(Self::Null);
        }

        if let Some(name) = text.strip_prefix('@') {
            if name.is_empty() || name.contains('/') {
                return Err(PathError::Malformed(text.to_string()));
            }
            return Ok(Self::Decision(name.to_string()));
        }

        if let Some(open) = text.find('[') {
            return Self::parse_fork(text, open);
        }

        if text == "." {
            return Ok(Self::Current);
        }

        if let Some(rest) = text.strip_prefix('/') {
            return Ok(Self::Absolute(segments(text, rest)?));
        }

        if let Some(rest) = text.strip_prefix("./") {
            return Ok(Self::Descend(segments(text, rest)?));
        }

        if text.starts_with("..") {
            let mut levels = 0;
            let mut rest = text;
            loop {
                if rest == ".." {
                    levels += 1;
                    rest = "";
                    break;
                }
                match rest.strip_prefix("../") {
                    Some(r) => {
                        levels += 1;
                        rest = r;
                    }
                    None => break,
                }
            }
            if levels == 0 {
                return Err(PathError::Malformed(text.to_string()));
            }
            let tail = if rest.is_empty() {
                Vec::new()
            } else {
                segments(text, rest)?
            };
            return Ok(Self::Up { levels, tail });
        }

        Ok(Self::Sibling(segments(text, text)?))
    }

    /// Parses the fork form `prefix/[limb, limb, ...]`.
    fn parse_fork(text: &str, open: usize) -> Result<Self, PathError> {
        let close = text
            .rfind(']')
            .ok_or_else(|| PathError::Malformed(text.to_string()))?;
        if close != text.len() - 1 || close < open {
            return Err(PathError::Malformed(text.to_string()));
        }

        let prefix_text = text[..open].trim_end_matches('/');
        let prefix = if prefix_text.is_empty() {
            Self::Current
        } else {
            Self::parse(Some(prefix_text))?
        };
        match prefix {
            Self::Null | Self::Decision(_) | Self::Fork { .. } => {
                return Err(PathError::Malformed(text.to_string()));
            }
            _ => {}
        }

        let mut limbs = Vec::new();
        for limb in text[open + 1..close].split(',') {
            let limb = limb.trim();
            if limb.is_empty() {
                return Err(PathError::Malformed(text.to_string()));
            }
            limbs.push(segments(text, limb)?);
        }
        if limbs.is_empty() {
            return Err(PathError::Malformed(text.to_string()));
        }

        Ok(Self::Fork {
            prefix: Box::new(prefix),
            limbs,
        })
    }

    /// Resolves the expression against a source state.
    pub fn resolve(&self, machine: &Machine, source: StateId) -> Result<Resolved, PathError> {
        match self {
            Self::Null => Ok(Resolved::Termination),
            Self::Decision(name) => Ok(Resolved::Decision(name.clone())),
            Self::Current => Ok(Resolved::Single(source)),
            Self::Absolute(segs) => descend(machine, machine.root(), segs).map(Resolved::Single),
            Self::Descend(segs) => descend(machine, source, segs).map(Resolved::Single),
            Self::Up { levels, tail } => {
                let mut current = source;
                for _ in 0..*levels {
                    current = machine
                        .state(current)
                        .parent
                        .ok_or(PathError::AboveRoot)?;
                }
                descend(machine, current, tail).map(Resolved::Single)
            }
            Self::Sibling(segs) => {
                // A bare name on the root state has no sibling scope; it
                // descends into the root's children instead.
                let scope = machine.state(source).parent.unwrap_or(source);
                descend(machine, scope, segs).map(Resolved::Single)
            }
            Self::Fork { prefix, limbs } => {
                let state = match prefix.resolve(machine, source)? {
                    Resolved::Single(id) => id,
                    _ => unreachable!("fork prefixes parse to single-target forms"),
                };
                if machine.state(state).kind != StateKind::CompositeAnd {
                    return Err(PathError::NotOrthogonal {
                        path: machine.path(state),
                    });
                }

                let mut targets = Vec::new();
                for limb in limbs {
                    let region = &limb[0];
                    if machine.child(state, region).is_none() {
                        return Err(PathError::NotARegion {
                            limb: region.clone(),
                            path: machine.path(state),
                        });
                    }
                    targets.push(descend(machine, state, limb)?);
                }

                Ok(Resolved::Fork {
                    state,
                    limbs: targets,
                })
            }
        }
    }
}

impl fmt::Display for TargetExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Decision(name) => write!(f, "@{name}"),
            Self::Current => write!(f, "."),
            Self::Absolute(segs) => write!(f, "/{segs}", segs = segs.join("/")),
            Self::Descend(segs) => write!(f, "./{segs}", segs = segs.join("/")),
            Self::Up { levels, tail } => {
                let ups = vec![".."; *levels].join("/");
                if tail.is_empty() {
                    write!(f, "{ups}")
                } else {
                    write!(f, "{ups}/{tail}", tail = tail.join("/"))
                }
            }
            Self::Sibling(segs) => write!(f, "{segs}", segs = segs.join("/")),
            Self::Fork { prefix, limbs } => {
                let limbs = limbs
                    .iter()
                    .map(|l| l.join("/"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{prefix}/[{limbs}]")
            }
        }
    }
}

/// Splits a path remainder into non-empty segments.
fn segments(whole: &str, rest: &str) -> Result<Vec<String>, PathError> {
    let segs: Vec<String> = rest.split('/').map(str::to_string).collect();
    if segs.iter().any(|s| s.is_empty() || s == "." || s == "..") {
        return Err(PathError::Malformed(whole.to_string()));
    }
    Ok(segs)
}

/// Descends from a state through a chain of child names.
fn descend(machine: &Machine, from: StateId, segs: &[String]) -> Result<StateId, PathError> {
    let mut current = from;
    for seg in segs {
        current = machine
            .child(current, seg)
            .ok_or_else(|| PathError::UnknownChild {
                segment: seg.clone(),
                parent: machine.path(current),
            })?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    /// A small machine used by the resolution tests:
    ///
    /// ```text
    /// /root
    ///   a
    ///     x
    ///     y
    ///   b
    ///   par (orthogonal)
    ///     r1: p, q
    ///     r2: u, v
    /// ```
    fn fixture() -> Machine {
        let doc = Document::parse(
            r#"
initial: a
states:
  a:
    initial: x
    states:
      x: {}
      y: {}
  b: {}
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
        .expect("fixture should parse");
        Machine::from_document(doc).expect("fixture should load")
    }

    fn id(machine: &Machine, path: &str) -> StateId {
        match TargetExpr::parse(Some(path))
            .unwrap()
            .resolve(machine, machine.root())
            .unwrap()
        {
            Resolved::Single(id) => id,
            other => panic!("expected a single state for `{path}`, got {other:?}"),
        }
    }

    #[test]
    fn parse_forms() {
        assert_eq!(TargetExpr::parse(None).unwrap(), TargetExpr::Null);
        assert_eq!(TargetExpr::parse(Some("null")).unwrap(), TargetExpr::Null);
        assert_eq!(
            TargetExpr::parse(Some("@pick")).unwrap(),
            TargetExpr::Decision("pick".to_string())
        );
        assert_eq!(TargetExpr::parse(Some(".")).unwrap(), TargetExpr::Current);
        assert_eq!(
            TargetExpr::parse(Some("/a/x")).unwrap(),
            TargetExpr::Absolute(vec!["a".to_string(), "x".to_string()])
        );
        assert_eq!(
            TargetExpr::parse(Some("./y")).unwrap(),
            TargetExpr::Descend(vec!["y".to_string()])
        );
        assert_eq!(
            TargetExpr::parse(Some("../../b")).unwrap(),
            TargetExpr::Up {
                levels: 2,
                tail: vec!["b".to_string()],
            }
        );
        assert_eq!(
            TargetExpr::parse(Some("..")).unwrap(),
            TargetExpr::Up {
                levels: 1,
                tail: Vec::new(),
            }
        );
        assert_eq!(
            TargetExpr::parse(Some("b")).unwrap(),
            TargetExpr::Sibling(vec!["b".to_string()])
        );
        assert_eq!(
            TargetExpr::parse(Some("par/[r1/p, r2/v]")).unwrap(),
            TargetExpr::Fork {
                prefix: Box::new(TargetExpr::Sibling(vec!["par".to_string()])),
                limbs: vec![
                    vec!["r1".to_string(), "p".to_string()],
                    vec!["r2".to_string(), "v".to_string()],
                ],
            }
        );
    }

    #[test]
    fn parse_rejects_malformed_text() {
        for text in ["@", "a//b", "/", "./", "...", "par/[", "par/[]", "par/[r1]x"] {
            TargetExpr::parse(Some(text)).expect_err(text);
        }
    }

    #[test]
    fn display_round_trips() {
        for text in ["null", "@pick", ".", "/a/x", "./y", "../../b", "b", "par/[r1/p, r2/v]"] {
            let parsed = TargetExpr::parse(Some(text)).unwrap();
            assert_eq!(
                TargetExpr::parse(Some(&parsed.to_string())).unwrap(),
                parsed,
                "`{text}` should round-trip through display"
            );
        }
    }

    #[test]
    fn absolute_paths_round_trip() {
        // Resolving a state's own absolute path yields the state itself.
        let machine = fixture();
        for (state_id, _) in machine.states() {
            let path = machine.path(state_id);
            let expr = path.strip_prefix("/root").unwrap();
            if expr.is_empty() {
                continue;
            }
            assert_eq!(id(&machine, expr), state_id, "round-trip for {path}");
        }
    }

    #[test]
    fn sibling_resolves_against_parent() {
        let machine = fixture();
        let a = id(&machine, "/a");
        let expr = TargetExpr::parse(Some("b")).unwrap();
        assert_eq!(
            expr.resolve(&machine, a).unwrap(),
            Resolved::Single(id(&machine, "/b"))
        );
    }

    #[test]
    fn sibling_with_descent_enters_the_sibling() {
        let machine = fixture();
        let b = id(&machine, "/b");
        let expr = TargetExpr::parse(Some("a/y")).unwrap();
        assert_eq!(
            expr.resolve(&machine, b).unwrap(),
            Resolved::Single(id(&machine, "/a/y"))
        );
    }

    #[test]
    fn ascent_reaches_an_uncle() {
        let machine = fixture();
        let x = id(&machine, "/a/x");
        let expr = TargetExpr::parse(Some("../../b")).unwrap();
        assert_eq!(
            expr.resolve(&machine, x).unwrap(),
            Resolved::Single(id(&machine, "/b"))
        );

        let expr = TargetExpr::parse(Some("../../../b")).unwrap();
        assert_eq!(
            expr.resolve(&machine, x).unwrap_err(),
            PathError::AboveRoot
        );
    }

    #[test]
    fn descent_enters_a_child() {
        let machine = fixture();
        let a = id(&machine, "/a");
        let expr = TargetExpr::parse(Some("./y")).unwrap();
        assert_eq!(
            expr.resolve(&machine, a).unwrap(),
            Resolved::Single(id(&machine, "/a/y"))
        );
    }

    #[test]
    fn fork_resolves_each_limb() {
        let machine = fixture();
        let b = id(&machine, "/b");
        let expr = TargetExpr::parse(Some("par/[r1/q, r2/v]")).unwrap();
        assert_eq!(
            expr.resolve(&machine, b).unwrap(),
            Resolved::Fork {
                state: id(&machine, "/par"),
                limbs: vec![id(&machine, "/par/r1/q"), id(&machine, "/par/r2/v")],
            }
        );
    }

    #[test]
    fn fork_requires_an_orthogonal_prefix() {
        let machine = fixture();
        let b = id(&machine, "/b");
        let expr = TargetExpr::parse(Some("a/[x, y]")).unwrap();
        assert!(matches!(
            expr.resolve(&machine, b).unwrap_err(),
            PathError::NotOrthogonal { .. }
        ));
    }

    #[test]
    fn fork_limbs_must_start_at_regions() {
        let machine = fixture();
        let b = id(&machine, "/b");
        let expr = TargetExpr::parse(Some("par/[r1/p, u]")).unwrap();
        assert!(matches!(
            expr.resolve(&machine, b).unwrap_err(),
            PathError::NotARegion { .. }
        ));
    }

    #[test]
    fn unknown_segment_reports_parent_path() {
        let machine = fixture();
        let err = TargetExpr::parse(Some("/a/zzz"))
            .unwrap()
            .resolve(&machine, machine.root())
            .unwrap_err();
        assert_eq!(
            err,
            PathError::UnknownChild {
                segment: "zzz".to_string(),
                parent: "/root/a".to_string(),
            }
        );
    }
}
