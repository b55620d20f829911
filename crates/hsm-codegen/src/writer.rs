//! A line-oriented source writer with indentation tracking.

/// Writes source text one line at a time at a tracked indentation level.
///
/// The writer is deliberately dumb: block structure (what opens a block, what
/// closes one) is the caller's business, which keeps it usable for brace
/// languages, indentation-sensitive languages, and DOT alike.
#[derive(Debug)]
pub struct SourceWriter {
    /// The accumulated output.
    buf: String,
    /// The current indentation depth.
    depth: usize,
    /// The text emitted per indentation level.
    unit: &'static str,
    /// The number of lines written so far.
    lines: usize,
}

impl SourceWriter {
    /// Creates a writer indenting with four spaces.
    pub fn new() -> Self {
        Self::with_unit("    ")
    }

    /// Creates a writer with the given indentation unit.
    pub fn with_unit(unit: &'static str) -> Self {
        Self {
            buf: String::new(),
            depth: 0,
            unit,
            lines: 0,
        }
    }

    /// Writes one line at the current indentation.
    ///
    /// An empty line is written without trailing indentation.
    pub fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buf.push_str(self.unit);
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
        self.lines += 1;
    }

    /// Writes a blank line.
    pub fn blank(&mut self) {
        self.line("");
    }

    /// Increases the indentation depth.
    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// Decreases the indentation depth.
    pub fn dedent(&mut self) {
        debug_assert!(self.depth > 0, "unbalanced dedent");
        self.depth = self.depth.saturating_sub(1);
    }

    /// Gets the number of lines written so far.
    ///
    /// Used to detect blocks that received no statements.
    pub fn line_count(&self) -> usize {
        self.lines
    }

    /// Consumes the writer and returns the accumulated text.
    pub fn finish(self) -> String {
        self.buf
    }
}

impl Default for SourceWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits a block of user-supplied code at the writer's current indentation.
///
/// The block's own common leading indentation is stripped first so that code
/// written flush-left (or indented to taste) in the input document lands
/// correctly in both brace-delimited and indentation-sensitive output.
pub fn emit_reindented(w: &mut SourceWriter, code: &str) {
    let lines: Vec<&str> = code.lines().collect();
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    for line in &lines {
        if line.trim().is_empty() {
            w.blank();
        } else {
            w.line(&line[common.min(line.len() - line.trim_start().len())..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn indentation_tracks_depth() {
        let mut w = SourceWriter::new();
        w.line("fn f() {");
        w.indent();
        w.line("body();");
        w.dedent();
        w.line("}");
        assert_eq!(w.finish(), "fn f() {\n    body();\n}\n");
    }

    #[test]
    fn reindent_strips_common_indent() {
        let mut w = SourceWriter::new();
        w.indent();
        emit_reindented(&mut w, "  if x:\n    y()\n");
        assert_eq!(w.finish(), "    if x:\n        y()\n");
    }

    #[test]
    fn blank_lines_carry_no_indentation() {
        let mut w = SourceWriter::new();
        w.indent();
        w.line("a");
        w.blank();
        w.line("b");
        assert_eq!(w.finish(), "    a\n\n    b\n");
    }
}
