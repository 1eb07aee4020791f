use colored::Colorize;
use mgen_error::{Diagnostic, Severity};

/// Line lookup over a source text, for diagnostic excerpts
pub struct LineIndex<'a> {
    lines: Vec<&'a str>,
}

impl<'a> LineIndex<'a> {
    /// Indexes the given source text
    pub fn new(source: &'a str) -> Self {
        LineIndex {
            lines: source.lines().collect(),
        }
    }

    /// The text of a 1-based line, without its terminator
    pub fn line_text(&self, line: usize) -> Option<&'a str> {
        if line == 0 {
            return None;
        }
        self.lines.get(line - 1).copied()
    }
}

/// Collects diagnostics across phases and renders them for the user
///
/// Diagnostics accumulate in emission order and are sorted by source
/// location before rendering, so a pipeline result reads top to bottom
/// regardless of which phase produced what.
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    max_errors: usize,
    file_name: String,
}

impl Default for DiagnosticEngine {
    fn default() -> Self {
        DiagnosticEngine::new()
    }
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        DiagnosticEngine {
            diagnostics: Vec::new(),
            error_count: 0,
            warning_count: 0,
            max_errors: 100,
            file_name: String::from("<input>"),
        }
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }

    pub fn set_max_errors(&mut self, max_errors: usize) {
        self.max_errors = max_errors;
    }

    /// Records a diagnostic, counting by severity
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => {
                if self.error_count >= self.max_errors {
                    return;
                }
                self.error_count += 1;
            }
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        self.diagnostics.push(diagnostic);
    }

    /// Records a batch of diagnostics
    pub fn emit_all(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.emit(diagnostic);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// The collected diagnostics in stable location order
    pub fn sorted(&self) -> Vec<Diagnostic> {
        let mut sorted = self.diagnostics.clone();
        sorted.sort_by_key(|d| d.order_key());
        sorted
    }

    /// Consumes the engine, returning diagnostics in stable location order
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics;
        diagnostics.sort_by_key(|d| d.order_key());
        diagnostics
    }

    /// Renders one diagnostic to a multi-line string
    ///
    /// Layout:
    /// ```text
    /// error[E1001]: unsupported feature: yield
    ///   --> example.py:2:5
    ///    |
    ///  2 |     yield 1
    ///    |     ^^^^^
    ///    | help: return a list; generators are not supported
    /// ```
    pub fn render(&self, diagnostic: &Diagnostic, index: &LineIndex) -> String {
        let severity_str = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Note => "note".blue().bold(),
        };

        let line = diagnostic.location.line;
        let col = diagnostic.location.column;
        let line_text = index.line_text(line).unwrap_or("<line not available>");

        let mut out = String::new();
        out.push_str(&format!(
            "{}{}: {}\n",
            severity_str,
            format!("[{}]", diagnostic.code).bold(),
            diagnostic.message
        ));
        out.push_str(&format!(
            "  {} {}:{}:{}\n",
            "-->".yellow(),
            self.file_name,
            line,
            col
        ));

        let line_num_str = format!("{}", line);
        let indent = " ".repeat(line_num_str.len() + 1);
        let pipe = "|".yellow();

        out.push_str(&format!("{indent}{}\n", pipe));
        out.push_str(&format!("{} {} {}\n", line_num_str.yellow(), pipe, line_text));

        let caret = " ".repeat(col.saturating_sub(1))
            + &"^"
                .repeat(diagnostic.location.width())
                .bold()
                .red()
                .to_string();
        out.push_str(&format!("{indent}{} {}\n", pipe, caret));

        if let Some(suggestion) = &diagnostic.suggestion {
            out.push_str(&format!(
                "{indent}{} {}: {}\n",
                pipe,
                "help".green().bold(),
                suggestion.message
            ));
        }
        if let Some(note) = &diagnostic.note {
            out.push_str(&format!(
                "{indent}{} {}: {}\n",
                pipe,
                "note".blue().bold(),
                note
            ));
        }
        out
    }

    /// Renders every collected diagnostic to stderr, followed by a summary
    pub fn report_all(&self, source: &str) {
        let index = LineIndex::new(source);
        for diagnostic in self.sorted() {
            eprintln!("{}", self.render(&diagnostic, &index));
        }

        if self.error_count > 0 || self.warning_count > 0 {
            self.report_summary();
        }
    }

    fn report_summary(&self) {
        let mut parts = Vec::new();

        if self.error_count > 0 {
            parts.push(
                format!(
                    "{} {}",
                    self.error_count,
                    if self.error_count == 1 { "error" } else { "errors" }
                )
                .red()
                .to_string(),
            );
        }

        if self.warning_count > 0 {
            parts.push(
                format!(
                    "{} {}",
                    self.warning_count,
                    if self.warning_count == 1 {
                        "warning"
                    } else {
                        "warnings"
                    }
                )
                .yellow()
                .to_string(),
            );
        }

        if !parts.is_empty() {
            eprintln!("Compilation finished with {}", parts.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgen_error::ErrorCode;
    use mgen_ir::SourceLocation;

    fn sample(line: usize, column: usize, code: ErrorCode) -> Diagnostic {
        Diagnostic::error(code, "message", SourceLocation::point(line, column))
    }

    #[test]
    fn sorting_is_by_location_then_code() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(sample(3, 1, ErrorCode::MissingAnnotation));
        engine.emit(sample(1, 9, ErrorCode::UnsupportedFeature));
        engine.emit(sample(1, 2, ErrorCode::UnsupportedFeature));

        let sorted = engine.into_sorted();
        assert_eq!(sorted[0].location.line, 1);
        assert_eq!(sorted[0].location.column, 2);
        assert_eq!(sorted[1].location.column, 9);
        assert_eq!(sorted[2].location.line, 3);
    }

    #[test]
    fn max_errors_caps_collection() {
        let mut engine = DiagnosticEngine::new();
        engine.set_max_errors(2);
        for _ in 0..5 {
            engine.emit(sample(1, 1, ErrorCode::SyntaxError));
        }
        assert_eq!(engine.error_count(), 2);
    }

    #[test]
    fn render_includes_excerpt_and_caret() {
        colored::control::set_override(false);
        let mut engine = DiagnosticEngine::new();
        engine.set_file_name("demo.py");
        let source = "def f():\n    yield 1\n";
        let diagnostic = Diagnostic::error(
            ErrorCode::UnsupportedFeature,
            "unsupported feature: yield",
            SourceLocation::new(2, 5, 2, 10),
        )
        .with_help("return a list; generators are not supported");

        let rendered = engine.render(&diagnostic, &LineIndex::new(source));
        colored::control::unset_override();

        assert!(rendered.contains("error[E1001]: unsupported feature: yield"));
        assert!(rendered.contains("--> demo.py:2:5"));
        assert!(rendered.contains("yield 1"));
        assert!(rendered.contains("^^^^^"));
        assert!(rendered.contains("help: return a list"));
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::warning(
            ErrorCode::UnknownModule,
            "unknown preference",
            SourceLocation::default(),
        ));
        assert!(!engine.has_errors());
        assert_eq!(engine.warning_count(), 1);
    }
}
