//! Indented text emission shared by every backend

/// An append-only source-text builder with indentation tracking
pub struct CodeWriter {
    out: String,
    level: usize,
    indent_unit: String,
}

impl CodeWriter {
    /// Creates a writer indenting with `indent_size` spaces per level
    pub fn new(indent_size: usize) -> Self {
        CodeWriter {
            out: String::new(),
            level: 0,
            indent_unit: " ".repeat(indent_size),
        }
    }

    /// Appends one indented line
    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.level {
            self.out.push_str(&self.indent_unit);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    /// Appends an empty line
    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Appends raw text without indentation or terminator
    pub fn raw(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Escapes a string for a double-quoted C-family literal
pub fn escape_c_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_indented_by_level() {
        let mut writer = CodeWriter::new(4);
        writer.line("fn main() {");
        writer.indent();
        writer.line("body();");
        writer.dedent();
        writer.line("}");
        assert_eq!(writer.finish(), "fn main() {\n    body();\n}\n");
    }

    #[test]
    fn escape_handles_quotes_and_newlines() {
        assert_eq!(escape_c_string("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
