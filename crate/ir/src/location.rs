/// A span in the source file (1-based lines and columns)
///
/// End coordinates may equal the start for point diagnostics. The file
/// name is carried by the diagnostic engine's context rather than on each
/// node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// Start line (1-based)
    pub line: usize,
    /// Start column (1-based)
    pub column: usize,
    /// End line (1-based, inclusive)
    pub end_line: usize,
    /// End column (1-based, exclusive)
    pub end_column: usize,
}

impl SourceLocation {
    /// Creates a span covering `[column, end_column)` on the given lines
    pub fn new(line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Creates a single-point location
    pub fn point(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }

    /// The smallest span covering both `self` and `other`
    pub fn merge(&self, other: &SourceLocation) -> SourceLocation {
        let (line, column) = if (self.line, self.column) <= (other.line, other.column) {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        let (end_line, end_column) =
            if (self.end_line, self.end_column) >= (other.end_line, other.end_column) {
                (self.end_line, self.end_column)
            } else {
                (other.end_line, other.end_column)
            };
        SourceLocation {
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Width of the span on its first line, for caret underlines
    pub fn width(&self) -> usize {
        if self.end_line == self.line && self.end_column > self.column {
            self.end_column - self.column
        } else {
            1
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            end_line: 1,
            end_column: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_takes_the_outer_bounds() {
        let a = SourceLocation::new(2, 5, 2, 9);
        let b = SourceLocation::new(2, 7, 3, 1);
        let merged = a.merge(&b);
        assert_eq!(merged, SourceLocation::new(2, 5, 3, 1));
    }

    #[test]
    fn width_is_one_for_multiline_spans() {
        assert_eq!(SourceLocation::new(1, 4, 1, 10).width(), 6);
        assert_eq!(SourceLocation::new(1, 4, 2, 2).width(), 1);
        assert_eq!(SourceLocation::point(3, 3).width(), 1);
    }
}
