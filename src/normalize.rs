//! Code-block normalization.
//!
//! Trims the runs of blank lines at the start and end of a code block before
//! the block is handed to the highlighter. Interior lines, blank or not, are
//! kept exactly as written and in their original order.

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which characters count as whitespace when deciding whether a line is blank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Whitespace {
    /// Space, tab, line feed and carriage return.
    #[default]
    Ascii,
    /// Every character with the Unicode `White_Space` property.
    Unicode,
}

impl Whitespace {
    fn matches(self, c: char) -> bool {
        match self {
            Whitespace::Ascii => matches!(c, ' ' | '\t' | '\n' | '\r'),
            Whitespace::Unicode => c.is_whitespace(),
        }
    }
}

/// The lines of one displayed snippet, borrowed from its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    /// Lines in source order, split on `\n` (separators removed).
    pub raw_lines: Vec<&'a str>,
}

impl<'a> CodeBlock<'a> {
    /// Split `raw_content` on `\n`.
    ///
    /// An empty input yields a single empty line, so a block always has at
    /// least one line.
    pub fn parse(raw_content: &'a str) -> Self {
        Self {
            raw_lines: raw_content.split('\n').collect(),
        }
    }

    /// A line is blank when nothing is left after trimming whitespace.
    pub fn is_blank_line(line: &str, ws: Whitespace) -> bool {
        line.chars().all(|c| ws.matches(c))
    }

    /// Index range `start..end` of the lines kept after boundary trimming.
    fn bounds(&self, ws: Whitespace) -> (usize, usize) {
        let lines = self.raw_lines.as_slice();
        let start = lines
            .iter()
            .position(|line| !Self::is_blank_line(line, ws))
            .unwrap_or(lines.len());
        let end = lines
            .iter()
            .rposition(|line| !Self::is_blank_line(line, ws))
            .map_or(start, |idx| idx + 1);
        (start, end)
    }

    /// The contiguous run of lines between the leading and trailing blank runs.
    ///
    /// Empty when every line is blank.
    pub fn trimmed(&self, ws: Whitespace) -> &[&'a str] {
        let (start, end) = self.bounds(ws);
        &self.raw_lines[start..end]
    }

    /// Number of blank lines in the leading and trailing runs.
    ///
    /// An all-blank block reports every line as leading.
    pub fn blank_runs(&self, ws: Whitespace) -> (usize, usize) {
        let (start, end) = self.bounds(ws);
        (start, self.raw_lines.len() - end)
    }

    /// Re-join the trimmed lines with `\n`.
    pub fn join(&self, ws: Whitespace) -> String {
        self.trimmed(ws).join("\n")
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Remove leading and trailing blank lines from `raw_content`.
///
/// Uses the ASCII whitespace set. Total over all inputs: an empty or
/// all-blank block normalizes to the empty string.
pub fn normalize(raw_content: &str) -> String {
    normalize_with(raw_content, Whitespace::Ascii)
}

/// [`normalize`] with an explicit whitespace definition.
pub fn normalize_with(raw_content: &str, ws: Whitespace) -> String {
    CodeBlock::parse(raw_content).join(ws)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
