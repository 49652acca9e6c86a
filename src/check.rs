//! Lint for code blocks that carry boundary blank lines.
//!
//! Reports the blocks normalization would change, so decks can be cleaned at
//! the source instead of at render time.

use crate::normalize::{normalize_with, CodeBlock, Whitespace};
use crate::parse;

/// One markdown code block that normalization would change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line_start: usize,
    pub line_end: usize,
    /// Fence info string (may be empty).
    pub info: String,
    /// Blank lines before the first non-blank line.
    pub leading: usize,
    /// Blank lines after the last non-blank line.
    pub trailing: usize,
}

impl Finding {
    /// `path:start-end: <lang> block has N leading and M trailing blank line(s)`.
    pub fn describe(&self, path: &str) -> String {
        let lang = crate::highlight::language_token(&self.info).unwrap_or("text");
        format!(
            "{path}:{}-{}: {lang} block has {} leading and {} trailing blank line(s)",
            self.line_start, self.line_end, self.leading, self.trailing
        )
    }
}

/// Check every code block in a markdown source.
///
/// The parser reports each block with the newline that ends its last line;
/// that newline belongs to the fence syntax and is not counted as a blank
/// line.
pub fn check_markdown(source: &str, ws: Whitespace) -> Vec<Finding> {
    parse::code_blocks(source)
        .into_iter()
        .filter_map(|block| {
            let content = block.content.strip_suffix('\n').unwrap_or(&block.content);
            if normalize_with(content, ws) == content {
                return None;
            }
            let (leading, trailing) = CodeBlock::parse(content).blank_runs(ws);
            Some(Finding {
                line_start: block.line_start,
                line_end: block.line_end,
                info: block.info.clone(),
                leading,
                trailing,
            })
        })
        .collect()
}
