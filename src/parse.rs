//! Markdown code block extraction.
//!
//! Locates every code block in a markdown source (fenced or indented, at any
//! nesting depth) together with its source line range, so findings can point
//! back at the lines an author has to edit.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A code block found in a markdown source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCodeBlock {
    /// 1-based line of the opening fence (or first indented line).
    pub line_start: usize,
    /// 1-based line of the closing fence (or last indented line), inclusive.
    pub line_end: usize,
    /// Fence info string; empty for indented blocks and bare fences.
    pub info: String,
    /// Literal block text as the markdown parser reports it.
    pub content: String,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Maps byte offsets into a source string to 1-based line numbers.
struct LineIndex {
    /// Byte offsets of each `\n` character in the source.
    newline_offsets: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let newline_offsets = source
            .bytes()
            .enumerate()
            .filter_map(|(i, b)| if b == b'\n' { Some(i) } else { None })
            .collect();
        Self { newline_offsets }
    }

    /// Convert a byte offset to a 1-based line number.
    fn line_at(&self, offset: usize) -> usize {
        match self.newline_offsets.binary_search(&offset) {
            Ok(idx) | Err(idx) => idx + 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Collect every code block in `source`, in document order.
///
/// YAML front matter is recognised as a metadata block and never reported.
pub fn code_blocks(source: &str) -> Vec<SourceCodeBlock> {
    let line_index = LineIndex::new(source);

    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
    let parser = Parser::new_ext(source, options);

    let mut blocks: Vec<SourceCodeBlock> = Vec::new();
    // (start offset, info) of the block being read.
    let mut current: Option<(usize, String)> = None;
    let mut text_buf = String::new();

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let info = match kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                current = Some((range.start, info));
                text_buf.clear();
            }
            Event::Text(text) if current.is_some() => {
                text_buf.push_str(&text);
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((start_offset, info)) = current.take() {
                    let line_start = line_index.line_at(start_offset);
                    let line_end = line_index
                        .line_at(range.end.saturating_sub(1).max(start_offset));
                    blocks.push(SourceCodeBlock {
                        line_start,
                        line_end,
                        info,
                        content: std::mem::take(&mut text_buf),
                    });
                }
            }
            _ => {}
        }
    }

    blocks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document() {
        assert!(code_blocks("").is_empty());
    }

    #[test]
    fn no_code_blocks() {
        assert!(code_blocks("# Title\n\nSome `inline` code.\n").is_empty());
    }

    #[test]
    fn fenced_code_with_language() {
        let blocks = code_blocks("```rust\nfn main() {}\n```\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].info, "rust");
        assert_eq!(blocks[0].content, "fn main() {}\n");
        assert_eq!((blocks[0].line_start, blocks[0].line_end), (1, 3));
    }

    #[test]
    fn fenced_code_keeps_boundary_blank_lines() {
        let blocks = code_blocks("intro\n\n```\n\nhello\n\n```\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "\nhello\n\n");
        assert_eq!((blocks[0].line_start, blocks[0].line_end), (3, 7));
    }

    #[test]
    fn indented_code_block() {
        let blocks = code_blocks("para\n\n    a\n    b\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].info, "");
        assert_eq!(blocks[0].content, "a\nb\n");
        assert_eq!(blocks[0].line_start, 3);
        assert_eq!(blocks[0].line_end, 4);
    }

    #[test]
    fn nested_in_list_and_quote() {
        let src = "- item\n\n  ```sh\n  ls\n  ```\n\n> ```\n> quoted\n> ```\n";
        let blocks = code_blocks(src);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].info, "sh");
        assert_eq!(blocks[0].content, "ls\n");
        assert_eq!(blocks[1].content, "quoted\n");
        assert!(blocks[1].line_start > blocks[0].line_end);
    }

    #[test]
    fn front_matter_not_reported() {
        let blocks = code_blocks("---\ntitle: x\n---\n\n```\ncode\n```\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "code\n");
        assert_eq!(blocks[0].line_start, 5);
    }

    #[test]
    fn line_ranges_increase() {
        let src = "```\na\n```\n\ntext\n\n```py\nb\n```\n";
        let blocks = code_blocks(src);
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].line_start, blocks[0].line_end), (1, 3));
        assert_eq!((blocks[1].line_start, blocks[1].line_end), (7, 9));
    }
}
