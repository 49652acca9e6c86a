//! HTML page adapter.
//!
//! Finds every `<code>` element that is a direct child of a `<pre>` element
//! and replaces its content with the normalized text. Markup outside those
//! contents is copied through byte for byte; the page is never re-serialized.

use crate::normalize::{normalize_with, Whitespace};

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Result of one pass over a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRewrite {
    /// The rewritten markup.
    pub html: String,
    /// Number of `pre > code` blocks found.
    pub blocks: usize,
    /// Number of blocks whose content changed.
    pub changed: usize,
}

// ---------------------------------------------------------------------------
// Markup tokens
// ---------------------------------------------------------------------------

/// What starts at a `<` in the page. `end` is the offset just past the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Markup<'a> {
    Open {
        name: &'a str,
        end: usize,
        self_closing: bool,
    },
    Close {
        name: &'a str,
        end: usize,
    },
    /// Comment, doctype or processing instruction.
    Other { end: usize },
    /// A `<` that does not open a tag.
    Text { end: usize },
}

fn tag_name(rest: &str) -> &str {
    let len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(rest.len());
    &rest[..len]
}

/// Offset just past the `>` closing the tag at `pos`. Quoted attribute
/// values may contain `>`.
fn tag_end(lower: &str, pos: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in lower.as_bytes()[pos + 1..].iter().enumerate() {
        match (quote, *b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(*b),
            (None, b'>') => return Some(pos + i + 2),
            (None, _) => {}
        }
    }
    None
}

/// Classify the markup at `lower[pos]`, which must be `<`.
///
/// `None` means the token runs off the end of the page.
fn read_markup(lower: &str, pos: usize) -> Option<Markup<'_>> {
    let rest = &lower[pos..];
    if rest.starts_with("<!--") {
        let len = rest[4..].find("-->")?;
        return Some(Markup::Other {
            end: pos + 4 + len + 3,
        });
    }
    if let Some(after) = rest.strip_prefix("</") {
        let name = tag_name(after);
        if name.is_empty() {
            return Some(Markup::Text { end: pos + 1 });
        }
        return Some(Markup::Close {
            name,
            end: tag_end(lower, pos)?,
        });
    }
    match rest.as_bytes().get(1) {
        Some(b'!') | Some(b'?') => Some(Markup::Other {
            end: tag_end(lower, pos)?,
        }),
        Some(b) if b.is_ascii_alphabetic() => {
            let end = tag_end(lower, pos)?;
            Some(Markup::Open {
                name: tag_name(&rest[1..]),
                end,
                self_closing: lower[..end].ends_with("/>"),
            })
        }
        _ => Some(Markup::Text { end: pos + 1 }),
    }
}

// ---------------------------------------------------------------------------
// Rewriting
// ---------------------------------------------------------------------------

struct PageScan<'a> {
    html: &'a str,
    /// ASCII-lowercased copy of `html`; byte offsets line up.
    lower: &'a str,
    ws: Whitespace,
    out: String,
    copied: usize,
    blocks: usize,
    changed: usize,
}

impl<'a> PageScan<'a> {
    fn replace_content(&mut self, start: usize, end: usize) {
        let content = &self.html[start..end];
        let normalized = normalize_with(content, self.ws);
        self.blocks += 1;
        if normalized != content {
            self.changed += 1;
        }
        self.out.push_str(&self.html[self.copied..start]);
        self.out.push_str(&normalized);
        self.copied = end;
    }

    /// Walk the children of a `<pre>` whose start tag ends at `pos`.
    ///
    /// Every `<code>` at depth zero is a direct child. Returns the offset
    /// past `</pre>`, or `None` when the page ends first.
    fn scan_pre(&mut self, mut pos: usize) -> Option<usize> {
        let lower = self.lower;
        let mut depth = 0usize;
        while let Some(found) = lower[pos..].find('<') {
            match read_markup(lower, pos + found)? {
                Markup::Close { name: "pre", end } if depth == 0 => return Some(end),
                Markup::Open {
                    name: "pre",
                    end,
                    self_closing: false,
                } => pos = self.scan_pre(end)?,
                Markup::Open {
                    name: "code",
                    end,
                    self_closing: false,
                } if depth == 0 => {
                    let close = end + lower[end..].find("</code")?;
                    self.replace_content(end, close);
                    pos = match read_markup(lower, close)? {
                        Markup::Close { end, .. } => end,
                        _ => close + 1,
                    };
                }
                Markup::Open {
                    name,
                    end,
                    self_closing,
                } => {
                    if !self_closing && !VOID_ELEMENTS.contains(&name) {
                        depth += 1;
                    }
                    pos = end;
                }
                Markup::Close { end, .. } => {
                    depth = depth.saturating_sub(1);
                    pos = end;
                }
                Markup::Other { end } | Markup::Text { end } => pos = end,
            }
        }
        None
    }

    fn scan(&mut self) {
        let lower = self.lower;
        let mut pos = 0usize;
        while let Some(found) = lower[pos..].find("<pre") {
            let next = match read_markup(lower, pos + found) {
                Some(Markup::Open {
                    name: "pre",
                    end,
                    self_closing: false,
                }) => self.scan_pre(end),
                Some(Markup::Open { end, .. }) => Some(end),
                Some(_) => Some(pos + found + 1),
                None => None,
            };
            let Some(next) = next else {
                break;
            };
            pos = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Normalize the content of every `pre > code` block in `html`.
///
/// Content is treated as opaque text; entities are not decoded. A `<code>`
/// without a closing tag ends the scan and the remainder is copied as is.
pub fn rewrite_page(html: &str, ws: Whitespace) -> PageRewrite {
    let lower = html.to_ascii_lowercase();
    let mut scan = PageScan {
        html,
        lower: &lower,
        ws,
        out: String::with_capacity(html.len()),
        copied: 0,
        blocks: 0,
        changed: 0,
    };
    scan.scan();

    let mut out = scan.out;
    out.push_str(&html[scan.copied..]);
    PageRewrite {
        html: out,
        blocks: scan.blocks,
        changed: scan.changed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(html: &str) -> PageRewrite {
        rewrite_page(html, Whitespace::Ascii)
    }

    #[test]
    fn trims_boundary_lines_in_pre_code() {
        let page = "<pre><code>\n\nval x = 1\n\nx + 1\n  \n</code></pre>";
        let out = rewrite(page);
        assert_eq!(out.html, "<pre><code>val x = 1\n\nx + 1</code></pre>");
        assert_eq!(out.blocks, 1);
        assert_eq!(out.changed, 1);
    }

    #[test]
    fn attributes_and_whitespace_between_tags() {
        let page = "<pre class=\"x\">\n  <code class=\"scala\" data-trim>\nfoo\n</code>\n</pre>";
        let out = rewrite(page);
        assert_eq!(
            out.html,
            "<pre class=\"x\">\n  <code class=\"scala\" data-trim>foo</code>\n</pre>"
        );
    }

    #[test]
    fn tag_names_are_case_insensitive() {
        let out = rewrite("<PRE><Code>\nfoo\n</CODE></PRE>");
        assert_eq!(out.html, "<PRE><Code>foo</CODE></PRE>");
        assert_eq!(out.blocks, 1);
    }

    #[test]
    fn inline_code_outside_pre_untouched() {
        let page = "<p><code>\nfoo\n</code></p>";
        let out = rewrite(page);
        assert_eq!(out.html, page);
        assert_eq!(out.blocks, 0);
    }

    #[test]
    fn code_after_sibling_element_is_direct_child() {
        let out = rewrite("<pre><span>x</span><code>\nfoo\n</code></pre>");
        assert_eq!(out.html, "<pre><span>x</span><code>foo</code></pre>");
        assert_eq!(out.blocks, 1);
    }

    #[test]
    fn code_after_text_is_direct_child() {
        let out = rewrite("<pre>$ <code>\n\nls\n\n</code></pre>");
        assert_eq!(out.html, "<pre>$ <code>ls</code></pre>");
        assert_eq!(out.blocks, 1);
    }

    #[test]
    fn every_code_child_normalized() {
        let out = rewrite("<pre><code>\na\n</code>\n<code>\n\nb\n\n</code></pre>");
        assert_eq!(out.html, "<pre><code>a</code>\n<code>b</code></pre>");
        assert_eq!(out.blocks, 2);
        assert_eq!(out.changed, 2);
    }

    #[test]
    fn nested_code_is_not_a_child() {
        let page = "<pre><div><code>\nfoo\n</code></div></pre>";
        let out = rewrite(page);
        assert_eq!(out.html, page);
        assert_eq!(out.blocks, 0);
    }

    #[test]
    fn void_and_self_closing_siblings_keep_depth() {
        let out = rewrite("<pre>a<br><img src=\"x.png\"/><!-- <code> --><code>\nfoo\n</code></pre>");
        assert_eq!(
            out.html,
            "<pre>a<br><img src=\"x.png\"/><!-- <code> --><code>foo</code></pre>"
        );
        assert_eq!(out.blocks, 1);
    }

    #[test]
    fn code_after_closed_pre_untouched() {
        let page = "<pre><code>\na\n</code></pre><code>\nb\n</code>";
        let out = rewrite(page);
        assert_eq!(out.html, "<pre><code>a</code></pre><code>\nb\n</code>");
        assert_eq!(out.blocks, 1);
    }

    #[test]
    fn nested_pre_scanned_on_its_own() {
        let out = rewrite("<pre><pre><code>\ninner\n</code></pre><code>\nouter\n</code></pre>");
        assert_eq!(
            out.html,
            "<pre><pre><code>inner</code></pre><code>outer</code></pre>"
        );
        assert_eq!(out.blocks, 2);
    }

    #[test]
    fn stray_less_than_in_text() {
        let out = rewrite("<pre>a < b <code>\nfoo\n</code></pre>");
        assert_eq!(out.html, "<pre>a < b <code>foo</code></pre>");
    }

    /// `pre > code` as an HTML5 parser sees it.
    fn parsed_blocks(html: &str) -> Vec<String> {
        let document = scraper::Html::parse_document(html);
        let selector = scraper::Selector::parse("pre > code").expect("valid selector");
        document.select(&selector).map(|el| el.inner_html()).collect()
    }

    #[test]
    fn matches_agree_with_html_parser() {
        let pages = [
            "<pre><code>\na\n</code>\n<code>\n\nb\n\n</code></pre>",
            "<pre>$ <code>\n\nls\n\n</code></pre>",
            "<pre><span>x</span><code>\nfoo\n</code></pre>",
            "<pre><div><code>\nfoo\n</code></div></pre>",
            "<p><code>\nfoo\n</code></p><pre class=\"x\">\n  <code>\nbar\n</code>\n</pre>",
            "<pre><br><code>\n\nbaz</code></pre>",
        ];
        for page in pages {
            let out = rewrite(page);
            let blocks = parsed_blocks(&out.html);
            assert_eq!(blocks.len(), out.blocks, "block count for {page:?}");
            for content in blocks {
                assert_eq!(
                    normalize_with(&content, Whitespace::Ascii),
                    content,
                    "boundary blank lines left in {page:?}"
                );
            }
        }
    }

    #[test]
    fn similarly_named_tags_ignored() {
        let page = "<prefix><code>\nfoo\n</code></prefix><pre><codex>\nbar\n</codex></pre>";
        let out = rewrite(page);
        assert_eq!(out.html, page);
        assert_eq!(out.blocks, 0);
    }

    #[test]
    fn quoted_gt_in_attribute() {
        let page = "<pre title=\"a>b\"><code>\nfoo\n</code></pre>";
        let out = rewrite(page);
        assert_eq!(out.html, "<pre title=\"a>b\"><code>foo</code></pre>");
    }

    #[test]
    fn multiple_blocks_independent() {
        let page = "<pre><code>\na\n</code></pre>\n<p>mid</p>\n<pre><code>b</code></pre>";
        let out = rewrite(page);
        assert_eq!(
            out.html,
            "<pre><code>a</code></pre>\n<p>mid</p>\n<pre><code>b</code></pre>"
        );
        assert_eq!(out.blocks, 2);
        assert_eq!(out.changed, 1);
    }

    #[test]
    fn escaped_content_kept_opaque() {
        let page = "<pre><code>\n&lt;div&gt;\n\n&amp;\n</code></pre>";
        let out = rewrite(page);
        assert_eq!(out.html, "<pre><code>&lt;div&gt;\n\n&amp;</code></pre>");
    }

    #[test]
    fn unterminated_code_left_alone() {
        let page = "<pre><code>\nfoo\n";
        let out = rewrite(page);
        assert_eq!(out.html, page);
        assert_eq!(out.blocks, 0);
    }

    #[test]
    fn page_without_blocks_is_identity() {
        let page = "<!DOCTYPE html><html><body><h1>Hi</h1></body></html>";
        let out = rewrite(page);
        assert_eq!(out.html, page);
        assert_eq!(out.blocks, 0);
        assert_eq!(out.changed, 0);
    }

    #[test]
    fn all_blank_block_becomes_empty() {
        let out = rewrite("<pre><code>\n   \n</code></pre>");
        assert_eq!(out.html, "<pre><code></code></pre>");
    }

    #[test]
    fn non_ascii_text_offsets_preserved() {
        let page = "<h1>Ünïcødé</h1><pre><code>\nλx → x\n</code></pre>";
        let out = rewrite(page);
        assert_eq!(out.html, "<h1>Ünïcødé</h1><pre><code>λx → x</code></pre>");
    }
}
