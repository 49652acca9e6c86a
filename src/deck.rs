//! Slide deck rendering.
//!
//! Turns a markdown deck into a reveal.js page: front matter becomes the
//! presentation config, top-level `---` breaks split slides, and every code
//! block is normalized and then highlighted before it reaches the page.

use std::path::Path;

use comrak::{
    format_html,
    nodes::{AstNode, NodeValue},
    parse_document, Arena, Options,
};
use serde_json::{json, Map, Value};

use crate::error::DeckError;
use crate::highlight::{html_escape, language_token, Highlighter};
use crate::normalize::{normalize_with, Whitespace};

const FRONT_MATTER_DELIMITER: &str = "---";

/// Pinned reveal.js release loaded by every deck page.
const REVEAL_CDN_URL: &str = "https://cdn.jsdelivr.net/npm/reveal.js@5.1.0";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Deck settings read from the YAML front matter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    /// Page title; overrides the first level-1 heading.
    pub title: Option<String>,
    /// Highlight theme name; overrides the default theme.
    pub theme: Option<String>,
    /// Every other key, passed to `Reveal.initialize` untouched.
    pub reveal: Map<String, Value>,
}

/// A rendered deck, ready for [`build_page_shell`].
#[derive(Debug, Clone)]
pub struct Deck {
    pub title: String,
    /// Effective reveal.js options (defaults overlaid with front matter).
    pub config: Map<String, Value>,
    /// HTML for each slide, in order.
    pub slides: Vec<String>,
    /// Number of code blocks normalized and highlighted.
    pub code_blocks: usize,
    /// Stylesheet for the highlight theme in use.
    pub highlight_css: String,
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

/// Detach the front matter node from a parsed deck and return its YAML.
///
/// comrak keeps the `---` delimiter lines in the node; they are stripped
/// here.
fn take_front_matter<'a>(root: &'a AstNode<'a>) -> Option<String> {
    let node = root.first_child()?;
    let yaml = match &node.data.borrow().value {
        NodeValue::FrontMatter(raw) => {
            let raw = raw.trim_end();
            raw.strip_prefix(FRONT_MATTER_DELIMITER)
                .and_then(|rest| rest.strip_suffix(FRONT_MATTER_DELIMITER))
                .unwrap_or(raw)
                .to_owned()
        }
        _ => return None,
    };
    node.detach();
    Some(yaml)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    map.remove(key).map(|value| match value {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Parse front matter YAML into [`FrontMatter`].
///
/// An empty block yields the defaults. The top level must be a mapping.
pub fn parse_front_matter(yaml: &str) -> Result<FrontMatter, DeckError> {
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::default());
    }

    let mut reveal = match serde_yml::from_str::<Value>(yaml)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(DeckError::FrontMatterShape {
                found: json_kind(&other),
            })
        }
    };

    let title = take_string(&mut reveal, "title");
    let theme = take_string(&mut reveal, "theme");
    Ok(FrontMatter {
        title,
        theme,
        reveal,
    })
}

/// The presentation defaults every deck starts from.
pub fn default_reveal_config() -> Map<String, Value> {
    let mut config = Map::new();
    config.insert("slideNumber".to_owned(), json!(true));
    config.insert("progress".to_owned(), json!(false));
    config.insert("center".to_owned(), json!(false));
    config.insert("history".to_owned(), json!(true));
    config.insert("transition".to_owned(), json!("slide"));
    config.insert("controls".to_owned(), json!(false));
    config.insert("width".to_owned(), json!(2560));
    config.insert("height".to_owned(), json!(1600));
    config
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// comrak options: GFM extensions, raw HTML stripped.
fn make_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.front_matter_delimiter = Some(FRONT_MATTER_DELIMITER.to_owned());
    options.render.unsafe_ = false;
    options
}

/// Recursively collect plain-text content of a heading AST node.
fn collect_heading_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(s) => text.push_str(s),
            NodeValue::Code(c) => text.push_str(&c.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => text.push_str(&collect_heading_text(child)),
        }
    }
    text
}

fn first_h1_text<'a>(root: &'a AstNode<'a>) -> Option<String> {
    root.descendants().find_map(|node| {
        let is_h1 = matches!(&node.data.borrow().value, NodeValue::Heading(nh) if nh.level == 1);
        is_h1.then(|| collect_heading_text(node))
    })
}

fn code_block_html(highlighted: &str, info: &str) -> String {
    match language_token(info) {
        Some(lang) => format!(
            "<pre><code class=\"hl-code language-{}\">{highlighted}</code></pre>\n",
            html_escape(lang)
        ),
        None => format!("<pre><code class=\"hl-code\">{highlighted}</code></pre>\n"),
    }
}

/// Replace every code block with normalized, highlighted raw HTML.
///
/// Returns the number of blocks rewritten.
fn rewrite_code_blocks<'a>(
    root: &'a AstNode<'a>,
    highlighter: &Highlighter,
    ws: Whitespace,
) -> usize {
    let mut rewritten = 0usize;

    for node in root.descendants() {
        let replacement = {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::CodeBlock(ncb) => {
                    let code = normalize_with(&ncb.literal, ws);
                    let highlighted = highlighter.highlight(&code, &ncb.info);
                    Some(code_block_html(&highlighted, &ncb.info))
                }
                _ => None,
            }
        };

        if let Some(raw_html) = replacement {
            node.data.borrow_mut().value = NodeValue::Raw(raw_html);
            rewritten += 1;
        }
    }

    rewritten
}

fn push_slide(slides: &mut Vec<String>, current: &mut Vec<u8>) {
    let html = String::from_utf8_lossy(current).into_owned();
    current.clear();
    if !html.trim().is_empty() {
        slides.push(html);
    }
}

/// Render top-level nodes into slides, starting a new one at each
/// top-level thematic break.
fn split_slides<'a>(root: &'a AstNode<'a>, options: &Options) -> Result<Vec<String>, DeckError> {
    let mut slides = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for child in root.children() {
        if matches!(child.data.borrow().value, NodeValue::ThematicBreak) {
            push_slide(&mut slides, &mut current);
            continue;
        }
        format_html(child, options, &mut current)?;
    }
    push_slide(&mut slides, &mut current);

    Ok(slides)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render a markdown deck.
///
/// # Parameters
/// - `source`: deck markdown, optionally starting with YAML front matter.
/// - `file_path`: path of the deck (title fallback and logging).
/// - `highlighter`: loaded syntax/theme sets.
/// - `ws`: whitespace definition for blank-line trimming.
///
/// Logs `[deck] file=<path> slides=<n> code_blocks=<m>`.
pub fn render_deck(
    source: &str,
    file_path: &Path,
    highlighter: &Highlighter,
    ws: Whitespace,
) -> Result<Deck, DeckError> {
    let arena = Arena::new();
    let options = make_options();
    let root = parse_document(&arena, source, &options);

    let front = match take_front_matter(root) {
        Some(yaml) => parse_front_matter(&yaml)?,
        None => FrontMatter::default(),
    };

    let highlight_css = highlighter.stylesheet(front.theme.as_deref())?;

    let mut config = default_reveal_config();
    config.extend(front.reveal);

    let code_blocks = rewrite_code_blocks(root, highlighter, ws);
    let heading_title = first_h1_text(root);
    let slides = split_slides(root, &options)?;

    let title = front
        .title
        .or(heading_title)
        .or_else(|| {
            file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| "Slides".to_owned());

    eprintln!(
        "[deck] file={} slides={} code_blocks={}",
        file_path.display(),
        slides.len(),
        code_blocks
    );

    Ok(Deck {
        title,
        config,
        slides,
        code_blocks,
        highlight_css,
    })
}

/// Serialize the reveal.js config for an inline `<script>`.
///
/// `</` is escaped so string values can never close the script element.
pub fn config_json(config: &Map<String, Value>) -> String {
    Value::Object(config.clone()).to_string().replace("</", "<\\/")
}

/// Build the full deck page.
///
/// With `inline_assets` the deck stylesheet is embedded in the page so the
/// file works on its own; otherwise it is linked from `/assets/snipdeck.css`.
pub fn build_page_shell(deck: &Deck, inline_assets: bool) -> String {
    let title = html_escape(&deck.title);
    let config = config_json(&deck.config);
    let highlight_css = &deck.highlight_css;

    let deck_css = if inline_assets {
        format!("<style>\n{}</style>\n", crate::web_assets::CSS)
    } else {
        "<link rel=\"stylesheet\" href=\"/assets/snipdeck.css\">\n".to_owned()
    };

    let mut sections = String::new();
    for slide in &deck.slides {
        sections.push_str("<section>\n");
        sections.push_str(slide);
        sections.push_str("</section>\n");
    }

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title}</title>\n\
<link rel=\"stylesheet\" href=\"{REVEAL_CDN_URL}/dist/reveal.css\">\n\
<link rel=\"stylesheet\" href=\"{REVEAL_CDN_URL}/dist/theme/white.css\">\n\
{deck_css}\
<style>\n{highlight_css}</style>\n\
</head>\n\
<body>\n\
<div class=\"reveal\">\n\
<div class=\"slides\">\n\
{sections}</div>\n\
</div>\n\
<script src=\"{REVEAL_CDN_URL}/dist/reveal.js\"></script>\n\
<script src=\"{REVEAL_CDN_URL}/plugin/zoom/zoom.js\"></script>\n\
<script src=\"{REVEAL_CDN_URL}/plugin/notes/notes.js\"></script>\n\
<script>\n\
var config = {config};\n\
config.plugins = [RevealZoom, RevealNotes];\n\
Reveal.initialize(config);\n\
</script>\n\
</body>\n\
</html>\n"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
