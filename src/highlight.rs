//! Syntax highlighting for normalized code blocks.
//!
//! Wraps syntect's bundled syntaxes and themes. Blocks are emitted as classed
//! spans so a single stylesheet per theme styles every block on the page.

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::error::DeckError;

/// Theme used when neither the command line nor the deck names one.
pub const DEFAULT_THEME: &str = "base16-ocean.dark";

/// Class prefix shared by the generated spans and stylesheet.
const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

/// Loaded syntax and theme sets plus the default theme name.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    default_theme: String,
}

/// Minimal HTML entity escaping for text content and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Language named by a fence info string: its first whitespace-delimited
/// token, cut at the first comma (`rust,ignore title=x` names `rust`).
pub fn language_token(info: &str) -> Option<&str> {
    info.split_whitespace()
        .next()
        .and_then(|tok| tok.split(',').next())
        .filter(|tok| !tok.is_empty())
}

impl Highlighter {
    /// Load the bundled sets and validate `default_theme`.
    pub fn new(default_theme: &str) -> Result<Self, DeckError> {
        let highlighter = Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            default_theme: default_theme.to_owned(),
        };
        highlighter.theme(None)?;
        Ok(highlighter)
    }

    /// Names of the bundled themes, sorted.
    pub fn theme_names(&self) -> Vec<&str> {
        // ThemeSet stores themes in a BTreeMap, so keys come out sorted.
        self.theme_set.themes.keys().map(String::as_str).collect()
    }

    pub fn default_theme(&self) -> &str {
        &self.default_theme
    }

    /// Look up `name`, or the default theme when `None`.
    pub fn theme(&self, name: Option<&str>) -> Result<&Theme, DeckError> {
        let name = name.unwrap_or(self.default_theme.as_str());
        self.theme_set
            .themes
            .get(name)
            .ok_or_else(|| DeckError::UnknownTheme {
                name: name.to_owned(),
                available: self.theme_names().join(", "),
            })
    }

    /// CSS for the classed spans under theme `name` (default when `None`).
    pub fn stylesheet(&self, name: Option<&str>) -> Result<String, DeckError> {
        let theme = self.theme(name)?;
        css_for_theme_with_class_style(theme, CLASS_STYLE).map_err(|e| DeckError::Stylesheet {
            theme: name.unwrap_or(self.default_theme.as_str()).to_owned(),
            message: e.to_string(),
        })
    }

    /// Highlight `code` as the language named by `info` (a fence info string).
    ///
    /// Unknown or missing languages render as plain text. The result is
    /// escaped HTML suitable for the inside of a `<code>` element.
    pub fn highlight(&self, code: &str, info: &str) -> String {
        let syntax = language_token(info)
            .and_then(|tok| self.syntax_set.find_syntax_by_token(tok))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        // The generator expects every line to end with a newline; normalized
        // blocks drop the last one.
        let terminated = !code.is_empty() && !code.ends_with('\n');
        let owned;
        let input = if terminated {
            owned = format!("{code}\n");
            owned.as_str()
        } else {
            code
        };

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, CLASS_STYLE);
        for line in LinesWithEndings::from(input) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                eprintln!("[highlight] syntax={} fallback=plain error={}", syntax.name, e);
                return html_escape(code);
            }
        }

        let mut html = generator.finalize();
        if terminated {
            if let Some(pos) = html.rfind('\n') {
                html.remove(pos);
            }
        }
        html
    }
}
