/// Errors raised while turning a markdown deck into a page.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("invalid front matter: {0}")]
    FrontMatter(#[from] serde_yml::Error),

    #[error("front matter must be a mapping, found {found}")]
    FrontMatterShape { found: &'static str },

    #[error("unknown highlight theme '{name}' (available: {available})")]
    UnknownTheme { name: String, available: String },

    #[error("cannot build stylesheet for theme '{theme}': {message}")]
    Stylesheet { theme: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
