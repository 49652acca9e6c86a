//! Embedded static web assets for snipdeck pages.
//!
//! Compiled into the binary via `include_str!` so decks render without any
//! external asset files next to the binary.

/// Stylesheet for deck pages: code block layout on top of the reveal.js theme.
///
/// Served at `/assets/snipdeck.css`, or inlined by `snipdeck build`.
/// Loaded from `src/assets/snipdeck.css` at compile time.
pub const CSS: &str = include_str!("assets/snipdeck.css");
