//! Trim, highlight and present code snippets in slide decks.
//!
//! The core is [`normalize::normalize`], which strips the blank lines around
//! a code block. The other modules apply it at the edges: HTML pages
//! ([`page`]), markdown decks rendered for reveal.js ([`deck`]), a source lint
//! ([`check`]) and an HTTP server ([`serve`]).

pub mod check;
pub mod deck;
pub mod error;
pub mod highlight;
pub mod normalize;
pub mod page;
pub mod parse;
pub mod serve;
pub mod web_assets;
