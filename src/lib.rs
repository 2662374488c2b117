//! mdbook-highlight library
//!
//! Renders fenced code blocks in Markdown as syntax-highlighted HTML, and
//! refuses code blocks that do not declare their language.
//!
//! ## Public API
//!
//! - [`CodeBlockHandler`] - The per-block rendering capability the Markdown
//!   pipeline is parameterised over
//! - [`HighlightingCodeBlock`] - Requires a language tag and delegates to a [`Highlighter`]
//! - [`SyntectHighlighter`] - The syntect-backed highlighting engine
//! - [`MarkdownRenderer`] - Drives pulldown-cmark and splices in the block markup
//! - [`HighlightPreprocessor`] - The mdBook `Preprocessor` implementation
//! - [`render_files`] - Renders Markdown files to HTML outside of mdBook

mod code_block;
mod config;
mod error;
mod highlighter;
mod language;
mod preprocessor;
mod renderer;
pub mod reporting;
mod standalone;

pub use code_block::{parse_fence_info, CodeBlockHandler, HighlightingCodeBlock};
pub use config::{ErrorPolicy, HighlightConfig, OutputStyle, UnknownLanguage};
pub use error::{BlockFailure, DocumentError, HighlightError, RenderError};
pub use highlighter::{available_themes, Highlighter, SyntectHighlighter};
pub use language::{syntax_alias, LanguageRegistry, SupportedLanguage};
pub use preprocessor::HighlightPreprocessor;
pub use renderer::{
    extract_code_blocks, CodeBlock, MarkdownRenderer, Rendered, MAX_BLOCKS_PER_DOCUMENT,
    MAX_CODE_BLOCK_SIZE,
};
pub use standalone::{check_jobs, render_files, RenderJob};
