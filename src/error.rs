use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while rendering a single code block.
///
/// `MissingLanguageTag` is the only failure the code block handler raises on
/// its own. Everything the highlighting engine reports passes through
/// [`RenderError::Highlight`] untouched.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The fenced block carries no language tag.
    #[error("code block is missing a language tag:\n{code}")]
    MissingLanguageTag {
        /// The offending code, so the author can find the block.
        code: String,
    },

    /// The block exceeds the per-block size limit.
    #[error("code block is {size} bytes, exceeding limit of {limit} bytes")]
    BlockTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Highlight(#[from] HighlightError),
}

/// Errors reported by the highlighting engine.
#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("unknown theme '{name}' (available: {available})")]
    UnknownTheme { name: String, available: String },

    #[error("failed to load themes from {path}: {source}")]
    LoadThemes {
        path: PathBuf,
        #[source]
        source: syntect::LoadingError,
    },

    #[error("failed to load syntaxes from {path}: {source}")]
    LoadSyntaxes {
        path: PathBuf,
        #[source]
        source: syntect::LoadingError,
    },

    #[error("highlighting failed: {0}")]
    Syntect(#[from] syntect::Error),
}

/// A code block that failed to render, located within its document.
#[derive(Debug, Error)]
#[error("block #{index} at line {line}: {error}")]
pub struct BlockFailure {
    /// Zero-based ordinal of the block in the document
    pub index: usize,
    /// One-based line of the opening fence
    pub line: usize,
    /// The block's language tag, if it had one
    pub language: Option<String>,
    pub error: RenderError,
}

/// Errors produced while rendering a whole Markdown document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document has more code blocks than the per-document limit.
    #[error("document has {count} code blocks, exceeding limit of {limit}")]
    TooManyBlocks { count: usize, limit: usize },

    /// One or more code blocks failed. Holds a single failure under the
    /// fail-fast policy, every failure in document order otherwise.
    #[error("{} code block(s) failed to render", .0.len())]
    Blocks(Vec<BlockFailure>),
}

impl DocumentError {
    /// Returns the failed blocks, empty for document-level errors.
    pub fn failures(&self) -> &[BlockFailure] {
        match self {
            DocumentError::Blocks(failures) => failures,
            DocumentError::TooManyBlocks { .. } => &[],
        }
    }
}
