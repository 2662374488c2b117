use crate::error::RenderError;
use crate::highlighter::Highlighter;

/// Renders one code block encountered while converting Markdown to HTML.
///
/// The Markdown pipeline is generic over this trait and calls it once per
/// code block, in document order, splicing the returned markup into its
/// output.
pub trait CodeBlockHandler: Send + Sync {
    /// Renders `code` written in `language`.
    ///
    /// `language` is `None` when the block has no language tag.
    fn render_block(&self, code: &str, language: Option<&str>) -> Result<String, RenderError>;
}

/// Code block handler that requires a language tag and delegates to a
/// [`Highlighter`].
///
/// Blocks without a language tag fail with
/// [`RenderError::MissingLanguageTag`] and never reach the highlighter.
/// Everything else is the highlighter's output, returned verbatim, or its
/// error, propagated unchanged.
///
/// # Example
///
/// ```
/// use mdbook_highlight::{CodeBlockHandler, HighlightingCodeBlock, RenderError, SyntectHighlighter};
///
/// let handler = HighlightingCodeBlock::new(SyntectHighlighter::new().unwrap());
///
/// let html = handler.render_block("print(1)", Some("python")).unwrap();
/// assert!(html.starts_with("<pre"));
///
/// let err = handler.render_block("SELECT 1;", None).unwrap_err();
/// assert!(matches!(err, RenderError::MissingLanguageTag { .. }));
/// ```
pub struct HighlightingCodeBlock<H> {
    highlighter: H,
}

impl<H: Highlighter> HighlightingCodeBlock<H> {
    pub fn new(highlighter: H) -> Self {
        Self { highlighter }
    }

    pub fn highlighter(&self) -> &H {
        &self.highlighter
    }
}

impl<H: Highlighter> CodeBlockHandler for HighlightingCodeBlock<H> {
    fn render_block(&self, code: &str, language: Option<&str>) -> Result<String, RenderError> {
        let language = match language {
            Some(language) if !language.trim().is_empty() => language,
            _ => {
                return Err(RenderError::MissingLanguageTag {
                    code: code.to_string(),
                })
            }
        };

        log::debug!("Highlighting {} block ({} bytes)", language, code.len());

        Ok(self.highlighter.highlight(code, language)?)
    }
}

/// Extracts the language tag from a fence info string.
///
/// The tag is the first token, where tokens are separated by commas or
/// whitespace:
/// - "rust" -> Some("rust")
/// - "rust,ignore" -> Some("rust")
/// - "python title=\"demo\"" -> Some("python")
/// - "" -> None
pub fn parse_fence_info(info: &str) -> Option<&str> {
    info.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .find(|token| !token.is_empty())
}
