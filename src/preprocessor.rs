use crate::code_block::HighlightingCodeBlock;
use crate::config::HighlightConfig;
use crate::highlighter::SyntectHighlighter;
use crate::renderer::MarkdownRenderer;
use crate::reporting::{self, DocumentFailure};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use mdbook::book::{Book, BookItem};
use mdbook::preprocess::{Preprocessor, PreprocessorContext};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

type BookRenderer = MarkdownRenderer<HighlightingCodeBlock<SyntectHighlighter>>;

/// An mdBook preprocessor that replaces fenced code blocks with
/// syntax-highlighted HTML.
///
/// # Overview
///
/// Every code block in every chapter must declare its language. A block
/// without a language tag fails the build, with the chapter, block number,
/// line and code printed so the author can fix it. Highlighting is done by
/// syntect; the rest of the chapter is left for mdBook to render.
///
/// # Configuration
///
/// Options live in `book.toml` under `[preprocessor.highlight]`.
///
/// # Example
///
/// ```toml
/// [preprocessor.highlight]
/// theme = "InspiredGitHub"
/// on-error = "collect"
/// ```
pub struct HighlightPreprocessor;

impl HighlightPreprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Runs the preprocessor on an existing tokio runtime.
    ///
    /// Chapters are highlighted concurrently, at most one per CPU at a time,
    /// and written back in book order.
    pub async fn run_async(&self, ctx: &PreprocessorContext, mut book: Book) -> Result<Book> {
        let config = HighlightConfig::from_preprocessor_context(ctx)?;
        let highlighter =
            SyntectHighlighter::from_config(&config).context("Failed to set up highlighter")?;
        let renderer: Arc<BookRenderer> = Arc::new(
            MarkdownRenderer::new(HighlightingCodeBlock::new(highlighter))
                .with_policy(config.on_error),
        );

        let src_dir = ctx.root.join(&ctx.config.book.src);

        // Book::for_each_mut visits nested chapters too, in a stable order
        let mut chapters: Vec<(String, PathBuf, String)> = Vec::new();
        book.for_each_mut(|item| {
            if let BookItem::Chapter(chapter) = item {
                if let Some(chapter_path) = &chapter.path {
                    chapters.push((
                        chapter.name.clone(),
                        src_dir.join(chapter_path),
                        chapter.content.clone(),
                    ));
                }
            }
        });

        let start = Instant::now();
        let results: Vec<_> = stream::iter(chapters.into_iter().map(|(name, path, content)| {
            let renderer = Arc::clone(&renderer);
            async move {
                log::info!("Highlighting chapter: {}", name);
                let result =
                    tokio::task::spawn_blocking(move || renderer.highlight_blocks(&content)).await;
                (path, result)
            }
        }))
        .buffered(num_cpus::get())
        .collect()
        .await;

        let mut outputs = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        let mut stats = BTreeMap::new();

        for (path, result) in results {
            let result = result
                .with_context(|| format!("Highlighting task failed for {}", path.display()))?;
            match result {
                Ok(rendered) => {
                    reporting::merge_stats(&mut stats, &rendered.blocks);
                    outputs.push(rendered.output);
                }
                Err(error) => failures.push(DocumentFailure { path, error }),
            }
        }

        if !failures.is_empty() {
            reporting::report_failures(failures)?;
        }

        let mut outputs = outputs.into_iter();
        book.for_each_mut(|item| {
            if let BookItem::Chapter(chapter) = item {
                if chapter.path.is_some() {
                    if let Some(output) = outputs.next() {
                        chapter.content = output;
                    }
                }
            }
        });

        reporting::print_statistics(&stats, start.elapsed());
        log::info!("All code blocks highlighted successfully.");
        Ok(book)
    }
}

impl Default for HighlightPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor for HighlightPreprocessor {
    fn name(&self) -> &str {
        "highlight"
    }

    fn run(&self, ctx: &PreprocessorContext, book: Book) -> Result<Book> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .context("Failed to create tokio runtime")?;
        runtime.block_on(self.run_async(ctx, book))
    }

    fn supports_renderer(&self, renderer: &str) -> bool {
        // The markup is HTML, other renderers would show it as text
        renderer == "html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(HighlightPreprocessor::new().name(), "highlight");
    }

    #[test]
    fn test_supports_only_html() {
        let preprocessor = HighlightPreprocessor::new();
        assert!(preprocessor.supports_renderer("html"));
        assert!(!preprocessor.supports_renderer("markdown"));
        assert!(!preprocessor.supports_renderer("epub"));
    }
}
