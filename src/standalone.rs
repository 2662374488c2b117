//! Standalone rendering of Markdown files to HTML, outside of mdBook.

use crate::code_block::HighlightingCodeBlock;
use crate::config::HighlightConfig;
use crate::highlighter::SyntectHighlighter;
use crate::renderer::MarkdownRenderer;
use crate::reporting::{self, DocumentFailure};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One Markdown file to render and where its HTML goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl RenderJob {
    /// Builds a job writing `<stem>.html` next to `input`, or into `out_dir`.
    pub fn new(input: PathBuf, out_dir: Option<&Path>) -> Self {
        let output = match out_dir {
            Some(dir) => dir.join(input.with_extension("html").file_name().unwrap_or_default()),
            None => input.with_extension("html"),
        };
        Self { input, output }
    }
}

/// Rejects jobs that would overwrite their own input or share an output file.
pub fn check_jobs(jobs: &[RenderJob]) -> Result<()> {
    let mut outputs = HashSet::with_capacity(jobs.len());
    for job in jobs {
        if job.output == job.input {
            anyhow::bail!(
                "Output for {} would overwrite the input file",
                job.input.display()
            );
        }
        if !outputs.insert(&job.output) {
            anyhow::bail!(
                "More than one input renders to {}; use separate output directories",
                job.output.display()
            );
        }
    }
    Ok(())
}

/// Renders every job concurrently and returns the per-language block counts.
///
/// Jobs are checked with [`check_jobs`] before anything is read or written.
/// I/O errors abort immediately. Highlighting failures are gathered across
/// all files, reported together, and then fail the call; no output is written
/// for a file that failed.
pub async fn render_files(
    jobs: Vec<RenderJob>,
    config: &HighlightConfig,
) -> Result<BTreeMap<String, usize>> {
    check_jobs(&jobs)?;

    let highlighter =
        SyntectHighlighter::from_config(config).context("Failed to set up highlighter")?;
    let renderer = Arc::new(
        MarkdownRenderer::new(HighlightingCodeBlock::new(highlighter)).with_policy(config.on_error),
    );

    let results: Vec<_> = stream::iter(jobs.into_iter().map(|job| {
        let renderer = Arc::clone(&renderer);
        async move {
            let markdown = tokio::fs::read_to_string(&job.input)
                .await
                .with_context(|| format!("Failed to read {}", job.input.display()))?;

            log::info!("Rendering {}", job.input.display());
            let rendered = tokio::task::spawn_blocking(move || renderer.render_html(&markdown))
                .await
                .with_context(|| format!("Rendering task failed for {}", job.input.display()))?;

            if let Ok(rendered) = &rendered {
                tokio::fs::write(&job.output, &rendered.output)
                    .await
                    .with_context(|| format!("Failed to write {}", job.output.display()))?;
                log::info!("Wrote {}", job.output.display());
            }

            anyhow::Ok((job.input, rendered))
        }
    }))
    .buffered(num_cpus::get())
    .collect()
    .await;

    let mut stats = BTreeMap::new();
    let mut failures = Vec::new();
    for result in results {
        let (path, rendered) = result?;
        match rendered {
            Ok(rendered) => reporting::merge_stats(&mut stats, &rendered.blocks),
            Err(error) => failures.push(DocumentFailure { path, error }),
        }
    }

    if !failures.is_empty() {
        reporting::report_failures(failures)?;
    }

    Ok(stats)
}
