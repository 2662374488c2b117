use crate::error::{BlockFailure, DocumentError, RenderError};
use chrono::Local;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A document that failed to render, with the path shown to the author.
#[derive(Debug)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: DocumentError,
}

/// Error ending a run after its failures were reported. Callers can
/// downcast to it to inspect every failed document.
#[derive(Debug, thiserror::Error)]
#[error(
    "Code highlighting failed: {} code block(s) in {} file(s)",
    block_count(.failures),
    .failures.len()
)]
pub struct HighlightFailed {
    pub failures: Vec<DocumentFailure>,
}

fn block_count(failures: &[DocumentFailure]) -> usize {
    failures.iter().map(|document| document.error.failures().len()).sum()
}

/// Formats a message with mdBook-style timestamp and prefix.
fn format_line(level: &str, message: &str) -> String {
    format!(
        "{} [{}] (mdbook_highlight): {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

fn format_error(message: &str) -> String {
    format_line("ERROR", message)
}

/// Builds the report lines for one failed block: location, error, and the
/// code when the error carries it.
fn block_report(path: &Path, failure: &BlockFailure) -> Vec<String> {
    let mut lines = vec![
        "Code highlighting failed".to_string(),
        format!("File: {}", path.display()),
        format!("Block: #{} (line {})", failure.index, failure.line),
        String::new(),
    ];

    match &failure.error {
        RenderError::MissingLanguageTag { code } => {
            lines.push("code block is missing a language tag".to_string());
            lines.push(String::new());
            lines.push("Code block:".to_string());
            lines.push("```".to_string());
            lines.extend(code.lines().map(str::to_string));
            lines.push("```".to_string());
        }
        error => {
            lines.extend(error.to_string().lines().map(str::to_string));
            if let Some(language) = &failure.language {
                lines.push(format!("Language: {}", language));
            }
        }
    }

    lines.push(String::new());
    lines
}

/// Builds every report line for a set of failed documents.
pub fn failure_report(failures: &[DocumentFailure]) -> Vec<String> {
    let mut lines = Vec::new();

    for document in failures {
        match &document.error {
            DocumentError::Blocks(blocks) => {
                for failure in blocks {
                    lines.extend(block_report(&document.path, failure));
                }
            }
            other => {
                lines.push(format!("{}: {}", document.path.display(), other));
                lines.push(String::new());
            }
        }
    }

    lines.push("Failed to highlight code in the following files:".to_string());
    for document in failures {
        lines.push(format!("  {}", document.path.display()));
    }
    lines.push("Code highlighting failed".to_string());
    lines
}

/// Reports highlighting failures to stderr with mdBook-style formatting.
///
/// # Errors
///
/// Returns [`HighlightFailed`] after printing all failures (to stop the build).
pub fn report_failures(failures: Vec<DocumentFailure>) -> anyhow::Result<()> {
    for line in failure_report(&failures) {
        eprintln!("{}", format_error(&line));
    }

    Err(HighlightFailed { failures }.into())
}

/// Formats per-language counts: "python: 2, ruby: 3"
pub fn format_stats(stats: &BTreeMap<String, usize>) -> String {
    stats
        .iter()
        .map(|(lang, count)| format!("{}: {}", lang, count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prints highlighting statistics to stderr.
pub fn print_statistics(stats: &BTreeMap<String, usize>, duration: Duration) {
    let total_blocks: usize = stats.values().sum();

    if total_blocks == 0 {
        eprintln!("{}", format_line("INFO", "No code blocks found to highlight"));
        return;
    }

    eprintln!(
        "{}",
        format_line(
            "INFO",
            &format!(
                "Highlighted {} code block(s) ({})",
                total_blocks,
                format_stats(stats)
            )
        )
    );
    eprintln!(
        "{}",
        format_line(
            "INFO",
            &format!("Finished in {}ms", duration.as_millis())
        )
    );
}

/// Adds `other` counts into `total`.
pub fn merge_stats(total: &mut BTreeMap<String, usize>, other: &BTreeMap<String, usize>) {
    for (lang, count) in other {
        *total.entry(lang.clone()).or_insert(0) += count;
    }
}
