use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdbook::preprocess::{CmdPreprocessor, Preprocessor};
use mdbook_highlight::{
    available_themes, check_jobs, reporting, ErrorPolicy, HighlightConfig, HighlightPreprocessor,
    RenderJob, SyntectHighlighter,
};
use std::io;
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "mdbook-highlight",
    version,
    about = "Syntax-highlights fenced code blocks, as an mdBook preprocessor or on plain Markdown files"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a renderer is supported (used by mdBook)
    Supports { renderer: String },

    /// Render Markdown files to HTML
    ///
    /// Each FILE is written as <stem>.html next to it, or into --out-dir.
    Render {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory for the generated HTML files
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Configuration file (defaults to the user config file, if any)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report every failing code block instead of stopping at the first one
        #[arg(long)]
        collect_errors: bool,
    },

    /// Print the stylesheet for the `classed` output style
    Css {
        /// Theme to generate the stylesheet for
        #[arg(short, long)]
        theme: Option<String>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List supported languages and their file extensions
    Languages {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List available themes
    Themes {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn main() {
    // Logs go to stderr, stdout carries the book JSON
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let result = match args.command {
        None => handle_preprocessing(),
        Some(Command::Supports { renderer }) => {
            let preprocessor = HighlightPreprocessor::new();
            exit(if preprocessor.supports_renderer(&renderer) {
                0
            } else {
                1
            });
        }
        Some(Command::Render {
            files,
            out_dir,
            config,
            collect_errors,
        }) => handle_render(files, out_dir, config, collect_errors),
        Some(Command::Css { theme, config }) => handle_css(theme, config),
        Some(Command::Languages { config }) => handle_languages(config),
        Some(Command::Themes { config }) => handle_themes(config),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn handle_preprocessing() -> Result<()> {
    let (ctx, book) = CmdPreprocessor::parse_input(io::stdin())?;

    if ctx.mdbook_version != mdbook::MDBOOK_VERSION {
        log::warn!(
            "mdbook-highlight was built against mdbook {}, but is called from mdbook {}",
            mdbook::MDBOOK_VERSION,
            ctx.mdbook_version
        );
    }

    let preprocessor = HighlightPreprocessor::new();
    let processed_book = preprocessor.run(&ctx, book)?;

    serde_json::to_writer(io::stdout(), &processed_book)?;

    Ok(())
}

fn handle_render(
    files: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    collect_errors: bool,
) -> Result<()> {
    let mut config = HighlightConfig::load(config.as_deref())?;
    if collect_errors {
        config.on_error = ErrorPolicy::Collect;
    }

    let jobs: Vec<_> = files
        .into_iter()
        .map(|file| RenderJob::new(file, out_dir.as_deref()))
        .collect();
    check_jobs(&jobs)?;

    if let Some(dir) = &out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to create tokio runtime")?;

    let start = Instant::now();
    let stats = runtime.block_on(mdbook_highlight::render_files(jobs, &config))?;
    reporting::print_statistics(&stats, start.elapsed());

    Ok(())
}

fn handle_css(theme: Option<String>, config: Option<PathBuf>) -> Result<()> {
    let mut config = HighlightConfig::load(config.as_deref())?;
    if let Some(theme) = theme {
        config.theme = theme;
    }

    let highlighter = SyntectHighlighter::from_config(&config)?;
    print!("{}", highlighter.css()?);
    Ok(())
}

fn handle_languages(config: Option<PathBuf>) -> Result<()> {
    let config = HighlightConfig::load(config.as_deref())?;
    let highlighter = SyntectHighlighter::from_config(&config)?;

    for language in highlighter.supported_languages() {
        println!("{}: {}", language.name, language.extensions.join(", "));
    }
    Ok(())
}

fn handle_themes(config: Option<PathBuf>) -> Result<()> {
    let config = HighlightConfig::load(config.as_deref())?;
    for theme in available_themes(&config)? {
        println!("{}", theme);
    }
    Ok(())
}
