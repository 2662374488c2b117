use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for the highlight preprocessor and the standalone renderer.
///
/// For mdBook this is deserialized from the `[preprocessor.highlight]` section
/// of `book.toml`. The standalone renderer reads the same keys from the root
/// of a TOML file.
///
/// # Example
///
/// ```toml
/// [preprocessor.highlight]
/// theme = "InspiredGitHub"
/// style = "classed"
/// unknown-language = "error"
/// on-error = "collect"
/// theme-dir = "${BOOK_ASSETS}/themes"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct HighlightConfig {
    /// Theme name, one of syntect's bundled themes or a theme from `theme_dir`
    pub theme: String,

    /// How highlighted markup carries its colours
    pub style: OutputStyle,

    /// What the highlighter does with a language tag it does not know
    pub unknown_language: UnknownLanguage,

    /// Whether a document render stops at the first failing block
    pub on_error: ErrorPolicy,

    /// Folder of extra `.tmTheme` files (supports ${VAR} expansion)
    pub theme_dir: Option<PathBuf>,

    /// Folder of extra `.sublime-syntax` files (supports ${VAR} expansion)
    pub syntax_dir: Option<PathBuf>,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            style: OutputStyle::default(),
            unknown_language: UnknownLanguage::default(),
            on_error: ErrorPolicy::default(),
            theme_dir: None,
            syntax_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputStyle {
    /// Colours inlined as `style` attributes
    #[default]
    Inline,
    /// Scope names as CSS classes, paired with a generated stylesheet
    Classed,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownLanguage {
    /// Render the block as escaped plain text
    #[default]
    Plain,
    /// Fail the block
    Error,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Abort the document at the first failing block
    #[default]
    FailFast,
    /// Render every block and report all failures together
    Collect,
}

impl HighlightConfig {
    /// Validate the configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.theme.trim().is_empty() {
            anyhow::bail!("Theme name cannot be empty");
        }

        for (key, dir) in [("theme-dir", &self.theme_dir), ("syntax-dir", &self.syntax_dir)] {
            if let Some(dir) = dir {
                if !dir.is_dir() {
                    anyhow::bail!("{} is not a directory: {}", key, dir.display());
                }
            }
        }

        Ok(())
    }

    /// Parse configuration from mdbook PreprocessorContext and expand environment variables
    ///
    /// Relative directories are resolved against the book root.
    pub fn from_preprocessor_context(
        ctx: &mdbook::preprocess::PreprocessorContext,
    ) -> Result<Self> {
        let config: HighlightConfig =
            if let Some(config_value) = ctx.config.get("preprocessor.highlight") {
                config_value
                    .clone()
                    .try_into()
                    .context("Invalid [preprocessor.highlight] configuration")?
            } else {
                Self::default()
            };

        config.resolve(&ctx.root)
    }

    /// Parse configuration from a standalone TOML file.
    ///
    /// Relative directories are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: HighlightConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config
            .resolve(base)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Load configuration for the standalone renderer.
    ///
    /// Uses `explicit` when given, otherwise the user config file if one
    /// exists, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match user_config_path() {
            Some(path) if path.is_file() => {
                log::info!("Using configuration from {}", path.display());
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    fn resolve(mut self, base: &Path) -> Result<Self> {
        for dir in [&mut self.theme_dir, &mut self.syntax_dir] {
            if let Some(path) = dir.as_mut() {
                let expanded = PathBuf::from(expand_env_vars(&path.to_string_lossy()));
                *path = if expanded.is_relative() {
                    base.join(expanded)
                } else {
                    expanded
                };
            }
        }

        self.validate()?;
        Ok(self)
    }
}

/// Get the user configuration file path
fn user_config_path() -> Option<PathBuf> {
    // Check for XDG_CONFIG_HOME environment variable first (respects XDG standard on all platforms)
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("mdbook-highlight")
                .join("config.toml"),
        );
    }

    // Fall back to platform-specific defaults via directories crate
    ProjectDirs::from("", "", "mdbook-highlight").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Expand environment variables in a string
/// Supports ${VAR_NAME} syntax
/// This function processes the string in a single pass to avoid re-processing expanded values
fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_name = String::new();
            let mut found_close = false;

            for ch in chars.by_ref() {
                if ch == '}' {
                    found_close = true;
                    break;
                }
                var_name.push(ch);
            }

            if found_close {
                match env::var(&var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => {
                        log::warn!(
                            "Environment variable '{}' not found, leaving unexpanded",
                            var_name
                        );
                        result.push_str("${");
                        result.push_str(&var_name);
                        result.push('}');
                    }
                }
            } else {
                // No closing brace found, treat as literal
                result.push_str("${");
                result.push_str(&var_name);
            }
        } else {
            result.push(ch);
        }
    }

    result
}
