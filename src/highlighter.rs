//! Syntax highlighting engine.
//!
//! The [`Highlighter`] trait is the black box the code block handler
//! delegates to. [`SyntectHighlighter`] is the production implementation.

use crate::config::{HighlightConfig, OutputStyle, UnknownLanguage};
use crate::error::HighlightError;
use crate::language::{LanguageRegistry, SupportedLanguage};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{
    css_for_theme_with_class_style, highlighted_html_for_string, ClassStyle,
    ClassedHTMLGenerator,
};
use syntect::parsing::SyntaxReference;
use syntect::util::LinesWithEndings;

/// Turns a code fragment into highlighted markup for a language.
///
/// Implementations must be shareable across threads: one engine serves every
/// chapter of a book.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError>;
}

impl<H: Highlighter + ?Sized> Highlighter for std::sync::Arc<H> {
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
        (**self).highlight(code, language)
    }
}

/// Highlighter backed by syntect's syntaxes and themes.
pub struct SyntectHighlighter {
    languages: LanguageRegistry,
    theme: Theme,
    style: OutputStyle,
    unknown_language: UnknownLanguage,
}

impl SyntectHighlighter {
    /// Creates a highlighter with the default theme and inline styles.
    pub fn new() -> Result<Self, HighlightError> {
        Self::from_config(&HighlightConfig::default())
    }

    /// Creates a highlighter from configuration, loading any extra themes and
    /// syntaxes it names.
    pub fn from_config(config: &HighlightConfig) -> Result<Self, HighlightError> {
        let languages = match &config.syntax_dir {
            Some(dir) => LanguageRegistry::with_extra_syntaxes(dir)?,
            None => LanguageRegistry::new(),
        };
        let mut themes = load_themes(config)?;

        let theme = themes.themes.remove(&config.theme).ok_or_else(|| {
            HighlightError::UnknownTheme {
                name: config.theme.clone(),
                available: themes.themes.keys().cloned().collect::<Vec<_>>().join(", "),
            }
        })?;

        log::debug!(
            "Highlighter ready: theme '{}', {:?} style, unknown languages {:?}",
            config.theme,
            config.style,
            config.unknown_language
        );

        Ok(Self {
            languages,
            theme,
            style: config.style,
            unknown_language: config.unknown_language,
        })
    }

    /// Returns the stylesheet for the `classed` output style.
    pub fn css(&self) -> Result<String, HighlightError> {
        Ok(css_for_theme_with_class_style(&self.theme, ClassStyle::Spaced)?)
    }

    pub fn supported_languages(&self) -> Vec<SupportedLanguage> {
        self.languages.supported_languages()
    }

    fn resolve(&self, language: &str) -> Result<&SyntaxReference, HighlightError> {
        match self.languages.find_syntax(language) {
            Some(syntax) => Ok(syntax),
            None => match self.unknown_language {
                UnknownLanguage::Plain => {
                    log::warn!(
                        "Unknown language '{}', highlighting as plain text",
                        language
                    );
                    Ok(self.languages.plain_text())
                }
                UnknownLanguage::Error => {
                    Err(HighlightError::UnknownLanguage(language.to_string()))
                }
            },
        }
    }

    /// Classed markup is a bare `<pre>` with the tag in `data-lang`. There is
    /// no `<code>` element, so mdBook's highlight.js leaves syntect's scope
    /// classes alone.
    fn classed_html(
        &self,
        code: &str,
        language: &str,
        syntax: &SyntaxReference,
    ) -> Result<String, HighlightError> {
        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            self.languages.syntax_set(),
            ClassStyle::Spaced,
        );
        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }

        Ok(format!(
            "<pre class=\"code\" data-lang=\"{}\">{}</pre>\n",
            escape_attribute(language),
            generator.finalize()
        ))
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
        let syntax = self.resolve(language)?;

        match self.style {
            OutputStyle::Inline => Ok(highlighted_html_for_string(
                code,
                self.languages.syntax_set(),
                syntax,
                &self.theme,
            )?),
            OutputStyle::Classed => self.classed_html(code, language, syntax),
        }
    }
}

/// Lists every theme name available under `config`, sorted.
pub fn available_themes(config: &HighlightConfig) -> Result<Vec<String>, HighlightError> {
    // BTreeMap keys are already sorted
    Ok(load_themes(config)?.themes.into_keys().collect())
}

fn load_themes(config: &HighlightConfig) -> Result<ThemeSet, HighlightError> {
    let mut themes = ThemeSet::load_defaults();
    if let Some(dir) = &config.theme_dir {
        themes
            .add_from_folder(dir)
            .map_err(|source| HighlightError::LoadThemes {
                path: dir.clone(),
                source,
            })?;
        log::debug!("Loaded extra themes from {}", dir.display());
    }
    Ok(themes)
}

fn escape_attribute(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.'))
        .collect()
}
