use crate::error::HighlightError;
use std::path::Path;
use syntect::parsing::{SyntaxReference, SyntaxSet};

/// Maps a fence language tag alias to the name of a bundled syntect syntax.
///
/// Syntect already resolves file extensions and case-insensitive syntax names
/// on its own (`py`, `python`, `Rust`), so this table only covers the aliases
/// authors commonly write in fences that syntect would otherwise miss.
///
/// # Examples
///
/// ```
/// use mdbook_highlight::syntax_alias;
///
/// assert_eq!(syntax_alias("sh"), Some("Bourne Again Shell (bash)"));
/// assert_eq!(syntax_alias("C++"), Some("C++"));
/// assert_eq!(syntax_alias("python"), None);
/// ```
pub fn syntax_alias(tag: &str) -> Option<&'static str> {
    let name = match tag.to_ascii_lowercase().as_str() {
        // B
        "bash" | "sh" | "shell" | "zsh" | "console" => "Bourne Again Shell (bash)",
        "bat" | "cmd" | "dos" => "Batch File",

        // C
        "c++" | "cpp" | "cxx" | "hpp" => "C++",
        "cs" | "csharp" | "c#" => "C#",
        "clj" | "clojure" => "Clojure",

        // D
        "diff" | "patch" => "Diff",
        "dot" | "graphviz" => "Graphviz (DOT)",

        // E
        "erl" | "erlang" => "Erlang",

        // G
        "go" | "golang" => "Go",

        // H
        "hs" | "haskell" => "Haskell",

        // J
        "js" | "javascript" | "node" => "JavaScript",

        // L
        "tex" | "latex" => "LaTeX",

        // M
        "make" | "makefile" | "mk" => "Makefile",
        "md" | "markdown" => "Markdown",

        // O
        "objc" | "objective-c" => "Objective-C",
        "ml" | "ocaml" => "OCaml",

        // P
        "pl" | "perl" => "Perl",
        "text" | "txt" | "plain" | "plaintext" => "Plain Text",

        // R
        "regex" | "regexp" => "Regular Expression",
        "rb" | "ruby" => "Ruby",
        "rs" | "rust" => "Rust",
        "rst" | "restructuredtext" => "reStructuredText",

        // Y
        "yml" | "yaml" => "YAML",

        _ => return None,
    };

    Some(name)
}

/// A supported language as reported by [`LanguageRegistry::supported_languages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedLanguage {
    pub name: String,
    pub extensions: Vec<String>,
}

/// Registry of syntaxes the highlighter can resolve fence tags against.
///
/// Holds syntect's bundled syntaxes plus any extra `.sublime-syntax` files
/// loaded from a configured folder.
pub struct LanguageRegistry {
    syntax_set: SyntaxSet,
}

impl LanguageRegistry {
    /// Creates a registry with syntect's bundled syntaxes.
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Creates a registry with the bundled syntaxes plus those found in `folder`.
    pub fn with_extra_syntaxes(folder: &Path) -> Result<Self, HighlightError> {
        let mut builder = SyntaxSet::load_defaults_newlines().into_builder();
        builder
            .add_from_folder(folder, true)
            .map_err(|source| HighlightError::LoadSyntaxes {
                path: folder.to_path_buf(),
                source,
            })?;

        log::debug!("Loaded extra syntaxes from {}", folder.display());

        Ok(Self {
            syntax_set: builder.build(),
        })
    }

    pub fn syntax_set(&self) -> &SyntaxSet {
        &self.syntax_set
    }

    /// Finds the syntax for a fence language tag.
    ///
    /// Aliases are tried first, then syntect's own lookup by extension or
    /// case-insensitive name.
    pub fn find_syntax(&self, tag: &str) -> Option<&SyntaxReference> {
        let tag = tag.trim();
        if let Some(name) = syntax_alias(tag) {
            if let Some(syntax) = self.syntax_set.find_syntax_by_name(name) {
                return Some(syntax);
            }
        }

        self.syntax_set
            .find_syntax_by_token(tag)
            .or_else(|| self.syntax_set.find_syntax_by_token(&tag.to_ascii_lowercase()))
    }

    pub fn plain_text(&self) -> &SyntaxReference {
        self.syntax_set.find_syntax_plain_text()
    }

    /// Returns all known syntaxes sorted by name.
    pub fn supported_languages(&self) -> Vec<SupportedLanguage> {
        let mut languages: Vec<_> = self
            .syntax_set
            .syntaxes()
            .iter()
            .map(|syntax| SupportedLanguage {
                name: syntax.name.clone(),
                extensions: syntax.file_extensions.clone(),
            })
            .collect();
        languages.sort_by(|a, b| a.name.cmp(&b.name));
        languages
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
