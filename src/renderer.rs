use crate::code_block::{parse_fence_info, CodeBlockHandler};
use crate::config::ErrorPolicy;
use crate::error::{BlockFailure, DocumentError, RenderError};
use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::collections::BTreeMap;
use std::ops::Range;

/// Maximum size of a single code block in bytes (1MB)
pub const MAX_CODE_BLOCK_SIZE: usize = 1_000_000;

/// Maximum number of code blocks per document
pub const MAX_BLOCKS_PER_DOCUMENT: usize = 1000;

/// A code block found in a Markdown document.
///
/// Both fenced and indented blocks are collected. Indented blocks never carry
/// a language tag.
///
/// ````markdown
/// ```python
/// print(1)
/// ```
/// ````
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// The language tag from the fence info string (e.g., "python" for "python,ignore")
    pub language: Option<String>,
    /// The literal code content
    pub code: String,
    /// Byte range of the whole block, fences included, in the source
    pub range: Range<usize>,
    /// Whether the block is an indented (unfenced) code block
    pub indented: bool,
    /// Byte offset on the opening line where the enclosing block quote or
    /// list item prefix ends. Fence indentation past it belongs to the block.
    pub content_start: usize,
}

/// Open container block, innermost last.
enum Container {
    Quote,
    /// List item with the column its content starts at
    Item(usize),
}

/// Output of a successful render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub output: String,
    /// Number of rendered blocks per language tag
    pub blocks: BTreeMap<String, usize>,
}

impl Rendered {
    pub fn total_blocks(&self) -> usize {
        self.blocks.values().sum()
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Extracts code blocks from markdown content using pulldown-cmark.
///
/// Blocks are returned in document order.
pub fn extract_code_blocks(content: &str) -> Vec<CodeBlock> {
    let parser = Parser::new_ext(content, markdown_options()).into_offset_iter();
    let mut code_blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;
    let mut containers = Vec::new();

    for (event, range) in parser {
        match event {
            Event::Start(Tag::BlockQuote { .. }) => containers.push(Container::Quote),
            Event::Start(Tag::Item) => {
                containers.push(Container::Item(item_content_column(content, range.start)))
            }
            Event::End(TagEnd::BlockQuote { .. }) | Event::End(TagEnd::Item) => {
                containers.pop();
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                let (language, indented) = match kind {
                    CodeBlockKind::Fenced(info) => (parse_fence_info(&info).map(String::from), false),
                    CodeBlockKind::Indented => (None, true),
                };

                let content_start = container_end(content, range.start, containers.last());
                current = Some(CodeBlock {
                    language,
                    code: String::new(),
                    range,
                    indented,
                    content_start,
                });
            }

            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    code_blocks.push(block);
                }
            }

            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.code.push_str(&text);
                }
            }

            _ => {}
        }
    }

    code_blocks
}

fn line_start(content: &str, offset: usize) -> usize {
    content[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Column where the content of the list item starting at `start` begins:
/// the marker width plus 1-4 spaces, or one space when the marker is
/// followed by a blank line or by indented code.
fn item_content_column(content: &str, start: usize) -> usize {
    let line_end = content[start..].find('\n').map_or(content.len(), |i| start + i);
    let line = &content[start..line_end];
    let indent = line.len() - line.trim_start_matches(' ').len();
    let marker = &line[indent..];
    let marker_len = match marker.bytes().next() {
        Some(b'-' | b'*' | b'+') => 1,
        _ => marker.bytes().take_while(u8::is_ascii_digit).count() + 1,
    };
    let rest = marker.get(marker_len..).unwrap_or("");
    let spaces = rest.len() - rest.trim_start_matches(' ').len();
    let padding = if spaces == rest.len() || spaces > 4 {
        1
    } else {
        spaces
    };

    start - line_start(content, start) + indent + marker_len + padding
}

/// Byte offset on the line of `block_start` where the innermost container's
/// prefix ends.
fn container_end(content: &str, block_start: usize, container: Option<&Container>) -> usize {
    let line = line_start(content, block_start);
    let prefix = &content[line..block_start];
    let column = match container {
        None => 0,
        Some(Container::Item(column)) => *column,
        Some(Container::Quote) => prefix.rfind('>').map_or(0, |i| {
            if prefix[i + 1..].starts_with(' ') {
                i + 2
            } else {
                i + 1
            }
        }),
    };

    let end = line + column.min(prefix.len());
    if content.is_char_boundary(end) {
        end
    } else {
        block_start
    }
}

/// Converts Markdown to HTML, handing every code block to a [`CodeBlockHandler`].
///
/// The handler is injected, so any implementation of the trait can take over
/// code block rendering without touching the rest of the pipeline.
///
/// # Example
///
/// ```
/// use mdbook_highlight::{HighlightingCodeBlock, MarkdownRenderer, SyntectHighlighter};
///
/// let handler = HighlightingCodeBlock::new(SyntectHighlighter::new().unwrap());
/// let renderer = MarkdownRenderer::new(handler);
///
/// let rendered = renderer.render_html("# Demo\n\n```ruby\nputs 1\n```\n").unwrap();
/// assert!(rendered.output.contains("<h1>Demo</h1>"));
/// assert_eq!(rendered.blocks["ruby"], 1);
/// ```
pub struct MarkdownRenderer<C> {
    handler: C,
    policy: ErrorPolicy,
}

impl<C: CodeBlockHandler> MarkdownRenderer<C> {
    /// Creates a renderer that stops at the first failing block.
    pub fn new(handler: C) -> Self {
        Self {
            handler,
            policy: ErrorPolicy::FailFast,
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn handler(&self) -> &C {
        &self.handler
    }

    /// Renders a Markdown document to HTML.
    pub fn render_html(&self, markdown: &str) -> Result<Rendered, DocumentError> {
        let code_blocks = extract_code_blocks(markdown);
        let (markup, blocks) = self.render_blocks(markdown, &code_blocks)?;
        let mut markup = markup.into_iter();

        let mut events = Vec::new();
        let mut in_code_block = false;
        for event in Parser::new_ext(markdown, markdown_options()) {
            match event {
                Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    if let Some(html) = markup.next() {
                        events.push(Event::Html(html.into()));
                    }
                }
                _ if in_code_block => {}
                event => events.push(event),
            }
        }

        let mut output = String::with_capacity(markdown.len() * 2);
        html::push_html(&mut output, events.into_iter());

        Ok(Rendered { output, blocks })
    }

    /// Replaces every code block in a Markdown document with its markup,
    /// leaving the rest of the source untouched.
    ///
    /// Blocks nested in block quotes or list items repeat their container
    /// prefix, and nothing more, on every line of the markup. The fence's own
    /// indentation is dropped, so once Markdown is rendered the HTML block
    /// holds the markup byte for byte.
    pub fn highlight_blocks(&self, markdown: &str) -> Result<Rendered, DocumentError> {
        let code_blocks = extract_code_blocks(markdown);
        let (markup, blocks) = self.render_blocks(markdown, &code_blocks)?;

        let mut output = String::with_capacity(markdown.len() * 2);
        let mut cursor = 0;
        for (block, html) in code_blocks.iter().zip(markup) {
            let prefix = &markdown[line_start(markdown, block.range.start)..block.content_start];

            output.push_str(&markdown[cursor..block.content_start]);
            output.push_str(&prefix_continuation_lines(&html, &continuation_prefix(prefix)));
            if markdown[block.range.clone()].ends_with('\n') {
                output.push('\n');
            }
            cursor = block.range.end;
        }
        output.push_str(&markdown[cursor..]);

        Ok(Rendered { output, blocks })
    }

    /// Renders each block through the handler, applying limits and the error policy.
    fn render_blocks(
        &self,
        markdown: &str,
        code_blocks: &[CodeBlock],
    ) -> Result<(Vec<String>, BTreeMap<String, usize>), DocumentError> {
        if code_blocks.len() > MAX_BLOCKS_PER_DOCUMENT {
            return Err(DocumentError::TooManyBlocks {
                count: code_blocks.len(),
                limit: MAX_BLOCKS_PER_DOCUMENT,
            });
        }

        let mut markup = Vec::with_capacity(code_blocks.len());
        let mut stats: BTreeMap<String, usize> = BTreeMap::new();
        let mut failures = Vec::new();

        for (index, block) in code_blocks.iter().enumerate() {
            match self.render_block(block) {
                Ok(html) => {
                    if let Some(language) = &block.language {
                        *stats.entry(language.clone()).or_insert(0) += 1;
                    }
                    markup.push(html);
                }
                Err(error) => {
                    let failure = BlockFailure {
                        index,
                        line: line_of(markdown, block.range.start),
                        language: block.language.clone(),
                        error,
                    };
                    log::debug!("Code {}", failure);

                    failures.push(failure);
                    if self.policy == ErrorPolicy::FailFast {
                        break;
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(DocumentError::Blocks(failures));
        }

        Ok((markup, stats))
    }

    fn render_block(&self, block: &CodeBlock) -> Result<String, RenderError> {
        if block.code.len() > MAX_CODE_BLOCK_SIZE {
            return Err(RenderError::BlockTooLarge {
                size: block.code.len(),
                limit: MAX_CODE_BLOCK_SIZE,
            });
        }

        self.handler
            .render_block(&block.code, block.language.as_deref())
    }
}

/// One-based line number of a byte offset.
fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

/// Container prefix to repeat on continuation lines: block quote markers are
/// kept, list markers and other text become spaces.
fn continuation_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| if c == '>' || c == '\t' { c } else { ' ' })
        .collect()
}

fn prefix_continuation_lines(html: &str, prefix: &str) -> String {
    let html = html.trim_end_matches('\n');
    if prefix.is_empty() {
        return html.to_string();
    }

    let mut lines = html.split('\n');
    let mut result = String::with_capacity(html.len());
    if let Some(first) = lines.next() {
        result.push_str(first);
    }
    for line in lines {
        result.push('\n');
        if line.is_empty() {
            result.push_str(prefix.trim_end());
        } else {
            result.push_str(prefix);
        }
        result.push_str(line);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_block::HighlightingCodeBlock;
    use crate::error::HighlightError;
    use crate::highlighter::{Highlighter, SyntectHighlighter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeHighlighter {
        calls: AtomicUsize,
    }

    impl Highlighter for FakeHighlighter {
        fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if language == "bogus" {
                return Err(HighlightError::UnknownLanguage(language.to_string()));
            }
            Ok(format!("<pre class=\"{}\">{}</pre>\n", language, code))
        }
    }

    fn renderer() -> MarkdownRenderer<HighlightingCodeBlock<FakeHighlighter>> {
        MarkdownRenderer::new(HighlightingCodeBlock::new(FakeHighlighter::default()))
    }

    fn calls(renderer: &MarkdownRenderer<HighlightingCodeBlock<FakeHighlighter>>) -> usize {
        renderer.handler().highlighter().calls.load(Ordering::SeqCst)
    }

    #[test]
    fn test_extract_simple_code_block() {
        let markdown = r#"
# Test

```c
int main() {
    return 0;
}
```
"#;

        let blocks = extract_code_blocks(markdown);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language.as_deref(), Some("c"));
        assert!(!blocks[0].indented);
        assert!(blocks[0].code.contains("int main()"));
        assert!(markdown[blocks[0].range.clone()].starts_with("```c"));
    }

    #[test]
    fn test_extract_with_attributes_and_without_tag() {
        let markdown = "```rust,ignore\nfn f() {}\n```\n\n```\nplain\n```\n\n    indented\n";

        let blocks = extract_code_blocks(markdown);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].language.as_deref(), Some("rust"));
        assert_eq!(blocks[1].language, None);
        assert_eq!(blocks[1].code, "plain\n");
        assert_eq!(blocks[2].language, None);
        assert!(blocks[2].indented);
    }

    #[test]
    fn test_render_html_splices_markup() {
        let renderer = renderer();
        let rendered = renderer
            .render_html("Intro *text*\n\n```python\nprint(1)\n```\n\nOutro\n")
            .unwrap();

        assert!(rendered.output.contains("<p>Intro <em>text</em></p>"));
        assert!(rendered
            .output
            .contains("<pre class=\"python\">print(1)\n</pre>"));
        assert!(rendered.output.contains("<p>Outro</p>"));
        assert!(!rendered.output.contains("<code"));
        assert_eq!(rendered.blocks.get("python"), Some(&1));
    }

    #[test]
    fn test_blocks_rendered_in_document_order() {
        let renderer = renderer();
        let rendered = renderer
            .render_html("```ruby\none\n```\n\n```python\ntwo\n```\n\n```ruby\nthree\n```\n")
            .unwrap();

        let one = rendered.output.find("one").unwrap();
        let two = rendered.output.find("two").unwrap();
        let three = rendered.output.find("three").unwrap();
        assert!(one < two && two < three);
        assert_eq!(rendered.blocks.get("ruby"), Some(&2));
        assert_eq!(rendered.total_blocks(), 3);
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() {
        let renderer = renderer();
        let markdown = "```\nSELECT 1;\n```\n\n```\nSELECT 2;\n```\n\n```sql\nSELECT 3;\n```\n";

        let err = renderer.render_html(markdown).unwrap_err();
        let failures = err.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 0);
        assert_eq!(failures[0].line, 1);
        assert!(matches!(
            &failures[0].error,
            RenderError::MissingLanguageTag { code } if code == "SELECT 1;\n"
        ));
        assert_eq!(calls(&renderer), 0);
    }

    #[test]
    fn test_collect_reports_every_failure() {
        let renderer = renderer().with_policy(ErrorPolicy::Collect);
        let markdown = "```\nSELECT 1;\n```\n\n```sql\nok\n```\n\n```bogus\nfoo\n```\n";

        let err = renderer.render_html(markdown).unwrap_err();
        let failures = err.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!((failures[0].index, failures[0].line), (0, 1));
        assert_eq!((failures[1].index, failures[1].line), (2, 9));
        assert_eq!(failures[1].language.as_deref(), Some("bogus"));
        assert!(matches!(
            failures[1].error,
            RenderError::Highlight(HighlightError::UnknownLanguage(_))
        ));
        assert_eq!(calls(&renderer), 2);
    }

    #[test]
    fn test_indented_block_has_no_language() {
        let renderer = renderer();
        let err = renderer
            .render_html("Text\n\n    let x = 1;\n")
            .unwrap_err();
        assert!(matches!(
            err.failures()[0].error,
            RenderError::MissingLanguageTag { .. }
        ));
    }

    #[test]
    fn test_oversized_block_rejected() {
        let renderer = renderer();
        let markdown = format!("```c\n{}\n```\n", "x".repeat(MAX_CODE_BLOCK_SIZE + 1));

        let err = renderer.render_html(&markdown).unwrap_err();
        assert!(matches!(
            err.failures()[0].error,
            RenderError::BlockTooLarge { .. }
        ));
        assert_eq!(calls(&renderer), 0);
    }

    #[test]
    fn test_too_many_blocks_rejected() {
        let renderer = renderer();
        let markdown = "```c\nx\n```\n\n".repeat(MAX_BLOCKS_PER_DOCUMENT + 1);

        let err = renderer.highlight_blocks(&markdown).unwrap_err();
        assert!(matches!(err, DocumentError::TooManyBlocks { .. }));
        assert!(err.failures().is_empty());
    }

    #[test]
    fn test_highlight_blocks_keeps_surrounding_markdown() {
        let renderer = renderer();
        let markdown = "# Title\n\n```ruby\nputs 1\n```\n\nAfter *this*.\n";

        let rendered = renderer.highlight_blocks(markdown).unwrap();
        assert_eq!(
            rendered.output,
            "# Title\n\n<pre class=\"ruby\">puts 1\n</pre>\n\nAfter *this*.\n"
        );
    }

    #[test]
    fn test_highlight_blocks_in_block_quote() {
        let renderer = renderer();
        let markdown = "> Quote\n>\n> ```ruby\n> a\n> b\n> ```\n";

        let rendered = renderer.highlight_blocks(markdown).unwrap();
        assert_eq!(
            rendered.output,
            "> Quote\n>\n> <pre class=\"ruby\">a\n> b\n> </pre>\n"
        );
    }

    #[test]
    fn test_highlight_blocks_in_list_item() {
        let renderer = renderer();
        let markdown = "- item\n\n  ```ruby\n  a\n  b\n  ```\n";

        let rendered = renderer.highlight_blocks(markdown).unwrap();
        assert_eq!(
            rendered.output,
            "- item\n\n  <pre class=\"ruby\">a\n  b\n  </pre>\n"
        );
    }

    #[test]
    fn test_document_without_code_blocks() {
        let renderer = renderer();
        let rendered = renderer.highlight_blocks("Just text.\n").unwrap();
        assert_eq!(rendered.output, "Just text.\n");
        assert_eq!(rendered.total_blocks(), 0);
    }

    #[test]
    fn test_line_of() {
        assert_eq!(line_of("a\nb\nc", 0), 1);
        assert_eq!(line_of("a\nb\nc", 2), 2);
        assert_eq!(line_of("a\nb\nc", 4), 3);
    }

    #[test]
    fn test_continuation_prefix() {
        assert_eq!(continuation_prefix("> "), "> ");
        assert_eq!(continuation_prefix("- "), "  ");
        assert_eq!(continuation_prefix("> 1. "), ">    ");
    }

    #[test]
    fn test_container_prefix_excludes_fence_indentation() {
        let blocks = extract_code_blocks("1. item\n\n    ```ruby\n    a\n    ```\n");
        assert_eq!(blocks[0].content_start, "1. item\n\n   ".len());

        let blocks = extract_code_blocks("   ```ruby\n   a\n   ```\n");
        assert_eq!(blocks[0].content_start, 0);

        let blocks = extract_code_blocks(">  ```ruby\n>  a\n>  ```\n");
        assert_eq!(blocks[0].content_start, 2);

        let blocks = extract_code_blocks("- item\n\n      indented\n");
        assert_eq!(blocks[0].content_start, "- item\n\n  ".len());
    }

    #[test]
    fn test_item_content_column() {
        assert_eq!(item_content_column("- a", 0), 2);
        assert_eq!(item_content_column("10.  a", 0), 5);
        assert_eq!(item_content_column("-\n  a", 0), 2);
        assert_eq!(item_content_column("-      code", 0), 2);
        assert_eq!(item_content_column("> * a", 2), 4);
    }

    #[test]
    fn test_highlight_blocks_drops_fence_indentation() {
        let renderer = renderer();
        let markdown = "1. item\n\n    ```ruby\n    a\n\n    b\n    ```\n";

        let rendered = renderer.highlight_blocks(markdown).unwrap();
        assert_eq!(
            rendered.output,
            "1. item\n\n   <pre class=\"ruby\">a\n\n   b\n   </pre>\n"
        );
    }

    /// Markdown rendering of the spliced output must hand the engine's markup
    /// through untouched, wherever the fence sits.
    #[test]
    fn test_spliced_markup_survives_markdown_rendering() {
        let highlighter = SyntectHighlighter::new().unwrap();
        let expected = highlighter.highlight("a\n\nb\n", "ruby").unwrap();
        let renderer = MarkdownRenderer::new(HighlightingCodeBlock::new(highlighter));

        for markdown in [
            "1. item\n\n    ```ruby\n    a\n\n    b\n    ```\n",
            "   ```ruby\n   a\n\n   b\n   ```\n",
            "- item\n\n  ```ruby\n  a\n\n  b\n  ```\n",
            "> Quote\n>\n>   ```ruby\n>   a\n>\n>   b\n>   ```\n",
            "- > ```ruby\n  > a\n  >\n  > b\n  > ```\n",
        ] {
            let spliced = renderer.highlight_blocks(markdown).unwrap().output;
            let mut html_output = String::new();
            html::push_html(&mut html_output, Parser::new_ext(&spliced, markdown_options()));

            assert!(
                html_output.contains(&expected),
                "markup altered for {:?}:\n{}",
                markdown,
                html_output
            );
        }
    }
}
