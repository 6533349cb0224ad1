use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::plugins::syntect::SyntectAdapter;
use comrak::{Arena, ComrakOptions, ComrakPlugins, format_html_with_plugins, parse_document};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};

const CODE_THEME: &str = "base16-ocean.dark";

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(|| {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.footnotes = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options.extension.autolink = true;
    options
});

static HIGHLIGHTER: Lazy<SyntectAdapter> = Lazy::new(|| SyntectAdapter::new(Some(CODE_THEME)));

/// Stable identity of a fenced code block.
///
/// Derived from the block's language and body, so the same block keeps its id
/// while the document around it grows.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(String);

impl BlockId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CodeBlock {
    pub id: BlockId,
    pub language: Option<String>,
    pub code: String,
    /// Syntax highlighted `<pre>` element.
    pub highlighted: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    Code(CodeBlock),
    Quote(Vec<Block>),
    List {
        ordered: bool,
        start: usize,
        items: Vec<ListItem>,
    },
    Table {
        head: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    Rule,
    Footnote {
        label: String,
        content: Vec<Block>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    /// `Some(checked)` for task list items.
    pub task: Option<bool>,
    pub content: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
    Text(String),
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link { href: String, content: Vec<Inline> },
    Image { src: String, alt: String },
    FootnoteRef(String),
    SoftBreak,
    LineBreak,
}

/// Parses `markdown` into the element tree the chat views mount.
pub fn render(markdown: &str) -> Vec<Block> {
    if markdown.trim().is_empty() {
        return Vec::new();
    }
    let arena = Arena::new();
    let root = parse_document(&arena, markdown, &MARKDOWN_OPTIONS);
    let mut builder = TreeBuilder::default();
    builder.blocks(root)
}

#[derive(Default)]
struct TreeBuilder {
    code_occurrences: HashMap<u64, usize>,
}

impl TreeBuilder {
    fn blocks<'a>(&mut self, parent: &'a AstNode<'a>) -> Vec<Block> {
        parent
            .children()
            .flat_map(|child| self.block(child))
            .collect()
    }

    fn block<'a>(&mut self, node: &'a AstNode<'a>) -> Vec<Block> {
        let value = node.data.borrow().value.clone();
        let block = match value {
            NodeValue::Heading(heading) => Block::Heading {
                level: heading.level,
                content: inlines(node),
            },
            NodeValue::Paragraph => Block::Paragraph(inlines(node)),
            NodeValue::CodeBlock(code) => {
                Block::Code(self.code_block(node, &code.info, code.literal))
            }
            NodeValue::BlockQuote => Block::Quote(self.blocks(node)),
            NodeValue::List(list) => Block::List {
                ordered: list.list_type == ListType::Ordered,
                start: list.start,
                items: node.children().map(|item| self.list_item(item)).collect(),
            },
            NodeValue::Table(..) => self.table(node),
            NodeValue::ThematicBreak => Block::Rule,
            NodeValue::HtmlBlock(html) => Block::Paragraph(vec![Inline::Text(html.literal)]),
            NodeValue::FootnoteDefinition(definition) => Block::Footnote {
                label: definition.name,
                content: self.blocks(node),
            },
            _ => return self.blocks(node),
        };
        vec![block]
    }

    fn list_item<'a>(&mut self, item: &'a AstNode<'a>) -> ListItem {
        let task = match item.data.borrow().value {
            NodeValue::TaskItem(mark) => Some(mark.is_some()),
            _ => None,
        };
        ListItem {
            task,
            content: self.blocks(item),
        }
    }

    fn code_block<'a>(&mut self, node: &'a AstNode<'a>, info: &str, code: String) -> CodeBlock {
        let language = info
            .split_whitespace()
            .next()
            .filter(|lang| !lang.is_empty())
            .map(str::to_string);

        let mut hasher = DefaultHasher::new();
        language.hash(&mut hasher);
        code.hash(&mut hasher);
        let digest = hasher.finish();
        let occurrence = self.code_occurrences.entry(digest).or_insert(0);
        let id = BlockId(format!("code-{digest:016x}-{occurrence}"));
        *occurrence += 1;

        let highlighted = highlight(node).unwrap_or_else(|| {
            format!("<pre class=\"md-pre\"><code>{}</code></pre>", escape(&code))
        });

        CodeBlock {
            id,
            language,
            code,
            highlighted,
        }
    }

    fn table<'a>(&self, node: &'a AstNode<'a>) -> Block {
        let mut head = Vec::new();
        let mut rows = Vec::new();
        for row in node.children() {
            let is_header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
            let cells: Vec<Vec<Inline>> = row.children().map(inlines).collect();
            if is_header {
                head = cells;
            } else {
                rows.push(cells);
            }
        }
        Block::Table { head, rows }
    }
}

fn highlight<'a>(node: &'a AstNode<'a>) -> Option<String> {
    let mut plugins = ComrakPlugins::default();
    plugins.render.codefence_syntax_highlighter = Some(&*HIGHLIGHTER);
    let mut output = Vec::new();
    if let Err(err) = format_html_with_plugins(node, &MARKDOWN_OPTIONS, &mut output, &plugins) {
        tracing::warn!("code highlighting failed: {}", err);
        return None;
    }
    String::from_utf8(output).ok()
}

fn inlines<'a>(parent: &'a AstNode<'a>) -> Vec<Inline> {
    let mut out = Vec::new();
    for child in parent.children() {
        push_inline(child, &mut out);
    }
    out
}

fn push_inline<'a>(node: &'a AstNode<'a>, out: &mut Vec<Inline>) {
    let value = node.data.borrow().value.clone();
    let inline = match value {
        NodeValue::Text(text) => Inline::Text(text),
        NodeValue::Code(code) => Inline::Code(code.literal),
        NodeValue::Emph => Inline::Emphasis(inlines(node)),
        NodeValue::Strong => Inline::Strong(inlines(node)),
        NodeValue::Strikethrough => Inline::Strikethrough(inlines(node)),
        NodeValue::Link(link) if is_safe_url(&link.url) => Inline::Link {
            href: link.url,
            content: inlines(node),
        },
        NodeValue::Image(image) if is_safe_url(&image.url) => Inline::Image {
            src: image.url,
            alt: plain_text(&inlines(node)),
        },
        // Unsafe image sources degrade to their alt text.
        NodeValue::Image(_) => Inline::Text(plain_text(&inlines(node))),
        NodeValue::FootnoteReference(reference) => Inline::FootnoteRef(reference.name),
        NodeValue::SoftBreak => Inline::SoftBreak,
        NodeValue::LineBreak => Inline::LineBreak,
        NodeValue::HtmlInline(html) => Inline::Text(html),
        // Includes links with an unsafe target: only their text survives.
        _ => {
            for child in node.children() {
                push_inline(child, out);
            }
            return;
        }
    };
    out.push(inline);
}

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Relative URLs and http(s)/mailto targets. Anything else (`javascript:`,
/// `data:`, `vbscript:`, `file:`) is never emitted into markup.
fn is_safe_url(url: &str) -> bool {
    let cleaned: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let scheme_end = cleaned.find(|c: char| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(end) if cleaned[end..].starts_with(':') => {
            let scheme = cleaned[..end].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

fn plain_text(content: &[Inline]) -> String {
    let mut out = String::new();
    for item in content {
        match item {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strikethrough(children)
            | Inline::Link {
                content: children, ..
            } => out.push_str(&plain_text(children)),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::FootnoteRef(label) => {
                let _ = write!(out, "[{label}]");
            }
            Inline::SoftBreak | Inline::LineBreak => out.push(' '),
        }
    }
    out
}

// ---------------
// HTML mapping
// ---------------

pub fn to_html(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        block.write_html(&mut out);
    }
    out
}

impl Block {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Block::Heading { level, content } => {
                let _ = write!(out, "<h{level} class=\"md-h{level}\">");
                write_inlines(content, out);
                let _ = write!(out, "</h{level}>");
            }
            Block::Paragraph(content) => {
                out.push_str("<p class=\"md-p\">");
                write_inlines(content, out);
                out.push_str("</p>");
            }
            Block::Code(code) => {
                let _ = write!(out, "<div class=\"md-code\" data-block-id=\"{}\">", code.id);
                out.push_str("<div class=\"md-code-header\">");
                let _ = write!(
                    out,
                    "<span class=\"md-code-lang\">{}</span>",
                    escape(code.language.as_deref().unwrap_or("text"))
                );
                let _ = write!(
                    out,
                    "<button class=\"md-copy\" data-copy-target=\"{}\">Copy</button>",
                    code.id
                );
                out.push_str("</div>");
                out.push_str(&code.highlighted);
                out.push_str("</div>");
            }
            Block::Quote(children) => {
                out.push_str("<blockquote class=\"md-quote\">");
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</blockquote>");
            }
            Block::List {
                ordered,
                start,
                items,
            } => {
                if *ordered {
                    let _ = write!(out, "<ol class=\"md-ol\" start=\"{start}\">");
                } else {
                    out.push_str("<ul class=\"md-ul\">");
                }
                for item in items {
                    match item.task {
                        Some(checked) => {
                            out.push_str("<li class=\"md-task\"><input type=\"checkbox\" disabled");
                            if checked {
                                out.push_str(" checked");
                            }
                            out.push('>');
                        }
                        None => out.push_str("<li>"),
                    }
                    for child in &item.content {
                        child.write_html(out);
                    }
                    out.push_str("</li>");
                }
                out.push_str(if *ordered { "</ol>" } else { "</ul>" });
            }
            Block::Table { head, rows } => {
                out.push_str("<div class=\"md-table-wrap\"><table class=\"md-table\">");
                if !head.is_empty() {
                    out.push_str("<thead><tr>");
                    for cell in head {
                        out.push_str("<th>");
                        write_inlines(cell, out);
                        out.push_str("</th>");
                    }
                    out.push_str("</tr></thead>");
                }
                out.push_str("<tbody>");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        out.push_str("<td>");
                        write_inlines(cell, out);
                        out.push_str("</td>");
                    }
                    out.push_str("</tr>");
                }
                out.push_str("</tbody></table></div>");
            }
            Block::Rule => out.push_str("<hr class=\"md-hr\">"),
            Block::Footnote { label, content } => {
                let _ = write!(
                    out,
                    "<div class=\"md-footnote\"><span class=\"md-footnote-label\">{}.</span>",
                    escape(label)
                );
                for child in content {
                    child.write_html(out);
                }
                out.push_str("</div>");
            }
        }
    }
}

fn write_inlines(content: &[Inline], out: &mut String) {
    for item in content {
        match item {
            Inline::Text(text) => out.push_str(&escape(text)),
            Inline::Code(code) => {
                let _ = write!(out, "<code class=\"md-inline-code\">{}</code>", escape(code));
            }
            Inline::Emphasis(children) => wrap("em", children, out),
            Inline::Strong(children) => wrap("strong", children, out),
            Inline::Strikethrough(children) => wrap("del", children, out),
            Inline::Link { href, content } => {
                let _ = write!(
                    out,
                    "<a class=\"md-link\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">",
                    escape(href)
                );
                write_inlines(content, out);
                out.push_str("</a>");
            }
            Inline::Image { src, alt } => {
                let _ = write!(
                    out,
                    "<img class=\"md-img\" src=\"{}\" alt=\"{}\">",
                    escape(src),
                    escape(alt)
                );
            }
            Inline::FootnoteRef(label) => {
                let _ = write!(out, "<sup class=\"md-footnote-ref\">{}</sup>", escape(label));
            }
            Inline::SoftBreak => out.push('\n'),
            Inline::LineBreak => out.push_str("<br>"),
        }
    }
}

fn wrap(tag: &str, children: &[Inline], out: &mut String) {
    let _ = write!(out, "<{tag}>");
    write_inlines(children, out);
    let _ = write!(out, "</{tag}>");
}

pub(crate) fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
