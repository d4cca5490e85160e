//! Conversion of source rich text into target wiki notation.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::config::TextFormatting;

/// Hook converting a source text field into target markup.
pub trait RichText {
    fn convert(&self, text: &str) -> String;
}

/// Default converter from the configured source dialect to wiki notation.
#[derive(Debug, Clone, Copy)]
pub struct WikiConverter {
    formatting: TextFormatting,
}

impl WikiConverter {
    pub fn new(formatting: TextFormatting) -> Self {
        Self { formatting }
    }
}

impl RichText for WikiConverter {
    fn convert(&self, text: &str) -> String {
        match self.formatting {
            TextFormatting::None => text.to_string(),
            TextFormatting::Textile => textile_to_wiki(text),
            TextFormatting::Markdown => markdown_to_wiki(text),
        }
    }
}

/// Textile and wiki notation share headings, emphasis and lists; only code
/// markup differs.
fn textile_to_wiki(text: &str) -> String {
    text.lines()
        .map(|line| match line.trim() {
            "<pre>" | "</pre>" => "{noformat}".to_string(),
            _ => inline_code(line),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_code(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '@' && opens_code(&chars, i) {
            let close = (i + 2..chars.len()).find(|&j| chars[j] == '@' && closes_code(&chars, j));
            if let Some(close) = close {
                out.push_str("{{");
                out.extend(&chars[i + 1..close]);
                out.push_str("}}");
                i = close + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn opens_code(chars: &[char], at: usize) -> bool {
    let before_ok = at == 0 || chars[at - 1].is_whitespace() || chars[at - 1] == '(';
    let after_ok = chars.get(at + 1).is_some_and(|c| !c.is_whitespace());
    before_ok && after_ok
}

fn closes_code(chars: &[char], at: usize) -> bool {
    !chars[at - 1].is_whitespace()
        && chars
            .get(at + 1)
            .is_none_or(|c| c.is_whitespace() || ".,;:!?)".contains(*c))
}

fn markdown_to_wiki(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut lists: Vec<char> = Vec::new();
    let mut links: Vec<String> = Vec::new();
    let mut in_image = false;
    let mut in_table_head = false;

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    for event in Parser::new_ext(text, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                out.push_str(&format!("h{}. ", level as usize))
            }
            Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Paragraph) => {
                if lists.is_empty() {
                    out.push_str("\n\n");
                }
            }
            Event::Start(Tag::Emphasis) | Event::End(TagEnd::Emphasis) => out.push('_'),
            Event::Start(Tag::Strong) | Event::End(TagEnd::Strong) => out.push('*'),
            Event::Start(Tag::Strikethrough) | Event::End(TagEnd::Strikethrough) => out.push('-'),
            Event::Start(Tag::BlockQuote(_)) => out.push_str("{quote}\n"),
            Event::End(TagEnd::BlockQuote(_)) => {
                trim_trailing_newlines(&mut out);
                out.push_str("\n{quote}\n\n");
            }
            Event::Start(Tag::CodeBlock(kind)) => match kind {
                CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                    out.push_str(&format!("{{code:{lang}}}\n"))
                }
                _ => out.push_str("{code}\n"),
            },
            Event::End(TagEnd::CodeBlock) => out.push_str("{code}\n\n"),
            Event::Start(Tag::List(start)) => {
                if !lists.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                lists.push(if start.is_some() { '#' } else { '*' });
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
                if lists.is_empty() {
                    out.push('\n');
                }
            }
            Event::Start(Tag::Item) => {
                out.extend(lists.iter());
                out.push(' ');
            }
            Event::End(TagEnd::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                out.push('[');
                links.push(dest_url.to_string());
            }
            Event::End(TagEnd::Link) => {
                let url = links.pop().unwrap_or_default();
                out.push_str(&format!("|{url}]"));
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                out.push_str(&format!("!{dest_url}!"));
                in_image = true;
            }
            Event::End(TagEnd::Image) => in_image = false,
            Event::Start(Tag::TableHead) => in_table_head = true,
            Event::End(TagEnd::TableHead) => {
                out.push_str("||\n");
                in_table_head = false;
            }
            Event::Start(Tag::TableCell) => out.push_str(if in_table_head { "||" } else { "|" }),
            Event::End(TagEnd::TableRow) => out.push_str("|\n"),
            Event::End(TagEnd::Table) => out.push('\n'),
            Event::Text(text) if !in_image => out.push_str(&text),
            Event::Code(code) => out.push_str(&format!("{{{{{code}}}}}")),
            Event::Html(html) | Event::InlineHtml(html) => out.push_str(&html),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => out.push_str("----\n\n"),
            _ => {}
        }
    }

    out.trim_end().to_string()
}

fn trim_trailing_newlines(out: &mut String) {
    while out.ends_with('\n') {
        out.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(formatting: TextFormatting, text: &str) -> String {
        WikiConverter::new(formatting).convert(text)
    }

    #[test]
    fn none_passes_text_through() {
        assert_eq!(convert(TextFormatting::None, "**as is**"), "**as is**");
    }

    #[test]
    fn markdown_blocks_become_wiki_notation() {
        let wiki = convert(
            TextFormatting::Markdown,
            "# Title\n\nSome **bold** and `code`.\n\n- a\n- b\n",
        );
        assert_eq!(wiki, "h1. Title\n\nSome *bold* and {{code}}.\n\n* a\n* b");
    }

    #[test]
    fn markdown_links_and_ordered_lists() {
        let wiki = convert(
            TextFormatting::Markdown,
            "See [site](http://x.y)\n\n1. one\n2. two\n",
        );
        assert_eq!(wiki, "See [site|http://x.y]\n\n# one\n# two");
    }

    #[test]
    fn markdown_fenced_code_keeps_language() {
        let wiki = convert(TextFormatting::Markdown, "```rust\nfn main() {}\n```\n");
        assert_eq!(wiki, "{code:rust}\nfn main() {}\n{code}");
    }

    #[test]
    fn textile_rewrites_code_markup_only() {
        let wiki = convert(
            TextFormatting::Textile,
            "h2. Notes\nUse @foo()@ here, mail a@b.com\n<pre>\nraw\n</pre>",
        );
        assert_eq!(
            wiki,
            "h2. Notes\nUse {{foo()}} here, mail a@b.com\n{noformat}\nraw\n{noformat}"
        );
    }
}
