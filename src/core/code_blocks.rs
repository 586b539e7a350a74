//! Locates fenced code blocks in a model reply so they can be saved as
//! snippets.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

/// Language tag used when a fence has no info string.
pub const PLAIN_LANGUAGE: &str = "text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

/// Extract fenced and indented code blocks from markdown, in document order.
/// Trailing newlines inside a block are trimmed.
pub fn extract_code_blocks(markdown: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(|lang| lang.split(',').next().unwrap_or(lang).to_string())
                        .filter(|lang| !lang.is_empty())
                        .unwrap_or_else(|| PLAIN_LANGUAGE.to_string()),
                    CodeBlockKind::Indented => PLAIN_LANGUAGE.to_string(),
                };
                current = Some(CodeBlock {
                    language,
                    code: String::new(),
                });
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut block) = current.take() {
                    let trimmed_len = block.code.trim_end_matches('\n').len();
                    block.code.truncate(trimmed_len);
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    blocks
}
