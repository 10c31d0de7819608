//! Fenced code block extraction from model replies

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

/// Collect the contents of every fenced code block in `text`, in document
/// order, joined by newlines. The fence language tag is dropped. Indented
/// blocks and inline code are ignored. Returns an empty string when the
/// text has no fenced blocks.
pub fn extract_code_blocks(text: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                current = Some(String::new());
            }
            Event::Text(chunk) => {
                if let Some(block) = current.as_mut() {
                    block.push_str(&chunk);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block.trim_end_matches('\n').to_string());
                }
            }
            _ => {}
        }
    }

    blocks.join("\n")
}
