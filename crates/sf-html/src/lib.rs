//! HTML tokenization and parsing boundaries.
//!
//! The parser is deliberately forgiving: unmatched end tags are dropped, unclosed
//! elements are closed at end of input, and `li`/`option`/`p` close an open sibling of
//! the same kind, which covers the markup storefront sections render.

use sf_dom::Document;
use sf_dom::NodeId;
use sf_dom::is_raw_text_tag;
use sf_dom::is_void;

/// Parses raw HTML into a DOM document.
#[derive(Debug, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn parse(&self, input: &str) -> Document {
        let mut document = Document::new();
        let root = document.root();
        build_tree(&mut document, root, tokenize(input));
        document
    }

    /// Parses `input` as children of a fresh detached `template` element in `document`.
    pub fn parse_fragment_into(&self, document: &mut Document, input: &str) -> NodeId {
        let container = document.create_element("template");
        build_tree(document, container, tokenize(input));
        container
    }
}

/// Convenience wrapper around [`HtmlParser::parse`].
pub fn parse_document(input: &str) -> Document {
    HtmlParser.parse(input)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let bytes = source.as_bytes();
    let mut idx = 0_usize;

    while idx < bytes.len() {
        if starts_with(bytes, idx, b"<!--") {
            idx = skip_comment(bytes, idx);
            continue;
        }

        if bytes[idx] == b'<' {
            if starts_with(bytes, idx, b"</") {
                if let Some((token, next)) = parse_end_tag(bytes, idx) {
                    out.push(token);
                    idx = next;
                    continue;
                }
            } else if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
                idx = skip_to_gt(bytes, idx.saturating_add(2));
                continue;
            } else if let Some((token, next)) = parse_start_tag(bytes, idx) {
                let raw_text_tag = match &token {
                    Token::Start {
                        name, self_closing, ..
                    } if !*self_closing && is_raw_text_tag(name) => Some(name.clone()),
                    _ => None,
                };

                out.push(token);
                idx = next;

                if let Some(tag_name) = raw_text_tag {
                    let (raw_text, closing_end) = read_raw_text_until_end_tag(source, idx, &tag_name);
                    if !raw_text.is_empty() {
                        out.push(Token::Text(raw_text.to_owned()));
                    }
                    out.push(Token::End { name: tag_name });
                    idx = closing_end;
                }

                continue;
            }
        }

        let next = find_byte(bytes, idx.saturating_add(1), b'<').unwrap_or(bytes.len());
        let text = &source[idx..next];
        if !text.is_empty() {
            out.push(Token::Text(decode_entities(text)));
        }
        idx = next;
    }

    out
}

fn build_tree(document: &mut Document, container: NodeId, tokens: Vec<Token>) {
    let mut stack: Vec<NodeId> = vec![container];

    for token in tokens {
        match token {
            Token::Text(text) => {
                let parent = current(&stack, container);
                // Whitespace between block tags carries no content worth keeping.
                if text.trim().is_empty() && !keeps_whitespace(document, parent) {
                    continue;
                }
                document.append_new_text(parent, &text);
            }
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                close_implied_sibling(document, &mut stack, &name);

                let parent = current(&stack, container);
                let node = document.append_new_element(parent, &name, attrs);

                if !self_closing && !is_void(&name) {
                    stack.push(node);
                }
            }
            Token::End { name } => {
                let open_at = stack
                    .iter()
                    .skip(1)
                    .rposition(|node| document.tag_name(*node) == Some(name.as_str()));
                if let Some(position) = open_at {
                    stack.truncate(position + 1);
                }
            }
        }
    }
}

fn current(stack: &[NodeId], container: NodeId) -> NodeId {
    stack.last().copied().unwrap_or(container)
}

fn close_implied_sibling(document: &Document, stack: &mut Vec<NodeId>, incoming: &str) {
    if !matches!(incoming, "li" | "option" | "p") {
        return;
    }
    if stack.len() > 1 && document.tag_name(current(stack, stack[0])) == Some(incoming) {
        stack.pop();
    }
}

fn keeps_whitespace(document: &Document, parent: NodeId) -> bool {
    matches!(
        document.tag_name(parent),
        Some("pre" | "textarea" | "span" | "a" | "label" | "button" | "p" | "strong" | "em")
    )
}

fn parse_start_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = start.saturating_add(1);
    let name_start = idx;
    while idx < bytes.len() && is_tag_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    if idx == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        idx = skip_spaces(bytes, idx);
        if idx >= bytes.len() {
            return None;
        }

        if bytes[idx] == b'>' {
            idx = idx.saturating_add(1);
            break;
        }

        if bytes[idx] == b'/' {
            self_closing = true;
            idx = skip_spaces(bytes, idx.saturating_add(1));
            if bytes.get(idx).copied() == Some(b'>') {
                idx = idx.saturating_add(1);
                break;
            }
            continue;
        }
        self_closing = false;

        let attr_start = idx;
        while idx < bytes.len()
            && !bytes[idx].is_ascii_whitespace()
            && !matches!(bytes[idx], b'=' | b'>' | b'/')
        {
            idx = idx.saturating_add(1);
        }
        if idx == attr_start {
            idx = idx.saturating_add(1);
            continue;
        }

        let attr_name = String::from_utf8_lossy(&bytes[attr_start..idx]).to_ascii_lowercase();
        idx = skip_spaces(bytes, idx);

        let mut value = String::new();
        if bytes.get(idx).copied() == Some(b'=') {
            idx = skip_spaces(bytes, idx.saturating_add(1));
            match bytes.get(idx).copied() {
                Some(quote @ (b'"' | b'\'')) => {
                    let value_start = idx.saturating_add(1);
                    let value_end = find_byte(bytes, value_start, quote).unwrap_or(bytes.len());
                    value = String::from_utf8_lossy(&bytes[value_start..value_end]).to_string();
                    idx = value_end.saturating_add(1);
                }
                _ => {
                    let value_start = idx;
                    while idx < bytes.len()
                        && !bytes[idx].is_ascii_whitespace()
                        && bytes[idx] != b'>'
                    {
                        idx = idx.saturating_add(1);
                    }
                    value = String::from_utf8_lossy(&bytes[value_start..idx]).to_string();
                }
            }
        }

        // First occurrence wins for duplicated attributes.
        if !attrs.iter().any(|(existing, _)| *existing == attr_name) {
            attrs.push((attr_name, decode_entities(&value)));
        }
    }

    Some((
        Token::Start {
            name,
            attrs,
            self_closing,
        },
        idx,
    ))
}

fn parse_end_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = skip_spaces(bytes, start.saturating_add(2));
    let name_start = idx;
    while idx < bytes.len() && is_tag_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    if idx == name_start {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let end = find_byte(bytes, idx, b'>')?;
    Some((Token::End { name }, end.saturating_add(1)))
}

fn read_raw_text_until_end_tag<'a>(input: &'a str, start: usize, tag_name: &str) -> (&'a str, usize) {
    let bytes = input.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx.saturating_add(1)).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx.saturating_add(2), tag_bytes)
            && tag_name_boundary(bytes, idx.saturating_add(2 + tag_bytes.len()))
        {
            if let Some((_, end_idx)) = parse_end_tag(bytes, idx) {
                return (&input[start..idx], end_idx);
            }
        }

        idx = idx.saturating_add(1);
    }

    (&input[start..], bytes.len())
}

fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0_usize;

    while let Some(relative) = input[cursor..].find('&') {
        let amp = cursor + relative;
        out.push_str(&input[cursor..amp]);

        let rest = &input[(amp + 1)..];
        let semi = rest
            .find(';')
            .filter(|offset| *offset <= 10)
            .map(|offset| amp + 1 + offset);
        let decoded = semi.and_then(|semi| decode_entity(&input[(amp + 1)..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                cursor = semi + 1;
            }
            None => {
                out.push('&');
                cursor = amp + 1;
            }
        }
    }

    out.push_str(&input[cursor..]);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "nbsp" => Some('\u{a0}'),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        _ => {
            if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                None
            }
        }
    }
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    find_subslice(bytes, start.saturating_add(4), b"-->")
        .map(|end| end.saturating_add(3))
        .unwrap_or(bytes.len())
}

fn skip_to_gt(bytes: &[u8], idx: usize) -> usize {
    find_byte(bytes, idx, b'>')
        .map(|end| end.saturating_add(1))
        .unwrap_or(bytes.len())
}

fn tag_name_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx).copied() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || byte == b'>' || byte == b'/',
    }
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn is_tag_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    if end > bytes.len() {
        return false;
    }

    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}
