//! HTML serialization for `inner_html` / `outer_html`.

use crate::Document;
use crate::NodeData;
use crate::NodeId;

pub(crate) fn write_node(document: &Document, node: NodeId, out: &mut String) {
    match document.data(node) {
        Some(NodeData::Text(text)) => {
            let raw = document
                .parent(node)
                .and_then(|parent| document.tag_name(parent))
                .is_some_and(is_raw_text_tag);
            if raw {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        Some(NodeData::Element(element)) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');

            if is_void(&element.tag) {
                return;
            }

            for child in document.children(node) {
                write_node(document, *child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
        Some(NodeData::Document) => {
            for child in document.children(node) {
                write_node(document, *child, out);
            }
        }
        None => {}
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

pub fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

pub fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}
