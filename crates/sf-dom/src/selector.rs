//! CSS selector subset used by storefront scripts.
//!
//! Supports selector lists, descendant and child combinators, type / universal, `#id`,
//! `.class`, and `[attr]`, `[attr=value]`, `[attr*=value]`, `[attr^=value]` conditions.

use crate::Document;
use crate::NodeId;
use sf_core::SyncError;
use sf_core::SyncResult;

/// Parsed, reusable selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    // combinators[i] joins compounds[i] and compounds[i + 1].
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrCondition {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
}

impl Selector {
    pub fn parse(input: &str) -> SyncResult<Self> {
        let mut alternatives = Vec::new();
        for part in split_top_level(input, ',') {
            alternatives.push(parse_complex(part.trim(), input)?);
        }

        if alternatives.is_empty() {
            return Err(invalid(input, "empty selector"));
        }

        Ok(Self { alternatives })
    }

    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        if !document.is_element(node) {
            return false;
        }

        self.alternatives.iter().any(|complex| {
            let last = complex.compounds.len().saturating_sub(1);
            matches_at(document, node, complex, last)
        })
    }
}

fn matches_at(document: &Document, node: NodeId, complex: &ComplexSelector, index: usize) -> bool {
    if !matches_compound(document, node, &complex.compounds[index]) {
        return false;
    }
    if index == 0 {
        return true;
    }

    match complex.combinators[index - 1] {
        Combinator::Child => document
            .parent_element(node)
            .is_some_and(|parent| matches_at(document, parent, complex, index - 1)),
        Combinator::Descendant => {
            let mut current = document.parent_element(node);
            while let Some(ancestor) = current {
                if matches_at(document, ancestor, complex, index - 1) {
                    return true;
                }
                current = document.parent_element(ancestor);
            }
            false
        }
    }
}

fn matches_compound(document: &Document, node: NodeId, compound: &Compound) -> bool {
    if let Some(tag) = compound.tag.as_deref() {
        if document.tag_name(node) != Some(tag) {
            return false;
        }
    }

    if let Some(id) = compound.id.as_deref() {
        if document.attr(node, "id") != Some(id) {
            return false;
        }
    }

    if !compound
        .classes
        .iter()
        .all(|class| document.has_class(node, class))
    {
        return false;
    }

    compound.attrs.iter().all(|condition| {
        let Some(value) = document.attr(node, &condition.name) else {
            return false;
        };
        match &condition.op {
            AttrOp::Exists => true,
            AttrOp::Equals(expected) => value == expected,
            AttrOp::Contains(needle) => !needle.is_empty() && value.contains(needle.as_str()),
            AttrOp::Prefix(prefix) => !prefix.is_empty() && value.starts_with(prefix.as_str()),
        }
    })
}

fn parse_complex(input: &str, full: &str) -> SyncResult<ComplexSelector> {
    if input.is_empty() {
        return Err(invalid(full, "empty selector in list"));
    }

    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;
    let mut current = String::new();
    let mut bracket_depth = 0_u32;
    let mut quote: Option<char> = None;

    let flush = |current: &mut String,
                 compounds: &mut Vec<Compound>,
                 combinators: &mut Vec<Combinator>,
                 pending: &mut Option<Combinator>|
     -> SyncResult<()> {
        if current.is_empty() {
            return Ok(());
        }
        if !compounds.is_empty() {
            combinators.push(pending.take().unwrap_or(Combinator::Descendant));
        } else if pending.is_some() {
            return Err(invalid(full, "selector cannot start with a combinator"));
        }
        compounds.push(parse_compound(current, full)?);
        current.clear();
        *pending = None;
        Ok(())
    };

    for ch in input.chars() {
        if let Some(open) = quote {
            current.push(ch);
            if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' if bracket_depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth = bracket_depth.saturating_add(1);
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth.saturating_sub(1);
                current.push(ch);
            }
            '>' if bracket_depth == 0 => {
                flush(&mut current, &mut compounds, &mut combinators, &mut pending)?;
                if compounds.is_empty() {
                    return Err(invalid(full, "selector cannot start with a combinator"));
                }
                pending = Some(Combinator::Child);
            }
            ch if ch.is_whitespace() && bracket_depth == 0 => {
                flush(&mut current, &mut compounds, &mut combinators, &mut pending)?;
                if !compounds.is_empty() && pending.is_none() {
                    pending = Some(Combinator::Descendant);
                }
            }
            _ => current.push(ch),
        }
    }

    if quote.is_some() || bracket_depth != 0 {
        return Err(invalid(full, "unterminated attribute condition"));
    }

    let trailing_child = matches!(pending, Some(Combinator::Child)) && current.is_empty();
    flush(&mut current, &mut compounds, &mut combinators, &mut pending)?;
    if trailing_child {
        return Err(invalid(full, "selector cannot end with a combinator"));
    }

    if compounds.is_empty() {
        return Err(invalid(full, "empty selector"));
    }

    Ok(ComplexSelector {
        compounds,
        combinators,
    })
}

fn parse_compound(input: &str, full: &str) -> SyncResult<Compound> {
    let mut compound = Compound::default();
    let chars: Vec<char> = input.chars().collect();
    let mut idx = 0_usize;

    let ident_end = |from: usize| -> usize {
        let mut end = from;
        while end < chars.len() && is_ident_char(chars[end]) {
            end += 1;
        }
        end
    };

    if idx < chars.len() && chars[idx] == '*' {
        idx += 1;
    } else if idx < chars.len() && is_ident_char(chars[idx]) {
        let end = ident_end(idx);
        compound.tag = Some(chars[idx..end].iter().collect::<String>().to_ascii_lowercase());
        idx = end;
    }

    while idx < chars.len() {
        match chars[idx] {
            '#' => {
                let end = ident_end(idx + 1);
                if end == idx + 1 {
                    return Err(invalid(full, "`#` must be followed by an id"));
                }
                compound.id = Some(chars[idx + 1..end].iter().collect());
                idx = end;
            }
            '.' => {
                let end = ident_end(idx + 1);
                if end == idx + 1 {
                    return Err(invalid(full, "`.` must be followed by a class name"));
                }
                compound.classes.push(chars[idx + 1..end].iter().collect());
                idx = end;
            }
            '[' => {
                let close = chars[idx..]
                    .iter()
                    .position(|ch| *ch == ']')
                    .map(|offset| idx + offset)
                    .ok_or_else(|| invalid(full, "unterminated attribute condition"))?;
                let body: String = chars[idx + 1..close].iter().collect();
                compound.attrs.push(parse_attr_condition(body.trim(), full)?);
                idx = close + 1;
            }
            other => {
                return Err(invalid(full, &format!("unsupported selector character `{other}`")));
            }
        }
    }

    Ok(compound)
}

fn parse_attr_condition(body: &str, full: &str) -> SyncResult<AttrCondition> {
    let Some(eq) = body.find('=') else {
        if body.is_empty() || !body.chars().all(is_ident_char) {
            return Err(invalid(full, "invalid attribute name"));
        }
        return Ok(AttrCondition {
            name: body.to_ascii_lowercase(),
            op: AttrOp::Exists,
        });
    };

    let (raw_name, raw_value) = body.split_at(eq);
    let raw_value = raw_value[1..].trim();
    let (name, op_char) = match raw_name.chars().last() {
        Some(op @ ('*' | '^')) => (&raw_name[..raw_name.len() - 1], Some(op)),
        _ => (raw_name, None),
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err(invalid(full, "invalid attribute name"));
    }

    let value = unquote(raw_value);
    let op = match op_char {
        Some('*') => AttrOp::Contains(value),
        Some('^') => AttrOp::Prefix(value),
        _ => AttrOp::Equals(value),
    };

    Ok(AttrCondition {
        name: name.to_ascii_lowercase(),
        op,
    })
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_owned();
        }
    }
    value.to_owned()
}

fn split_top_level(input: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0_usize;
    let mut bracket_depth = 0_u32;
    let mut quote: Option<char> = None;

    for (idx, ch) in input.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '[' => bracket_depth = bracket_depth.saturating_add(1),
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            ch if ch == delimiter && bracket_depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }

    let tail = &input[start..];
    if !tail.trim().is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') || !ch.is_ascii()
}

fn invalid(selector: &str, reason: &str) -> SyncError {
    SyncError::new(
        "dom.selector_invalid",
        format!("invalid selector `{selector}`: {reason}"),
    )
}

#[cfg(test)]
mod tests {
    use super::Selector;
    use crate::Document;
    use crate::NodeId;

    fn build() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let form = doc.create_element_with_attrs(
            "form",
            vec![("id".to_owned(), "FacetFiltersForm".to_owned())],
        );
        let panel = doc.create_element_with_attrs(
            "details",
            vec![
                ("id".to_owned(), "Filter-color".to_owned()),
                ("class".to_owned(), "js-filter disclosure".to_owned()),
                ("data-filter-key".to_owned(), "color".to_owned()),
            ],
        );
        let input = doc.create_element_with_attrs(
            "input",
            vec![
                ("name".to_owned(), "filter.v.option.color".to_owned()),
                ("value".to_owned(), "Red".to_owned()),
            ],
        );
        assert!(doc.append_child(root, form).is_ok());
        assert!(doc.append_child(form, panel).is_ok());
        assert!(doc.append_child(panel, input).is_ok());
        (doc, form, panel, input)
    }

    fn parse(input: &str) -> Selector {
        match Selector::parse(input) {
            Ok(selector) => selector,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn matches_descendant_lists() {
        let (doc, _, panel, _) = build();
        let selector = parse("#FacetFiltersForm .js-filter, #FacetFiltersFormMobile .js-filter");
        assert!(selector.matches(&doc, panel));
    }

    #[test]
    fn child_combinator_requires_direct_parent() {
        let (doc, _, _, input) = build();
        assert!(parse("details > input").matches(&doc, input));
        assert!(!parse("form > input").matches(&doc, input));
        assert!(parse("form input").matches(&doc, input));
    }

    #[test]
    fn attribute_conditions() {
        let (doc, _, panel, input) = build();
        assert!(parse("details[data-filter-key=\"color\"]").matches(&doc, panel));
        assert!(parse("[data-filter-key]").matches(&doc, panel));
        assert!(!parse("[data-filter-key='size']").matches(&doc, panel));
        assert!(parse("input[name*=\"color\"]").matches(&doc, input));
        assert!(parse("input[name^=filter]").matches(&doc, input));
        assert!(parse("input[name][value]").matches(&doc, input));
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("# .js-filter").is_err());
        assert!(Selector::parse("div >").is_err());
        assert!(Selector::parse("[data-x").is_err());
        assert!(Selector::parse("a:hover").is_err());
    }

    #[test]
    fn query_selector_all_is_scoped_but_matches_outer_ancestors() {
        let (doc, form, panel, _) = build();
        let selector = parse("#FacetFiltersForm .js-filter");
        assert_eq!(doc.query_selector_all(panel, &selector), Vec::<NodeId>::new());
        assert_eq!(doc.query_selector_all(form, &selector), vec![panel]);
    }
}
