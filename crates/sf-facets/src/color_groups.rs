//! Color family shortcuts above the color filter list.
//!
//! Shops name variants freely ("Marineblå", "Navy", "Kongeblå"); each option is mapped
//! to a family and a button per family checks all of its options at once.

use crate::events::FragmentApplied;
use crate::events::FragmentObserver;
use regex_lite::Regex;
use sf_core::SyncError;
use sf_core::SyncResult;
use sf_dom::Document;
use sf_dom::NodeId;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub const COLOR_LIST_SELECTOR: &str = "ul[role=\"list\"][data-filter-key=\"color\"]";
pub const GROUP_BUTTON_CLASS: &str = "color-group__btn";

const GROUPED_MARKER: &str = "data-color-grouped";
const BASE_COLOR_ATTR: &str = "data-base-color";
const GROUP_ATTR: &str = "data-color-group";
const CONTAINER_CLASS: &str = "color-groups";

/// Family name and the keywords (Norwegian and English, diacritics stripped) mapping to it.
/// Checked in order; the first match wins.
const FAMILIES: [(&str, &str); 13] = [
    ("Black", "svart|sort|black"),
    ("White", "hvit|white"),
    ("Grey", "gra|grå|gray|grey|koks"),
    ("Blue", "bla|blå|blue|navy|royal|kongebla|himmelbla|marine|turkis|cyan"),
    ("Red", "rod|rød|red|burgunder|vin"),
    ("Green", "gronn|grønn|green|lime|oliven|khaki"),
    ("Yellow", "gul|yellow|mustard"),
    ("Orange", "oransj|orange"),
    ("Purple", "lilla|fiolett|purple|violet"),
    ("Pink", "rosa|pink"),
    ("Brown", "brun|brown|camel|tan"),
    ("Beige", "beige|sand|cream|ivory|bone"),
    ("Multicolor", "multi|flerfarg|flerfarget|multicolor"),
];

/// Lowercases and strips diacritics.
pub(crate) fn fold(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ColorGroups {
    families: Vec<(&'static str, Regex)>,
    count_pattern: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Group {
    family: String,
    inputs: Vec<NodeId>,
    count: u64,
}

impl ColorGroups {
    pub fn new() -> SyncResult<Self> {
        let mut families = Vec::with_capacity(FAMILIES.len());
        for (family, keywords) in FAMILIES {
            families.push((family, compile(&format!("({keywords})"))?));
        }
        Ok(Self {
            families,
            count_pattern: compile(r"\((\d+)\)")?,
        })
    }

    /// Family for an option label; unknown labels form their own family.
    pub fn family_of(&self, label: &str) -> String {
        let folded = fold(label);
        self.families
            .iter()
            .find(|(_, pattern)| pattern.is_match(&folded))
            .map(|(family, _)| (*family).to_owned())
            .unwrap_or_else(|| label.to_owned())
    }

    /// True when `text` names any color of `family`. Families outside the table never match.
    pub fn mentions_family(&self, family: &str, text: &str) -> bool {
        let folded = fold(text);
        self.families
            .iter()
            .any(|(name, pattern)| *name == family && pattern.is_match(&folded))
    }

    /// Adds family buttons above every not-yet-grouped color list below `root`.
    /// Returns how many button bars were inserted.
    pub fn build_groups(&self, document: &mut Document, root: NodeId) -> SyncResult<usize> {
        let mut inserted = 0_usize;
        for list in document.select_all(root, COLOR_LIST_SELECTOR)? {
            if document.attr(list, GROUPED_MARKER) == Some("true") {
                continue;
            }

            let items = document.select_all(list, "li")?;
            let groups = self.collect_groups(document, &items)?;
            document.set_attr(list, GROUPED_MARKER, "true");

            if groups.is_empty() || groups.len() == items.len() {
                continue;
            }

            let container = document.create_element_with_attrs(
                "div",
                vec![
                    ("class".to_owned(), CONTAINER_CLASS.to_owned()),
                    ("aria-label".to_owned(), "Main colors".to_owned()),
                ],
            );
            for group in &groups {
                let label = if group.count > 0 {
                    format!("{} ({})", group.family, group.count)
                } else {
                    group.family.clone()
                };
                let button = document.create_element_with_attrs(
                    "button",
                    vec![
                        ("type".to_owned(), "button".to_owned()),
                        (
                            "class".to_owned(),
                            format!("button button--tertiary {GROUP_BUTTON_CLASS}"),
                        ),
                        (GROUP_ATTR.to_owned(), group.family.clone()),
                    ],
                );
                document.set_text_content(button, &label)?;
                document.append_child(container, button)?;
            }
            document.insert_before(list, container)?;
            inserted = inserted.saturating_add(1);
        }
        Ok(inserted)
    }

    fn collect_groups(&self, document: &mut Document, items: &[NodeId]) -> SyncResult<Vec<Group>> {
        let mut groups: Vec<Group> = Vec::new();
        for item in items {
            let label_node = document
                .select_first(*item, ".facet-checkbox__text-label")?
                .unwrap_or(*item);
            let label = document.text_content(label_node);
            if label.trim().is_empty() {
                continue;
            }
            let family = self.family_of(label.trim());
            document.set_attr(*item, BASE_COLOR_ATTR, &family);

            let input = document.select_first(*item, "input[type=\"checkbox\"]")?;
            let count = match document.select_first(*item, ".facet-checkbox__text")? {
                Some(text) => self.count_in(&document.text_content(text)),
                None => 0,
            };

            let position = match groups.iter().position(|group| group.family == family) {
                Some(position) => position,
                None => {
                    groups.push(Group {
                        family,
                        inputs: Vec::new(),
                        count: 0,
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[position];
            group.inputs.extend(input);
            group.count = group.count.saturating_add(count);
        }
        Ok(groups)
    }

    fn count_in(&self, text: &str) -> u64 {
        self.count_pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|digits| digits.as_str().parse().ok())
            .unwrap_or(0)
    }
}

impl FragmentObserver for ColorGroups {
    fn on_fragment_applied(&mut self, document: &mut Document, event: &FragmentApplied) -> SyncResult<()> {
        let inserted = self.build_groups(document, event.root)?;
        tracing::debug!(lists = inserted, "color groups built");
        Ok(())
    }
}

/// Applies a family button click: checks every enabled, unchecked option of the family,
/// or unchecks them all when every one was already checked. Returns the inputs changed.
pub fn toggle_group(document: &mut Document, button: NodeId) -> SyncResult<Vec<NodeId>> {
    let family = document
        .attr(button, GROUP_ATTR)
        .map(str::to_owned)
        .ok_or_else(|| {
            SyncError::new(
                "facets.color_group_invalid",
                format!("node {button} is not a color group button"),
            )
        })?;
    let container = document.closest(button, &format!(".{CONTAINER_CLASS}"))?;
    let list = container
        .and_then(|container| following_color_list(document, container))
        .ok_or_else(|| {
            SyncError::new(
                "dom.target_missing",
                format!("color list for group `{family}` is missing"),
            )
        })?;

    let mut inputs = Vec::new();
    for item in document.select_all(list, "li")? {
        if document.attr(item, BASE_COLOR_ATTR) != Some(family.as_str()) {
            continue;
        }
        if let Some(input) = document.select_first(item, "input[type=\"checkbox\"]")? {
            if !document.has_attr(input, "disabled") {
                inputs.push(input);
            }
        }
    }

    let mut changed: Vec<NodeId> = Vec::new();
    for input in &inputs {
        if !document.has_attr(*input, "checked") {
            document.set_attr(*input, "checked", "");
            changed.push(*input);
        }
    }

    if changed.is_empty() {
        for input in &inputs {
            document.remove_attr(*input, "checked");
            changed.push(*input);
        }
    }

    Ok(changed)
}

fn following_color_list(document: &Document, container: NodeId) -> Option<NodeId> {
    let parent = document.parent(container)?;
    document
        .element_children(parent)
        .into_iter()
        .skip_while(|sibling| *sibling != container)
        .skip(1)
        .find(|sibling| document.attr(*sibling, "data-filter-key") == Some("color"))
}

fn compile(pattern: &str) -> SyncResult<Regex> {
    Regex::new(pattern).map_err(|error| {
        SyncError::new(
            "facets.color_pattern_invalid",
            format!("invalid color pattern `{pattern}`: {error}"),
        )
    })
}
