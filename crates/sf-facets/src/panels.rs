//! Filter panel identity and duplicate-panel normalization.
//!
//! Themes can render the same filter twice inside one form (a horizontal bar and a
//! drawer, say). Panels are identified by [`PanelKey`]; the first panel per key in
//! document order is kept and later ones are folded into it. The fold is planned on
//! plain [`PanelDescriptor`] values and applied to the DOM by
//! [`normalize_duplicate_filters`].

use core::fmt;
use sf_core::SyncResult;
use sf_dom::Document;
use sf_dom::NodeId;
use std::collections::HashMap;
use std::collections::HashSet;

/// Ids of the forms whose panels are normalized, in processing order.
pub const FILTER_FORM_IDS: [&str; 3] = [
    "FacetFiltersForm",
    "FacetFiltersFormMobile",
    "FacetFiltersPillsForm",
];

const PANEL_SELECTOR: &str = "details[data-filter-key]";
const OPTION_LIST_SELECTOR: &str = "[data-filter-key][role=\"list\"]";
const OPTION_INPUT_SELECTOR: &str = "input[name][value]";
const SHOW_MORE_SELECTOR: &str = "show-more-button";
const MOBILE_WRAPPER_SELECTOR: &str = ".mobile-facets__wrapper";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Desktop,
    Mobile,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

/// (scope, surface, filter key): at most one panel per key survives normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PanelKey {
    pub scope: String,
    pub surface: Surface,
    pub filter_key: String,
}

impl PanelKey {
    pub fn new(scope: &str, surface: Surface, filter_key: &str) -> Self {
        Self {
            scope: scope.to_owned(),
            surface,
            filter_key: filter_key.to_owned(),
        }
    }
}

impl fmt::Display for PanelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.scope, self.surface.as_str(), self.filter_key)
    }
}

/// One row of a panel's option list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelOption {
    /// Row carrying a named input; identified by `name::value`.
    Input { name: String, value: String },
    /// Row without an input (headings, notes); never deduplicated.
    Plain(String),
}

impl PanelOption {
    pub fn signature(&self) -> Option<String> {
        match self {
            Self::Input { name, value } => Some(format!("{name}::{value}")),
            Self::Plain(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelDescriptor {
    pub key: PanelKey,
    pub open: bool,
    /// `None` when the panel renders no option list.
    pub options: Option<Vec<PanelOption>>,
    pub show_more: bool,
}

/// `(primary, duplicate)` index pairs, in document order of the duplicates.
pub fn plan_dedup<'a>(keys: impl IntoIterator<Item = &'a PanelKey>) -> Vec<(usize, usize)> {
    let mut first_seen: HashMap<&PanelKey, usize> = HashMap::new();
    let mut plan = Vec::new();
    for (index, key) in keys.into_iter().enumerate() {
        match first_seen.get(key) {
            Some(primary) => plan.push((*primary, index)),
            None => {
                first_seen.insert(key, index);
            }
        }
    }
    plan
}

/// Folds `duplicate` into `primary`.
///
/// `open` is OR'd. When both panels have option lists, rows are unioned by signature
/// (rows without an input are always carried) and the show-more control is unioned.
pub fn merge_descriptors(primary: &mut PanelDescriptor, duplicate: &PanelDescriptor) {
    primary.open |= duplicate.open;

    let (Some(target), Some(incoming)) = (primary.options.as_mut(), duplicate.options.as_ref()) else {
        return;
    };

    let mut seen: HashSet<String> = target.iter().filter_map(PanelOption::signature).collect();
    for option in incoming {
        if let Some(signature) = option.signature() {
            if !seen.insert(signature) {
                continue;
            }
        }
        target.push(option.clone());
    }

    primary.show_more |= duplicate.show_more;
}

/// Applies [`plan_dedup`] and [`merge_descriptors`], dropping the folded duplicates.
pub fn normalize_descriptors(mut descriptors: Vec<PanelDescriptor>) -> Vec<PanelDescriptor> {
    let plan = plan_dedup(descriptors.iter().map(|descriptor| &descriptor.key));
    let mut removed = vec![false; descriptors.len()];

    for (primary, duplicate) in plan {
        let folded = descriptors[duplicate].clone();
        merge_descriptors(&mut descriptors[primary], &folded);
        removed[duplicate] = true;
    }

    descriptors
        .into_iter()
        .zip(removed)
        .filter(|(_, removed)| !removed)
        .map(|(descriptor, _)| descriptor)
        .collect()
}

/// Panels of `form` taking part in normalization, in document order.
pub fn filter_panels(document: &Document, form: NodeId) -> SyncResult<Vec<NodeId>> {
    Ok(document
        .select_all(form, PANEL_SELECTOR)?
        .into_iter()
        .filter(|panel| document.attr(*panel, "data-filter-key").is_some_and(|key| !key.is_empty()))
        .collect())
}

pub fn panel_key(document: &Document, scope: &str, panel: NodeId) -> SyncResult<Option<PanelKey>> {
    let Some(filter_key) = document.attr(panel, "data-filter-key").filter(|key| !key.is_empty()) else {
        return Ok(None);
    };
    let surface = if document.closest(panel, MOBILE_WRAPPER_SELECTOR)?.is_some() {
        Surface::Mobile
    } else {
        Surface::Desktop
    };
    Ok(Some(PanelKey::new(scope, surface, filter_key)))
}

/// Reads a live panel into a descriptor.
pub fn describe_panel(document: &Document, scope: &str, panel: NodeId) -> SyncResult<Option<PanelDescriptor>> {
    let Some(key) = panel_key(document, scope, panel)? else {
        return Ok(None);
    };

    let options = match document.select_first(panel, OPTION_LIST_SELECTOR)? {
        Some(list) => {
            let mut rows = Vec::new();
            for item in document.element_children(list) {
                rows.push(describe_option(document, item)?);
            }
            Some(rows)
        }
        None => None,
    };

    Ok(Some(PanelDescriptor {
        key,
        open: document.has_attr(panel, "open"),
        options,
        show_more: document.select_first(panel, SHOW_MORE_SELECTOR)?.is_some(),
    }))
}

fn describe_option(document: &Document, item: NodeId) -> SyncResult<PanelOption> {
    Ok(match document.select_first(item, OPTION_INPUT_SELECTOR)? {
        Some(input) => PanelOption::Input {
            name: document.attr(input, "name").unwrap_or_default().to_owned(),
            value: document.attr(input, "value").unwrap_or_default().to_owned(),
        },
        None => PanelOption::Plain(document.text_content(item).trim().to_owned()),
    })
}

fn option_signature(document: &Document, item: NodeId) -> SyncResult<Option<String>> {
    Ok(document
        .select_first(item, OPTION_INPUT_SELECTOR)?
        .map(|input| {
            format!(
                "{}::{}",
                document.attr(input, "name").unwrap_or_default(),
                document.attr(input, "value").unwrap_or_default()
            )
        }))
}

/// Folds duplicate panels in every filter form; returns how many panels were removed.
pub fn normalize_duplicate_filters(document: &mut Document) -> SyncResult<usize> {
    let mut removed = 0_usize;

    for scope in FILTER_FORM_IDS {
        let Some(form) = document.get_element_by_id(scope) else {
            continue;
        };

        let panels = filter_panels(document, form)?;
        let mut keys = Vec::with_capacity(panels.len());
        for panel in &panels {
            if let Some(key) = panel_key(document, scope, *panel)? {
                keys.push(key);
            }
        }

        for (primary, duplicate) in plan_dedup(keys.iter()) {
            tracing::debug!(key = %keys[duplicate], "merging duplicate filter panel");
            merge_filter_values(document, panels[primary], panels[duplicate])?;
            removed = removed.saturating_add(1);
        }
    }

    Ok(removed)
}

/// DOM counterpart of [`merge_descriptors`]; `duplicate` is removed afterwards.
pub fn merge_filter_values(document: &mut Document, primary: NodeId, duplicate: NodeId) -> SyncResult<()> {
    if document.has_attr(duplicate, "open") {
        document.set_attr(primary, "open", "");
    }

    let target_list = document.select_first(primary, OPTION_LIST_SELECTOR)?;
    let duplicate_list = document.select_first(duplicate, OPTION_LIST_SELECTOR)?;
    let (Some(target_list), Some(duplicate_list)) = (target_list, duplicate_list) else {
        document.remove(duplicate);
        return Ok(());
    };

    let mut seen = HashSet::new();
    for input in document.select_all(target_list, OPTION_INPUT_SELECTOR)? {
        seen.insert(format!(
            "{}::{}",
            document.attr(input, "name").unwrap_or_default(),
            document.attr(input, "value").unwrap_or_default()
        ));
    }

    for item in document.element_children(duplicate_list) {
        if let Some(signature) = option_signature(document, item)? {
            if !seen.insert(signature) {
                continue;
            }
        }
        document.append_child(target_list, item)?;
    }

    if let Some(show_more) = document.select_first(duplicate, SHOW_MORE_SELECTOR)? {
        if document.select_first(primary, SHOW_MORE_SELECTOR)?.is_none() {
            document.append_child(primary, show_more)?;
        }
    }

    document.remove(duplicate);
    Ok(())
}
