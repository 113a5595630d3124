//! Applies a fetched section fragment to the live page.
//!
//! Every function takes the live document mutably and the parsed fragment read-only.
//! Region lookups that the page contract guarantees fail with `dom.target_missing`;
//! optional regions are skipped.

use crate::panels;
use sf_core::SyncError;
use sf_core::SyncResult;
use sf_dom::Document;
use sf_dom::NodeId;
use std::collections::HashSet;

pub const FILTER_PANEL_SELECTOR: &str =
    "#FacetFiltersForm .js-filter, #FacetFiltersFormMobile .js-filter, #FacetFiltersPillsForm .js-filter";
pub const LOADING_SPINNER_SELECTOR: &str =
    ".facets-container .loading__spinner, facet-filters-form .loading__spinner";
pub const ACTIVE_FACET_SELECTORS: [&str; 2] = [".active-facets-mobile", ".active-facets-desktop"];
pub const ADDITIONAL_ELEMENT_SELECTORS: [&str; 3] =
    [".mobile-facets__open", ".mobile-facets__count", ".sorting"];
pub const FACET_REMOVE_SELECTOR: &str = ".js-facet-remove";

pub const GRID_CONTAINER_ID: &str = "ProductGridContainer";
pub const PRODUCT_COUNT_ID: &str = "ProductCount";
pub const PRODUCT_COUNT_DESKTOP_ID: &str = "ProductCountDesktop";

/// The filter panel an interaction came from, captured before the page changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trigger {
    /// Id of the nearest `.js-filter` around the control, when it has one.
    pub panel_id: Option<String>,
    /// Text inputs keep focus; every other control hands it to the panel header.
    pub is_text_input: bool,
}

impl Trigger {
    pub fn from_control(document: &Document, control: NodeId) -> SyncResult<Self> {
        let panel_id = document
            .closest(control, ".js-filter")?
            .and_then(|panel| document.element_id(panel))
            .map(str::to_owned);
        Ok(Self {
            panel_id,
            is_text_input: document.attr(control, "type") == Some("text"),
        })
    }
}

fn target_missing(what: &str) -> SyncError {
    SyncError::new("dom.target_missing", format!("required element `{what}` is missing"))
}

fn live_by_id(document: &Document, id: &str) -> SyncResult<NodeId> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| target_missing(&format!("#{id}")))
}

fn fetched_by_id(fetched: &Document, id: &str) -> SyncResult<NodeId> {
    fetched.get_element_by_id(id).ok_or_else(|| {
        SyncError::new(
            "dom.target_missing",
            format!("fetched fragment has no `#{id}`"),
        )
    })
}

/// Shows spinners and marks the grid and counts as loading.
pub fn show_loading(document: &mut Document) -> SyncResult<()> {
    let root = document.root();
    for spinner in document.select_all(root, LOADING_SPINNER_SELECTOR)? {
        document.remove_class(spinner, "hidden");
    }

    if let Some(container) = document.get_element_by_id(GRID_CONTAINER_ID) {
        if let Some(grid) = document.select_first(container, ".collection")? {
            document.add_class(grid, "loading");
        }
    }
    for id in [PRODUCT_COUNT_ID, PRODUCT_COUNT_DESKTOP_ID] {
        if let Some(count) = document.get_element_by_id(id) {
            document.add_class(count, "loading");
        }
    }
    Ok(())
}

/// Adds or removes `disabled` on every active-filter chip link.
pub fn toggle_active_facets(document: &mut Document, disabled: bool) -> SyncResult<()> {
    let root = document.root();
    for link in document.select_all(root, FACET_REMOVE_SELECTOR)? {
        document.toggle_class(link, "disabled", disabled);
    }
    Ok(())
}

/// Reconciles the filter panels, chips, mobile header elements and duplicate panels,
/// then refreshes the triggered panel in place.
pub fn render_filters(document: &mut Document, fetched: &Document, trigger: Option<&Trigger>) -> SyncResult<()> {
    let live_root = document.root();
    let fetched_panels = fetched.select_all(fetched.root(), FILTER_PANEL_SELECTOR)?;
    let live_panels = document.select_all(live_root, FILTER_PANEL_SELECTOR)?;

    let fetched_ids: HashSet<&str> = fetched_panels
        .iter()
        .map(|panel| fetched.attr(*panel, "id").unwrap_or_default())
        .collect();
    for panel in live_panels {
        let id = document.attr(panel, "id").unwrap_or_default();
        if !fetched_ids.contains(id) {
            tracing::debug!(panel = id, "removing filter panel absent from fragment");
            document.remove(panel);
        }
    }

    let triggered_id = trigger.and_then(|trigger| trigger.panel_id.as_deref());
    let is_triggered = |panel: NodeId| triggered_id.is_some() && fetched.element_id(panel) == triggered_id;
    let to_render: Vec<NodeId> = fetched_panels
        .iter()
        .copied()
        .filter(|panel| !is_triggered(*panel))
        .collect();
    let triggered_source = fetched_panels.iter().copied().find(|panel| is_triggered(*panel));

    for (index, panel) in to_render.iter().enumerate() {
        insert_or_update_panel(document, fetched, &to_render, index, *panel)?;
    }

    render_active_facets(document, fetched)?;
    render_additional_elements(document, fetched)?;
    panels::normalize_duplicate_filters(document)?;

    let (Some(source), Some(trigger)) = (triggered_source, trigger) else {
        return Ok(());
    };
    let Some(panel_id) = trigger.panel_id.as_deref() else {
        return Ok(());
    };
    let Some(target) = document.get_element_by_id(panel_id) else {
        tracing::debug!(panel = panel_id, "triggered panel no longer on the page");
        return Ok(());
    };

    render_counts(document, fetched, source, target)?;
    if let Some(target) = document.get_element_by_id(panel_id) {
        render_mobile_counts(document, fetched, source, target)?;
    }
    if let Some(target) = document.get_element_by_id(panel_id) {
        restore_focus(document, target, trigger)?;
    }
    Ok(())
}

fn insert_or_update_panel(
    document: &mut Document,
    fetched: &Document,
    to_render: &[NodeId],
    index: usize,
    panel: NodeId,
) -> SyncResult<()> {
    if let Some(live) = fetched
        .element_id(panel)
        .and_then(|id| document.get_element_by_id(id))
    {
        return document.replace_children_from(live, fetched, panel);
    }

    if let Some(previous) = index.checked_sub(1).map(|previous| to_render[previous]) {
        if fetched.attr(panel, "class") == fetched.attr(previous, "class") {
            let previous_id = fetched.element_id(previous).unwrap_or_default();
            let anchor = live_by_id(document, previous_id)?;
            let copy = document.import_subtree(fetched, panel)?;
            return document.insert_after(anchor, copy);
        }
    }

    let Some(parent) = fetched.parent_element(panel) else {
        return Ok(());
    };
    let parent_id = fetched.element_id(parent).ok_or_else(|| {
        SyncError::new(
            "dom.target_missing",
            format!(
                "new filter panel `{}` has a parent without an id",
                fetched.element_id(panel).unwrap_or_default()
            ),
        )
    })?;
    let live_parent = live_by_id(document, parent_id)?;
    let copy = document.import_subtree(fetched, panel)?;
    match document.select_first(live_parent, ".js-filter")? {
        Some(first) => document.insert_before(first, copy),
        None => document.append_child(live_parent, copy),
    }
}

/// Replaces the active-filter chip regions and re-enables their links.
pub fn render_active_facets(document: &mut Document, fetched: &Document) -> SyncResult<()> {
    for selector in ACTIVE_FACET_SELECTORS {
        replace_region(document, fetched, selector)?;
    }
    toggle_active_facets(document, false)
}

/// Replaces the mobile drawer opener, mobile result count and sort controls.
pub fn render_additional_elements(document: &mut Document, fetched: &Document) -> SyncResult<()> {
    for selector in ADDITIONAL_ELEMENT_SELECTORS {
        replace_region(document, fetched, selector)?;
    }
    Ok(())
}

fn replace_region(document: &mut Document, fetched: &Document, selector: &str) -> SyncResult<()> {
    let Some(source) = fetched.select_first(fetched.root(), selector)? else {
        return Ok(());
    };
    let root = document.root();
    let target = document
        .select_first(root, selector)?
        .ok_or_else(|| target_missing(selector))?;
    document.replace_children_from(target, fetched, source)
}

/// Refreshes summary, header and option list of the panel the user is interacting with.
pub fn render_counts(document: &mut Document, fetched: &Document, source: NodeId, target: NodeId) -> SyncResult<()> {
    for selector in [".facets__summary", ".facets__header"] {
        let source_part = fetched.select_first(source, selector)?;
        let target_part = document.select_first(target, selector)?;
        if let (Some(source_part), Some(target_part)) = (source_part, target_part) {
            document.replace_with_import(target_part, fetched, source_part)?;
        }
    }

    let source_wrap = fetched.select_first(source, ".facets-wrap")?;
    let target_wrap = document.select_first(target, ".facets-wrap")?;
    if let (Some(source_wrap), Some(target_wrap)) = (source_wrap, target_wrap) {
        let showing_more = document
            .select_first(target, "show-more-button .label-show-more.hidden")?
            .is_some();
        let copy = document.import_subtree(fetched, source_wrap)?;
        if showing_more {
            for item in document.select_all(copy, ".facets__item.hidden")? {
                document.replace_class(item, "hidden", "show-more-item");
            }
        }
        document.replace_with(target_wrap, copy)?;
    }
    Ok(())
}

pub fn render_mobile_counts(document: &mut Document, fetched: &Document, source: NodeId, target: NodeId) -> SyncResult<()> {
    let source_list = fetched.select_first(source, ".mobile-facets__list")?;
    let target_list = document.select_first(target, ".mobile-facets__list")?;
    if let (Some(source_list), Some(target_list)) = (source_list, target_list) {
        document.replace_with_import(target_list, fetched, source_list)?;
    }
    Ok(())
}

fn restore_focus(document: &mut Document, panel: NodeId, trigger: &Trigger) -> SyncResult<()> {
    if trigger.is_text_input {
        return Ok(());
    }
    let selector = if document.has_class(panel, "mobile-facets__details") {
        ".mobile-facets__close-button"
    } else {
        ".facets__summary"
    };
    if let Some(focus_target) = document.select_first(panel, selector)? {
        document.focus(focus_target);
    }
    Ok(())
}

/// Replaces the grid container's children; returns the container.
pub fn render_product_grid(document: &mut Document, fetched: &Document) -> SyncResult<NodeId> {
    let container = live_by_id(document, GRID_CONTAINER_ID)?;
    let source = fetched_by_id(fetched, GRID_CONTAINER_ID)?;
    document.replace_children_from(container, fetched, source)?;

    for trigger in document.select_all(container, ".scroll-trigger")? {
        document.add_class(trigger, "scroll-trigger--cancel");
    }
    Ok(container)
}

/// Copies the result count into both count regions and clears loading indicators.
pub fn render_product_count(document: &mut Document, fetched: &Document) -> SyncResult<()> {
    let source = fetched_by_id(fetched, PRODUCT_COUNT_ID)?;
    let count = live_by_id(document, PRODUCT_COUNT_ID)?;
    document.replace_children_from(count, fetched, source)?;
    document.remove_class(count, "loading");

    if let Some(desktop) = document.get_element_by_id(PRODUCT_COUNT_DESKTOP_ID) {
        document.replace_children_from(desktop, fetched, source)?;
        document.remove_class(desktop, "loading");
    }

    let root = document.root();
    for spinner in document.select_all(root, LOADING_SPINNER_SELECTOR)? {
        document.add_class(spinner, "hidden");
    }
    Ok(())
}
