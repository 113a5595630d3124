//! Form serialization and the routing of filter submissions.

use sf_core::SyncError;
use sf_core::SyncResult;
use sf_dom::Document;
use sf_dom::NodeId;
use sf_net::QueryParams;

pub const MOBILE_FILTER_FORM_ID: &str = "FacetFiltersFormMobile";
/// Forms submitted together when a desktop control changes, in document order.
pub const DESKTOP_FORM_IDS: [&str; 3] = ["FacetSortForm", "FacetFiltersForm", "FacetSortDrawerForm"];

const FILTER_FORMS_SELECTOR: &str = "facet-filters-form form";
const MOBILE_CHECKBOX_CLASS: &str = "mobile-facets__checkbox";

/// Serializes the successful controls of `form` the way `FormData` does.
pub fn serialize_form(document: &Document, form: NodeId) -> SyncResult<QueryParams> {
    let mut params = QueryParams::new();

    for control in document.descendants(form) {
        let Some(tag) = document.tag_name(control) else {
            continue;
        };
        if !matches!(tag, "input" | "select" | "textarea") {
            continue;
        }
        let Some(name) = document.attr(control, "name").filter(|name| !name.is_empty()) else {
            continue;
        };
        if is_disabled(document, control)? {
            continue;
        }

        match tag {
            "input" => {
                let kind = document
                    .attr(control, "type")
                    .unwrap_or("text")
                    .to_ascii_lowercase();
                match kind.as_str() {
                    "checkbox" | "radio" => {
                        if document.has_attr(control, "checked") {
                            params.append(name, document.attr(control, "value").unwrap_or("on"));
                        }
                    }
                    "submit" | "button" | "reset" | "image" | "file" => {}
                    _ => params.append(name, document.attr(control, "value").unwrap_or_default()),
                }
            }
            "select" => {
                for value in selected_values(document, control)? {
                    params.append(name, value);
                }
            }
            _ => params.append(name, document.text_content(control)),
        }
    }

    Ok(params)
}

fn is_disabled(document: &Document, control: NodeId) -> SyncResult<bool> {
    if document.has_attr(control, "disabled") {
        return Ok(true);
    }
    Ok(document.closest(control, "fieldset[disabled]")?.is_some())
}

fn selected_values(document: &Document, select: NodeId) -> SyncResult<Vec<String>> {
    let options = document.select_all(select, "option")?;
    let value_of = |option: NodeId| -> String {
        match document.attr(option, "value") {
            Some(value) => value.to_owned(),
            None => document
                .text_content(option)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        }
    };

    let selected: Vec<String> = options
        .iter()
        .filter(|option| document.has_attr(**option, "selected") && !document.has_attr(**option, "disabled"))
        .map(|option| value_of(*option))
        .collect();

    if !selected.is_empty() || document.has_attr(select, "multiple") {
        return Ok(selected);
    }

    Ok(options
        .iter()
        .find(|option| !document.has_attr(**option, "disabled"))
        .map(|option| vec![value_of(*option)])
        .unwrap_or_default())
}

/// Parameters submitted when `target` fires `input` or `change`.
///
/// A mobile checkbox submits only its own form. Otherwise a control inside the mobile
/// filter form submits that form, and any other control submits the sort and desktop
/// filter forms, concatenated in document order.
pub fn submission_params(document: &Document, target: NodeId) -> SyncResult<QueryParams> {
    let own_form = document.closest(target, "form")?.ok_or_else(|| {
        SyncError::new(
            "facets.form_missing",
            format!("control {target} is not inside a form"),
        )
    })?;

    if document.has_class(target, MOBILE_CHECKBOX_CLASS) {
        return serialize_form(document, own_form);
    }

    let is_mobile = document.attr(own_form, "id") == Some(MOBILE_FILTER_FORM_ID);
    let mut parts = Vec::new();
    for form in document.select_all(document.root(), FILTER_FORMS_SELECTOR)? {
        let id = document.attr(form, "id").unwrap_or_default();
        let wanted = if is_mobile {
            id == MOBILE_FILTER_FORM_ID
        } else {
            DESKTOP_FORM_IDS.contains(&id)
        };
        if wanted {
            parts.push(serialize_form(document, form)?);
        }
    }

    Ok(QueryParams::concat(&parts))
}
