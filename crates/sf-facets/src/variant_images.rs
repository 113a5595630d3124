//! Product card images that follow the checked color filters.
//!
//! Each card's primary image is swapped to the first candidate image whose alt text or
//! source names a checked color, either literally or through its color family. The
//! original `src`/`srcset`/`alt` are kept in `data-original-*` attributes and put back
//! once no color matches.

use crate::color_groups;
use crate::color_groups::ColorGroups;
use crate::events::FragmentApplied;
use crate::events::FragmentObserver;
use serde::Deserialize;
use sf_core::SyncResult;
use sf_dom::Document;
use sf_dom::NodeId;
use sf_dom::Selector;

pub const CARD_SELECTOR: &str = ".card-product, .card--media, .card[class*=\"product\"]";
pub const PRIMARY_IMAGE_SELECTOR: &str = ".card__media .media img";
/// Attribute on `.card-wrapper` listing extra images as JSON `[{"src", "srcset", "alt"}]`.
pub const PRODUCT_MEDIA_ATTR: &str = "data-product-media";
pub const VARIANT_CLASS: &str = "variant-image";

const CHECKED_COLOR_SELECTOR: &str =
    "input[name*=\"color\"][checked], input[data-filter-key=\"color\"][checked]";
const COLOR_CONTROL_SELECTOR: &str = "input[type=\"checkbox\"][name*=\"color\"], \
input[type=\"checkbox\"][data-filter-key=\"color\"], [data-filter-key=\"color\"] input[type=\"checkbox\"]";
const CARD_WRAPPER_SELECTOR: &str = ".card-wrapper";

const ORIGINAL_SRC: &str = "data-original-src";
const ORIGINAL_SRCSET: &str = "data-original-srcset";
const ORIGINAL_ALT: &str = "data-original-alt";

/// A candidate image for a card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaImage {
    pub src: String,
    #[serde(default)]
    pub srcset: String,
    #[serde(default)]
    pub alt: String,
}

#[derive(Debug, Clone)]
pub struct VariantImages {
    groups: ColorGroups,
    cards: Selector,
    primary: Selector,
    checked_colors: Selector,
    color_control: Selector,
    wrapper: Selector,
}

impl VariantImages {
    pub fn new(groups: ColorGroups) -> SyncResult<Self> {
        Ok(Self {
            groups,
            cards: Selector::parse(CARD_SELECTOR)?,
            primary: Selector::parse(PRIMARY_IMAGE_SELECTOR)?,
            checked_colors: Selector::parse(CHECKED_COLOR_SELECTOR)?,
            color_control: Selector::parse(COLOR_CONTROL_SELECTOR)?,
            wrapper: Selector::parse(CARD_WRAPPER_SELECTOR)?,
        })
    }

    /// Checkbox belonging to a color filter.
    pub fn is_color_control(&self, document: &Document, control: NodeId) -> bool {
        self.color_control.matches(document, control)
    }

    /// Values of the checked color inputs, in document order.
    pub fn selected_colors(&self, document: &Document) -> Vec<String> {
        document
            .query_selector_all(document.root(), &self.checked_colors)
            .into_iter()
            .filter_map(|input| document.attr(input, "value"))
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Updates every card below `scope`; returns how many now show a variant image.
    pub fn update_cards(&self, document: &mut Document, scope: NodeId) -> usize {
        let colors = self.selected_colors(document);
        let mut seen = Vec::new();
        let mut swapped = 0_usize;

        for card in document.query_selector_all(scope, &self.cards) {
            let Some(image) = document.query_selector(card, &self.primary) else {
                continue;
            };
            if seen.contains(&image) {
                continue;
            }
            seen.push(image);

            let best = self.best_image(document, card, image, &colors);
            if apply(document, image, best) {
                swapped = swapped.saturating_add(1);
            }
        }

        tracing::debug!(cards = seen.len(), swapped, colors = colors.len(), "variant images updated");
        swapped
    }

    /// First candidate naming a color, trying colors in order.
    pub fn best_image(
        &self,
        document: &Document,
        card: NodeId,
        primary: NodeId,
        colors: &[String],
    ) -> Option<MediaImage> {
        if colors.is_empty() {
            return None;
        }
        let candidates = self.candidates(document, card, primary);

        for color in colors {
            let wanted = normalize(color);
            let family = self.groups.family_of(color);
            for image in &candidates {
                let alt = normalize(&image.alt);
                let src = normalize(&image.src);
                if alt.contains(&wanted) || src.contains(&wanted) {
                    return Some(image.clone());
                }
                if self.groups.mentions_family(&family, &alt) || self.groups.mentions_family(&family, &src) {
                    return Some(image.clone());
                }
            }
        }
        None
    }

    fn candidates(&self, document: &Document, card: NodeId, primary: NodeId) -> Vec<MediaImage> {
        let mut candidates = Vec::new();

        let wrapper = core::iter::once(card)
            .chain(document.ancestors(card))
            .find(|node| self.wrapper.matches(document, *node));
        if let Some(raw) = wrapper.and_then(|wrapper| document.attr(wrapper, PRODUCT_MEDIA_ATTR)) {
            match serde_json::from_str::<Vec<MediaImage>>(raw) {
                Ok(images) => candidates.extend(images),
                Err(error) => tracing::debug!(%error, "ignoring unreadable product media"),
            }
        }

        // Images following the primary inside its `.media` box.
        if let Some(media) = document.parent_element(primary) {
            let siblings = document.element_children(media);
            for sibling in siblings.into_iter().skip_while(|node| *node != primary).skip(1) {
                if document.tag_name(sibling) != Some("img") {
                    continue;
                }
                candidates.push(MediaImage {
                    src: document.attr(sibling, "src").unwrap_or_default().to_owned(),
                    srcset: document.attr(sibling, "srcset").unwrap_or_default().to_owned(),
                    alt: document.attr(sibling, "alt").unwrap_or_default().to_owned(),
                });
            }
        }
        candidates
    }
}

impl FragmentObserver for VariantImages {
    fn on_fragment_applied(&mut self, document: &mut Document, event: &FragmentApplied) -> SyncResult<()> {
        self.update_cards(document, event.root);
        Ok(())
    }
}

/// Folded color text with separators removed, so "Kongeblå" matches "kongebla" in a file name.
fn normalize(text: &str) -> String {
    color_groups::fold(text)
        .chars()
        .filter(|ch| !ch.is_whitespace() && !matches!(ch, '-' | '_'))
        .collect()
}

/// Shows `best` on `image`, or restores the original. Images never swapped are left alone.
fn apply(document: &mut Document, image: NodeId, best: Option<MediaImage>) -> bool {
    if !document.has_attr(image, ORIGINAL_SRC) {
        if best.is_none() {
            return false;
        }
        for (attr, original) in [("src", ORIGINAL_SRC), ("srcset", ORIGINAL_SRCSET), ("alt", ORIGINAL_ALT)] {
            let value = document.attr(image, attr).unwrap_or_default().to_owned();
            document.set_attr(image, original, &value);
        }
    }

    let original_src = document.attr(image, ORIGINAL_SRC).unwrap_or_default();
    match best.filter(|best| best.src != original_src) {
        Some(best) => {
            document.set_attr(image, "src", &best.src);
            if !best.srcset.is_empty() {
                document.set_attr(image, "srcset", &best.srcset);
            }
            if !best.alt.is_empty() {
                document.set_attr(image, "alt", &best.alt);
            }
            document.add_class(image, VARIANT_CLASS);
            true
        }
        None => {
            for (attr, original) in [("src", ORIGINAL_SRC), ("srcset", ORIGINAL_SRCSET), ("alt", ORIGINAL_ALT)] {
                match document.attr(image, original).filter(|value| !value.is_empty()).map(str::to_owned) {
                    Some(value) => document.set_attr(image, attr, &value),
                    None => {
                        document.remove_attr(image, attr);
                    }
                }
            }
            document.remove_class(image, VARIANT_CLASS);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::VariantImages;
    use crate::color_groups::ColorGroups;
    use sf_dom::Document;
    use sf_dom::NodeId;
    use sf_html::parse_document;

    const GRID: &str = r#"
        <form id="FacetFiltersForm">
          <ul role="list" data-filter-key="color">
            <li><input id="navy" type="checkbox" name="filter.v.option.color" value="Navy"></li>
            <li><input id="gronn" type="checkbox" name="filter.v.option.color" value="Grønn"></li>
          </ul>
          <ul role="list" data-filter-key="size">
            <li><input id="size-s" type="checkbox" name="filter.v.option.size" value="S" checked></li>
          </ul>
        </form>
        <ul id="product-grid">
          <li class="card-wrapper">
            <div class="card card--media">
              <div class="card__media"><div class="media">
                <img id="hat" src="/hat-red.jpg" srcset="/hat-red.jpg 1x" alt="Red hat">
                <img src="/hat-2.jpg" alt="Hat in blue">
              </div></div>
            </div>
          </li>
          <li class="card-wrapper" data-product-media='[{"src": "/cap-gronn.jpg", "alt": "Cap"}]'>
            <div class="card-product">
              <div class="card__media"><div class="media"><img id="cap" src="/cap.jpg" alt="Cap"></div></div>
            </div>
          </li>
        </ul>
    "#;

    fn variants() -> VariantImages {
        let groups = match ColorGroups::new() {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        match VariantImages::new(groups) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn node(document: &Document, id: &str) -> NodeId {
        match document.get_element_by_id(id) {
            Some(node) => node,
            None => panic!("missing #{id}"),
        }
    }

    #[test]
    fn family_match_swaps_to_secondary_image() {
        let mut document = parse_document(GRID);
        let navy = node(&document, "navy");
        document.set_attr(navy, "checked", "");
        let root = document.root();

        assert_eq!(variants().update_cards(&mut document, root), 1);
        let hat = node(&document, "hat");
        assert_eq!(document.attr(hat, "src"), Some("/hat-2.jpg"));
        assert_eq!(document.attr(hat, "alt"), Some("Hat in blue"));
        assert_eq!(document.attr(hat, "srcset"), Some("/hat-red.jpg 1x"));
        assert_eq!(document.attr(hat, "data-original-src"), Some("/hat-red.jpg"));
        assert!(document.has_class(hat, "variant-image"));

        let cap = node(&document, "cap");
        assert_eq!(document.attr(cap, "src"), Some("/cap.jpg"));
        assert!(!document.has_attr(cap, "data-original-src"));
    }

    #[test]
    fn unchecking_restores_the_original_image() {
        let mut document = parse_document(GRID);
        let navy = node(&document, "navy");
        let root = document.root();
        let variants = variants();

        document.set_attr(navy, "checked", "");
        variants.update_cards(&mut document, root);
        document.remove_attr(navy, "checked");
        assert_eq!(variants.update_cards(&mut document, root), 0);

        let hat = node(&document, "hat");
        assert_eq!(document.attr(hat, "src"), Some("/hat-red.jpg"));
        assert_eq!(document.attr(hat, "srcset"), Some("/hat-red.jpg 1x"));
        assert_eq!(document.attr(hat, "alt"), Some("Red hat"));
        assert!(!document.has_class(hat, "variant-image"));
    }

    #[test]
    fn product_media_attribute_supplies_candidates() {
        let mut document = parse_document(GRID);
        let gronn = node(&document, "gronn");
        document.set_attr(gronn, "checked", "");
        let root = document.root();

        assert_eq!(variants().update_cards(&mut document, root), 1);
        let cap = node(&document, "cap");
        assert_eq!(document.attr(cap, "src"), Some("/cap-gronn.jpg"));
        assert_eq!(document.attr(cap, "data-original-srcset"), Some(""));
        assert!(!document.has_attr(cap, "srcset"));
    }

    #[test]
    fn only_color_checkboxes_count_as_color_controls() {
        let document = parse_document(GRID);
        let variants = variants();
        assert!(variants.is_color_control(&document, node(&document, "navy")));
        assert!(!variants.is_color_control(&document, node(&document, "size-s")));
        assert_eq!(variants.selected_colors(&document), Vec::<String>::new());
    }
}
