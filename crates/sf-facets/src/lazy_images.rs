//! Deferred image loading for freshly rendered product cards.

use crate::config::RootMargin;
use crate::events::FragmentApplied;
use crate::events::FragmentObserver;
use sf_core::SyncResult;
use sf_dom::Document;
use sf_dom::NodeId;

pub const LAZY_IMAGE_SELECTOR: &str =
    "img[data-lazy-src], img[data-lazy-srcset], img[data-src], img[data-srcset]";

const OBSERVED_MARKER: &str = "data-lazy-observed";
const LOADED_MARKER: &str = "data-lazy-loaded";

/// Viewport-proximity capability supplied by the host.
///
/// The host calls [`crate::FacetEngine::on_image_proximity`] once an observed image
/// comes within the margin.
pub trait ProximityObserver {
    fn observe(&mut self, image: NodeId, margin: RootMargin);
    fn unobserve(&mut self, image: NodeId);
}

pub struct LazyImageLoader {
    observer: Option<Box<dyn ProximityObserver>>,
    margin: RootMargin,
}

impl LazyImageLoader {
    pub fn new(observer: Option<Box<dyn ProximityObserver>>, margin: RootMargin) -> Self {
        Self { observer, margin }
    }

    /// Registers every pending image below `root`; with no observer the sources are
    /// promoted at once. Returns how many images were registered or promoted.
    pub fn scan(&mut self, document: &mut Document, root: NodeId) -> SyncResult<usize> {
        let mut handled = 0_usize;
        for image in document.select_all(root, LAZY_IMAGE_SELECTOR)? {
            if document.attr(image, LOADED_MARKER) == Some("true") {
                continue;
            }
            match self.observer.as_mut() {
                None => load_image(document, image),
                Some(observer) => {
                    if document.attr(image, OBSERVED_MARKER) == Some("true") {
                        continue;
                    }
                    observer.observe(image, self.margin);
                    document.set_attr(image, OBSERVED_MARKER, "true");
                }
            }
            handled = handled.saturating_add(1);
        }
        Ok(handled)
    }

    /// Loads an image the host reported as near the viewport.
    pub fn on_proximity(&mut self, document: &mut Document, image: NodeId) {
        load_image(document, image);
        if let Some(observer) = self.observer.as_mut() {
            observer.unobserve(image);
        }
    }
}

impl FragmentObserver for LazyImageLoader {
    fn on_fragment_applied(&mut self, document: &mut Document, event: &FragmentApplied) -> SyncResult<()> {
        let handled = self.scan(document, event.root)?;
        tracing::debug!(images = handled, "lazy images registered");
        Ok(())
    }
}

impl core::fmt::Debug for LazyImageLoader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LazyImageLoader")
            .field("observer", &self.observer.is_some())
            .field("margin", &self.margin)
            .finish()
    }
}

/// Promotes pending `src`/`srcset` values and marks the image loaded.
pub fn load_image(document: &mut Document, image: NodeId) {
    let src = document
        .attr(image, "data-lazy-src")
        .or_else(|| document.attr(image, "data-src"))
        .filter(|value| !value.is_empty())
        .map(str::to_owned);
    let srcset = document
        .attr(image, "data-lazy-srcset")
        .or_else(|| document.attr(image, "data-srcset"))
        .filter(|value| !value.is_empty())
        .map(str::to_owned);

    if let Some(src) = src {
        document.set_attr(image, "src", &src);
        document.remove_attr(image, "data-lazy-src");
        document.remove_attr(image, "data-src");
    }
    if let Some(srcset) = srcset {
        document.set_attr(image, "srcset", &srcset);
        document.remove_attr(image, "data-lazy-srcset");
        document.remove_attr(image, "data-srcset");
    }

    document.remove_attr(image, OBSERVED_MARKER);
    document.set_attr(image, LOADED_MARKER, "true");
}

#[cfg(test)]
mod tests {
    use super::LazyImageLoader;
    use super::ProximityObserver;
    use crate::config::RootMargin;
    use sf_dom::Document;
    use sf_dom::NodeId;
    use sf_html::parse_document;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Observed {
        observing: Vec<NodeId>,
        margins: Vec<RootMargin>,
    }

    struct FakeObserver(Rc<RefCell<Observed>>);

    impl ProximityObserver for FakeObserver {
        fn observe(&mut self, image: NodeId, margin: RootMargin) {
            let mut observed = self.0.borrow_mut();
            observed.observing.push(image);
            observed.margins.push(margin);
        }

        fn unobserve(&mut self, image: NodeId) {
            self.0.borrow_mut().observing.retain(|node| *node != image);
        }
    }

    const GRID: &str = r#"
        <div id="ProductGridContainer">
          <img id="a" data-lazy-src="/a.jpg" data-lazy-srcset="/a.jpg 1x, /a@2x.jpg 2x">
          <img id="b" data-src="/b.jpg">
          <img id="c" src="/c.jpg">
        </div>
    "#;

    fn node(document: &Document, id: &str) -> NodeId {
        match document.get_element_by_id(id) {
            Some(node) => node,
            None => panic!("missing #{id}"),
        }
    }

    #[test]
    fn without_observer_sources_are_promoted_immediately() {
        let mut document = parse_document(GRID);
        let root = document.root();
        let mut loader = LazyImageLoader::new(None, RootMargin::default());

        assert_eq!(loader.scan(&mut document, root), Ok(2));
        let a = node(&document, "a");
        assert_eq!(document.attr(a, "src"), Some("/a.jpg"));
        assert_eq!(document.attr(a, "srcset"), Some("/a.jpg 1x, /a@2x.jpg 2x"));
        assert!(!document.has_attr(a, "data-lazy-src"));
        assert_eq!(document.attr(a, "data-lazy-loaded"), Some("true"));

        assert_eq!(loader.scan(&mut document, root), Ok(0));
    }

    #[test]
    fn observed_images_register_once_and_load_on_proximity() {
        let state = Rc::new(RefCell::new(Observed::default()));
        let mut document = parse_document(GRID);
        let root = document.root();
        let mut loader = LazyImageLoader::new(
            Some(Box::new(FakeObserver(Rc::clone(&state)))),
            RootMargin::default(),
        );

        assert_eq!(loader.scan(&mut document, root), Ok(2));
        assert_eq!(loader.scan(&mut document, root), Ok(0));
        assert_eq!(state.borrow().observing.len(), 2);
        assert_eq!(state.borrow().margins[0].to_string(), "200px 0px");

        let b = node(&document, "b");
        assert_eq!(document.attr(b, "data-lazy-observed"), Some("true"));
        loader.on_proximity(&mut document, b);
        assert_eq!(document.attr(b, "src"), Some("/b.jpg"));
        assert!(!document.has_attr(b, "data-src"));
        assert!(!document.has_attr(b, "data-lazy-observed"));
        assert_eq!(state.borrow().observing, vec![node(&document, "a")]);
    }
}
