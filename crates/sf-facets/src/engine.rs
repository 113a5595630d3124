//! The facet engine: turns interactions into fragment renders.

use crate::cache::FragmentCache;
use crate::color_groups;
use crate::color_groups::ColorGroups;
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::events::EventBus;
use crate::events::FRAGMENT_APPLIED;
use crate::events::FragmentApplied;
use crate::events::FragmentObserver;
use crate::form;
use crate::history::BrowserHost;
use crate::history::HistoryState;
use crate::lazy_images::LazyImageLoader;
use crate::lazy_images::ProximityObserver;
use crate::panels;
use crate::reconcile;
use crate::reconcile::Trigger;
use crate::state::EngineState;
use crate::variant_images::VariantImages;
use core::time::Duration;
use sf_core::SyncError;
use sf_core::SyncResult;
use sf_dom::Document;
use sf_dom::NodeId;
use sf_html::HtmlParser;
use sf_net::FragmentTransport;
use sf_net::PageLocation;
use sf_net::QueryParams;

const PRODUCT_GRID_ID: &str = "product-grid";

/// Where a section's HTML came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSource {
    Cache,
    Network,
}

impl SectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Network => "network",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOutcome {
    Rendered {
        section_id: String,
        url: String,
        source: SectionSource,
    },
    /// The fragment could not be fetched or applied; the host was asked to navigate.
    FellBack {
        section_id: String,
        url: String,
        navigated_to: String,
        error: SyncError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Merged query the render was for, without `section_id`.
    pub query: QueryParams,
    pub sections: Vec<SectionOutcome>,
    pub history_pushed: bool,
}

impl RenderOutcome {
    pub fn fell_back(&self) -> bool {
        self.sections
            .iter()
            .any(|section| matches!(section, SectionOutcome::FellBack { .. }))
    }
}

/// Collects optional collaborators before the engine takes over the page.
pub struct EngineBuilder {
    page_url: String,
    document: Document,
    config: EngineConfig,
    proximity: Option<Box<dyn ProximityObserver>>,
    observers: Vec<Box<dyn FragmentObserver>>,
}

impl EngineBuilder {
    pub fn new(page_url: impl Into<String>, document: Document) -> Self {
        Self {
            page_url: page_url.into(),
            document,
            config: EngineConfig::default(),
            proximity: None,
            observers: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn proximity_observer(mut self, observer: Box<dyn ProximityObserver>) -> Self {
        self.proximity = Some(observer);
        self
    }

    /// Adds a `fragment-applied` observer; runs after the built-in color grouping.
    pub fn observer(mut self, observer: Box<dyn FragmentObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Validates the setup and prepares the page: duplicate panels are folded, chip
    /// links are marked as buttons, pending images are registered, color lists are
    /// grouped and card images follow the checked colors.
    pub fn build<T, H>(self, transport: T, host: H) -> SyncResult<FacetEngine<T, H>>
    where
        T: FragmentTransport,
        H: BrowserHost,
    {
        self.config.validate()?;
        let page = PageLocation::parse(&self.page_url)?;
        let mut document = self.document;
        let root = document.root();

        let folded = panels::normalize_duplicate_filters(&mut document)?;
        for link in document.select_all(root, "facet-remove a")? {
            document.set_attr(link, "role", "button");
        }

        let mut lazy_images = LazyImageLoader::new(self.proximity, self.config.lazy_root_margin);
        let images = lazy_images.scan(&mut document, root)?;

        let color_groups = ColorGroups::new()?;
        let grouped = color_groups.build_groups(&mut document, root)?;
        let variant_images = VariantImages::new(color_groups.clone())?;
        let variants = variant_images.update_cards(&mut document, root);

        let mut observers = EventBus::new();
        observers.subscribe(Box::new(color_groups));
        for observer in self.observers {
            observers.subscribe(observer);
        }

        tracing::info!(
            page = page.href(),
            folded_panels = folded,
            lazy_images = images,
            color_lists = grouped,
            variant_images = variants,
            "facet engine ready"
        );

        Ok(FacetEngine {
            state: EngineState::new(page.query()),
            submit: Debouncer::new(self.config.submit_debounce),
            active_filter: Debouncer::new(self.config.active_filter_debounce),
            config: self.config,
            page,
            document,
            transport,
            host,
            cache: FragmentCache::new(),
            lazy_images,
            variant_images,
            observers,
        })
    }
}

/// Facet state synchronization for one page view.
///
/// The host forwards DOM events, history traversals and the passage of time; the
/// engine owns the live document and mutates it in place.
pub struct FacetEngine<T, H> {
    config: EngineConfig,
    page: PageLocation,
    document: Document,
    transport: T,
    host: H,
    state: EngineState,
    cache: FragmentCache,
    lazy_images: LazyImageLoader,
    variant_images: VariantImages,
    observers: EventBus,
    submit: Debouncer<NodeId>,
    active_filter: Debouncer<String>,
}

impl<T, H> FacetEngine<T, H>
where
    T: FragmentTransport,
    H: BrowserHost,
{
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn page(&self) -> &PageLocation {
        &self.page
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    pub fn subscribe(&mut self, observer: Box<dyn FragmentObserver>) {
        self.observers.subscribe(observer);
    }

    /// Section ids rendered by this page.
    pub fn sections(&self) -> SyncResult<Vec<String>> {
        let grid = self.document.get_element_by_id(PRODUCT_GRID_ID).ok_or_else(|| {
            SyncError::new(
                "facets.section_missing",
                format!("page has no `#{PRODUCT_GRID_ID}` element"),
            )
        })?;
        let section_id = self.document.attr(grid, "data-id").unwrap_or_default();
        Ok(vec![section_id.to_owned()])
    }

    /// Renders the page for `params`, merged over the initial query.
    ///
    /// `trigger` is the control the user interacted with, if any; its filter panel is
    /// refreshed in place instead of replaced. A history entry is pushed only when
    /// `push_history` is set and every section rendered.
    pub fn render_page(
        &mut self,
        params: &QueryParams,
        trigger: Option<NodeId>,
        push_history: bool,
    ) -> SyncResult<RenderOutcome> {
        let sections = self.sections()?;
        let trigger = match trigger {
            Some(control) => Some(Trigger::from_control(&self.document, control)?),
            None => None,
        };
        let merged = self.state.merged(params);
        self.state.begin_render(merged.clone());

        reconcile::show_loading(&mut self.document)?;
        tracing::info!(query = %merged, sections = sections.len(), "rendering facets");

        let mut outcomes = Vec::with_capacity(sections.len());
        for section_id in sections {
            let url = sf_net::section_fetch_url(&self.page, self.state.initial(), params, &section_id);

            if let Some(html) = self.cache.lookup(&url).map(str::to_owned) {
                tracing::debug!(url = %url, "fragment cache hit");
                self.apply_fragment(&html, trigger.as_ref())?;
                outcomes.push(SectionOutcome::Rendered {
                    section_id,
                    url,
                    source: SectionSource::Cache,
                });
                continue;
            }

            tracing::debug!(url = %url, "fragment cache miss");
            let fetched = sf_net::fetch_section(&mut self.transport, &self.page, &url);
            let applied = fetched.and_then(|html| {
                self.cache.insert(url.clone(), html.clone());
                self.apply_fragment(&html, trigger.as_ref())
            });
            outcomes.push(match applied {
                Ok(()) => SectionOutcome::Rendered {
                    section_id,
                    url,
                    source: SectionSource::Network,
                },
                Err(error) => self.fall_back(section_id, url, &merged, error),
            });
        }

        let history_pushed = push_history
            && outcomes
                .iter()
                .all(|outcome| matches!(outcome, SectionOutcome::Rendered { .. }));
        if history_pushed {
            let target = self.page.path_with_query(&merged);
            tracing::info!(url = %target, "pushing history entry");
            self.host.push_state(HistoryState::new(merged.to_string()), &target);
        }

        Ok(RenderOutcome {
            query: merged,
            sections: outcomes,
            history_pushed,
        })
    }

    fn apply_fragment(&mut self, html: &str, trigger: Option<&Trigger>) -> SyncResult<()> {
        let fetched = HtmlParser.parse(html);
        reconcile::render_filters(&mut self.document, &fetched, trigger)?;
        let root = reconcile::render_product_grid(&mut self.document, &fetched)?;

        let event = FragmentApplied { root };
        self.lazy_images.on_fragment_applied(&mut self.document, &event)?;
        self.variant_images.on_fragment_applied(&mut self.document, &event)?;
        let delivered = self.observers.dispatch(&mut self.document, &event);
        tracing::debug!(event = FRAGMENT_APPLIED, observers = delivered, "notified observers");

        reconcile::render_product_count(&mut self.document, &fetched)
    }

    fn fall_back(&mut self, section_id: String, url: String, merged: &QueryParams, error: SyncError) -> SectionOutcome {
        let target = self.page.path_with_query(merged);
        tracing::warn!(
            url = %url,
            target = %target,
            %error,
            "fragment render failed, falling back to full navigation"
        );
        self.host.navigate(&target);
        SectionOutcome::FellBack {
            section_id,
            url,
            navigated_to: target,
            error,
        }
    }

    /// A filter or sort control fired `input` or `change`. Color checkboxes update the
    /// card images right away.
    pub fn on_form_event(&mut self, target: NodeId, now: Duration) {
        if self.variant_images.is_color_control(&self.document, target) {
            let root = self.document.root();
            self.variant_images.update_cards(&mut self.document, root);
        }
        self.submit.schedule(now, target);
    }

    /// An active-filter chip link was clicked.
    pub fn on_active_filter_click(&mut self, link: NodeId, now: Duration) -> SyncResult<()> {
        let href = self.document.attr(link, "href").ok_or_else(|| {
            SyncError::new(
                "facets.link_invalid",
                format!("active filter link {link} has no href"),
            )
        })?;
        self.active_filter.schedule(now, href.to_owned());
        Ok(())
    }

    /// A color family button was clicked; returns how many options changed.
    pub fn on_color_group_click(&mut self, button: NodeId, now: Duration) -> SyncResult<usize> {
        let changed = color_groups::toggle_group(&mut self.document, button)?;
        let root = self.document.root();
        self.variant_images.update_cards(&mut self.document, root);
        if let Some(last) = changed.last() {
            self.submit.schedule(now, *last);
        }
        Ok(changed.len())
    }

    /// The host reports that an observed lazy image is near the viewport.
    pub fn on_image_proximity(&mut self, image: NodeId) {
        self.lazy_images.on_proximity(&mut self.document, image);
    }

    /// Earliest pending debounce deadline, for the host's timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.submit.deadline(), self.active_filter.deadline()) {
            (Some(submit), Some(active)) => Some(submit.min(active)),
            (submit, active) => submit.or(active),
        }
    }

    /// Runs every debounced action due at `now`, earliest deadline first.
    pub fn tick(&mut self, now: Duration) -> SyncResult<Vec<RenderOutcome>> {
        let submit_first = match (self.submit.deadline(), self.active_filter.deadline()) {
            (Some(submit), Some(active)) => submit <= active,
            _ => true,
        };

        let mut outcomes = Vec::new();
        if submit_first {
            self.fire_submit(now, &mut outcomes)?;
            self.fire_active_filter(now, &mut outcomes)?;
        } else {
            self.fire_active_filter(now, &mut outcomes)?;
            self.fire_submit(now, &mut outcomes)?;
        }
        Ok(outcomes)
    }

    fn fire_submit(&mut self, now: Duration, outcomes: &mut Vec<RenderOutcome>) -> SyncResult<()> {
        let Some(target) = self.submit.poll(now) else {
            return Ok(());
        };
        let params = form::submission_params(&self.document, target)?;
        outcomes.push(self.render_page(&params, Some(target), true)?);
        Ok(())
    }

    fn fire_active_filter(&mut self, now: Duration, outcomes: &mut Vec<RenderOutcome>) -> SyncResult<()> {
        let Some(href) = self.active_filter.poll(now) else {
            return Ok(());
        };
        reconcile::toggle_active_facets(&mut self.document, true)?;
        let query = href
            .split_once('?')
            .map(|(_, query)| query.split('#').next().unwrap_or_default())
            .unwrap_or_default();
        outcomes.push(self.render_page(&QueryParams::parse(query), None, true)?);
        Ok(())
    }

    /// History traversal. `state` is the entry's state object, `None` for entries this
    /// engine did not push. Returns `None` when the entry shows what is already rendered.
    pub fn on_popstate(&mut self, state: Option<&HistoryState>) -> SyncResult<Option<RenderOutcome>> {
        let params = match state {
            Some(state) => QueryParams::parse(&state.search_params),
            None => self.state.initial().clone(),
        };
        if self.state.merged(&params) == *self.state.last_rendered() {
            tracing::debug!(query = %params, "history entry already rendered");
            return Ok(None);
        }
        self.render_page(&params, None, false).map(Some)
    }
}

impl<T, H> core::fmt::Debug for FacetEngine<T, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FacetEngine")
            .field("page", &self.page.href())
            .field("state", &self.state)
            .field("cached_fragments", &self.cache.len())
            .field("observers", &self.observers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::EngineBuilder;
    use super::FacetEngine;
    use super::SectionOutcome;
    use super::SectionSource;
    use crate::events::FragmentApplied;
    use crate::events::FragmentObserver;
    use crate::history::BrowserHost;
    use crate::history::HistoryState;
    use crate::history::SessionHistory;
    use core::time::Duration;
    use sf_core::SyncError;
    use sf_core::SyncResult;
    use sf_dom::Document;
    use sf_dom::NodeId;
    use sf_html::parse_document;
    use sf_net::FragmentResponse;
    use sf_net::QueryParams;
    use sf_net::ScriptedTransport;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    type Engine = FacetEngine<ScriptedTransport, SessionHistory>;

    const PAGE_URL: &str = "https://shop.example/collections/hats?filter.color=red";
    const RED_BLUE_URL: &str = "https://shop.example/collections/hats?filter.color=red&filter.color=blue&section_id=template--main";
    const BLUE_URL: &str = "https://shop.example/collections/hats?filter.color=blue&section_id=template--main";

    const PAGE: &str = r#"
        <facet-filters-form class="facets-container">
          <form id="FacetFiltersForm">
            <details id="Details-color" class="js-filter" data-filter-key="color">
              <summary class="facets__summary">Color</summary>
              <div class="facets-wrap"><ul data-filter-key="color" role="list">
                <li class="facets__item"><input id="red" type="checkbox" name="filter.color" value="red" checked></li>
                <li class="facets__item"><input id="blue" type="checkbox" name="filter.color" value="blue"></li>
              </ul></div>
            </details>
          </form>
          <div class="loading__spinner hidden"></div>
          <div class="active-facets-desktop"><facet-remove><a id="chip" class="js-facet-remove" href="/collections/hats?filter.color=blue">Red</a></facet-remove></div>
        </facet-filters-form>
        <div id="ProductCount">1 product</div>
        <div id="ProductGridContainer"><ul id="product-grid" class="collection" data-id="template--main"><li>Red hat</li></ul></div>
    "#;

    fn fragment(count: &str, chip_href: &str) -> String {
        format!(
            r#"<facet-filters-form class="facets-container">
                 <form id="FacetFiltersForm">
                   <details id="Details-color" class="js-filter" data-filter-key="color">
                     <summary class="facets__summary">Color ({count})</summary>
                     <div class="facets-wrap"><ul data-filter-key="color" role="list">
                       <li class="facets__item"><input type="checkbox" name="filter.color" value="red" checked></li>
                       <li class="facets__item"><input type="checkbox" name="filter.color" value="blue" checked></li>
                     </ul></div>
                   </details>
                 </form>
                 <div class="active-facets-desktop"><facet-remove><a id="chip" class="js-facet-remove" href="{chip_href}">Red</a></facet-remove></div>
               </facet-filters-form>
               <div id="ProductCount">{count} products</div>
               <div id="ProductGridContainer"><ul id="product-grid" class="collection" data-id="template--main">
                 <li><img data-lazy-src="/hat-{count}.jpg"></li>
               </ul></div>"#
        )
    }

    fn engine(transport: ScriptedTransport) -> Engine {
        let built = EngineBuilder::new(PAGE_URL, parse_document(PAGE))
            .build(transport, SessionHistory::new("/collections/hats?filter.color=red"));
        match built {
            Ok(engine) => engine,
            Err(error) => panic!("{error}"),
        }
    }

    fn node(document: &Document, id: &str) -> NodeId {
        match document.get_element_by_id(id) {
            Some(node) => node,
            None => panic!("missing #{id}"),
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn count_text(engine: &Engine) -> String {
        engine.document().text_content(node(engine.document(), "ProductCount"))
    }

    #[test]
    fn check_remove_and_back_scenario() {
        let mut transport = ScriptedTransport::new();
        transport.respond(RED_BLUE_URL, FragmentResponse::html(&fragment("2", "/collections/hats?filter.color=blue")));
        transport.respond(BLUE_URL, FragmentResponse::html(&fragment("1", "/collections/hats")));
        transport.respond_to_any(FragmentResponse::html(&fragment("5", "/collections/hats")));
        let mut engine = engine(transport);

        let blue = node(engine.document(), "blue");
        engine.document_mut().set_attr(blue, "checked", "");
        engine.on_form_event(blue, ms(0));
        assert_eq!(engine.tick(ms(799)).map(|outcomes| outcomes.len()), Ok(0));

        let outcomes = match engine.tick(ms(800)) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].query.to_string(), "filter.color=red&filter.color=blue");
        assert!(outcomes[0].history_pushed);
        assert_eq!(engine.transport().requested_urls(), vec![RED_BLUE_URL]);
        assert_eq!(count_text(&engine), "2 products");
        assert_eq!(
            engine.host().current().url,
            "/collections/hats?filter.color=red&filter.color=blue"
        );

        let chip = node(engine.document(), "chip");
        assert!(engine.on_active_filter_click(chip, ms(1000)).is_ok());
        assert!(engine.tick(ms(1299)).is_ok_and(|outcomes| outcomes.is_empty()));
        let outcomes = match engine.tick(ms(1300)) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(outcomes[0].query.to_string(), "filter.color=blue");
        assert_eq!(engine.host().current().state, Some(HistoryState::new("filter.color=blue")));
        assert_eq!(count_text(&engine), "1 products");

        let popped = engine.host_mut().back();
        let outcome = match popped {
            Some(state) => engine.on_popstate(state.as_ref()),
            None => panic!("no history entry to go back to"),
        };
        let outcome = match outcome {
            Ok(Some(value)) => value,
            other => panic!("expected a re-render, got {other:?}"),
        };
        assert!(!outcome.history_pushed);
        assert!(matches!(
            outcome.sections[0],
            SectionOutcome::Rendered { source: SectionSource::Cache, .. }
        ));
        assert_eq!(engine.transport().requests().len(), 2);
        assert_eq!(engine.host().len(), 3);
        assert_eq!(count_text(&engine), "2 products");

        let popped = engine.host_mut().back();
        let outcome = match popped {
            Some(state) => engine.on_popstate(state.as_ref()),
            None => panic!("no initial entry"),
        };
        assert!(matches!(outcome, Ok(Some(_))));
        assert_eq!(engine.state().last_rendered().to_string(), "filter.color=red");
        assert_eq!(engine.transport().requests().len(), 3);
    }

    #[test]
    fn popstate_for_rendered_state_is_ignored() {
        let mut engine = engine(ScriptedTransport::new());
        assert_eq!(engine.on_popstate(None), Ok(None));
        let state = HistoryState::new("filter.color=red&page=4");
        assert_eq!(engine.on_popstate(Some(&state)), Ok(None));
        assert!(engine.transport().requests().is_empty());
    }

    #[test]
    fn http_error_falls_back_to_navigation() {
        let mut transport = ScriptedTransport::new();
        let failure = match FragmentResponse::with_status(500, "oops") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        transport.respond_to_any(failure);
        let mut engine = engine(transport);

        let outcome = engine.render_page(&QueryParams::parse("filter.color=red&filter.color=blue"), None, true);
        let outcome = match outcome {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(outcome.fell_back());
        assert!(!outcome.history_pushed);
        assert_eq!(
            engine.host().navigations(),
            ["/collections/hats?filter.color=red&filter.color=blue".to_owned()]
        );
        assert_eq!(engine.host().len(), 1);
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn reconcile_failure_on_network_path_falls_back() {
        let mut transport = ScriptedTransport::new();
        transport.respond_to_any(FragmentResponse::html("<div id=\"ProductGridContainer\"></div>"));
        let mut engine = engine(transport);

        let outcome = engine.render_page(&QueryParams::parse("filter.color=blue"), None, true);
        assert!(outcome.is_ok_and(|outcome| outcome.fell_back()));
        assert_eq!(engine.host().navigations().len(), 1);
    }

    #[test]
    fn reconcile_failure_on_cache_path_propagates() {
        let mut transport = ScriptedTransport::new();
        transport.respond_to_any(FragmentResponse::html(&fragment("3", "/collections/hats")));
        let mut engine = engine(transport);
        let params = QueryParams::parse("filter.color=blue");

        assert!(engine.render_page(&params, None, true).is_ok());
        let count = node(engine.document(), "ProductCount");
        engine.document_mut().remove(count);

        let rendered = engine.render_page(&params, None, true);
        assert!(rendered.is_err());
        if let Err(error) = rendered {
            assert_eq!(error.code, "dom.target_missing");
        }
        assert_eq!(engine.transport().requests().len(), 1);
        assert!(engine.host().navigations().is_empty());
    }

    #[test]
    fn repeated_query_is_served_from_cache() {
        let mut transport = ScriptedTransport::new();
        transport.respond_to_any(FragmentResponse::html(&fragment("3", "/collections/hats")));
        let mut engine = engine(transport);
        let params = QueryParams::parse("filter.color=blue");

        let first = engine.render_page(&params, None, true);
        let second = engine.render_page(&params, None, true);
        assert!(matches!(
            first.map(|outcome| outcome.sections),
            Ok(sections) if matches!(sections[0], SectionOutcome::Rendered { source: SectionSource::Network, .. })
        ));
        assert!(matches!(
            second.map(|outcome| outcome.sections),
            Ok(sections) if matches!(sections[0], SectionOutcome::Rendered { source: SectionSource::Cache, .. })
        ));
        assert_eq!(engine.transport().requests().len(), 1);
        assert_eq!(engine.cache().len(), 1);
    }

    struct GridSnapshot {
        seen: Rc<RefCell<Vec<(String, String)>>>,
    }

    impl FragmentObserver for GridSnapshot {
        fn on_fragment_applied(&mut self, document: &mut Document, event: &FragmentApplied) -> SyncResult<()> {
            let count = document
                .get_element_by_id("ProductCount")
                .map(|count| document.text_content(count))
                .unwrap_or_default();
            let image = document
                .select_first(event.root, "img")?
                .and_then(|image| document.attr(image, "src"))
                .unwrap_or_default()
                .to_owned();
            self.seen.borrow_mut().push((image, count));
            Ok(())
        }
    }

    #[test]
    fn observers_run_once_after_grid_and_before_count() {
        let mut transport = ScriptedTransport::new();
        transport.respond_to_any(FragmentResponse::html(&fragment("7", "/collections/hats")));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let built = EngineBuilder::new(PAGE_URL, parse_document(PAGE))
            .observer(Box::new(GridSnapshot { seen: Rc::clone(&seen) }))
            .build(transport, SessionHistory::new("/collections/hats"));
        let mut engine = match built {
            Ok(engine) => engine,
            Err(error) => panic!("{error}"),
        };

        assert!(engine.render_page(&QueryParams::parse("filter.color=blue"), None, true).is_ok());
        assert_eq!(
            *seen.borrow(),
            vec![("/hat-7.jpg".to_owned(), "1 product".to_owned())]
        );
        assert_eq!(count_text(&engine), "7 products");
    }

    #[test]
    fn chip_links_are_disabled_while_rendering_and_marked_as_buttons() {
        let mut transport = ScriptedTransport::new();
        transport.fail_any(SyncError::new("net.fetch.offline", "offline"));
        let mut engine = engine(transport);
        let chip = node(engine.document(), "chip");
        assert_eq!(engine.document().attr(chip, "role"), Some("button"));

        assert!(engine.on_active_filter_click(chip, ms(0)).is_ok());
        assert!(engine.tick(ms(300)).is_ok());
        assert!(engine.document().has_class(chip, "disabled"));
        assert_eq!(engine.host().navigations(), ["/collections/hats?filter.color=blue".to_owned()]);
    }

    #[derive(Clone, Default)]
    struct WarnCapture(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCapture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                if let Ok(mut captured) = self.0.lock() {
                    captured.push(event.metadata().target().to_owned());
                }
            }
        }
    }

    #[test]
    fn fallback_is_logged_as_warning() {
        let capture = WarnCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        tracing::subscriber::with_default(subscriber, || {
            let mut transport = ScriptedTransport::new();
            transport.fail_any(SyncError::new("net.fetch.offline", "offline"));
            let mut engine = engine(transport);
            assert!(engine.render_page(&QueryParams::parse("filter.color=blue"), None, true).is_ok());
        });

        let captured = match capture.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        assert_eq!(captured, vec!["sf_facets::engine".to_owned()]);
    }

    #[test]
    fn color_group_click_schedules_submission() {
        let page = r#"
            <facet-filters-form><form id="FacetFiltersForm">
              <details id="Details-color" class="js-filter" data-filter-key="color"><div class="facets-wrap">
                <ul role="list" data-filter-key="color">
                  <li><input id="navy" type="checkbox" name="filter.color" value="Navy"><span class="facet-checkbox__text-label">Navy</span></li>
                  <li><input id="royal" type="checkbox" name="filter.color" value="Royal"><span class="facet-checkbox__text-label">Royal</span></li>
                  <li><input id="wine" type="checkbox" name="filter.color" value="Vinrød"><span class="facet-checkbox__text-label">Vinrød</span></li>
                </ul></div></details>
            </form></facet-filters-form>
            <div id="ProductCount">0</div>
            <div id="ProductGridContainer"><ul id="product-grid" data-id="main"></ul></div>
        "#;
        let mut transport = ScriptedTransport::new();
        transport.respond_to_any(FragmentResponse::html(
            "<div id=\"ProductCount\">9</div><div id=\"ProductGridContainer\"></div>",
        ));
        let built = EngineBuilder::new("https://shop.example/collections/all", parse_document(page))
            .build(transport, SessionHistory::new("/collections/all"));
        let mut engine = match built {
            Ok(engine) => engine,
            Err(error) => panic!("{error}"),
        };

        let button = match engine.document().select_first(engine.document().root(), ".color-group__btn") {
            Ok(Some(button)) => button,
            other => panic!("expected a color group button, got {other:?}"),
        };
        assert_eq!(engine.on_color_group_click(button, ms(0)), Ok(2));
        assert_eq!(engine.next_deadline(), Some(ms(800)));

        let outcomes = match engine.tick(ms(800)) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(outcomes[0].query.to_string(), "filter.color=Navy&filter.color=Royal");
    }

    #[test]
    fn missing_product_grid_is_reported() {
        let built = EngineBuilder::new(PAGE_URL, parse_document("<div id=\"ProductCount\"></div>"))
            .build(ScriptedTransport::new(), SessionHistory::new("/"));
        let mut engine = match built {
            Ok(engine) => engine,
            Err(error) => panic!("{error}"),
        };
        let rendered = engine.render_page(&QueryParams::parse("filter.color=blue"), None, true);
        assert!(rendered.is_err());
        if let Err(error) = rendered {
            assert_eq!(error.code, "facets.section_missing");
        }
        assert_eq!(engine.state().renders(), 0);
        assert_eq!(engine.state().last_rendered().to_string(), "filter.color=red");
        assert!(engine.transport().requests().is_empty());
    }

    #[test]
    fn cached_renders_do_not_grow_the_document() {
        let mut transport = ScriptedTransport::new();
        transport.respond_to_any(FragmentResponse::html(&fragment("3", "/collections/hats")));
        let mut engine = engine(transport);
        let params = QueryParams::parse("filter.color=blue");

        assert!(engine.render_page(&params, None, true).is_ok());
        assert!(engine.render_page(&params, None, false).is_ok());
        let settled = engine.document().node_count();
        for _ in 0..100 {
            assert!(engine.render_page(&params, None, false).is_ok());
        }
        assert_eq!(engine.document().node_count(), settled);
        assert_eq!(engine.transport().requests().len(), 1);
        assert_eq!(count_text(&engine), "3 products");
    }

    #[test]
    fn host_trait_is_usable_through_mutable_reference() {
        let mut history = SessionHistory::new("/collections/hats");
        {
            let mut host: &mut SessionHistory = &mut history;
            BrowserHost::navigate(&mut host, "/collections/hats?page=2");
        }
        assert_eq!(history.navigations().len(), 1);
    }

    fn card_page(image: &str, checked: &str) -> String {
        format!(
            r#"<facet-filters-form><form id="FacetFiltersForm">
                 <details id="Details-color" class="js-filter" data-filter-key="color">
                   <div class="facets-wrap"><ul role="list" data-filter-key="color">
                     <li><input id="blue" type="checkbox" name="filter.color" value="Blue" {checked}></li>
                   </ul></div>
                 </details>
               </form></facet-filters-form>
               <div id="ProductCount">1 product</div>
               <div id="ProductGridContainer"><ul id="product-grid" data-id="main">
                 <li class="card-wrapper"><div class="card card--media"><div class="card__media"><div class="media">
                   <img id="hat" src="/{image}.jpg" alt="Hat"><img src="/{image}-blue.jpg" alt="Hat">
                 </div></div></div></li>
               </ul></div>"#
        )
    }

    #[test]
    fn card_images_follow_checked_colors() {
        let mut transport = ScriptedTransport::new();
        transport.respond_to_any(FragmentResponse::html(&card_page("cap", "checked")));
        let built = EngineBuilder::new("https://shop.example/collections/hats", parse_document(&card_page("hat", "")))
            .build(transport, SessionHistory::new("/collections/hats"));
        let mut engine = match built {
            Ok(engine) => engine,
            Err(error) => panic!("{error}"),
        };

        let blue = node(engine.document(), "blue");
        engine.document_mut().set_attr(blue, "checked", "");
        engine.on_form_event(blue, ms(0));
        let hat = node(engine.document(), "hat");
        assert_eq!(engine.document().attr(hat, "src"), Some("/hat-blue.jpg"));
        assert!(engine.document().has_class(hat, "variant-image"));

        assert!(engine.tick(ms(800)).is_ok_and(|outcomes| outcomes.len() == 1));
        let hat = node(engine.document(), "hat");
        assert_eq!(engine.document().attr(hat, "src"), Some("/cap-blue.jpg"));
        assert_eq!(engine.document().attr(hat, "data-original-src"), Some("/cap.jpg"));
    }
}
