//! Facet state synchronization for storefront collection pages.
//!
//! [`FacetEngine`] owns the live page document. Filter, sort and chip interactions are
//! debounced, the merged query is fetched as a section fragment through a
//! [`sf_net::FragmentTransport`], and the fragment is reconciled into the page region by
//! region. Successful renders push a history entry on the [`BrowserHost`]; failures fall
//! back to a full navigation.

pub mod cache;
pub mod color_groups;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod events;
pub mod form;
pub mod history;
pub mod lazy_images;
pub mod panels;
pub mod reconcile;
pub mod state;
pub mod variant_images;

pub use cache::FragmentCache;
pub use color_groups::ColorGroups;
pub use config::EngineConfig;
pub use config::RootMargin;
pub use debounce::Debouncer;
pub use engine::EngineBuilder;
pub use engine::FacetEngine;
pub use engine::RenderOutcome;
pub use engine::SectionOutcome;
pub use engine::SectionSource;
pub use events::EventBus;
pub use events::FRAGMENT_APPLIED;
pub use events::FragmentApplied;
pub use events::FragmentObserver;
pub use history::BrowserHost;
pub use history::HistoryEntry;
pub use history::HistoryState;
pub use history::SessionHistory;
pub use lazy_images::LazyImageLoader;
pub use lazy_images::ProximityObserver;
pub use state::EngineState;
pub use variant_images::VariantImages;
