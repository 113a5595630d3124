//! `fragment-applied` notification and its observers.

use sf_core::SyncResult;
use sf_dom::Document;
use sf_dom::NodeId;

/// Name under which the notification is published to page scripts.
pub const FRAGMENT_APPLIED: &str = "fragment-applied";

/// Published once per section render, right after the product grid is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentApplied {
    /// The live grid container whose children were just replaced.
    pub root: NodeId,
}

/// Reacts to freshly applied fragments.
pub trait FragmentObserver {
    fn on_fragment_applied(&mut self, document: &mut Document, event: &FragmentApplied) -> SyncResult<()>;
}

/// Observers invoked synchronously, in subscription order.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn FragmentObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn FragmentObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Delivers `event` to every observer. A failing observer is logged and skipped so the
    /// rest still run; returns how many observers succeeded.
    pub fn dispatch(&mut self, document: &mut Document, event: &FragmentApplied) -> usize {
        let mut delivered = 0_usize;
        for observer in &mut self.observers {
            match observer.on_fragment_applied(document, event) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(error) => {
                    tracing::warn!(event = FRAGMENT_APPLIED, %error, "fragment observer failed");
                }
            }
        }
        delivered
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}
