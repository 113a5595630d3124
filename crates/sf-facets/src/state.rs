//! Per-page-view engine state.

use sf_net::QueryParams;
use sf_net::SectionIdPolicy;
use sf_net::query;

/// Query state owned by one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    initial: QueryParams,
    last_rendered: QueryParams,
    renders: u64,
}

impl EngineState {
    pub fn new(initial: QueryParams) -> Self {
        let last_rendered = query::merge(&initial, &QueryParams::new(), SectionIdPolicy::Exclude);
        Self {
            initial,
            last_rendered,
            renders: 0,
        }
    }

    /// Query of the page as first loaded; the base of every merge.
    pub fn initial(&self) -> &QueryParams {
        &self.initial
    }

    /// Merged query of the most recent render request.
    pub fn last_rendered(&self) -> &QueryParams {
        &self.last_rendered
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Merges `params` over the initial query, without `section_id`.
    pub fn merged(&self, params: &QueryParams) -> QueryParams {
        query::merge(&self.initial, params, SectionIdPolicy::Exclude)
    }

    pub(crate) fn begin_render(&mut self, merged: QueryParams) {
        self.last_rendered = merged;
        self.renders = self.renders.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::EngineState;
    use sf_net::QueryParams;

    #[test]
    fn initial_render_state_drops_pagination() {
        let state = EngineState::new(QueryParams::parse("q=hat&page=3"));
        assert_eq!(state.last_rendered().to_string(), "q=hat");
        assert_eq!(state.initial().to_string(), "q=hat&page=3");
        assert_eq!(state.renders(), 0);
    }

    #[test]
    fn begin_render_records_query_and_count() {
        let mut state = EngineState::new(QueryParams::parse("q=hat"));
        let merged = state.merged(&QueryParams::parse("color=red"));
        state.begin_render(merged);
        assert_eq!(state.last_rendered().to_string(), "q=hat&color=red");
        assert_eq!(state.renders(), 1);
    }
}
