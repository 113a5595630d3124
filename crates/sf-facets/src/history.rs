//! Session history entries and the host seam for history and navigation.

use serde::Deserialize;
use serde::Serialize;
use sf_core::SyncError;
use sf_core::SyncResult;

/// State object stored with each pushed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    #[serde(rename = "searchParams")]
    pub search_params: String,
}

impl HistoryState {
    pub fn new(search_params: impl Into<String>) -> Self {
        Self {
            search_params: search_params.into(),
        }
    }

    pub fn to_json(&self) -> SyncResult<String> {
        serde_json::to_string(self).map_err(|error| {
            SyncError::new("history.state_encode", format!("failed to encode history state: {error}"))
        })
    }

    pub fn from_json(input: &str) -> SyncResult<Self> {
        serde_json::from_str(input).map_err(|error| {
            SyncError::new("history.state_decode", format!("invalid history state `{input}`: {error}"))
        })
    }
}

/// Browser facilities the engine drives: history entries and full navigations.
pub trait BrowserHost {
    fn push_state(&mut self, state: HistoryState, url: &str);
    fn navigate(&mut self, url: &str);
}

impl<T> BrowserHost for &mut T
where
    T: BrowserHost + ?Sized,
{
    fn push_state(&mut self, state: HistoryState, url: &str) {
        (**self).push_state(state, url);
    }

    fn navigate(&mut self, url: &str) {
        (**self).navigate(url);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub url: String,
    pub state: Option<HistoryState>,
}

/// In-memory session history with back/forward traversal.
///
/// Traversal returns the state a `popstate` event would carry for the entry moved to.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    entries: Vec<HistoryEntry>,
    index: usize,
    navigations: Vec<String>,
}

impl SessionHistory {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            entries: vec![HistoryEntry {
                url: initial_url.into(),
                state: None,
            }],
            index: 0,
            navigations: Vec::new(),
        }
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full navigations requested so far, oldest first.
    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub fn back(&mut self) -> Option<Option<HistoryState>> {
        let previous = self.index.checked_sub(1)?;
        self.index = previous;
        Some(self.current().state.clone())
    }

    pub fn forward(&mut self) -> Option<Option<HistoryState>> {
        if self.index.saturating_add(1) >= self.entries.len() {
            return None;
        }
        self.index = self.index.saturating_add(1);
        Some(self.current().state.clone())
    }
}

impl BrowserHost for SessionHistory {
    fn push_state(&mut self, state: HistoryState, url: &str) {
        self.entries.truncate(self.index.saturating_add(1));
        self.entries.push(HistoryEntry {
            url: url.to_owned(),
            state: Some(state),
        });
        self.index = self.entries.len() - 1;
    }

    fn navigate(&mut self, url: &str) {
        self.navigations.push(url.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::BrowserHost;
    use super::HistoryState;
    use super::SessionHistory;

    #[test]
    fn state_serializes_with_browser_field_name() {
        let state = HistoryState::new("color=red&color=blue");
        assert_eq!(state.to_json(), Ok("{\"searchParams\":\"color=red&color=blue\"}".to_owned()));
        assert_eq!(HistoryState::from_json("{\"searchParams\":\"q=hat\"}"), Ok(HistoryState::new("q=hat")));
        assert!(HistoryState::from_json("{}").is_err());
    }

    #[test]
    fn push_truncates_forward_entries() {
        let mut history = SessionHistory::new("/collections/hats");
        history.push_state(HistoryState::new("color=red"), "/collections/hats?color=red");
        history.push_state(HistoryState::new("color=blue"), "/collections/hats?color=blue");

        assert_eq!(history.back(), Some(Some(HistoryState::new("color=red"))));
        history.push_state(HistoryState::new("size=m"), "/collections/hats?size=m");

        assert_eq!(history.len(), 3);
        assert_eq!(history.forward(), None);
        assert_eq!(history.current().url, "/collections/hats?size=m");
    }

    #[test]
    fn back_to_initial_entry_carries_no_state() {
        let mut history = SessionHistory::new("/search?q=hat");
        history.push_state(HistoryState::new("q=hat&color=red"), "/search?q=hat&color=red");
        assert_eq!(history.back(), Some(None));
        assert_eq!(history.back(), None);
        assert_eq!(history.forward(), Some(Some(HistoryState::new("q=hat&color=red"))));
    }
}
