//! Fragment cache keyed by exact request URL.
//!
//! Entries are never evicted or replaced; the cache lives as long as the page view.
//! Keys are compared byte for byte, so two URLs carrying the same parameters in a
//! different order are different entries.

/// One fetched fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone, Default)]
pub struct FragmentCache {
    entries: Vec<CacheEntry>,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTML of the first entry stored under `url`.
    pub fn lookup(&self, url: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.url == url)
            .map(|entry| entry.html.as_str())
    }

    pub fn insert(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.entries.push(CacheEntry {
            url: url.into(),
            html: html.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::FragmentCache;

    #[test]
    fn first_entry_wins() {
        let mut cache = FragmentCache::new();
        cache.insert("/c?color=red&section_id=grid", "first");
        cache.insert("/c?color=red&section_id=grid", "second");
        assert_eq!(cache.lookup("/c?color=red&section_id=grid"), Some("first"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn parameter_order_is_significant() {
        let mut cache = FragmentCache::new();
        cache.insert("/c?color=red&size=m&section_id=grid", "html");
        assert_eq!(cache.lookup("/c?size=m&color=red&section_id=grid"), None);
        assert!(cache.lookup("/c?color=red&size=m&section_id=grid").is_some());
    }
}
