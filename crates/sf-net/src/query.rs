//! Query-parameter state and the replace-by-key merge.

use core::fmt;
use url::form_urlencoded;

/// Parameter that never survives a merge; pagination restarts on every filter change.
pub const PAGE_PARAM: &str = "page";
/// Parameter naming the section a fragment request renders.
pub const SECTION_ID_PARAM: &str = "section_id";

/// Ordered multi-map of query parameters, serialized as `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a query string; a leading `?` is ignored.
    pub fn parse(input: &str) -> Self {
        let input = input.strip_prefix('?').unwrap_or(input);
        Self {
            pairs: form_urlencoded::parse(input.as_bytes())
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(candidate, _)| candidate == key)
    }

    /// Distinct keys in first-seen order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (key, _) in &self.pairs {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn delete(&mut self, key: &str) {
        self.pairs.retain(|(candidate, _)| candidate != key);
    }

    /// Replaces the first value under `key` and drops the rest, appending when absent.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(candidate, _)| candidate == key) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut index = 0_usize;
                self.pairs.retain(|(candidate, _)| {
                    let keep = index <= first || candidate != key;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((key.to_owned(), value)),
        }
    }

    /// Concatenates several serialized parameter sets, as joining them with `&` would.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a QueryParams>) -> Self {
        Self {
            pairs: parts
                .into_iter()
                .flat_map(|part| part.pairs.iter().cloned())
                .collect(),
        }
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish();
        f.write_str(&encoded)
    }
}

impl From<&str> for QueryParams {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Whether a merge result may carry `section_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionIdPolicy<'a> {
    Exclude,
    Include(&'a str),
}

/// Merges `update` over `base`.
///
/// Every key present in `update` loses all of its `base` values and takes exactly the
/// update's values, in the update's order, appended after the untouched keys. `page`
/// never survives; `section_id` survives only as the value supplied through
/// [`SectionIdPolicy::Include`], and only when that value is non-empty.
pub fn merge(base: &QueryParams, update: &QueryParams, policy: SectionIdPolicy<'_>) -> QueryParams {
    let mut merged = base.clone();
    merged.delete(PAGE_PARAM);
    merged.delete(SECTION_ID_PARAM);

    for key in update.keys() {
        merged.delete(key);
    }

    for (key, value) in update.pairs() {
        if key == PAGE_PARAM || key == SECTION_ID_PARAM {
            continue;
        }
        merged.append(key.clone(), value.clone());
    }

    if let SectionIdPolicy::Include(section_id) = policy {
        if !section_id.is_empty() {
            merged.set(SECTION_ID_PARAM, section_id);
        }
    }

    merged
}
