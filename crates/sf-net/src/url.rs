//! Storefront page location and the URLs derived from it.

use crate::query::QueryParams;
use sf_core::SyncError;
use sf_core::SyncResult;
use url::Url;

/// Location of the collection or search page the engine is mounted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    parsed: Url,
}

impl PageLocation {
    pub fn parse(input: &str) -> SyncResult<Self> {
        let mut parsed = Url::parse(input).map_err(|error| {
            SyncError::new(
                "net.url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;

        if parsed.cannot_be_a_base() {
            return Err(SyncError::new(
                "net.url.invalid_base",
                "URL cannot be used as a page location",
            ));
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(SyncError::new(
                "net.url.credentials_disallowed",
                "URL userinfo (`username:password@`) is not allowed",
            ));
        }

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SyncError::new(
                "net.url.scheme_unsupported",
                format!("unsupported scheme `{}`", parsed.scheme()),
            ));
        }

        if parsed.host_str().is_none() {
            return Err(SyncError::new("net.url.host_missing", "URL must include a host"));
        }

        parsed.set_fragment(None);
        Ok(Self { parsed })
    }

    pub fn href(&self) -> &str {
        self.parsed.as_str()
    }

    /// Serialized origin, e.g. `https://shop.example`.
    pub fn origin(&self) -> String {
        self.parsed.origin().ascii_serialization()
    }

    pub fn pathname(&self) -> &str {
        match self.parsed.path() {
            "" => "/",
            path => path,
        }
    }

    /// Query string without the leading `?`.
    pub fn search(&self) -> &str {
        self.parsed.query().unwrap_or("")
    }

    pub fn query(&self) -> QueryParams {
        QueryParams::parse(self.search())
    }

    /// Absolute URL on this page's path carrying `query`; empty parameters leave no `?`.
    pub fn url_with_query(&self, query: &QueryParams) -> String {
        let mut url = self.parsed.clone();
        let serialized = query.to_string();
        if serialized.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&serialized));
        }
        url.to_string()
    }

    /// Origin-relative `path?query` target, as recorded in session history.
    pub fn path_with_query(&self, query: &QueryParams) -> String {
        let serialized = query.to_string();
        if serialized.is_empty() {
            self.pathname().to_owned()
        } else {
            format!("{}?{serialized}", self.pathname())
        }
    }

    /// Resolves `reference` against this page; relative references inherit the origin.
    pub fn resolve(&self, reference: &str) -> SyncResult<PageLocation> {
        let joined = self.parsed.join(reference).map_err(|error| {
            SyncError::new(
                "net.url.invalid",
                format!("failed to resolve `{reference}` against `{}`: {error}", self.href()),
            )
        })?;
        PageLocation::parse(joined.as_str())
    }

    pub fn is_same_origin(&self, other: &PageLocation) -> bool {
        self.parsed.origin() == other.parsed.origin()
    }
}
