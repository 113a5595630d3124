//! Networking contracts for section fragments: query merging, page URLs, HTTP messages,
//! body decoding and the transport seam.

mod body;
pub mod http;
pub mod query;
pub mod transport;
pub mod url;

use sf_core::SyncResult;

pub use http::CredentialsMode;
pub use http::FragmentRequest;
pub use http::FragmentResponse;
pub use http::Header;
pub use http::HttpStatusCode;
pub use query::QueryParams;
pub use query::SectionIdPolicy;
pub use transport::FragmentTransport;
pub use transport::ScriptedTransport;
pub use url::PageLocation;

/// Builds the URL a section fragment is fetched from.
///
/// The result is `page.pathname` on the page origin, with the query being `params`
/// merged over `base` and `section_id` appended.
pub fn section_fetch_url(
    page: &PageLocation,
    base: &QueryParams,
    params: &QueryParams,
    section_id: &str,
) -> String {
    let merged = query::merge(base, params, SectionIdPolicy::Include(section_id));
    page.url_with_query(&merged)
}

/// Fetches one section fragment and returns its decoded HTML.
pub fn fetch_section<T>(transport: &mut T, page: &PageLocation, url: &str) -> SyncResult<String>
where
    T: FragmentTransport + ?Sized,
{
    let request = FragmentRequest::same_origin_get(page, url)?;
    transport.fetch(&request)?.into_text()
}
