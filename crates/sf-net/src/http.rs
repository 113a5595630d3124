//! Fragment request/response contracts.

use crate::body;
use crate::url::PageLocation;
use sf_core::SyncError;
use sf_core::SyncResult;

/// Credentials policy attached to a fragment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

impl CredentialsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Omit => "omit",
            Self::SameOrigin => "same-origin",
            Self::Include => "include",
        }
    }
}

/// Single HTTP header with validated wire-safe name/value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> SyncResult<Self> {
        if name.is_empty() || !name.bytes().all(is_token_char) {
            return Err(SyncError::new(
                "net.http.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(SyncError::new(
                "net.http.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

const FRAGMENT_ACCEPT_HEADER: &str = "text/html";

/// GET request for one section's server-rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRequest {
    pub url: PageLocation,
    pub headers: Vec<Header>,
    pub credentials: CredentialsMode,
}

impl FragmentRequest {
    /// Prepares a request for `url`, which must share the page's origin.
    pub fn same_origin_get(page: &PageLocation, url: &str) -> SyncResult<Self> {
        let target = page.resolve(url)?;
        if !page.is_same_origin(&target) {
            return Err(SyncError::new(
                "net.request.cross_origin",
                format!(
                    "fragment URL `{}` is not on page origin `{}`",
                    target.href(),
                    page.origin()
                ),
            ));
        }

        Ok(Self {
            url: target,
            headers: vec![Header::new("Accept", FRAGMENT_ACCEPT_HEADER)?],
            credentials: CredentialsMode::SameOrigin,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// HTTP status code wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpStatusCode(u16);

impl HttpStatusCode {
    pub const OK: Self = Self(200);

    pub fn new(code: u16) -> SyncResult<Self> {
        if (100..=599).contains(&code) {
            return Ok(Self(code));
        }

        Err(SyncError::new(
            "net.http.status_invalid",
            format!("status code must be 100-599, got `{code}`"),
        ))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..=299).contains(&self.0)
    }
}

/// Response to a fragment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentResponse {
    pub status: HttpStatusCode,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl FragmentResponse {
    /// `200 OK` carrying a UTF-8 HTML body.
    pub fn html(body: &str) -> Self {
        Self {
            status: HttpStatusCode::OK,
            headers: vec![Header {
                name: "Content-Type".to_owned(),
                value: "text/html; charset=utf-8".to_owned(),
            }],
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn with_status(code: u16, body: &str) -> SyncResult<Self> {
        let mut response = Self::html(body);
        response.status = HttpStatusCode::new(code)?;
        Ok(response)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Rejects non-2xx responses, then decodes content encoding and charset into text.
    pub fn into_text(self) -> SyncResult<String> {
        if !self.status.is_success() {
            return Err(SyncError::new(
                "net.fetch.status",
                format!("fragment request failed with status {}", self.status.as_u16()),
            ));
        }

        let decoded = body::decode_content_encoding(&self.headers, &self.body)?;
        let content_type = self.header("content-type").unwrap_or("text/html");
        Ok(body::decode_text(&decoded, content_type))
    }
}

fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::CredentialsMode;
    use super::FragmentRequest;
    use super::FragmentResponse;
    use super::Header;
    use super::HttpStatusCode;
    use crate::url::PageLocation;

    fn page() -> PageLocation {
        match PageLocation::parse("https://shop.example/collections/hats?color=red") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn same_origin_request_accepts_html_with_credentials() {
        let request = FragmentRequest::same_origin_get(
            &page(),
            "https://shop.example/collections/hats?color=red&section_id=grid",
        );
        let request = match request {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(request.header("accept"), Some("text/html"));
        assert_eq!(request.credentials, CredentialsMode::SameOrigin);
        assert_eq!(request.url.search(), "color=red&section_id=grid");
    }

    #[test]
    fn cross_origin_request_is_rejected() {
        let request = FragmentRequest::same_origin_get(&page(), "https://evil.example/x");
        assert!(request.is_err());
        if let Err(error) = request {
            assert_eq!(error.code, "net.request.cross_origin");
        }
    }

    #[test]
    fn header_validation_rejects_line_breaks() {
        assert!(Header::new("Accept", "text/html").is_ok());
        assert!(Header::new("Bad Name", "x").is_err());
        assert!(Header::new("Accept", "text/html\r\nX: y").is_err());
    }

    #[test]
    fn status_code_range_is_enforced() {
        assert!(HttpStatusCode::new(200).is_ok());
        assert!(HttpStatusCode::new(99).is_err());
        assert!(HttpStatusCode::new(600).is_err());
    }

    #[test]
    fn non_success_status_is_an_error() {
        let response = match FragmentResponse::with_status(503, "<p>busy</p>") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let text = response.into_text();
        assert!(text.is_err());
        if let Err(error) = text {
            assert_eq!(error.code, "net.fetch.status");
        }

        let text = FragmentResponse::html("<p>ok</p>").into_text();
        assert_eq!(text, Ok("<p>ok</p>".to_owned()));
    }
}
