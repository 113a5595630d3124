//! Transport seam for fragment requests and an in-memory implementation.

use crate::http::FragmentRequest;
use crate::http::FragmentResponse;
use sf_core::SyncError;
use sf_core::SyncResult;

/// Executes fragment requests. Implementations own connection handling and retries.
pub trait FragmentTransport {
    fn fetch(&mut self, request: &FragmentRequest) -> SyncResult<FragmentResponse>;
}

impl<T> FragmentTransport for &mut T
where
    T: FragmentTransport + ?Sized,
{
    fn fetch(&mut self, request: &FragmentRequest) -> SyncResult<FragmentResponse> {
        (**self).fetch(request)
    }
}

impl<T> FragmentTransport for Box<T>
where
    T: FragmentTransport + ?Sized,
{
    fn fetch(&mut self, request: &FragmentRequest) -> SyncResult<FragmentResponse> {
        (**self).fetch(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Respond(FragmentResponse),
    Fail(SyncError),
}

/// Answers requests from a fixed table keyed by full URL and records every request.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    routes: Vec<(String, Reply)>,
    fallback: Option<Reply>,
    requests: Vec<FragmentRequest>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responds to `url` with `response`; later routes for the same URL replace earlier ones.
    pub fn respond(&mut self, url: &str, response: FragmentResponse) -> &mut Self {
        self.route(url, Reply::Respond(response))
    }

    pub fn fail(&mut self, url: &str, error: SyncError) -> &mut Self {
        self.route(url, Reply::Fail(error))
    }

    /// Response for any URL without a route.
    pub fn respond_to_any(&mut self, response: FragmentResponse) -> &mut Self {
        self.fallback = Some(Reply::Respond(response));
        self
    }

    pub fn fail_any(&mut self, error: SyncError) -> &mut Self {
        self.fallback = Some(Reply::Fail(error));
        self
    }

    pub fn requests(&self) -> &[FragmentRequest] {
        &self.requests
    }

    pub fn requested_urls(&self) -> Vec<&str> {
        self.requests.iter().map(|request| request.url.href()).collect()
    }

    fn route(&mut self, url: &str, reply: Reply) -> &mut Self {
        self.routes.retain(|(candidate, _)| candidate != url);
        self.routes.push((url.to_owned(), reply));
        self
    }
}

impl FragmentTransport for ScriptedTransport {
    fn fetch(&mut self, request: &FragmentRequest) -> SyncResult<FragmentResponse> {
        self.requests.push(request.clone());
        let href = request.url.href();
        let reply = self
            .routes
            .iter()
            .find(|(url, _)| url == href)
            .map(|(_, reply)| reply)
            .or(self.fallback.as_ref());

        match reply {
            Some(Reply::Respond(response)) => Ok(response.clone()),
            Some(Reply::Fail(error)) => Err(error.clone()),
            None => Err(SyncError::new(
                "net.fetch.unreachable",
                format!("no route for `{href}`"),
            )),
        }
    }
}
