use eyre::{
    Context as _,
    Result,
};
use reqwest::header::{
    HeaderValue,
    CONTENT_TYPE,
};
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};
use strum::Display;
use url::Url;

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A fully prepared request. `path` is relative to the API base URL and already carries its query string.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_body(mut self, body: Option<serde_json::Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("has_body", &self.body.is_some())
            .field("has_bearer", &self.bearer.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timeout of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),
    #[error("Network Error: {0}")]
    Network(String),
}

/// Executes requests against the API. Implementations never interpret status codes.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>>;
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            let url = self.url(&request.path);
            trace!(method = %request.method, %url, "sending request");

            let mut builder = self
                .client
                .request(request.method.into(), &url)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            if let Some(token) = &request.bearer {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|err| self.map_error(err))?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(|err| self.map_error(err))?.to_vec();
            trace!(method = %request.method, %url, status, "received response");

            Ok(HttpResponse { status, body })
        })
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::{
        Arc,
        Mutex,
    };

    type Handler = Box<dyn Fn(&HttpRequest, usize) -> Result<HttpResponse, TransportError> + Send + Sync>;

    struct Route {
        method: Method,
        path: String,
        calls: usize,
        handler: Handler,
    }

    /// Scripted in-process transport. Unknown routes answer 404.
    #[derive(Clone, Default)]
    pub(crate) struct MockTransport {
        routes: Arc<Mutex<Vec<Route>>>,
        log: Arc<Mutex<Vec<HttpRequest>>>,
        delay: Option<Duration>,
    }

    pub(crate) fn json(status: u16, body: serde_json::Value) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            body: body.to_string().into_bytes(),
        })
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Every response is delayed, so concurrent callers overlap.
        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// `handler` receives the request and the zero based call count of this route.
        pub(crate) fn on(
            &self,
            method: Method,
            path: &str,
            handler: impl Fn(&HttpRequest, usize) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
        ) -> &Self {
            self.routes.lock().unwrap().push(Route {
                method,
                path: path.to_string(),
                calls: 0,
                handler: Box::new(handler),
            });
            self
        }

        /// Answers the responses in order, repeating the last one.
        pub(crate) fn on_seq(&self, method: Method, path: &str, responses: Vec<(u16, serde_json::Value)>) -> &Self {
            self.on(method, path, move |_, call| {
                let (status, body) = responses[call.min(responses.len() - 1)].clone();
                json(status, body)
            })
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.log.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, method: Method, path: &str) -> usize {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|request| request.method == method && request.path == path)
                .count()
        }
    }

    impl Transport for MockTransport {
        fn execute(
            &self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(request.clone());
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                let mut routes = self.routes.lock().unwrap();
                let Some(route) = routes
                    .iter_mut()
                    .find(|route| route.method == request.method && route.path == request.path)
                else {
                    return json(404, serde_json::json!({ "error": "not_found" }));
                };
                let call = route.calls;
                route.calls += 1;
                (route.handler)(&request, call)
            })
        }
    }
}
