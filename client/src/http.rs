//! Authenticated JSON requests with a single shared access token refresh.

use crate::{
    error::{
        ApiError,
        ClientError,
        ClientResult,
    },
    navigation::{
        Navigator,
        Route,
    },
    session::SessionStore,
    transport::{
        HttpRequest,
        HttpResponse,
        Method,
        ReqwestTransport,
        Transport,
    },
};
use futures::{
    future::{
        BoxFuture,
        Shared,
    },
    FutureExt as _,
};
use perf_dashboard_config::Config;
use serde::{
    de::DeserializeOwned,
    Deserialize,
    Serialize,
};
use std::sync::Arc;
use tokio::sync::Mutex;

const REFRESH_PATH: &str = "/api/v1/auth/token/refresh/";

type RefreshFuture = Shared<BoxFuture<'static, Result<String, ApiError>>>;

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    transport: Box<dyn Transport>,
    session: SessionStore,
    navigator: Navigator,
    /// The refresh every concurrent 401 waits on.
    refresh: Mutex<Option<RefreshFuture>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

/// Whether a request carries the access token and may go through the refresh flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bearer,
    Anonymous,
}

impl ApiClient {
    pub fn new(transport: impl Transport, session: SessionStore, navigator: Navigator) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                transport: Box::new(transport),
                session,
                navigator,
                refresh: Mutex::new(None),
            }),
        }
    }

    pub fn from_config(config: &Config, session: SessionStore, navigator: Navigator) -> eyre::Result<Self> {
        let transport = ReqwestTransport::new(config.api_url.clone(), config.request_timeout())?;
        Ok(Self::new(transport, session, navigator))
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn navigator(&self) -> &Navigator {
        &self.inner.navigator
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::Get, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> ClientResult<T> {
        self.send(Method::Post, path, Some(to_body(body)?)).await
    }

    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> ClientResult<T> {
        self.send(Method::Patch, path, Some(to_body(body)?)).await
    }

    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send_empty(Method::Delete, path, None).await
    }

    /// Sends an authenticated request and decodes the JSON response.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<T> {
        let response = self.execute(HttpRequest::new(method, path).with_body(body), Auth::Bearer).await?;
        decode(&response)
    }

    /// Like [`ApiClient::send`] for endpoints that answer without a body worth reading.
    pub async fn send_empty(&self, method: Method, path: &str, body: Option<serde_json::Value>) -> ClientResult<()> {
        self.execute(HttpRequest::new(method, path).with_body(body), Auth::Bearer)
            .await
            .map(|_| ())
    }

    /// Sends a request without the access token. A 401 is returned as is.
    pub async fn send_anonymous<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<T> {
        let response = self.execute(HttpRequest::new(method, path).with_body(body), Auth::Anonymous).await?;
        decode(&response)
    }

    pub async fn send_anonymous_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<()> {
        self.execute(HttpRequest::new(method, path).with_body(body), Auth::Anonymous)
            .await
            .map(|_| ())
    }

    #[instrument(level = "debug", skip_all, fields(method = %request.method, path = %request.path))]
    async fn execute(&self, request: HttpRequest, auth: Auth) -> ClientResult<HttpResponse> {
        if auth == Auth::Anonymous {
            let response = self.round_trip(request).await?;
            return check_status(response);
        }

        let sent_token = self.inner.session.access_token();
        let response = self.round_trip(request.clone().with_bearer(sent_token.clone())).await?;
        if response.status != 401 {
            return check_status(response);
        }

        let unauthorized = ApiError::from_response(response.status, &response.body);
        let Some(refresh_token) = self.inner.session.refresh_token() else {
            debug!("401 without a refresh token");
            self.end_session();
            return Err(unauthorized.into());
        };

        // Another request may already have rotated the token while this one was in flight.
        let current_token = self.inner.session.access_token();
        let token = match current_token {
            Some(current) if sent_token.as_deref() != Some(current.as_str()) => {
                debug!("replaying with the already refreshed token");
                current
            }
            _ => match self.refresh_access_token(refresh_token).await {
                Ok(token) => token,
                Err(err) => {
                    warn!("token refresh failed: {err}");
                    self.end_session();
                    return Err(ClientError::SessionExpired(err));
                }
            },
        };

        let response = self.round_trip(request.with_bearer(Some(token))).await?;
        if response.status == 401 {
            warn!("request still unauthorized after token refresh");
            self.end_session();
        }
        check_status(response)
    }

    async fn round_trip(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let response = self.inner.transport.execute(request).await.map_err(|err| {
            debug!("no response: {err}");
            ApiError::from_transport(&err)
        })?;
        debug!(status = response.status, "response");
        Ok(response)
    }

    /// Joins the refresh in flight or starts a new one.
    async fn refresh_access_token(&self, refresh_token: String) -> Result<String, ApiError> {
        let refresh = {
            let mut in_flight = self.inner.refresh.lock().await;
            match in_flight.as_ref() {
                Some(refresh) if refresh.peek().is_none() => refresh.clone(),
                _ => {
                    let refresh = request_refresh(self.inner.clone(), refresh_token).boxed().shared();
                    *in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };
        refresh.await
    }

    fn end_session(&self) {
        self.inner.session.logout();
        self.inner.navigator.navigate(Route::Login);
    }
}

async fn request_refresh(inner: Arc<ApiClientInner>, refresh_token: String) -> Result<String, ApiError> {
    #[derive(Serialize)]
    struct RefreshRequest {
        refresh: String,
    }
    #[derive(Deserialize)]
    struct RefreshResponse {
        access: String,
    }

    debug!("refreshing access token");
    let body = serde_json::to_value(RefreshRequest {
        refresh: refresh_token.clone(),
    })
        .map_err(|err| ApiError::new("An error occurred", err, 500))?;
    let request = HttpRequest::new(Method::Post, REFRESH_PATH).with_body(Some(body));
    let response = inner
        .transport
        .execute(request)
        .await
        .map_err(|err| ApiError::from_transport(&err))?;
    if !response.is_success() {
        return Err(ApiError::from_response(response.status, &response.body));
    }
    let RefreshResponse { access } = serde_json::from_slice(&response.body)
        .map_err(|err| ApiError::malformed_body(response.status, err))?;
    if !inner.session.set_access_token(&refresh_token, access.clone()) {
        return Err(ApiError::new(
            "session_ended",
            "The session ended while the token was refreshed",
            401,
        ));
    }
    Ok(access)
}

fn check_status(response: HttpResponse) -> ClientResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_response(response.status, &response.body).into())
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> ClientResult<T> {
    serde_json::from_slice(&response.body).map_err(|err| ApiError::malformed_body(response.status, err).into())
}

pub(crate) fn to_body(body: &impl Serialize) -> ClientResult<serde_json::Value> {
    serde_json::to_value(body)
        .map_err(|err| ApiError::new("An error occurred", format!("Invalid request body: {err}"), 500).into())
}
