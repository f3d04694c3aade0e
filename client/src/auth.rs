use crate::{
    api::AuthApi,
    cache::{
        Query,
        QueryClient,
    },
    error::ClientResult,
    http::ApiClient,
    models::{
        LoginCredentials,
        User,
    },
    navigation::{
        Navigator,
        Route,
    },
    queries::{
        auth_keys,
        USER_STALE_TIME,
    },
    session::SessionStore,
};
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

/// Sign in and sign out flows tying the session, the query cache and navigation together.
#[derive(Clone, Debug)]
pub struct AuthService {
    api: AuthApi,
    session: SessionStore,
    cache: QueryClient,
    navigator: Navigator,
}

impl AuthService {
    pub fn new(client: ApiClient, cache: QueryClient) -> Self {
        Self {
            session: client.session().clone(),
            navigator: client.navigator().clone(),
            api: AuthApi::new(client),
            cache,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[instrument(level = "debug", skip_all, fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &LoginCredentials) -> ClientResult<User> {
        let (tokens, user) = self.api.login(credentials).await?;
        self.session.login(tokens, user.clone());
        self.navigator.navigate(Route::Dashboard);
        Ok(user)
    }

    /// Signs out locally even when the server cannot be reached.
    pub async fn logout(&self) {
        if self.session.is_authenticated() {
            if let Err(err) = self.api.logout().await {
                debug!(status = ?err.status(), "server logout failed: {err}");
            }
        }
        self.session.logout();
        self.cache.clear();
        self.navigator.navigate(Route::Login);
    }

    /// The signed in user as the server sees it. Runs only while authenticated; the answer replaces the stored
    /// identity.
    pub fn current_user_query(&self) -> Query<User> {
        let api = self.api.clone();
        let session = self.session.clone();
        Query::new(auth_keys::user(), move || {
            let api = api.clone();
            let session = session.clone();
            async move {
                let user = api.current_user().await?;
                session.set_user(user.clone());
                Ok(user)
            }
        })
        .stale_time(USER_STALE_TIME)
        .enabled(self.session.is_authenticated())
    }

    pub async fn current_user(&self) -> ClientResult<User> {
        self.cache.fetch(&self.current_user_query()).await
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> ClientResult<()> {
        self.api.change_password(old_password, new_password).await?;
        info!("password changed");
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> ClientResult<()> {
        self.api.request_password_reset(email).await
    }

    /// Clears the query cache whenever the session stops being authenticated, including forced sign outs by the
    /// HTTP client. Runs until the guard is dropped.
    pub fn clear_cache_on_logout(&self) -> DropGuard {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        let mut sessions = self.session.subscribe();
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let mut was_authenticated = sessions.borrow_and_update().is_authenticated();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let is_authenticated = sessions.borrow_and_update().is_authenticated();
                if was_authenticated && !is_authenticated {
                    debug!(entries = cache.len(), "session ended, clearing query cache");
                    cache.clear();
                }
                was_authenticated = is_authenticated;
            }
            trace!("stopped watching the session");
        });
        guard
    }
}
