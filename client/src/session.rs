use crate::models::{
    AuthTokens,
    User,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use strum::Display;
use tokio::sync::watch;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    /// Persisted state has not been read yet.
    Loading,
    Unauthenticated,
    Authenticated,
}

/// Tokens and identity of the signed in user.
///
/// `is_authenticated` always equals `user.is_some()`. The access token lives in memory only.
#[derive(Clone, Default, PartialEq)]
pub struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
    is_authenticated: bool,
    is_loading: bool,
}

impl Session {
    fn loading() -> Self {
        Self {
            is_loading: true,
            ..Default::default()
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_loading {
            SessionStatus::Loading
        } else if self.is_authenticated {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("user", &self.user.as_ref().map(|user| &user.username))
            .field("status", &self.status())
            .finish()
    }
}

/// The part of the session that survives a restart.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    refresh_token: Option<String>,
    user: Option<User>,
    is_authenticated: bool,
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            refresh_token: session.refresh_token.clone(),
            user: session.user.clone(),
            is_authenticated: session.is_authenticated,
        }
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Owns the [`Session`]. Clones share the same state.
#[derive(Clone, Debug)]
pub struct SessionStore {
    file: Option<PathBuf>,
    state: Arc<watch::Sender<Session>>,
}

impl SessionStore {
    /// A store backed by `file`. It stays [`SessionStatus::Loading`] until [`SessionStore::rehydrate`] is called.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        let (state, _) = watch::channel(Session::loading());
        Self {
            file: Some(file.into()),
            state: Arc::new(state),
        }
    }

    pub fn load_from_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(SESSION_FILE))
    }

    /// A signed out store that is never written to disk.
    pub fn in_memory() -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            file: None,
            state: Arc::new(state),
        }
    }

    /// Reads the persisted session and leaves the loading state.
    pub fn rehydrate(&self) -> SessionStatus {
        let persisted = self.file.as_deref().and_then(read_session).unwrap_or_default();
        self.state.send_modify(|session| {
            let authenticated = persisted.is_authenticated && persisted.user.is_some();
            *session = Session {
                access_token: None,
                refresh_token: persisted.refresh_token.filter(|_| authenticated),
                user: persisted.user.filter(|_| authenticated),
                is_authenticated: authenticated,
                is_loading: false,
            };
        });
        let status = self.status();
        debug!(%status, "rehydrated session");
        status
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn login(&self, tokens: AuthTokens, user: User) {
        info!(username = %user.username, "signed in");
        self.state.send_replace(Session {
            access_token: Some(tokens.access),
            refresh_token: Some(tokens.refresh),
            user: Some(user),
            is_authenticated: true,
            is_loading: false,
        });
        self.flush();
    }

    pub fn logout(&self) {
        let was_authenticated = self.is_authenticated();
        self.state.send_replace(Session::default());
        if was_authenticated {
            info!("signed out");
        }
        self.flush();
    }

    /// Swaps the access token minted from `refresh_token`. Returns `false` and leaves the session alone
    /// once it was signed out or signed in again with other tokens meanwhile.
    pub fn set_access_token(&self, refresh_token: &str, token: impl Into<String>) -> bool {
        let token = token.into();
        let accepted = self.state.send_if_modified(|session| {
            if !session.is_authenticated || session.refresh_token.as_deref() != Some(refresh_token) {
                return false;
            }
            session.access_token = Some(token);
            true
        });
        if accepted {
            trace!("access token replaced");
        } else {
            debug!("discarding access token of an ended session");
        }
        accepted
    }

    /// Replaces the identity of the signed in user. Ignored while signed out.
    pub fn set_user(&self, user: User) {
        let updated = self.state.send_if_modified(|session| {
            if !session.is_authenticated || session.user.as_ref() == Some(&user) {
                return false;
            }
            session.user = Some(user);
            true
        });
        if updated {
            self.flush();
        }
    }

    fn flush(&self) {
        let Some(file) = &self.file else {
            return;
        };
        let persisted = PersistedSession::from(&*self.state.borrow());
        if let Err(err) = write_session(file, &persisted) {
            warn!(?file, "failed to save session: {err}");
        }
    }
}

fn read_session(file: &Path) -> Option<PersistedSession> {
    if !file.exists() {
        debug!(?file, "no stored session");
        return None;
    }
    std::fs::File::open(file)
        .ok()
        .and_then(|f| {
            serde_json::from_reader(f)
                .inspect_err(|err| warn!(?file, "ignoring malformed session: {err}"))
                .ok()
        })
        .inspect(|_| debug!(?file, "loaded session"))
}

fn write_session(file: &Path, session: &PersistedSession) -> eyre::Result<()> {
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let f = std::fs::File::create(file)?;
    serde_json::to_writer_pretty(&f, session)?;
    trace!(?file, "saved session");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    pub(crate) fn user() -> User {
        User {
            id: 1,
            username: "ada".into(),
            email: "ada@example.com".into(),
            first_name: None,
            last_name: None,
        }
    }

    pub(crate) fn tokens(access: &str, refresh: &str) -> AuthTokens {
        AuthTokens {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    #[test]
    fn reload_drops_the_access_token() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::load_from_data_dir(dir.path());
        assert_eq!(store.rehydrate(), SessionStatus::Unauthenticated);
        store.login(tokens("access-1", "refresh-1"), user());

        let reloaded = SessionStore::load_from_data_dir(dir.path());
        assert_eq!(reloaded.status(), SessionStatus::Loading);
        assert_eq!(reloaded.rehydrate(), SessionStatus::Authenticated);

        let session = reloaded.snapshot();
        assert_eq!(session.access_token(), None);
        assert_eq!(session.refresh_token(), Some("refresh-1"));
        assert_eq!(session.user(), Some(&user()));
    }

    #[test]
    fn persists_camel_case_blob_without_access_token() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::load_from_data_dir(dir.path());
        store.rehydrate();
        store.login(tokens("access-1", "refresh-1"), user());

        let blob: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(SESSION_FILE)).unwrap()).unwrap();
        let mut keys = blob.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["isAuthenticated", "refreshToken", "user"]);
        assert!(!blob.to_string().contains("access-1"));
    }

    #[test]
    fn logout_clears_the_persisted_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::load_from_data_dir(dir.path());
        store.rehydrate();
        store.login(tokens("a", "r"), user());
        store.logout();
        assert_eq!(store.status(), SessionStatus::Unauthenticated);
        assert_eq!(store.refresh_token(), None);

        let reloaded = SessionStore::load_from_data_dir(dir.path());
        assert_eq!(reloaded.rehydrate(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn corrupt_blob_rehydrates_signed_out() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{ not json").unwrap();
        let store = SessionStore::load_from_data_dir(dir.path());
        assert_eq!(store.rehydrate(), SessionStatus::Unauthenticated);

        std::fs::write(
            dir.path().join(SESSION_FILE),
            r#"{"refreshToken": "r", "user": null, "isAuthenticated": true}"#,
        )
        .unwrap();
        let store = SessionStore::load_from_data_dir(dir.path());
        assert_eq!(store.rehydrate(), SessionStatus::Unauthenticated);
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn access_token_swap_keeps_authentication() {
        let store = SessionStore::in_memory();
        store.login(tokens("old", "r"), user());
        assert!(store.set_access_token("r", "new"));
        assert_eq!(store.access_token().as_deref(), Some("new"));
        assert_eq!(store.status(), SessionStatus::Authenticated);
    }

    #[test]
    fn access_token_of_an_ended_session_is_discarded() {
        let store = SessionStore::in_memory();
        store.login(tokens("old", "r"), user());
        store.logout();
        assert!(!store.set_access_token("r", "late"));
        assert_eq!(store.access_token(), None);
        assert!(!store.is_authenticated());

        store.login(tokens("other", "r2"), user());
        assert!(!store.set_access_token("r", "late"));
        assert_eq!(store.access_token().as_deref(), Some("other"));
    }

    #[test]
    fn set_user_is_ignored_while_signed_out() {
        let store = SessionStore::in_memory();
        store.set_user(user());
        assert_eq!(store.user(), None);
        assert!(!store.is_authenticated());

        store.login(tokens("a", "r"), user());
        let renamed = User {
            first_name: Some("Ada".into()),
            ..user()
        };
        store.set_user(renamed.clone());
        assert_eq!(store.user(), Some(renamed));
    }
}
