use crate::session::{
    Session,
    SessionStatus,
};
use std::sync::Arc;
use strum::{
    Display,
    EnumIter,
};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Display, EnumIter, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
}

/// Whether a route may be shown for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Allowed,
    /// The session is still being restored.
    Loading,
    Redirect(Route),
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path {
            "/login" | "/login/" => Some(Route::Login),
            "" | "/" => Some(Route::Dashboard),
            _ => None,
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }

    pub fn access(&self, session: &Session) -> RouteAccess {
        if !self.is_protected() {
            return RouteAccess::Allowed;
        }
        match session.status() {
            SessionStatus::Loading => RouteAccess::Loading,
            SessionStatus::Unauthenticated => RouteAccess::Redirect(Route::Login),
            SessionStatus::Authenticated => RouteAccess::Allowed,
        }
    }
}

/// Current route of the front end. Clones share the same state.
#[derive(Clone, Debug)]
pub struct Navigator {
    state: Arc<watch::Sender<Route>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Dashboard)
    }
}

impl Navigator {
    pub fn new(initial: Route) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state: Arc::new(state) }
    }

    pub fn current(&self) -> Route {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.state.subscribe()
    }

    pub fn navigate(&self, route: Route) {
        debug!(path = route.path(), "navigate");
        self.state.send_replace(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::tests::{
            tokens,
            user,
        },
        SessionStore,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_round_trip() {
        use strum::IntoEnumIterator;
        for route in Route::iter() {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/?collector=2&range=6h"), Some(Route::Dashboard));
        assert_eq!(Route::from_path("/reports"), None);
    }

    #[test]
    fn protected_routes_follow_the_session() {
        let dir = temp_dir::TempDir::new().unwrap();
        let store = SessionStore::load_from_data_dir(dir.path());
        assert_eq!(Route::Dashboard.access(&store.snapshot()), RouteAccess::Loading);
        assert_eq!(Route::Login.access(&store.snapshot()), RouteAccess::Allowed);

        store.rehydrate();
        assert_eq!(
            Route::Dashboard.access(&store.snapshot()),
            RouteAccess::Redirect(Route::Login)
        );

        store.login(tokens("a", "r"), user());
        assert_eq!(Route::Dashboard.access(&store.snapshot()), RouteAccess::Allowed);
    }
}
