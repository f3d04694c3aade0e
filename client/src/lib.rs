//! Client side orchestration for the performance dashboard: authenticated HTTP access, a keyed query cache with
//! staleness and refetch timers, and the session that ties them together.

#[macro_use]
extern crate tracing;

pub mod api;
mod auth;
pub mod cache;
mod dashboard;
mod error;
mod http;
pub mod models;
mod navigation;
pub mod queries;
mod query_params;
mod session;
mod transport;

pub use auth::AuthService;
pub use dashboard::{
    Dashboard,
    DashboardLocation,
    Panels,
};
pub use error::{
    ApiError,
    ClientError,
    ClientResult,
};
pub use http::ApiClient;
pub use navigation::{
    Navigator,
    Route,
    RouteAccess,
};
pub use query_params::{
    time_range_to_hours,
    ParamValue,
    QueryParams,
};
pub use session::{
    Session,
    SessionStatus,
    SessionStore,
};
pub use transport::{
    HttpRequest,
    HttpResponse,
    Method,
    ReqwestTransport,
    Transport,
    TransportError,
};
