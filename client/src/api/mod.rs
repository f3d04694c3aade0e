//! Typed endpoints of the dashboard API.

mod auth;
mod collectors;
mod containers;

pub use auth::AuthApi;
pub use collectors::CollectorsApi;
pub use containers::ContainersApi;
