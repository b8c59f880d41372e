//! UAT Pilot API
//!
//! REST transport layer for the UAT Pilot workspace: the HTTP client factory
//! (proxy-aware) and `UatApiClient`, the `PlanningBackend` implementation
//! over the backend's REST endpoints.

pub mod http_client;
pub mod rest;

pub use http_client::build_http_client;
pub use rest::UatApiClient;
