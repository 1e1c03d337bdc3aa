//! Core library for the entrega delivery platform client.
//!
//! Everything here is a consumer of a hosted backend: a GoTrue-style auth
//! endpoint and a PostgREST-style tabular REST endpoint. The crate owns no
//! server-side logic - it provides the session manager (token storage,
//! auth client, session context), a generic REST client that transparently
//! refreshes an expired access token once per request, typed models for
//! the platform's tables, and the typed operation sets used by the
//! customer, merchant, and admin surfaces.
//!
//! Wiring is explicit: construct a `PlatformConfig`, a `TokenStore`, an
//! `AuthClient`, and a `RestClient`, sharing the store between the two
//! clients so they agree on the current token pair.

pub mod api;
pub mod auth;
pub mod cart;
pub mod config;
pub mod models;
pub mod transport;

pub use api::{AdminService, ApiError, MerchantService, PlatformApi, RestClient};
pub use auth::{AuthClient, AuthError, Session, SignIn, TokenStore};
pub use cart::{Cart, CartItem};
pub use config::{PlatformConfig, Preferences};
pub use transport::{HttpTransport, ReqwestTransport};
