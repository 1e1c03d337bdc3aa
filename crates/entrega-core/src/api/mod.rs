//! REST API clients for the hosted data endpoint.
//!
//! `RestClient` is the generic resource client carrying the one-shot
//! refresh-and-retry policy; `PlatformApi`, `MerchantService`, and
//! `AdminService` are the typed operation sets built on top of it.

pub mod admin;
pub mod error;
pub mod merchant;
pub mod platform;
pub mod rest;

pub use admin::{AdminMerchantStats, AdminService, GlobalStats, OrderFilters};
pub use error::{ApiError, SESSION_EXPIRED_MESSAGE};
pub use merchant::{MerchantService, MerchantStats};
pub use platform::PlatformApi;
pub use rest::RestClient;
