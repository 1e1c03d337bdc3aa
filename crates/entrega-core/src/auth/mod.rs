//! Authentication module for managing the session and its token pair.
//!
//! This module provides:
//! - `TokenStore`: durable + in-memory storage of the access/refresh pair
//! - `AuthClient`: sign-up, sign-in, refresh, and identity retrieval
//! - `Session`: bootstrap and session state for the application layer
//!
//! Tokens persist in the OS keychain and are rotated by the auth service
//! on every refresh.

pub mod client;
pub mod session;
pub mod tokens;

pub use client::{AuthClient, AuthError, SignIn, TokenPair};
pub use session::Session;
pub use tokens::{KeyringStorage, MemoryStorage, TokenStorage, TokenStore};
