//! Session context: bootstrap and expose the signed-in user to the
//! application.
//!
//! Pure orchestration over the token store, auth client, and profile
//! lookups - no network logic of its own. The exposed state is
//! `{user, access_token, loading}`; after bootstrap there is no visible
//! "expired-but-not-refreshed" state, since the REST client heals expiry
//! behind the scenes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::PlatformApi;
use crate::auth::{AuthClient, SignIn, TokenStore};
use crate::models::{SessionUser, UserMetadata};

pub struct Session {
    auth: Arc<AuthClient>,
    tokens: Arc<TokenStore>,
    api: PlatformApi,
    user: Option<SessionUser>,
    access_token: Option<String>,
    loading: bool,
    bootstrapped: bool,
}

impl Session {
    /// A new session starts in the loading state until `bootstrap` runs.
    pub fn new(auth: Arc<AuthClient>, tokens: Arc<TokenStore>, api: PlatformApi) -> Self {
        Self {
            auth,
            tokens,
            api,
            user: None,
            access_token: None,
            loading: true,
            bootstrapped: false,
        }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Restore the session at application start. Runs at most once: a
    /// stored access token is used as-is, otherwise one refresh is
    /// attempted; failure of either leaves the session unauthenticated.
    /// `loading` drops to false on every path.
    pub async fn bootstrap(&mut self) {
        if self.bootstrapped {
            return;
        }
        self.bootstrapped = true;
        self.loading = true;

        if let Err(error) = self.bootstrap_inner().await {
            debug!(error = %error, "session bootstrap ended unauthenticated");
        }
        self.loading = false;
    }

    async fn bootstrap_inner(&mut self) -> Result<()> {
        if let Some(token) = self.tokens.access_token() {
            self.access_token = Some(token);
            self.load_user().await?;
        } else if let Some(pair) = self.auth.refresh_session().await? {
            self.access_token = Some(pair.access_token);
            self.load_user().await?;
        }
        Ok(())
    }

    /// Sign in and populate the merged user. `loading` is held for the
    /// duration so consumers can show a busy state.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<SignIn> {
        self.loading = true;
        let result = self.sign_in_inner(email, password).await;
        self.loading = false;
        result
    }

    async fn sign_in_inner(&mut self, email: &str, password: &str) -> Result<SignIn> {
        let outcome = self.auth.sign_in(email, password).await?;
        self.access_token = self.tokens.access_token();
        self.load_user().await?;
        info!("signed in");
        Ok(outcome)
    }

    /// Register and immediately sign in with the same credentials.
    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        metadata: Option<UserMetadata>,
    ) -> Result<SignIn> {
        self.loading = true;
        let result = self.sign_up_inner(email, password, metadata).await;
        self.loading = false;
        result
    }

    async fn sign_up_inner(
        &mut self,
        email: &str,
        password: &str,
        metadata: Option<UserMetadata>,
    ) -> Result<SignIn> {
        self.auth.sign_up(email, password, metadata).await?;
        self.sign_in_inner(email, password).await
    }

    /// Synchronous and immediate: clears local state, no network round
    /// trip, no loading transition.
    pub fn sign_out(&mut self) {
        self.auth.sign_out();
        self.user = None;
        self.access_token = None;
        info!("signed out");
    }

    /// Fetch the auth identity and merge the application profile. A failed
    /// profile fetch is logged and leaves the identity-only user; a failed
    /// identity fetch is an error.
    async fn load_user(&mut self) -> Result<()> {
        let identity = self
            .auth
            .get_user()
            .await?
            .context("no identity behind the stored access token")?;

        let profile = match self.api.get_user_profile(&identity.id).await {
            Ok(profile) => profile,
            Err(error) => {
                debug!(error = %error, "failed to load application profile");
                None
            }
        };

        self.user = Some(SessionUser { identity, profile });
        Ok(())
    }
}
