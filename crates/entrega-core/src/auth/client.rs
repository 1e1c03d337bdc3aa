//! Client for the hosted authentication endpoint.
//!
//! Sign-up, sign-in, token refresh, and identity retrieval against
//! `/auth/v1`. Every request carries the public `apikey` header; the
//! password and refresh-token grants return a rotated token pair that is
//! stored through the shared `TokenStore`.
//!
//! This client never retries on its own. The expired-token healing loop
//! lives in the REST client, which calls `refresh_session` at most once
//! per request.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::error::truncate_body;
use crate::auth::TokenStore;
use crate::config::PlatformConfig;
use crate::models::{AuthIdentity, ProfileUpdate, Role, UserMetadata};
use crate::transport::{HttpRequest, HttpTransport, Method, TransportError};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Non-2xx from the auth endpoint, carrying the (truncated) body.
    #[error("Authentication rejected: {0}")]
    Rejected(String),

    /// An operation that needs a signed-in session was called without one.
    #[error("No active session")]
    NoSession,

    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("Malformed auth response: {0}")]
    InvalidResponse(String),
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        AuthError::InvalidResponse(error.to_string())
    }
}

/// The opaque token pair issued by the auth service. The refresh token is
/// single-use: the server invalidates it the moment a refresh succeeds.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Outcome of a sign-in. `profile_synced` is false when login succeeded but
/// the best-effort profile upsert did not; callers may surface a
/// non-blocking warning.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub identity: Option<AuthIdentity>,
    pub profile_synced: bool,
}

/// Grant response for the password and refresh-token flows.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<AuthIdentity>,
}

pub struct AuthClient {
    config: Arc<PlatformConfig>,
    tokens: Arc<TokenStore>,
    transport: Arc<dyn HttpTransport>,
    identity: Mutex<Option<AuthIdentity>>,
}

impl AuthClient {
    pub fn new(
        config: Arc<PlatformConfig>,
        tokens: Arc<TokenStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config,
            tokens,
            transport,
            identity: Mutex::new(None),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Identity cached by the last sign-in or `get_user` call.
    pub fn current_identity(&self) -> Option<AuthIdentity> {
        self.identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn cache_identity(&self, identity: Option<AuthIdentity>) {
        *self
            .identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = identity;
    }

    /// Register a new account. Does not authenticate the session.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<UserMetadata>,
    ) -> Result<AuthIdentity, AuthError> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(metadata) = metadata {
            body["data"] = serde_json::to_value(metadata)?;
        }
        let text = self
            .request(Method::Post, "/auth/v1/signup", None, Some(body))
            .await?;

        // The endpoint returns either the bare identity or a session
        // wrapping it, depending on whether email confirmation is on.
        let value: serde_json::Value = serde_json::from_str(&text)?;
        let identity = if value.get("user").is_some_and(|user| !user.is_null()) {
            serde_json::from_value(value["user"].clone())?
        } else {
            serde_json::from_value(value)?
        };
        Ok(identity)
    }

    /// Exchange credentials for a token pair and store it. The follow-up
    /// profile upsert is best-effort: its failure is logged and reported on
    /// the outcome, never propagated.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, AuthError> {
        let body = json!({ "email": email, "password": password });
        let text = self
            .request(
                Method::Post,
                "/auth/v1/token?grant_type=password",
                None,
                Some(body),
            )
            .await?;
        let grant: TokenGrant = serde_json::from_str(&text)?;

        self.tokens
            .set_token_pair(grant.access_token.as_deref(), grant.refresh_token.as_deref());
        self.cache_identity(grant.user.clone());

        let profile_synced = match grant.user.as_ref() {
            Some(identity) => match self.ensure_profile(identity).await {
                Ok(()) => true,
                Err(error) => {
                    warn!(error = %error, "profile sync failed during sign-in");
                    false
                }
            },
            None => false,
        };

        Ok(SignIn {
            identity: grant.user,
            profile_synced,
        })
    }

    /// Fetch the identity behind the stored access token. Returns `Ok(None)`
    /// without touching the network when no token is stored. A rejected
    /// token is an error; refreshing is the caller's job.
    pub async fn get_user(&self) -> Result<Option<AuthIdentity>, AuthError> {
        let Some(token) = self.tokens.access_token() else {
            return Ok(None);
        };
        let text = self
            .request(Method::Get, "/auth/v1/user", Some(&token), None)
            .await?;
        let identity: AuthIdentity = serde_json::from_str(&text)?;
        self.cache_identity(Some(identity.clone()));
        Ok(Some(identity))
    }

    /// Exchange the stored refresh token for a new pair, replacing both
    /// stored tokens atomically. Returns `Ok(None)` when no refresh token
    /// is stored.
    ///
    /// The server rotates refresh tokens: issuing this concurrently from
    /// two call sites races, and the loser fails with an invalidated-token
    /// error. No in-flight deduplication is performed here.
    pub async fn refresh_session(&self) -> Result<Option<TokenPair>, AuthError> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            return Ok(None);
        };
        let body = json!({ "refresh_token": refresh_token });
        let text = self
            .request(
                Method::Post,
                "/auth/v1/token?grant_type=refresh_token",
                None,
                Some(body),
            )
            .await?;
        let grant: TokenGrant = serde_json::from_str(&text)?;

        self.tokens
            .set_token_pair(grant.access_token.as_deref(), grant.refresh_token.as_deref());
        debug!("session refreshed");

        Ok(grant.access_token.map(|access_token| TokenPair {
            access_token,
            refresh_token: grant.refresh_token,
        }))
    }

    /// Update the name/phone metadata on the auth identity.
    pub async fn update_user_metadata(
        &self,
        update: &ProfileUpdate,
    ) -> Result<AuthIdentity, AuthError> {
        let Some(token) = self.tokens.access_token() else {
            return Err(AuthError::NoSession);
        };
        let body = json!({ "data": update });
        let text = self
            .request(Method::Put, "/auth/v1/user", Some(&token), Some(body))
            .await?;
        let identity: AuthIdentity = serde_json::from_str(&text)?;
        self.cache_identity(Some(identity.clone()));
        Ok(identity)
    }

    /// Drop the token pair and the cached identity. Purely local: the
    /// server's refresh rotation makes the abandoned tokens die on their
    /// own.
    pub fn sign_out(&self) {
        self.tokens.clear();
        self.cache_identity(None);
    }

    /// Upsert the application profile row for a fresh sign-in, merging on
    /// id so repeat logins keep the existing row.
    async fn ensure_profile(&self, identity: &AuthIdentity) -> Result<(), AuthError> {
        let Some(token) = self.tokens.access_token() else {
            return Ok(());
        };
        let role = identity.user_metadata.role.unwrap_or(Role::Customer);
        let body = json!({
            "id": identity.id,
            "email": identity.email,
            "name": identity.user_metadata.name,
            "phone": identity.user_metadata.phone,
            "role": role,
            "is_active": true,
        });

        let url = format!("{}/rest/v1/users?on_conflict=id", self.config.base_url);
        let request = HttpRequest::new(Method::Post, url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {token}"))
            .header("Prefer", "resolution=merge-duplicates")
            .body(body.to_string());

        let response = self.transport.execute(request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(AuthError::Rejected(truncate_body(&response.body)))
        }
    }

    /// One request against the auth endpoint: apikey always, bearer when
    /// user-scoped, non-2xx mapped to `Rejected` with the raw body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<String, AuthError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut request =
            HttpRequest::new(method, url).header("apikey", &self.config.anon_key);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let response = self.transport.execute(request).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(AuthError::Rejected(truncate_body(&response.body)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpResponse;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};

    struct ScriptedTransport {
        responses: Mutex<VecDeque<HttpResponse>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport script exhausted"))
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> (AuthClient, Arc<TokenStore>) {
        let config = Arc::new(PlatformConfig::new(
            "https://project.example.co",
            "anon-key",
        ));
        let tokens = Arc::new(TokenStore::in_memory());
        let auth = AuthClient::new(config, tokens.clone(), transport);
        (auth, tokens)
    }

    const GRANT: &str = r#"{
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "user": {"id": "u-1", "email": "ana@example.com", "user_metadata": {"name": "Ana"}}
    }"#;

    #[tokio::test]
    async fn test_sign_in_stores_pair_and_upserts_profile() {
        let transport = ScriptedTransport::new(vec![response(200, GRANT), response(201, "")]);
        let (auth, tokens) = client(transport.clone());

        let outcome = auth.sign_in("ana@example.com", "secret").await.expect("sign in");
        assert!(outcome.profile_synced);
        assert_eq!(
            outcome.identity.as_ref().map(|i| i.id.as_str()),
            Some("u-1")
        );
        assert_eq!(tokens.access_token().as_deref(), Some("access-1"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("refresh-1"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.contains("grant_type=password"));
        assert!(requests[1].url.contains("/rest/v1/users?on_conflict=id"));
        assert_eq!(
            requests[1].header_value("Prefer"),
            Some("resolution=merge-duplicates")
        );
        assert_eq!(
            requests[1].header_value("Authorization"),
            Some("Bearer access-1")
        );
    }

    #[tokio::test]
    async fn test_sign_in_survives_profile_sync_failure() {
        let transport = ScriptedTransport::new(vec![
            response(200, GRANT),
            response(500, "profile table unavailable"),
        ]);
        let (auth, tokens) = client(transport);

        let outcome = auth.sign_in("ana@example.com", "secret").await.expect("sign in");
        assert!(!outcome.profile_synced);
        // Login still holds a session
        assert_eq!(tokens.access_token().as_deref(), Some("access-1"));
    }

    #[tokio::test]
    async fn test_get_user_without_token_skips_network() {
        let transport = ScriptedTransport::new(vec![]);
        let (auth, _tokens) = client(transport.clone());

        let identity = auth.get_user().await.expect("get user");
        assert!(identity.is_none());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_get_user_does_not_self_heal() {
        let transport = ScriptedTransport::new(vec![response(401, r#"{"message":"JWT expired"}"#)]);
        let (auth, tokens) = client(transport.clone());
        tokens.set_access_token(Some("stale"));

        let error = auth.get_user().await.expect_err("rejected token");
        assert!(matches!(error, AuthError::Rejected(_)));
        // No refresh was attempted
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_without_token_returns_none() {
        let transport = ScriptedTransport::new(vec![]);
        let (auth, _tokens) = client(transport.clone());

        let pair = auth.refresh_session().await.expect("refresh");
        assert!(pair.is_none());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rotates_both_tokens() {
        let grant = r#"{"access_token": "access-2", "refresh_token": "refresh-2"}"#;
        let transport = ScriptedTransport::new(vec![response(200, grant)]);
        let (auth, tokens) = client(transport.clone());
        tokens.set_token_pair(Some("access-1"), Some("refresh-1"));

        let pair = auth.refresh_session().await.expect("refresh").expect("pair");
        assert_eq!(pair.access_token, "access-2");
        assert_eq!(tokens.access_token().as_deref(), Some("access-2"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("refresh-2"));

        let requests = transport.requests();
        assert!(requests[0].url.contains("grant_type=refresh_token"));
        let body = requests[0].body.as_deref().expect("body");
        assert!(body.contains("refresh-1"));
    }

    #[tokio::test]
    async fn test_sign_out_clears_tokens_and_identity() {
        let transport = ScriptedTransport::new(vec![response(200, GRANT), response(201, "")]);
        let (auth, tokens) = client(transport);
        auth.sign_in("ana@example.com", "secret").await.expect("sign in");
        assert!(auth.current_identity().is_some());

        auth.sign_out();
        assert_eq!(tokens.access_token(), None);
        assert_eq!(tokens.refresh_token(), None);
        assert!(auth.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_posts_metadata_and_parses_identity() {
        let body = r#"{"id": "u-9", "email": "nuevo@example.com", "user_metadata": {"role": "merchant"}}"#;
        let transport = ScriptedTransport::new(vec![response(200, body)]);
        let (auth, tokens) = client(transport.clone());

        let metadata = UserMetadata {
            role: Some(Role::Merchant),
            ..Default::default()
        };
        let identity = auth
            .sign_up("nuevo@example.com", "secret", Some(metadata))
            .await
            .expect("sign up");
        assert_eq!(identity.id, "u-9");
        assert_eq!(identity.user_metadata.role, Some(Role::Merchant));

        // Sign-up does not authenticate the session
        assert_eq!(tokens.access_token(), None);

        let request = &transport.requests()[0];
        assert!(request.url.ends_with("/auth/v1/signup"));
        let sent: serde_json::Value =
            serde_json::from_str(request.body.as_deref().expect("body")).expect("json body");
        assert_eq!(sent["data"]["role"], "merchant");
    }

    #[tokio::test]
    async fn test_update_user_metadata_requires_session() {
        let transport = ScriptedTransport::new(vec![]);
        let (auth, _tokens) = client(transport);

        let update = ProfileUpdate {
            name: Some("Ana Maria".to_string()),
            phone: None,
        };
        let error = auth
            .update_user_metadata(&update)
            .await
            .expect_err("no session");
        assert!(matches!(error, AuthError::NoSession));
    }

    #[tokio::test]
    async fn test_update_user_metadata_puts_data_payload() {
        let body = r#"{"id": "u-1", "email": "ana@example.com", "user_metadata": {"name": "Ana Maria"}}"#;
        let transport = ScriptedTransport::new(vec![response(200, body)]);
        let (auth, tokens) = client(transport.clone());
        tokens.set_access_token(Some("access-1"));

        let update = ProfileUpdate {
            name: Some("Ana Maria".to_string()),
            phone: None,
        };
        let identity = auth.update_user_metadata(&update).await.expect("update");
        assert_eq!(identity.user_metadata.name.as_deref(), Some("Ana Maria"));

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Put);
        assert!(request.url.ends_with("/auth/v1/user"));
        let sent: serde_json::Value =
            serde_json::from_str(request.body.as_deref().expect("body")).expect("json");
        assert_eq!(sent["data"]["name"], "Ana Maria");
        assert!(sent["data"].get("phone").is_none());
    }

    #[tokio::test]
    async fn test_sign_up_parses_session_wrapped_identity() {
        let body = r#"{
            "access_token": "at",
            "user": {"id": "u-10", "email": "otra@example.com"}
        }"#;
        let transport = ScriptedTransport::new(vec![response(200, body)]);
        let (auth, _tokens) = client(transport);

        let identity = auth
            .sign_up("otra@example.com", "secret", None)
            .await
            .expect("sign up");
        assert_eq!(identity.id, "u-10");
    }
}
