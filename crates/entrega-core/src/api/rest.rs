//! Generic client for the tabular REST endpoint (`/rest/v1/<table>`).
//!
//! Every domain operation funnels through `request`, which attaches the
//! current access token (falling back to the public API key for anonymous
//! access) and applies the one-shot refresh-and-retry policy on an
//! expired-token 401. Callers never refresh or retry manually: at most one
//! silent refresh happens per call, and a second 401 is always terminal.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::error::{truncate_body, ApiError};
use crate::auth::{AuthClient, TokenStore};
use crate::config::PlatformConfig;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

/// Body fragments that mark a 401 as an expired/invalid token rather than a
/// permissions failure. Matched case-insensitively.
const EXPIRED_TOKEN_MARKERS: [&str; 4] =
    ["jwt expired", "invalid token", "invalid jwt", "authorization"];

fn is_expired_token_body(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    EXPIRED_TOKEN_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Generic resource client. Clone is cheap - all fields are shared handles.
#[derive(Clone)]
pub struct RestClient {
    config: Arc<PlatformConfig>,
    tokens: Arc<TokenStore>,
    auth: Arc<AuthClient>,
    transport: Arc<dyn HttpTransport>,
}

impl RestClient {
    pub fn new(
        config: Arc<PlatformConfig>,
        tokens: Arc<TokenStore>,
        auth: Arc<AuthClient>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config,
            tokens,
            auth,
            transport,
        }
    }

    pub fn auth(&self) -> &Arc<AuthClient> {
        &self.auth
    }

    /// One resource request with the refresh-on-expiry policy.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        extra_headers: &[(&str, String)],
    ) -> Result<HttpResponse, ApiError> {
        let url = self.build_url(path, query)?;
        let body_text = body.map(|b| b.to_string());

        let first = self
            .send(method, &url, body_text.as_deref(), extra_headers)
            .await?;
        if first.status != 401 {
            return Self::check(first);
        }

        if !is_expired_token_body(&first.body) {
            // An authorization/permissions failure, not an expiry: surface
            // raw, leave the session alone.
            return Err(ApiError::Unauthorized(truncate_body(&first.body)));
        }

        debug!(url = %url, "access token rejected as expired, refreshing session");
        match self.auth.refresh_session().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("no refresh token available, signing out");
                self.auth.sign_out();
                return Err(ApiError::SessionExpired);
            }
            Err(error) => {
                warn!(error = %error, "session refresh failed, signing out");
                self.auth.sign_out();
                return Err(ApiError::SessionExpired);
            }
        }

        // Headers are rebuilt so the retry carries the rotated token.
        let retried = self
            .send(method, &url, body_text.as_deref(), extra_headers)
            .await?;
        if retried.status == 401 {
            warn!(url = %url, "request still unauthorized after refresh, signing out");
            self.auth.sign_out();
            return Err(ApiError::SessionExpired);
        }
        Self::check(retried)
    }

    // ===== Typed conveniences over `request` =====

    /// GET rows from a table.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let response = self
            .request(Method::Get, &table_path(table), query, None, &[])
            .await?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// GET at most one row from a table.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ApiError> {
        let mut query = query.to_vec();
        query.push(("limit", "1".to_string()));
        let mut rows = self.select(table, &query).await?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    /// POST one row, returning the stored representation.
    pub async fn insert<T, B>(&self, table: &str, row: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: serde::Serialize,
    {
        let body = serde_json::to_value(row)?;
        let response = self
            .request(
                Method::Post,
                &table_path(table),
                &[],
                Some(&body),
                &[("Prefer", "return=representation".to_string())],
            )
            .await?;
        first_row(&response.body)?
            .ok_or_else(|| ApiError::InvalidResponse("insert returned no rows".to_string()))
    }

    /// POST a batch of rows without asking for the representation back.
    pub async fn insert_many<B: serde::Serialize>(
        &self,
        table: &str,
        rows: &[B],
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(rows)?;
        self.request(
            Method::Post,
            &table_path(table),
            &[],
            Some(&body),
            &[("Prefer", "return=minimal".to_string())],
        )
        .await?;
        Ok(())
    }

    /// PATCH rows matching the filter, returning the first updated row if
    /// any matched.
    pub async fn update<T, B>(
        &self,
        table: &str,
        query: &[(&str, String)],
        patch: &B,
    ) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        B: serde::Serialize,
    {
        let body = serde_json::to_value(patch)?;
        let response = self
            .request(
                Method::Patch,
                &table_path(table),
                query,
                Some(&body),
                &[("Prefer", "return=representation".to_string())],
            )
            .await?;
        first_row(&response.body)
    }

    /// DELETE rows matching the filter.
    pub async fn delete(&self, table: &str, query: &[(&str, String)]) -> Result<(), ApiError> {
        self.request(Method::Delete, &table_path(table), query, None, &[])
            .await?;
        Ok(())
    }

    /// Exact row count for a filter, without fetching the rows. The count
    /// travels back in the `Content-Range` header.
    pub async fn count(&self, table: &str, query: &[(&str, String)]) -> Result<u64, ApiError> {
        let mut query = query.to_vec();
        query.push(("select", "id".to_string()));
        let response = self
            .request(
                Method::Get,
                &table_path(table),
                &query,
                None,
                &[
                    ("Prefer", "count=exact".to_string()),
                    ("Range", "0-0".to_string()),
                ],
            )
            .await?;
        let range = response.header("content-range").ok_or_else(|| {
            ApiError::InvalidResponse("count response missing Content-Range".to_string())
        })?;
        parse_content_range_total(range)
            .ok_or_else(|| ApiError::InvalidResponse(format!("bad Content-Range: {range}")))
    }

    // ===== Internals =====

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.config.base_url, path))
            .map_err(|e| ApiError::InvalidRequest(format!("{path}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url.into())
    }

    /// Issue one attempt. Headers are assembled fresh per attempt so a
    /// rotated access token is picked up by the retry.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
        extra_headers: &[(&str, String)],
    ) -> Result<HttpResponse, ApiError> {
        let bearer = self
            .tokens
            .access_token()
            .unwrap_or_else(|| self.config.anon_key.clone());

        let mut request = HttpRequest::new(method, url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {bearer}"));
        for (name, value) in extra_headers {
            request = request.header(*name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        Ok(self.transport.execute(request).await?)
    }

    fn check(response: HttpResponse) -> Result<HttpResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }
}

fn table_path(table: &str) -> String {
    format!("/rest/v1/{table}")
}

/// Pull the first row out of a representation response, which is always a
/// JSON array; an empty array means the filter matched nothing.
fn first_row<T: DeserializeOwned>(body: &str) -> Result<Option<T>, ApiError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    match value {
        serde_json::Value::Array(mut rows) => {
            if rows.is_empty() {
                Ok(None)
            } else {
                Ok(Some(serde_json::from_value(rows.remove(0))?))
            }
        }
        other => Ok(Some(serde_json::from_value(other)?)),
    }
}

/// Total from a `Content-Range` header, e.g. `0-0/42` or `*/0`.
fn parse_content_range_total(range: &str) -> Option<u64> {
    range.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStorage, TokenStorage};
    use crate::models::Order;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    const EXPIRED_BODY: &str = r#"{"message":"JWT expired"}"#;
    const PERMISSION_BODY: &str = r#"{"message":"permission denied for table orders"}"#;
    const REFRESH_GRANT: &str = r#"{"access_token":"fresh","refresh_token":"refresh-2"}"#;
    const ORDER_ROWS: &str = r#"[{
        "id": 1, "code": null, "user_id": null, "merchant_id": null,
        "status": "pending", "address": null, "courier_name": null,
        "total": 9990, "delivery_fee": null, "cancellation_reason": null,
        "created_at": null
    }]"#;

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

        fn resource_calls(&self) -> usize {
            self.requests()
                .iter()
                .filter(|r| r.url.contains("/rest/v1/"))
                .count()
        }

        fn refresh_calls(&self) -> usize {
            self.requests()
                .iter()
                .filter(|r| r.url.contains("grant_type=refresh_token"))
                .count()
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

    /// Storage wrapper that counts removals, so a forced sign-out is
    /// observable as exactly one clear of each slot.
    #[derive(Default)]
    struct RecordingStorage {
        inner: MemoryStorage,
        removals: Mutex<Vec<String>>,
    }

    impl TokenStorage for RecordingStorage {
        fn load(&self, key: &str) -> Option<String> {
            self.inner.load(key)
        }
        fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.store(key, value)
        }
        fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.removals.lock().unwrap().push(key.to_string());
            self.inner.remove(key)
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    fn client_with_storage(
        transport: Arc<ScriptedTransport>,
        storage: Arc<dyn TokenStorage>,
    ) -> (RestClient, Arc<TokenStore>) {
        let config = Arc::new(PlatformConfig::new(
            "https://project.example.co",
            "anon-key",
        ));
        let tokens = Arc::new(TokenStore::new(storage));
        let auth = Arc::new(AuthClient::new(
            config.clone(),
            tokens.clone(),
            transport.clone(),
        ));
        let rest = RestClient::new(config, tokens.clone(), auth, transport);
        (rest, tokens)
    }

    fn client(transport: Arc<ScriptedTransport>) -> (RestClient, Arc<TokenStore>) {
        client_with_storage(transport, Arc::new(MemoryStorage::default()))
    }

    #[tokio::test]
    async fn test_expired_401_refreshes_once_and_retries_once() {
        let transport = ScriptedTransport::new(vec![
            response(401, EXPIRED_BODY),
            response(200, REFRESH_GRANT),
            response(200, ORDER_ROWS),
        ]);
        let (rest, tokens) = client(transport.clone());
        tokens.set_token_pair(Some("stale"), Some("refresh-1"));

        let orders: Vec<Order> = rest
            .select("orders", &[("select", "*".to_string())])
            .await
            .expect("select after silent refresh");
        assert_eq!(orders.len(), 1);

        assert_eq!(transport.resource_calls(), 2);
        assert_eq!(transport.refresh_calls(), 1);

        // The retry carried the rotated token, not the stale one
        let requests = transport.requests();
        let retry = requests.last().expect("retry request");
        assert_eq!(retry.header_value("Authorization"), Some("Bearer fresh"));
        assert_eq!(tokens.access_token().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_second_401_is_terminal_and_signs_out_once() {
        let transport = ScriptedTransport::new(vec![
            response(401, EXPIRED_BODY),
            response(200, REFRESH_GRANT),
            response(401, EXPIRED_BODY),
        ]);
        let storage = Arc::new(RecordingStorage::default());
        let (rest, tokens) = client_with_storage(transport.clone(), storage.clone());
        tokens.set_token_pair(Some("stale"), Some("refresh-1"));

        let error = rest
            .select::<Order>("orders", &[("select", "*".to_string())])
            .await
            .expect_err("terminal double 401");
        assert!(matches!(error, ApiError::SessionExpired));
        assert_eq!(error.to_string(), "Session expired. Please sign in again.");

        assert_eq!(transport.resource_calls(), 2);
        assert_eq!(transport.refresh_calls(), 1);
        assert_eq!(tokens.access_token(), None);
        assert_eq!(tokens.refresh_token(), None);
        // Sign-out ran exactly once: one removal per slot
        let removals = storage.removals.lock().unwrap().clone();
        assert_eq!(removals.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_terminal() {
        let transport = ScriptedTransport::new(vec![
            response(401, EXPIRED_BODY),
            response(400, r#"{"error":"invalid_grant"}"#),
        ]);
        let (rest, tokens) = client(transport.clone());
        tokens.set_token_pair(Some("stale"), Some("refresh-1"));

        let error = rest
            .select::<Order>("orders", &[])
            .await
            .expect_err("refresh rejection");
        assert!(matches!(error, ApiError::SessionExpired));
        // The original request is never retried when refresh fails
        assert_eq!(transport.resource_calls(), 1);
        assert_eq!(tokens.access_token(), None);
    }

    #[tokio::test]
    async fn test_non_expiry_401_passes_through_untouched() {
        let transport = ScriptedTransport::new(vec![response(401, PERMISSION_BODY)]);
        let (rest, tokens) = client(transport.clone());
        tokens.set_token_pair(Some("valid"), Some("refresh-1"));

        let error = rest
            .select::<Order>("orders", &[])
            .await
            .expect_err("permissions failure");
        match error {
            ApiError::Unauthorized(body) => assert!(body.contains("permission denied")),
            other => panic!("expected Unauthorized, got {other:?}"),
        }

        assert_eq!(transport.resource_calls(), 1);
        assert_eq!(transport.refresh_calls(), 0);
        // The session is untouched
        assert_eq!(tokens.access_token().as_deref(), Some("valid"));
    }

    #[tokio::test]
    async fn test_anonymous_requests_fall_back_to_api_key() {
        let transport = ScriptedTransport::new(vec![response(200, "[]")]);
        let (rest, _tokens) = client(transport.clone());

        let rows: Vec<Order> = rest
            .select("merchants", &[("select", "*".to_string())])
            .await
            .expect("anonymous select");
        assert!(rows.is_empty());

        let request = &transport.requests()[0];
        assert_eq!(request.header_value("apikey"), Some("anon-key"));
        assert_eq!(request.header_value("Authorization"), Some("Bearer anon-key"));
    }

    #[tokio::test]
    async fn test_other_errors_do_not_retry() {
        let transport = ScriptedTransport::new(vec![response(404, "relation does not exist")]);
        let (rest, _tokens) = client(transport.clone());

        let error = rest
            .select::<Order>("nonexistent", &[])
            .await
            .expect_err("not found");
        assert!(matches!(error, ApiError::NotFound(_)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_query_values_are_percent_encoded() {
        let transport = ScriptedTransport::new(vec![response(200, "[]")]);
        let (rest, _tokens) = client(transport.clone());

        rest.select::<Order>(
            "orders",
            &[("created_at", "gte.2026-08-05T00:00:00+00:00".to_string())],
        )
        .await
        .expect("select");

        let url = &transport.requests()[0].url;
        assert!(url.contains("created_at=gte.2026-08-05T00%3A00%3A00%2B00%3A00"));
    }

    #[tokio::test]
    async fn test_count_parses_content_range() {
        let mut headers = HashMap::new();
        headers.insert("content-range".to_string(), "0-0/42".to_string());
        let transport = ScriptedTransport::new(vec![HttpResponse {
            status: 206,
            headers,
            body: "[]".to_string(),
        }]);
        let (rest, _tokens) = client(transport.clone());

        let total = rest.count("orders", &[]).await.expect("count");
        assert_eq!(total, 42);

        let request = &transport.requests()[0];
        assert_eq!(request.header_value("Prefer"), Some("count=exact"));
        assert_eq!(request.header_value("Range"), Some("0-0"));
    }

    #[tokio::test]
    async fn test_update_returns_none_when_filter_matches_nothing() {
        let transport = ScriptedTransport::new(vec![response(200, "[]")]);
        let (rest, _tokens) = client(transport);

        let updated: Option<Order> = rest
            .update(
                "orders",
                &[("id", "eq.999".to_string())],
                &serde_json::json!({"status": "cancelled"}),
            )
            .await
            .expect("update");
        assert!(updated.is_none());
    }

    #[test]
    fn test_expired_marker_matching() {
        assert!(is_expired_token_body(r#"{"message":"JWT expired"}"#));
        assert!(is_expired_token_body(r#"{"msg":"Invalid JWT"}"#));
        assert!(is_expired_token_body("invalid token"));
        assert!(is_expired_token_body("missing authorization header"));
        assert!(!is_expired_token_body(
            "permission denied for table orders"
        ));
        assert!(!is_expired_token_body(""));
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("garbage"), None);
    }
}
