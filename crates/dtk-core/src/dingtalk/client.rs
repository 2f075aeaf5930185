//! DingTalk API client.
//!
//! Two hosts are involved:
//!
//! 1. `api.dingtalk.com` for the v1.0 endpoints (token, contact search),
//!    which take the token in the `x-acs-dingtalk-access-token` header
//! 2. `oapi.dingtalk.com` for the legacy `topapi` send endpoint, which takes
//!    the token as the `access_token` query parameter and reports failures
//!    through `errcode` in a 200 response

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::dingtalk::auth::TokenCache;
use crate::dingtalk::message::Message;
use crate::dingtalk::models::{
    AccessToken, AccessTokenRequest, Credentials, DepartmentSearchRequest, Recipients,
    SearchQuery, SearchResult, SendReceipt, SendRequest, SendResponse, UserSearchRequest,
};
use crate::error::{ApiError, DingTalkError, Result};

/// Default host for the v1.0 API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.dingtalk.com";
/// Default host for the legacy `topapi` API.
pub const DEFAULT_OAPI_BASE_URL: &str = "https://oapi.dingtalk.com";

/// Header carrying the token on v1.0 endpoints.
pub const ACCESS_TOKEN_HEADER: &str = "x-acs-dingtalk-access-token";

const TOKEN_PATH: &str = "/v1.0/oauth2/accessToken";
const USER_SEARCH_PATH: &str = "/v1.0/contact/users/search";
const DEPARTMENT_SEARCH_PATH: &str = "/v1.0/contact/departments/search";
const ASYNC_SEND_PATH: &str = "/topapi/message/corpconversation/asyncsend_v2";

/// Base URLs of the two DingTalk hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Host for token and contact endpoints.
    pub api_base_url: String,
    /// Host for the message send endpoint.
    pub oapi_base_url: String,
}

impl Endpoints {
    /// Endpoints with the given base URLs. Trailing slashes are ignored.
    #[must_use]
    pub fn new(api_base_url: &str, oapi_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            oapi_base_url: oapi_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url)
    }

    fn oapi(&self, path: &str) -> String {
        format!("{}{path}", self.oapi_base_url)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL, DEFAULT_OAPI_BASE_URL)
    }
}

/// DingTalk API client.
///
/// Cloning is cheap; clones share the HTTP connection pool and token cache.
#[derive(Debug, Clone)]
pub struct DingTalkClient {
    http_client: Client,
    credentials: Credentials,
    agent_id: i64,
    endpoints: Endpoints,
    tokens: Arc<TokenCache>,
}

impl DingTalkClient {
    /// Create a client for the public DingTalk hosts.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(credentials: Credentials, agent_id: i64) -> Result<Self> {
        Self::with_options(credentials, agent_id, Endpoints::default(), None)
    }

    /// Create a client with explicit endpoints and an optional request timeout.
    ///
    /// Without a timeout the transport default applies.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn with_options(
        credentials: Credentials,
        agent_id: i64,
        endpoints: Endpoints,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| DingTalkError::Config(format!("creating HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            credentials,
            agent_id,
            endpoints,
            tokens: Arc::new(TokenCache::new()),
        })
    }

    /// Create a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials or the agent ID are missing, or HTTP
    /// client creation fails.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let credentials = config.credentials()?;
        let agent_id = config.agent_id()?;
        let endpoints = Endpoints::new(
            &config.dingtalk.api_base_url,
            &config.dingtalk.oapi_base_url,
        );
        let timeout = config.runtime.timeout.map(Duration::from_secs);
        Self::with_options(credentials, agent_id, endpoints, timeout)
    }

    /// Share a token cache with another client.
    #[must_use]
    pub fn with_token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = tokens;
        self
    }

    /// The token cache used by this client.
    #[must_use]
    pub const fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Agent ID used when sending.
    #[must_use]
    pub const fn agent_id(&self) -> i64 {
        self.agent_id
    }

    /// App key the token is requested for.
    #[must_use]
    pub fn app_key(&self) -> &str {
        &self.credentials.app_key
    }

    /// Full URL of the access token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        self.endpoints.api(TOKEN_PATH)
    }

    /// Return a valid access token, fetching a new one if the cached token is stale.
    ///
    /// # Errors
    ///
    /// Returns [`DingTalkError::Auth`] if the token request fails or the
    /// response carries no token.
    pub async fn access_token(&self) -> Result<String> {
        self.tokens
            .get_or_refresh(|| self.fetch_token())
            .await
            .map_err(DingTalkError::Auth)
    }

    async fn fetch_token(&self) -> std::result::Result<AccessToken, ApiError> {
        log::debug!("requesting access token for app {}", self.credentials.app_key);
        let body = AccessTokenRequest {
            app_key: &self.credentials.app_key,
            app_secret: &self.credentials.app_secret,
        };
        let request = self
            .http_client
            .post(self.endpoints.api(TOKEN_PATH))
            .json(&body);
        execute(TOKEN_PATH, request).await
    }

    /// Search users by keyword. One page only; empty results are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DingTalkError::Search`] on transport failure, a non-200
    /// status, or an undecodable body.
    pub async fn search_users(
        &self,
        access_token: &str,
        query: &SearchQuery,
    ) -> Result<SearchResult<String>> {
        log::debug!(
            "searching users for {:?} (exact: {}, offset: {}, size: {})",
            query.keyword,
            query.exact_match,
            query.offset,
            query.size
        );
        let request = self
            .http_client
            .post(self.endpoints.api(USER_SEARCH_PATH))
            .header(ACCESS_TOKEN_HEADER, access_token)
            .json(&UserSearchRequest::from(query));
        execute(USER_SEARCH_PATH, request)
            .await
            .map_err(DingTalkError::Search)
    }

    /// Search departments by keyword. One page only; empty results are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DingTalkError::Search`] on transport failure, a non-200
    /// status, or an undecodable body.
    pub async fn search_departments(
        &self,
        access_token: &str,
        query: &SearchQuery,
    ) -> Result<SearchResult<i64>> {
        log::debug!(
            "searching departments for {:?} (offset: {}, size: {})",
            query.keyword,
            query.offset,
            query.size
        );
        let request = self
            .http_client
            .post(self.endpoints.api(DEPARTMENT_SEARCH_PATH))
            .header(ACCESS_TOKEN_HEADER, access_token)
            .json(&DepartmentSearchRequest::from(query));
        execute(DEPARTMENT_SEARCH_PATH, request)
            .await
            .map_err(DingTalkError::Search)
    }

    /// Resolve a keyword to the user IDs on the first result page.
    ///
    /// Unlike [`search_users`](Self::search_users), an empty result is an error.
    ///
    /// # Errors
    ///
    /// Returns [`DingTalkError::NoMatch`] if nothing matches, or the auth or
    /// search error from the underlying calls.
    pub async fn resolve_user_ids(&self, keyword: &str, exact: bool) -> Result<Vec<String>> {
        let token = self.access_token().await?;
        let result = self
            .search_users(&token, &SearchQuery::new(keyword).exact(exact))
            .await?;
        if result.is_empty() {
            return Err(DingTalkError::NoMatch {
                keyword: keyword.to_string(),
            });
        }
        Ok(result.list)
    }

    /// Send a work notification from this client's agent.
    ///
    /// # Errors
    ///
    /// Returns [`DingTalkError::Auth`] if no token can be obtained, or
    /// [`DingTalkError::Send`] on transport failure, a non-200 status, an
    /// undecodable body, or a non-zero `errcode`.
    pub async fn send(&self, message: &Message, recipients: &Recipients) -> Result<SendReceipt> {
        let request = SendRequest::new(self.agent_id, message.clone(), recipients);
        self.send_request(&request).await
    }

    /// Send a message to the given users.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_to_users(
        &self,
        message: &Message,
        user_ids: &[String],
    ) -> Result<SendReceipt> {
        self.send(message, &Recipients::users(user_ids.iter().cloned()))
            .await
    }

    /// Send a fully built request.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_request(&self, request: &SendRequest) -> Result<SendReceipt> {
        if !request.to_all_user
            && request.user_id_list.is_empty()
            && request.dept_id_list.is_empty()
        {
            log::warn!("sending {} message with no recipients", request.msg.kind());
        }

        let token = self.access_token().await?;
        log::debug!(
            "sending {} message as agent {}",
            request.msg.kind(),
            request.agent_id
        );

        let http_request = self
            .http_client
            .post(self.endpoints.oapi(ASYNC_SEND_PATH))
            .query(&[("access_token", token.as_str())])
            .json(request);

        let response: SendResponse = execute(ASYNC_SEND_PATH, http_request)
            .await
            .map_err(DingTalkError::Send)?;

        if response.errcode != 0 {
            return Err(DingTalkError::Send(ApiError::Business {
                endpoint: ASYNC_SEND_PATH,
                code: response.errcode,
                message: response.errmsg,
            }));
        }

        log::info!(
            "message accepted, task {} (request {})",
            response.task_id,
            response.request_id
        );
        Ok(SendReceipt {
            task_id: response.task_id,
            request_id: response.request_id,
        })
    }
}

/// Send `request` and decode a 200 JSON response.
async fn execute<T: DeserializeOwned>(
    endpoint: &'static str,
    request: RequestBuilder,
) -> std::result::Result<T, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|source| ApiError::Transport { endpoint, source })?;
    decode(endpoint, response).await
}

async fn decode<T: DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> std::result::Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ApiError::Transport { endpoint, source })?;

    if status != reqwest::StatusCode::OK {
        return Err(ApiError::HttpStatus {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Decode {
        endpoint,
        message: e.to_string(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> DingTalkClient {
        DingTalkClient::with_options(
            Credentials::new("key", "secret"),
            1001,
            Endpoints::new(&server.uri(), &server.uri()),
            Some(Duration::from_secs(5)),
        )
        .expect("client")
    }

    async fn mount_token(server: &MockServer, expire_in: i64, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_json(json!({"appKey": "key", "appSecret": "secret"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"accessToken": "tok", "expireIn": expire_in})),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn endpoints_strip_trailing_slash() {
        let endpoints = Endpoints::new("http://a/", "http://b//");
        assert_eq!(endpoints.api(TOKEN_PATH), "http://a/v1.0/oauth2/accessToken");
        assert_eq!(
            endpoints.oapi(ASYNC_SEND_PATH),
            "http://b/topapi/message/corpconversation/asyncsend_v2"
        );
    }

    #[tokio::test]
    async fn access_token_is_cached() {
        let server = MockServer::start().await;
        mount_token(&server, 7200, 1).await;
        let client = client_for(&server);

        assert_eq!(client.access_token().await.expect("token"), "tok");
        assert_eq!(client.access_token().await.expect("token"), "tok");
        assert!(client.token_cache().is_valid().await);
    }

    #[tokio::test]
    async fn access_token_inside_margin_refreshes() {
        let server = MockServer::start().await;
        mount_token(&server, 30, 2).await;
        let client = client_for(&server);

        client.access_token().await.expect("token");
        client.access_token().await.expect("token");
    }

    #[tokio::test]
    async fn clones_share_the_token_cache() {
        let server = MockServer::start().await;
        mount_token(&server, 7200, 1).await;
        let client = client_for(&server);
        let other = client.clone();

        client.access_token().await.expect("token");
        other.access_token().await.expect("token");
    }

    #[tokio::test]
    async fn empty_access_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": "invalidClientId"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).access_token().await.expect_err("no token");
        assert!(matches!(err, DingTalkError::Auth(ApiError::MissingToken)));
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_error_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("{\"code\":\"invalidAppKey\"}"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).access_token().await.expect_err("rejected");
        let DingTalkError::Auth(ApiError::HttpStatus { status, body, .. }) = err else {
            panic!("unexpected error kind");
        };
        assert_eq!(status, 400);
        assert!(body.contains("invalidAppKey"));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let client = DingTalkClient::with_options(
            Credentials::new("key", "secret"),
            1,
            Endpoints::new("http://127.0.0.1:9", "http://127.0.0.1:9"),
            Some(Duration::from_secs(2)),
        )
        .expect("client");

        let err = client.access_token().await.expect_err("unreachable");
        assert!(matches!(
            err,
            DingTalkError::Auth(ApiError::Transport { endpoint: TOKEN_PATH, .. })
        ));
    }

    #[tokio::test]
    async fn user_search_sends_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(USER_SEARCH_PATH))
            .and(header(ACCESS_TOKEN_HEADER, "tok"))
            .and(body_json(
                json!({"queryWord": "Alice", "offset": 0, "size": 10, "fullMatchField": 1}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"hasMore": false, "totalCount": 1, "list": ["user-1"]}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .search_users("tok", &SearchQuery::new("Alice").exact(true))
            .await
            .expect("search");
        assert_eq!(result.total_count, 1);
        assert_eq!(result.list, vec!["user-1".to_string()]);
    }

    #[tokio::test]
    async fn empty_user_search_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(USER_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"hasMore": false, "totalCount": 0, "list": []}),
            ))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .search_users("tok", &SearchQuery::new("nobody"))
            .await
            .expect("search");
        assert!(!result.has_more);
        assert_eq!(result.total_count, 0);
        assert!(result.list.is_empty());
    }

    #[tokio::test]
    async fn department_search_decodes_numeric_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DEPARTMENT_SEARCH_PATH))
            .and(header(ACCESS_TOKEN_HEADER, "tok"))
            .and(body_json(json!({"queryWord": "Ops", "offset": 5, "size": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"hasMore": true, "totalCount": 9, "list": [101, 102]}),
            ))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .search_departments("tok", &SearchQuery::new("Ops").page(5, 2))
            .await
            .expect("search");
        assert!(result.has_more);
        assert_eq!(result.list, vec![101, 102]);
    }

    #[tokio::test]
    async fn search_status_error_carries_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DEPARTMENT_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden.AccessDenied"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .search_departments("tok", &SearchQuery::new("x"))
            .await
            .expect_err("forbidden");
        let DingTalkError::Search(ApiError::HttpStatus { status, body, endpoint }) = err else {
            panic!("unexpected error kind");
        };
        assert_eq!(status, 403);
        assert_eq!(body, "Forbidden.AccessDenied");
        assert_eq!(endpoint, DEPARTMENT_SEARCH_PATH);
    }

    #[tokio::test]
    async fn search_garbage_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(USER_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .search_users("tok", &SearchQuery::new("x"))
            .await
            .expect_err("garbage");
        assert!(matches!(err, DingTalkError::Search(ApiError::Decode { .. })));
    }

    #[tokio::test]
    async fn resolve_user_ids_reports_no_match() {
        let server = MockServer::start().await;
        mount_token(&server, 7200, 1).await;
        Mock::given(method("POST"))
            .and(path(USER_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"hasMore": false, "totalCount": 0, "list": []}),
            ))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .resolve_user_ids("ghost", true)
            .await
            .expect_err("no match");
        assert!(matches!(err, DingTalkError::NoMatch { ref keyword } if keyword == "ghost"));
    }

    #[tokio::test]
    async fn send_puts_token_in_query() {
        let server = MockServer::start().await;
        mount_token(&server, 7200, 1).await;
        Mock::given(method("POST"))
            .and(path(ASYNC_SEND_PATH))
            .and(query_param("access_token", "tok"))
            .and(body_json(json!({
                "agent_id": 1001,
                "to_all_user": false,
                "userid_list": "u1,u2",
                "msg": {"msgtype": "image", "image": {"media_id": "@m"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"errcode": 0, "task_id": 123, "request_id": "abc"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = client_for(&server)
            .send_to_users(&Message::image("@m"), &["u1".to_string(), "u2".to_string()])
            .await
            .expect("send");
        assert_eq!(
            receipt,
            SendReceipt {
                task_id: 123,
                request_id: "abc".to_string()
            }
        );
    }

    #[tokio::test]
    async fn nonzero_errcode_is_business_error() {
        let server = MockServer::start().await;
        mount_token(&server, 7200, 1).await;
        Mock::given(method("POST"))
            .and(path(ASYNC_SEND_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"errcode": 88, "errmsg": "不合法的agentid", "request_id": "r1"}),
            ))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(&Message::file("@f"), &Recipients::all())
            .await
            .expect_err("business error");
        assert!(err.is_business());
        let DingTalkError::Send(ApiError::Business { code, message, .. }) = err else {
            panic!("unexpected error kind");
        };
        assert_eq!(code, 88);
        assert_eq!(message, "不合法的agentid");
    }

    #[tokio::test]
    async fn send_status_error_is_not_business() {
        let server = MockServer::start().await;
        mount_token(&server, 7200, 1).await;
        Mock::given(method("POST"))
            .and(path(ASYNC_SEND_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(&Message::file("@f"), &Recipients::departments([3]))
            .await
            .expect_err("status error");
        assert!(!err.is_business());
        assert!(matches!(
            err,
            DingTalkError::Send(ApiError::HttpStatus { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn send_without_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(ASYNC_SEND_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(&Message::image("@i"), &Recipients::all())
            .await
            .expect_err("auth error");
        assert!(matches!(err, DingTalkError::Auth(_)));
    }
}
