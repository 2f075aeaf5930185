//! Request and response shapes for the DingTalk endpoints.

use serde::{Deserialize, Serialize};

use crate::dingtalk::message::Message;

/// Application credentials used to obtain an access token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Application key.
    pub app_key: String,
    /// Application secret.
    pub app_secret: String,
}

impl Credentials {
    /// Create credentials from an app key and secret.
    #[must_use]
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessTokenRequest<'a> {
    pub app_key: &'a str,
    pub app_secret: &'a str,
}

/// Token endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessToken {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expire_in: i64,
}

/// Keyword search parameters shared by user and department search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Keyword, e.g. a name or phone number.
    pub keyword: String,
    /// Pagination offset.
    pub offset: u32,
    /// Page size.
    pub size: u32,
    /// Exact match instead of fuzzy match. Only honored by user search.
    pub exact_match: bool,
}

impl SearchQuery {
    /// Default page size.
    pub const DEFAULT_SIZE: u32 = 10;

    /// Fuzzy search for `keyword` on the first page.
    #[must_use]
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            offset: 0,
            size: Self::DEFAULT_SIZE,
            exact_match: false,
        }
    }

    /// Request an exact match.
    #[must_use]
    pub const fn exact(mut self, exact: bool) -> Self {
        self.exact_match = exact;
        self
    }

    /// Set offset and page size.
    #[must_use]
    pub const fn page(mut self, offset: u32, size: u32) -> Self {
        self.offset = offset;
        self.size = size;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserSearchRequest<'a> {
    pub query_word: &'a str,
    pub offset: u32,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_match_field: Option<u8>,
}

impl<'a> From<&'a SearchQuery> for UserSearchRequest<'a> {
    fn from(query: &'a SearchQuery) -> Self {
        Self {
            query_word: &query.keyword,
            offset: query.offset,
            size: query.size,
            full_match_field: query.exact_match.then_some(1),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DepartmentSearchRequest<'a> {
    pub query_word: &'a str,
    pub offset: u32,
    pub size: u32,
}

impl<'a> From<&'a SearchQuery> for DepartmentSearchRequest<'a> {
    fn from(query: &'a SearchQuery) -> Self {
        Self {
            query_word: &query.keyword,
            offset: query.offset,
            size: query.size,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    /// More results exist past this page.
    #[serde(default)]
    pub has_more: bool,
    /// Total number of matches.
    #[serde(default)]
    pub total_count: u64,
    /// Matching IDs in server order.
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

impl<T> SearchResult<T> {
    /// Returns `true` when nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_count == 0 || self.list.is_empty()
    }
}

/// Who receives a work notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    /// User IDs.
    pub user_ids: Vec<String>,
    /// Department IDs.
    pub dept_ids: Vec<i64>,
    /// Send to everyone in the organization.
    pub to_all: bool,
}

impl Recipients {
    /// Explicit users.
    #[must_use]
    pub fn users<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_ids: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Explicit departments.
    #[must_use]
    pub fn departments(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            dept_ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Everyone in the organization.
    #[must_use]
    pub fn all() -> Self {
        Self {
            to_all: true,
            ..Self::default()
        }
    }

    /// Add departments to this recipient set.
    #[must_use]
    pub fn with_departments(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.dept_ids.extend(ids);
        self
    }

    /// Returns `true` when no recipient class is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.to_all && self.user_ids.is_empty() && self.dept_ids.is_empty()
    }
}

/// Body of the asynchronous work-notification send call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest {
    /// Agent ID of the sending application.
    pub agent_id: i64,
    /// Broadcast to every user.
    pub to_all_user: bool,
    /// Comma-separated user IDs.
    #[serde(rename = "userid_list", skip_serializing_if = "String::is_empty")]
    pub user_id_list: String,
    /// Comma-separated department IDs.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dept_id_list: String,
    /// Message body.
    pub msg: Message,
    /// Translate IDs into names in the rendered message.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub enable_id_trans: bool,
}

impl SendRequest {
    /// Build a request for `msg` addressed to `recipients`.
    #[must_use]
    pub fn new(agent_id: i64, msg: Message, recipients: &Recipients) -> Self {
        Self {
            agent_id,
            to_all_user: recipients.to_all,
            user_id_list: recipients.user_ids.join(","),
            dept_id_list: recipients
                .dept_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            msg,
            enable_id_trans: false,
        }
    }

    /// Enable or disable ID translation.
    #[must_use]
    pub const fn with_id_translation(mut self, enable: bool) -> Self {
        self.enable_id_trans = enable;
        self
    }
}

/// Raw send endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SendResponse {
    pub errcode: i64,
    pub errmsg: String,
    pub task_id: i64,
    pub request_id: String,
}

/// Accepted send: identifiers for later lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    /// Asynchronous task ID.
    pub task_id: i64,
    /// Request ID assigned by the server.
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_user_search_sets_full_match_field() {
        let query = SearchQuery::new("Alice").exact(true);
        let body = serde_json::to_value(UserSearchRequest::from(&query)).expect("serialize");
        assert_eq!(
            body,
            json!({"queryWord": "Alice", "offset": 0, "size": 10, "fullMatchField": 1})
        );
    }

    #[test]
    fn fuzzy_user_search_omits_full_match_field() {
        let query = SearchQuery::new("al").page(20, 5);
        let body = serde_json::to_value(UserSearchRequest::from(&query)).expect("serialize");
        assert_eq!(body, json!({"queryWord": "al", "offset": 20, "size": 5}));
    }

    #[test]
    fn department_search_ignores_exact_flag() {
        let query = SearchQuery::new("Ops").exact(true);
        let body = serde_json::to_value(DepartmentSearchRequest::from(&query)).expect("serialize");
        assert_eq!(body, json!({"queryWord": "Ops", "offset": 0, "size": 10}));
    }

    #[test]
    fn empty_search_result_decodes() {
        let result: SearchResult<String> =
            serde_json::from_value(json!({"hasMore": false, "totalCount": 0})).expect("decode");
        assert!(result.is_empty());
        assert!(result.list.is_empty());
    }

    #[test]
    fn department_ids_decode_as_integers() {
        let result: SearchResult<i64> = serde_json::from_value(
            json!({"hasMore": true, "totalCount": 3, "list": [1, 22, 333]}),
        )
        .expect("decode");
        assert!(result.has_more);
        assert_eq!(result.list, vec![1, 22, 333]);
    }

    #[test]
    fn send_request_joins_ids_and_omits_empty_lists() {
        let recipients = Recipients::users(["u1", "u2"]);
        let req = SendRequest::new(42, Message::file("@f"), &recipients);
        let body = serde_json::to_value(&req).expect("serialize");
        assert_eq!(
            body,
            json!({
                "agent_id": 42,
                "to_all_user": false,
                "userid_list": "u1,u2",
                "msg": {"msgtype": "file", "file": {"media_id": "@f"}}
            })
        );
    }

    #[test]
    fn send_request_with_departments_and_translation() {
        let recipients = Recipients::all().with_departments([7, 8]);
        let req = SendRequest::new(1, Message::image("@i"), &recipients).with_id_translation(true);
        let body = serde_json::to_value(&req).expect("serialize");
        assert_eq!(body["to_all_user"], true);
        assert_eq!(body["dept_id_list"], "7,8");
        assert_eq!(body["enable_id_trans"], true);
        assert!(body.get("userid_list").is_none());
    }

    #[test]
    fn recipients_emptiness() {
        assert!(Recipients::default().is_empty());
        assert!(!Recipients::all().is_empty());
        assert!(!Recipients::departments([1]).is_empty());
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = Credentials::new("key", "s3cret");
        let shown = format!("{creds:?}");
        assert!(shown.contains("key"));
        assert!(!shown.contains("s3cret"));
    }
}
