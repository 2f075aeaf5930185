//! Error types for the core library.

use thiserror::Error;

/// What went wrong while talking to a DingTalk endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("{endpoint}: request failed")]
    Transport {
        /// Endpoint path that was called.
        endpoint: &'static str,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-200 status.
    #[error("{endpoint}: HTTP {status} - {body}")]
    HttpStatus {
        /// Endpoint path that was called.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("{endpoint}: parsing response: {message} (body: {body})")]
    Decode {
        /// Endpoint path that was called.
        endpoint: &'static str,
        /// Decoder error text.
        message: String,
        /// Raw response body.
        body: String,
    },

    /// The token endpoint answered without an access token.
    #[error("no accessToken in response")]
    MissingToken,

    /// HTTP succeeded but the body carries a non-zero `errcode`.
    #[error("{endpoint}: errcode {code}: {message}")]
    Business {
        /// Endpoint path that was called.
        endpoint: &'static str,
        /// Remote `errcode`.
        code: i64,
        /// Remote `errmsg`, verbatim.
        message: String,
    },
}

/// Error returned by the DingTalk client, grouped by operation.
#[derive(Debug, Error)]
pub enum DingTalkError {
    /// Access token acquisition failed.
    #[error("authentication failed")]
    Auth(#[source] ApiError),

    /// A user or department search failed.
    #[error("search failed")]
    Search(#[source] ApiError),

    /// Sending a work notification failed.
    #[error("send failed")]
    Send(#[source] ApiError),

    /// A user lookup returned no results.
    #[error("no user matches {keyword:?}")]
    NoMatch {
        /// Keyword that was searched for.
        keyword: String,
    },

    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DingTalkError {
    /// The underlying API failure, if this error came from an API call.
    #[must_use]
    pub const fn kind(&self) -> Option<&ApiError> {
        match self {
            Self::Auth(e) | Self::Search(e) | Self::Send(e) => Some(e),
            Self::NoMatch { .. } | Self::Config(_) => None,
        }
    }

    /// Returns `true` for a non-zero `errcode` in an otherwise successful response.
    #[must_use]
    pub const fn is_business(&self) -> bool {
        matches!(self.kind(), Some(ApiError::Business { .. }))
    }
}

/// Result type alias using `DingTalkError`.
pub type Result<T> = std::result::Result<T, DingTalkError>;
