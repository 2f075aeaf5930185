//! DingTalk API client module.
//!
//! This module provides:
//! - Access token caching
//! - Contact search for users and departments
//! - Work notification messages and the async send endpoint

pub mod auth;
pub mod client;
pub mod message;
pub mod models;

pub use auth::TokenCache;
pub use client::{DingTalkClient, Endpoints};
pub use message::{
    ActionCardContent, LinkContent, MarkdownContent, MediaContent, Message, OaBody, OaContent,
    OaForm, OaHead, OaRich, TextContent, VoiceContent,
};
pub use models::{
    AccessToken, Credentials, Recipients, SearchQuery, SearchResult, SendReceipt, SendRequest,
};
