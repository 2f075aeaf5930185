//! Work notification message bodies.
//!
//! A [`Message`] serializes with its kind in `msgtype` and the kind-specific
//! payload under a key of the same name:
//!
//! ```json
//! {"msgtype": "text", "text": {"content": "[2024-01-01 09:00:00] hi"}}
//! ```
//!
//! Text, link, markdown and action-card constructors prefix their
//! human-readable fields with the local time.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Format of the timestamp prefix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A work notification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msgtype", rename_all = "snake_case")]
pub enum Message {
    /// Plain text.
    Text {
        /// Text payload.
        text: TextContent,
    },
    /// Image by media ID.
    Image {
        /// Image payload.
        image: MediaContent,
    },
    /// Voice clip by media ID.
    Voice {
        /// Voice payload.
        voice: VoiceContent,
    },
    /// File by media ID.
    File {
        /// File payload.
        file: MediaContent,
    },
    /// Link card.
    Link {
        /// Link payload.
        link: LinkContent,
    },
    /// Markdown.
    Markdown {
        /// Markdown payload.
        markdown: MarkdownContent,
    },
    /// Single-button action card.
    ActionCard {
        /// Action card payload.
        action_card: ActionCardContent,
    },
    /// OA approval-style card.
    Oa {
        /// OA payload.
        oa: OaContent,
    },
}

/// Text message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// Message text.
    pub content: String,
}

/// Payload for image and file messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaContent {
    /// Media ID returned by the media upload API.
    pub media_id: String,
}

/// Voice message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceContent {
    /// Media ID returned by the media upload API.
    pub media_id: String,
    /// Duration in seconds. The API expects a string.
    pub duration: String,
}

/// Link message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkContent {
    /// Card title.
    pub title: String,
    /// Card text.
    pub text: String,
    /// Target URL opened on click.
    pub message_url: String,
    /// Thumbnail image URL.
    pub pic_url: String,
}

/// Markdown message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownContent {
    /// Title shown in the conversation list.
    pub title: String,
    /// Markdown body.
    pub text: String,
}

/// Single-button action card payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCardContent {
    /// Card title.
    pub title: String,
    /// Markdown body.
    pub markdown: String,
    /// Button label.
    pub single_title: String,
    /// Button target URL.
    pub single_url: String,
}

/// OA message payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OaContent {
    /// Target URL on mobile.
    pub message_url: String,
    /// Target URL on desktop.
    pub pc_message_url: String,
    /// Colored header.
    pub head: OaHead,
    /// Card body.
    pub body: OaBody,
}

/// OA message header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OaHead {
    /// Header background color, `AARRGGBB`.
    pub bgcolor: String,
    /// Header text.
    pub text: String,
}

/// OA message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OaBody {
    /// Body title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Author line.
    pub author: String,
    /// Image media ID.
    pub image: String,
    /// Attachment count.
    pub file_count: String,
    /// Key/value rows.
    pub form: Vec<OaForm>,
    /// Highlighted number with unit.
    pub rich: OaRich,
}

/// One key/value row of an OA body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OaForm {
    /// Row label.
    pub key: String,
    /// Row value.
    pub value: String,
}

/// Highlighted number of an OA body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OaRich {
    /// Number.
    pub num: String,
    /// Unit.
    pub unit: String,
}

impl Message {
    /// Text message, stamped with the local time.
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self::text_at(content, &Local::now())
    }

    /// Image message.
    #[must_use]
    pub fn image(media_id: &str) -> Self {
        Self::Image {
            image: MediaContent {
                media_id: media_id.to_string(),
            },
        }
    }

    /// Voice message of `duration_secs` seconds.
    #[must_use]
    pub fn voice(media_id: &str, duration_secs: u32) -> Self {
        Self::Voice {
            voice: VoiceContent {
                media_id: media_id.to_string(),
                duration: duration_secs.to_string(),
            },
        }
    }

    /// File message.
    #[must_use]
    pub fn file(media_id: &str) -> Self {
        Self::File {
            file: MediaContent {
                media_id: media_id.to_string(),
            },
        }
    }

    /// Link message; title and text are stamped with the local time.
    #[must_use]
    pub fn link(title: &str, text: &str, message_url: &str, pic_url: &str) -> Self {
        Self::link_at(title, text, message_url, pic_url, &Local::now())
    }

    /// Markdown message; title and text are stamped with the local time.
    #[must_use]
    pub fn markdown(title: &str, text: &str) -> Self {
        Self::markdown_at(title, text, &Local::now())
    }

    /// Action card; title and markdown are stamped with the local time.
    #[must_use]
    pub fn action_card(title: &str, markdown: &str, single_title: &str, single_url: &str) -> Self {
        Self::action_card_at(title, markdown, single_title, single_url, &Local::now())
    }

    /// OA message. Sent as given, without a timestamp.
    #[must_use]
    pub const fn oa(oa: OaContent) -> Self {
        Self::Oa { oa }
    }

    /// The `msgtype` value of this message.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Voice { .. } => "voice",
            Self::File { .. } => "file",
            Self::Link { .. } => "link",
            Self::Markdown { .. } => "markdown",
            Self::ActionCard { .. } => "action_card",
            Self::Oa { .. } => "oa",
        }
    }

    fn text_at<Tz: TimeZone>(content: &str, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self::Text {
            text: TextContent {
                content: stamp(content, at),
            },
        }
    }

    fn link_at<Tz: TimeZone>(
        title: &str,
        text: &str,
        message_url: &str,
        pic_url: &str,
        at: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self::Link {
            link: LinkContent {
                title: stamp(title, at),
                text: stamp(text, at),
                message_url: message_url.to_string(),
                pic_url: pic_url.to_string(),
            },
        }
    }

    fn markdown_at<Tz: TimeZone>(title: &str, text: &str, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self::Markdown {
            markdown: MarkdownContent {
                title: stamp(title, at),
                text: stamp(text, at),
            },
        }
    }

    fn action_card_at<Tz: TimeZone>(
        title: &str,
        markdown: &str,
        single_title: &str,
        single_url: &str,
        at: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self::ActionCard {
            action_card: ActionCardContent {
                title: stamp(title, at),
                markdown: stamp(markdown, at),
                single_title: single_title.to_string(),
                single_url: single_url.to_string(),
            },
        }
    }
}

/// Prefix `text` with `[YYYY-MM-DD HH:MM:SS] `.
fn stamp<Tz: TimeZone>(text: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("[{}] {text}", at.format(TIMESTAMP_FORMAT))
}
