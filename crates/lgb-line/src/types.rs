//! LINE Messaging API types

use lgb_core::IdentityPolicy;
use serde::{Deserialize, Serialize};

/// Webhook request body
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Webhook event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    Message {
        reply_token: String,
        source: Option<Source>,
        #[serde(default)]
        timestamp: i64,
        message: MessageContent,
    },
    #[serde(rename_all = "camelCase")]
    Follow {
        reply_token: Option<String>,
        source: Option<Source>,
    },
    #[serde(rename_all = "camelCase")]
    Postback {
        reply_token: Option<String>,
        source: Option<Source>,
        postback: Postback,
    },
    #[serde(rename_all = "camelCase")]
    Beacon {
        reply_token: Option<String>,
        source: Option<Source>,
        beacon: Beacon,
    },
    /// unfollow, join, leave, memberJoined, ...
    #[serde(other)]
    Unknown,
}

impl Event {
    /// Event type name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Follow { .. } => "follow",
            Self::Postback { .. } => "postback",
            Self::Beacon { .. } => "beacon",
            Self::Unknown => "unknown",
        }
    }
}

/// Message event payload
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        id: String,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Sticker {
        id: String,
        package_id: String,
        sticker_id: String,
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        text: Option<String>,
    },
    Image {
        id: String,
    },
    Video {
        id: String,
    },
    /// audio, file, location, ...
    #[serde(other)]
    Unknown,
}

/// Where an event came from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
    #[serde(rename_all = "camelCase")]
    Group {
        group_id: String,
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Room {
        room_id: String,
        user_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl Source {
    /// Session key for this source under `policy`.
    ///
    /// `None` when the source carries no usable identifier, e.g. a group
    /// message from a user who has not consented to share their id.
    pub fn identity(&self, policy: IdentityPolicy) -> Option<&str> {
        let id = match (policy, self) {
            (_, Self::User { user_id }) => Some(user_id.as_str()),
            (IdentityPolicy::Sender, Self::Group { user_id, .. })
            | (IdentityPolicy::Sender, Self::Room { user_id, .. }) => user_id.as_deref(),
            (IdentityPolicy::Conversation, Self::Group { group_id, .. }) => Some(group_id.as_str()),
            (IdentityPolicy::Conversation, Self::Room { room_id, .. }) => Some(room_id.as_str()),
            (_, Self::Unknown) => None,
        };
        id.filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Beacon {
    pub hwid: String,
    #[serde(rename = "type", default)]
    pub beacon_type: String,
}

/// Reply message
#[derive(Debug, Clone, Serialize)]
pub struct ReplyMessage {
    #[serde(rename = "replyToken")]
    pub reply_token: String,
    pub messages: Vec<OutgoingMessage>,
}

/// Outgoing message object
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub enum OutgoingMessage {
    Text { text: String },
}

/// API error response
#[derive(Debug, Clone, Deserialize)]
pub struct LineApiError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<Vec<ErrorDetail>>,
}

/// Error detail
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub property: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_message() {
        let body: WebhookBody = serde_json::from_str(
            r#"{
                "destination": "Uxxxxxxxx",
                "events": [{
                    "type": "message",
                    "mode": "active",
                    "timestamp": 1462629479859,
                    "webhookEventId": "01FZ74A0TDDPYRVKNK77XKC3ZR",
                    "deliveryContext": {"isRedelivery": false},
                    "replyToken": "nHuyWiB7yP5Zw52FIkcQobQuGDXCTA",
                    "source": {"type": "user", "userId": "U4af4980629"},
                    "message": {"id": "444573844083572737", "type": "text", "text": "Hello", "quoteToken": "q3Plxr"}
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(body.destination, "Uxxxxxxxx");
        match &body.events[0] {
            Event::Message {
                reply_token,
                source,
                timestamp,
                message: MessageContent::Text { text, .. },
            } => {
                assert_eq!(reply_token, "nHuyWiB7yP5Zw52FIkcQobQuGDXCTA");
                assert_eq!(*timestamp, 1462629479859);
                assert_eq!(text, "Hello");
                assert_eq!(
                    source.as_ref().unwrap().identity(IdentityPolicy::Sender),
                    Some("U4af4980629")
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sticker_message() {
        let content: MessageContent = serde_json::from_str(
            r#"{"type": "sticker", "id": "1", "packageId": "446", "stickerId": "1988",
                "stickerResourceType": "STATIC", "keywords": ["happy", "smile"], "text": "hi"}"#,
        )
        .unwrap();

        match content {
            MessageContent::Sticker {
                package_id,
                sticker_id,
                keywords,
                text,
                ..
            } => {
                assert_eq!(package_id, "446");
                assert_eq!(sticker_id, "1988");
                assert_eq!(keywords, vec!["happy", "smile"]);
                assert_eq!(text.as_deref(), Some("hi"));
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kinds_are_tolerated() {
        let body: WebhookBody = serde_json::from_str(
            r#"{"destination": "U1", "events": [
                {"type": "unfollow", "timestamp": 1, "source": {"type": "user", "userId": "U1"}},
                {"type": "message", "replyToken": "t", "timestamp": 1,
                 "source": {"type": "user", "userId": "U1"},
                 "message": {"type": "location", "id": "9", "latitude": 35.6, "longitude": 139.7}}
            ]}"#,
        )
        .unwrap();

        assert!(matches!(body.events[0], Event::Unknown));
        assert!(matches!(
            body.events[1],
            Event::Message {
                message: MessageContent::Unknown,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_postback_and_beacon() {
        let body: WebhookBody = serde_json::from_str(
            r#"{"destination": "U1", "events": [
                {"type": "postback", "replyToken": "t1", "timestamp": 1,
                 "source": {"type": "user", "userId": "U1"}, "postback": {"data": "action=buy"}},
                {"type": "beacon", "replyToken": "t2", "timestamp": 1,
                 "source": {"type": "user", "userId": "U1"}, "beacon": {"hwid": "d41d8cd98f", "type": "enter"}},
                {"type": "follow", "replyToken": "t3", "timestamp": 1,
                 "source": {"type": "user", "userId": "U1"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(body.events[0].kind(), "postback");
        match &body.events[1] {
            Event::Beacon { beacon, .. } => {
                assert_eq!(beacon.hwid, "d41d8cd98f");
                assert_eq!(beacon.beacon_type, "enter");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(body.events[2].kind(), "follow");
    }

    #[test]
    fn test_identity_policies() {
        let group = Source::Group {
            group_id: "G1".to_string(),
            user_id: Some("U1".to_string()),
        };
        assert_eq!(group.identity(IdentityPolicy::Sender), Some("U1"));
        assert_eq!(group.identity(IdentityPolicy::Conversation), Some("G1"));

        let room = Source::Room {
            room_id: "R1".to_string(),
            user_id: None,
        };
        assert_eq!(room.identity(IdentityPolicy::Sender), None);
        assert_eq!(room.identity(IdentityPolicy::Conversation), Some("R1"));

        let user = Source::User {
            user_id: "U2".to_string(),
        };
        assert_eq!(user.identity(IdentityPolicy::Conversation), Some("U2"));

        let empty = Source::User {
            user_id: String::new(),
        };
        assert_eq!(empty.identity(IdentityPolicy::Sender), None);
        assert_eq!(Source::Unknown.identity(IdentityPolicy::Sender), None);
    }

    #[test]
    fn test_reply_serialization() {
        let reply = ReplyMessage {
            reply_token: "token".to_string(),
            messages: vec![OutgoingMessage::Text {
                text: "hi".to_string(),
            }],
        };

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["replyToken"], "token");
        assert_eq!(json["messages"][0]["type"], "text");
        assert_eq!(json["messages"][0]["text"], "hi");
    }
}
