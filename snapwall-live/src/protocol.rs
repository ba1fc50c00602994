//! JSON wire protocol between a Snapwall client and the event backend.
//!
//! Every frame is a single JSON object with a `type` discriminator:
//!
//! ```text
//! server → client                    client → server
//! ─────────────────────────────      ──────────────────────────────
//! joined          (snapshot)         join         (sent on open)
//! photo_added     { photo }          photo_added  { ..., sessionId }
//! play_photo      { photo, index }   danmaku      { content, sessionId }
//! danmaku         { id, content }    ping         { sessionId }
//! activity_ended  { reason }
//! pong / error
//! ```
//!
//! Callers build [`OutgoingMessage`]s, which carry no session id; the
//! transport turns them into [`ClientMessage`]s with its own session id.

use serde::{Deserialize, Serialize};
use snapwall_core::{DanmakuMessage, Photo};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("binary frame is not UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Which kind of client is joining the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Participant,
    Display,
}

/// Frames pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Snapshot sent right after `join`.
    Joined {
        activity_id: String,
        #[serde(default)]
        photos: Vec<Photo>,
        timestamp: i64,
        /// Present when the backend drives playback order.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        playlist: Option<Vec<Photo>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_index: Option<usize>,
    },
    PhotoAdded {
        photo: Photo,
    },
    /// Backend-driven playback: show this photo now.
    PlayPhoto {
        photo: Photo,
        index: usize,
        total: usize,
        timestamp: i64,
    },
    Danmaku(DanmakuMessage),
    ActivityEnded {
        activity_id: String,
        reason: String,
        timestamp: i64,
    },
    Pong {
        #[serde(default)]
        timestamp: i64,
    },
    Error {
        code: String,
        message: String,
        /// Seconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after: Option<u64>,
    },
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    /// Binary frames are accepted when they carry UTF-8 JSON.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode(std::str::from_utf8(bytes)?)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// The `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::PhotoAdded { .. } => "photo_added",
            Self::PlayPhoto { .. } => "play_photo",
            Self::Danmaku(_) => "danmaku",
            Self::ActivityEnded { .. } => "activity_ended",
            Self::Pong { .. } => "pong",
            Self::Error { .. } => "error",
        }
    }
}

/// Photo metadata as returned by `POST /upload` and announced over the
/// socket once the upload has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSubmission {
    pub drive_file_id: String,
    pub thumbnail_url: String,
    pub full_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Frames sent to the backend, session id included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        session_id: String,
        role: Role,
    },
    PhotoAdded {
        drive_file_id: String,
        thumbnail_url: String,
        full_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        session_id: String,
    },
    Danmaku {
        content: String,
        session_id: String,
    },
    Ping {
        session_id: String,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

/// What callers hand to `RealtimeConnection::send`. `join` is not here:
/// the transport sends it by itself on every open.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    PhotoAdded(PhotoSubmission),
    Danmaku { content: String },
    Ping,
}

impl OutgoingMessage {
    pub fn danmaku(content: impl Into<String>) -> Self {
        Self::Danmaku {
            content: content.into(),
        }
    }

    /// Attach the session id.
    pub fn with_session(self, session_id: &str) -> ClientMessage {
        let session_id = session_id.to_string();
        match self {
            Self::PhotoAdded(photo) => ClientMessage::PhotoAdded {
                drive_file_id: photo.drive_file_id,
                thumbnail_url: photo.thumbnail_url,
                full_url: photo.full_url,
                width: photo.width,
                height: photo.height,
                session_id,
            },
            Self::Danmaku { content } => ClientMessage::Danmaku {
                content,
                session_id,
            },
            Self::Ping => ClientMessage::Ping { session_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn photo_json(id: &str) -> Value {
        json!({
            "id": id,
            "activityId": "abc123",
            "sessionId": "s1",
            "driveFileId": format!("d-{id}"),
            "thumbnailUrl": format!("https://t/{id}"),
            "fullUrl": format!("https://f/{id}"),
            "uploadedAt": 1700000000000i64
        })
    }

    #[test]
    fn test_decode_joined_snapshot() {
        let frame = json!({
            "type": "joined",
            "activityId": "abc123",
            "photos": [photo_json("p1"), photo_json("p2")],
            "timestamp": 5
        });
        match ServerMessage::decode(&frame.to_string()).unwrap() {
            ServerMessage::Joined {
                activity_id,
                photos,
                playlist,
                current_index,
                ..
            } => {
                assert_eq!(activity_id, "abc123");
                assert_eq!(photos.len(), 2);
                assert_eq!(photos[1].full_url, "https://f/p2");
                assert!(playlist.is_none());
                assert!(current_index.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_joined_with_playlist() {
        let frame = json!({
            "type": "joined",
            "activityId": "abc123",
            "photos": [],
            "timestamp": 5,
            "playlist": [photo_json("p9")],
            "currentIndex": 0
        });
        let msg = ServerMessage::decode(&frame.to_string()).unwrap();
        let ServerMessage::Joined {
            playlist: Some(playlist),
            current_index: Some(0),
            ..
        } = &msg
        else {
            panic!("playlist missing: {msg:?}");
        };
        assert_eq!(playlist[0].id, "p9");
    }

    #[test]
    fn test_decode_flat_danmaku() {
        let frame = r#"{"type":"danmaku","id":"m1","content":"hi","sessionId":"s1","timestamp":7}"#;
        let msg = ServerMessage::decode(frame).unwrap();
        assert_eq!(msg.kind(), "danmaku");
        assert_eq!(
            msg,
            ServerMessage::Danmaku(DanmakuMessage {
                id: "m1".into(),
                content: "hi".into(),
                session_id: "s1".into(),
                timestamp: 7,
            })
        );
    }

    #[test]
    fn test_decode_error_and_pong() {
        let err = ServerMessage::decode(
            r#"{"type":"error","code":"RATE_LIMITED","message":"slow down","retryAfter":3}"#,
        )
        .unwrap();
        assert_eq!(
            err,
            ServerMessage::Error {
                code: "RATE_LIMITED".into(),
                message: "slow down".into(),
                retry_after: Some(3),
            }
        );

        let pong = ServerMessage::decode(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(pong, ServerMessage::Pong { timestamp: 0 });
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ServerMessage::decode("not json"),
            Err(ProtocolError::Decode(_))
        ));
        assert!(matches!(
            ServerMessage::decode(r#"{"type":"unknown"}"#),
            Err(ProtocolError::Decode(_))
        ));
        assert!(matches!(
            ServerMessage::decode_bytes(&[0xff, 0xfe]),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_join_wire_shape() {
        let join = ClientMessage::Join {
            session_id: "s1".into(),
            role: Role::Display,
        };
        let value: Value = serde_json::from_str(&join.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "join", "sessionId": "s1", "role": "display"}));
    }

    #[test]
    fn test_outgoing_gets_session_id() {
        let value: Value = serde_json::from_str(
            &OutgoingMessage::danmaku("hello").with_session("s1").encode().unwrap(),
        )
        .unwrap();
        assert_eq!(value, json!({"type": "danmaku", "content": "hello", "sessionId": "s1"}));

        let value: Value =
            serde_json::from_str(&OutgoingMessage::Ping.with_session("s1").encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "ping", "sessionId": "s1"}));
    }

    #[test]
    fn test_photo_added_omits_missing_dimensions() {
        let submission = PhotoSubmission {
            drive_file_id: "d1".into(),
            thumbnail_url: "https://t".into(),
            full_url: "https://f".into(),
            width: Some(640),
            height: None,
        };
        let value: Value = serde_json::from_str(
            &OutgoingMessage::PhotoAdded(submission)
                .with_session("s1")
                .encode()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "photo_added",
                "driveFileId": "d1",
                "thumbnailUrl": "https://t",
                "fullUrl": "https://f",
                "width": 640,
                "sessionId": "s1"
            })
        );
    }
}
