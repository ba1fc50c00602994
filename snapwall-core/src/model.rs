//! Data model shared by the scheduler, the animator and the wire protocol.
//!
//! Field names follow the backend's JSON (camelCase). Records are
//! immutable once received; the client only ever holds a read-only mirror.

use serde::{Deserialize, Serialize};

/// One uploaded photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub activity_id: String,
    pub session_id: String,
    pub drive_file_id: String,
    pub thumbnail_url: String,
    pub full_url: String,
    /// Upload time, milliseconds since the Unix epoch.
    pub uploaded_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A short text message flown across the display.
///
/// Each `id` is animated at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanmakuMessage {
    pub id: String,
    pub content: String,
    pub session_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Ended,
}

/// Event (activity) metadata as returned by `GET /events/:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_folder_id: Option<String>,
    #[serde(default)]
    pub photo_count: u32,
    #[serde(default)]
    pub participant_count: u32,
}

/// Body of `GET /events/:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    pub event: Event,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub active_connections: u32,
}

#[cfg(test)]
pub(crate) fn test_photo(id: &str) -> Photo {
    Photo {
        id: id.to_string(),
        activity_id: "act".into(),
        session_id: "sess".into(),
        drive_file_id: format!("drive-{id}"),
        thumbnail_url: format!("https://img.test/{id}/thumb"),
        full_url: format!("https://img.test/{id}/full"),
        uploaded_at: 1_700_000_000_000,
        width: None,
        height: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_decodes_camel_case() {
        let json = r#"{
            "id": "p1",
            "activityId": "a1",
            "sessionId": "s1",
            "driveFileId": "d1",
            "thumbnailUrl": "https://t",
            "fullUrl": "https://f",
            "uploadedAt": 1700000000000,
            "width": 800
        }"#;
        let photo: Photo = serde_json::from_str(json).unwrap();
        assert_eq!(photo.id, "p1");
        assert_eq!(photo.activity_id, "a1");
        assert_eq!(photo.full_url, "https://f");
        assert_eq!(photo.width, Some(800));
        assert_eq!(photo.height, None);
    }

    #[test]
    fn test_photo_omits_missing_dimensions() {
        let json = serde_json::to_string(&test_photo("p1")).unwrap();
        assert!(!json.contains("width"));
        assert!(json.contains("\"driveFileId\":\"drive-p1\""));
    }

    #[test]
    fn test_event_snapshot_decodes() {
        let json = r#"{
            "event": {
                "id": "abc123",
                "createdAt": 1,
                "status": "ended",
                "photoCount": 2,
                "participantCount": 5
            },
            "photos": [],
            "activeConnections": 3
        }"#;
        let snapshot: EventSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.event.status, EventStatus::Ended);
        assert_eq!(snapshot.event.title, None);
        assert_eq!(snapshot.active_connections, 3);
        assert!(snapshot.photos.is_empty());
    }
}
