//! Stream event envelope.
//!
//! Every event carries the storyboard id and a build status. `init` and
//! `complete` also carry the title and the full ordered frame list; `frame`
//! carries the single frame that changed; `end` carries nothing else.

use std::sync::Arc;

use serde::Serialize;
use storyboard_core::frame_cache::FrameView;
use storyboard_core::types::EntityId;

/// Event name on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventKind {
    Init,
    Frame,
    Complete,
    End,
}

impl StreamEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Frame => "frame",
            Self::Complete => "complete",
            Self::End => "end",
        }
    }
}

/// Build status reported alongside every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Generating,
    Complete,
}

/// JSON payload of a stream event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPayload {
    pub storyboard_id: EntityId,
    pub status: StreamStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<Arc<FrameView>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<Arc<FrameView>>,
}

/// One named event ready to be written to a client.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub kind: StreamEventKind,
    pub payload: StreamPayload,
}

impl StreamEvent {
    fn bare(kind: StreamEventKind, storyboard_id: &str, status: StreamStatus) -> Self {
        Self {
            kind,
            payload: StreamPayload {
                storyboard_id: storyboard_id.to_string(),
                status,
                title: None,
                frames: None,
                frame: None,
            },
        }
    }

    pub fn init(
        storyboard_id: &str,
        status: StreamStatus,
        title: &str,
        frames: Vec<Arc<FrameView>>,
    ) -> Self {
        let mut event = Self::bare(StreamEventKind::Init, storyboard_id, status);
        event.payload.title = Some(title.to_string());
        event.payload.frames = Some(frames);
        event
    }

    pub fn frame(storyboard_id: &str, frame: Arc<FrameView>) -> Self {
        let mut event = Self::bare(StreamEventKind::Frame, storyboard_id, StreamStatus::Generating);
        event.payload.frame = Some(frame);
        event
    }

    pub fn complete(storyboard_id: &str, title: &str, frames: Vec<Arc<FrameView>>) -> Self {
        let mut event = Self::bare(StreamEventKind::Complete, storyboard_id, StreamStatus::Complete);
        event.payload.title = Some(title.to_string());
        event.payload.frames = Some(frames);
        event
    }

    pub fn end(storyboard_id: &str) -> Self {
        Self::bare(StreamEventKind::End, storyboard_id, StreamStatus::Complete)
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// The payload serialized as JSON.
    pub fn data_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_payload_has_only_id_and_status() {
        let json: serde_json::Value =
            serde_json::from_str(&StreamEvent::end("sb-1").data_json().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"storyboardId": "sb-1", "status": "complete"}));
    }

    #[test]
    fn init_payload_carries_title_and_frames() {
        let event = StreamEvent::init("sb-1", StreamStatus::Generating, "Dawn", Vec::new());
        let json: serde_json::Value = serde_json::from_str(&event.data_json().unwrap()).unwrap();
        assert_eq!(event.name(), "init");
        assert_eq!(json["title"], "Dawn");
        assert_eq!(json["status"], "generating");
        assert!(json["frames"].as_array().unwrap().is_empty());
        assert!(json.get("frame").is_none());
    }
}
