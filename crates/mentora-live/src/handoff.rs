//! Room hand-off payload

use mentora_config::LiveRoomSettings;
use mentora_util::SessionId;
use serde::{Deserialize, Serialize};

/// Everything the live transport needs to put a participant in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomHandoff {
    /// Room name: configured prefix followed by the session id
    pub room: String,
    pub domain: String,
    pub display_name: String,
    pub start_audio_muted: bool,
    pub start_video_muted: bool,
}

impl RoomHandoff {
    pub fn for_session(
        settings: &LiveRoomSettings,
        session_id: &SessionId,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            room: format!("{}{}", settings.room_prefix, session_id),
            domain: settings.domain.clone(),
            display_name: display_name.into(),
            start_audio_muted: settings.start_audio_muted,
            start_video_muted: settings.start_video_muted,
        }
    }

    /// Full meeting URL
    pub fn url(&self) -> String {
        format!("https://{}/{}", self.domain, self.room)
    }
}
